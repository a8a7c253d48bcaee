//! orderFood 工具：下单外卖
//!
//! 效果对外可见且不幂等（每次调用生成新订单号），但结果形状固定。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::tools::schema::declaration_for;
use crate::tools::{Tool, ToolDeclaration};

pub const ORDER_FOOD: &str = "orderFood";

/// 默认预计送达时间（分钟）
const DEFAULT_ETA_MINUTES: u32 = 35;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OrderFoodArgs {
    /// Comma-separated list of dishes to order, e.g. "Pizza, Garlic bread"
    pub food_items: String,
    /// Preferred restaurant name, if the user mentioned one
    pub restaurant: Option<String>,
    /// Delivery address, if different from the saved one
    pub delivery_address: Option<String>,
}

/// orderFood：解析菜品列表并生成订单
#[derive(Debug, Default)]
pub struct OrderFoodTool;

impl OrderFoodTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for OrderFoodTool {
    fn declaration(&self) -> ToolDeclaration {
        declaration_for::<OrderFoodArgs>(
            ORDER_FOOD,
            "Place a food delivery order for the user. Use when the user asks to order food or a meal.",
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, String> {
        let args: OrderFoodArgs =
            serde_json::from_value(Value::Object(args)).map_err(|e| e.to_string())?;

        let items: Vec<String> = args
            .food_items
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if items.is_empty() {
            return Err("food_items must name at least one dish".to_string());
        }

        let order_id = format!("ord_{}", uuid::Uuid::new_v4().simple());
        tracing::info!(order_id = %order_id, items = ?items, "food order placed");

        Ok(json!({
            "message": "Order placed",
            "order_id": order_id,
            "items": items,
            "restaurant": args.restaurant,
            "delivery_address": args.delivery_address,
            "eta_minutes": DEFAULT_ETA_MINUTES,
            "placed_at": chrono::Utc::now().to_rfc3339(),
        }))
    }
}
