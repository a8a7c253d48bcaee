//! bookRide 工具：预约出行

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::tools::schema::declaration_for;
use crate::tools::{Tool, ToolDeclaration};

pub const BOOK_RIDE: &str = "bookRide";

const RIDE_TYPES: &[&str] = &["standard", "premium", "shared"];

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BookRideArgs {
    /// Where the driver should pick the user up
    pub pickup: String,
    /// Where the user wants to go
    pub destination: String,
    /// One of "standard", "premium" or "shared" (defaults to "standard")
    pub ride_type: Option<String>,
}

#[derive(Debug, Default)]
pub struct BookRideTool;

impl BookRideTool {
    pub fn new() -> Self {
        Self
    }
}

fn eta_minutes(ride_type: &str) -> u32 {
    match ride_type {
        "premium" => 4,
        "shared" => 12,
        _ => 7,
    }
}

#[async_trait]
impl Tool for BookRideTool {
    fn declaration(&self) -> ToolDeclaration {
        declaration_for::<BookRideArgs>(
            BOOK_RIDE,
            "Book a ride for the user from a pickup location to a destination.",
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, String> {
        let args: BookRideArgs =
            serde_json::from_value(Value::Object(args)).map_err(|e| e.to_string())?;

        let ride_type = args
            .ride_type
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| "standard".to_string());
        if !RIDE_TYPES.contains(&ride_type.as_str()) {
            return Err(format!(
                "unsupported ride_type {ride_type}; expected one of {}",
                RIDE_TYPES.join(", ")
            ));
        }
        if args.pickup.trim() == args.destination.trim() {
            return Err("pickup and destination must differ".to_string());
        }

        let booking_id = format!("ride_{}", uuid::Uuid::new_v4().simple());
        tracing::info!(booking_id = %booking_id, ride_type = %ride_type, "ride booked");

        Ok(json!({
            "message": "Ride booked",
            "booking_id": booking_id,
            "ride_type": ride_type,
            "pickup": args.pickup,
            "destination": args.destination,
            "eta_minutes": eta_minutes(&ride_type),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_default_ride_type() {
        let out = BookRideTool
            .execute(args(json!({"pickup": "Home", "destination": "Yoga studio"})))
            .await
            .unwrap();
        assert_eq!(out["ride_type"], "standard");
        assert_eq!(out["eta_minutes"], 7);
    }

    #[tokio::test]
    async fn test_unknown_ride_type_rejected() {
        let err = BookRideTool
            .execute(args(json!({
                "pickup": "Home",
                "destination": "Park",
                "ride_type": "helicopter"
            })))
            .await
            .unwrap_err();
        assert!(err.contains("helicopter"));
    }

    #[test]
    fn test_declaration() {
        let decl = BookRideTool.declaration();
        let mut required: Vec<&str> = decl.required_parameters().collect();
        required.sort();
        assert_eq!(required, vec!["destination", "pickup"]);
    }
}
