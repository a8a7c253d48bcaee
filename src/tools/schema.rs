//! 由参数结构体生成工具声明（schemars 自动生成 Schema）
//!
//! 内置工具的参数用 `#[derive(Deserialize, JsonSchema)]` 描述，字段文档注释即参数描述，
//! 非 Option 字段为必填，保证声明与实际反序列化的形状一致。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

use crate::tools::{ParamType, ToolDeclaration};

/// 从 `T` 的 JSON Schema 生成 ToolDeclaration（参数顺序与结构体字段声明顺序一致）
pub fn declaration_for<T: JsonSchema>(
    name: impl Into<String>,
    description: impl Into<String>,
) -> ToolDeclaration {
    let schema = serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut decl = ToolDeclaration::new(name, description);
    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (field, prop) in props {
            let description = prop
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            decl = decl.param(
                field.clone(),
                property_type(prop),
                description,
                required.contains(&field.as_str()),
            );
        }
    }
    decl
}

/// 取属性的主类型；`["string", "null"]` 这类可空写法取第一个非 null 类型
fn property_type(prop: &Value) -> ParamType {
    let ty = match prop.get("type") {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    };
    ty.and_then(ParamType::parse).unwrap_or(ParamType::String)
}
