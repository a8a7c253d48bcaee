pub mod book_ride;
pub mod call;
pub mod declaration;
pub mod executor;
pub mod order_food;
pub mod registry;
pub mod schema;

pub use book_ride::BookRideTool;
pub use call::{ToolCallRequest, ToolCallResult, ToolStatus};
pub use declaration::{ParamType, ToolDeclaration, ToolParameter};
pub use executor::ToolExecutor;
pub use order_food::OrderFoodTool;
pub use registry::{RegisteredTool, Tool, ToolRegistry, ToolRegistryBuilder};
pub use schema::declaration_for;

use crate::core::RegistryError;

/// 进程启动时的默认工具集（orderFood、bookRide）
pub fn default_registry() -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::builder()
        .register(OrderFoodTool::new())
        .register(BookRideTool::new())
        .build()
}
