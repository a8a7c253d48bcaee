//! 工具注册表
//!
//! 所有工具实现 Tool trait（declaration / execute），在启动时经 ToolRegistryBuilder 注册，
//! build 之后只读，可通过 Arc 在并发请求间共享且无需加锁。ToolExecutor 在调用时负责校验与超时。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::{RegistryError, ToolError};
use crate::tools::ToolDeclaration;

/// 工具 trait：声明（供后端理解）、异步执行（参数为 JSON 对象）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具声明；注册时读取一次
    fn declaration(&self) -> ToolDeclaration;

    /// 执行工具，返回结构化结果或错误描述
    async fn execute(&self, args: Map<String, Value>) -> Result<Value, String>;
}

/// 注册表条目
#[derive(Clone)]
pub struct RegisteredTool {
    pub declaration: ToolDeclaration,
    pub tool: Arc<dyn Tool>,
}

/// 只读工具注册表：保持注册顺序，按名查找
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// 按注册顺序返回全部声明
    pub fn list_declarations(&self) -> Vec<ToolDeclaration> {
        self.entries.iter().map(|e| e.declaration.clone()).collect()
    }

    pub fn lookup(&self, name: &str) -> Result<&RegisteredTool, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.declaration.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 配置期构建器：注册只在这里发生
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn register_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// 校验名称唯一与声明合法后冻结
    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut registry = ToolRegistry::default();
        for tool in self.tools {
            let declaration = tool.declaration();
            validate_declaration(&declaration)?;
            if registry.index.contains_key(&declaration.name) {
                return Err(RegistryError::DuplicateTool(declaration.name));
            }
            registry
                .index
                .insert(declaration.name.clone(), registry.entries.len());
            registry.entries.push(RegisteredTool { declaration, tool });
        }
        Ok(registry)
    }
}

fn validate_declaration(decl: &ToolDeclaration) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidDeclaration {
        tool: decl.name.clone(),
        reason: reason.to_string(),
    };
    if decl.name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    let mut seen = std::collections::HashSet::new();
    for p in &decl.parameters {
        if !seen.insert(p.name.as_str()) {
            return Err(invalid(&format!("duplicate parameter {}", p.name)));
        }
    }
    Ok(())
}
