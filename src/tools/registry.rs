//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! ToolRegistry 是进程级工具池：智能体定义按名引用，构建时解析为 Arc<dyn Tool>。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// 发给补全提供方的工具描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 工具 trait：错误是数据（Err(String) 会作为工具错误消息回填给模型），不会中止回合
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（能力表中的键）
    fn name(&self) -> &str;

    /// 工具描述（供模型理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }

    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 工具池：按名称存储 Arc<dyn Tool>，名称有序便于稳定输出
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名已存在时返回 false 且不覆盖
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> bool {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return false;
        }
        self.tools.insert(name, tool);
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;

    #[test]
    fn test_register_rejects_duplicate_name() {
        let mut reg = ToolRegistry::new();
        assert!(reg.register(Arc::new(EchoTool)));
        assert!(!reg.register(Arc::new(EchoTool)));
        assert_eq!(reg.tool_names(), vec!["echo".to_string()]);
    }

    #[tokio::test]
    async fn test_lookup_and_execute() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let tool = reg.get("echo").unwrap();
        let out = tool.execute(serde_json::json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, "hi");
        assert_eq!(tool.schema().name, "echo");
        assert!(reg.get("missing").is_none());
    }
}
