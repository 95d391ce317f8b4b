//! 闭包工具：把同步函数包装成 Tool，便于嵌入方与测试快速注册

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

type ToolFn = dyn Fn(Value) -> Result<String, String> + Send + Sync;

pub struct FnTool {
    name: String,
    description: String,
    parameters: Value,
    f: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
            f: Box::new(f),
        }
    }

    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = schema;
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        (self.f)(args)
    }
}
