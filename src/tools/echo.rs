//! Echo 工具（测试与本地调试用）

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::{parse_args, schema_of};
use crate::tools::Tool;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct EchoArgs {
    /// 要回显的文本
    #[serde(default)]
    pub text: Option<String>,
}

/// 回显 args.text
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text back."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<EchoArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: EchoArgs = parse_args(self.name(), args)?;
        Ok(args.text.unwrap_or_else(|| "(empty)".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_without_text() {
        assert_eq!(EchoTool.execute(Value::Null).await.unwrap(), "(empty)");
    }
}
