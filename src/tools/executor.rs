//! 工具执行器
//!
//! 对每次调用施加超时；工具返回 Err 或超时都转成带 is_error 的结果（回填给模型，不中止回合）。
//! 每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::tools::Tool;

/// 一次工具调用的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOutcomeKind {
    Ok,
    Error,
    Timeout,
}

impl ToolOutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolOutcomeKind::Ok => "ok",
            ToolOutcomeKind::Error => "error",
            ToolOutcomeKind::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub kind: ToolOutcomeKind,
    /// 成功时为工具输出，失败时为错误描述
    pub content: String,
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        self.kind != ToolOutcomeKind::Ok
    }
}

#[derive(Debug, Clone)]
pub struct ToolExecutor {
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn execute(&self, tool: &dyn Tool, args: Value) -> ToolOutcome {
        let start = Instant::now();
        let preview = args_preview(&args);
        let result = timeout(self.timeout, tool.execute(args)).await;

        let outcome = match result {
            Ok(Ok(content)) => ToolOutcome {
                kind: ToolOutcomeKind::Ok,
                content,
            },
            Ok(Err(e)) => ToolOutcome {
                kind: ToolOutcomeKind::Error,
                content: e,
            },
            Err(_) => ToolOutcome {
                kind: ToolOutcomeKind::Timeout,
                content: format!(
                    "tool '{}' timed out after {}ms",
                    tool.name(),
                    self.timeout.as_millis()
                ),
            },
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool.name(),
            "ok": !outcome.is_error(),
            "outcome": outcome.kind.as_str(),
            "duration_ms": u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "args_preview": preview,
        });
        tracing::info!(audit = %audit, "tool");
        outcome
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoTool, FnTool};

    #[tokio::test]
    async fn test_ok_outcome() {
        let ex = ToolExecutor::new(Duration::from_secs(1));
        let out = ex.execute(&EchoTool, serde_json::json!({"text": "ping"})).await;
        assert_eq!(out.kind, ToolOutcomeKind::Ok);
        assert_eq!(out.content, "ping");
    }

    #[tokio::test]
    async fn test_error_is_data() {
        let failing = FnTool::new("boom", "always fails", |_| Err("kaput".to_string()));
        let out = ToolExecutor::new(Duration::from_secs(1))
            .execute(&failing, Value::Null)
            .await;
        assert!(out.is_error());
        assert_eq!(out.content, "kaput");
    }

    struct SlowTool;

    #[async_trait::async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_outcome() {
        let out = ToolExecutor::new(Duration::from_millis(20))
            .execute(&SlowTool, Value::Null)
            .await;
        assert_eq!(out.kind, ToolOutcomeKind::Timeout);
        assert!(out.content.contains("timed out"));
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = serde_json::json!({"text": "x".repeat(500)});
        assert!(args_preview(&long).ends_with("..."));
    }
}
