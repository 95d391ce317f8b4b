//! 错误类型
//!
//! - AgentError：回合运行期错误，只有它会中止回合（提供方错误、超时、取消、工具循环超限、存储失败）
//! - RegistryError：注册 / 构建期配置错误，在任何线程创建之前快速失败
//!
//! 工具错误不在此列：它们作为 tool 消息回填给模型。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;
use crate::memory::StoreError;

/// 回合运行期错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(#[from] LlmError),

    #[error("{stage} timed out after {millis}ms")]
    Timeout { stage: &'static str, millis: u64 },

    #[error("turn cancelled")]
    Cancelled,

    #[error("tool loop exceeded: more than {limit} tool calls in one turn")]
    ToolLoopExceeded { limit: usize },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("delegation to {agent} failed: {source}")]
    Delegation {
        agent: String,
        #[source]
        source: Box<AgentError>,
    },
}

/// Error 事件携带的机器可读类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Provider,
    Timeout,
    Cancelled,
    ToolLoopExceeded,
    Store,
    UnknownCapability,
    Delegation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Provider => "provider",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::ToolLoopExceeded => "tool_loop_exceeded",
            ErrorKind::Store => "store",
            ErrorKind::UnknownCapability => "unknown_capability",
            ErrorKind::Delegation => "delegation",
        }
    }
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Provider(_) => ErrorKind::Provider,
            AgentError::Timeout { .. } => ErrorKind::Timeout,
            AgentError::Cancelled => ErrorKind::Cancelled,
            AgentError::ToolLoopExceeded { .. } => ErrorKind::ToolLoopExceeded,
            AgentError::Store(_) => ErrorKind::Store,
            AgentError::UnknownCapability(_) => ErrorKind::UnknownCapability,
            AgentError::Delegation { .. } => ErrorKind::Delegation,
        }
    }

    /// 子智能体失败包装为 Delegation；取消保持原样向上传递
    pub fn delegated(agent: &str, err: AgentError) -> Self {
        match err {
            AgentError::Cancelled => AgentError::Cancelled,
            other => AgentError::Delegation {
                agent: agent.to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// 注册与构建期配置错误
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("agent already registered: {0}")]
    DuplicateAgent(String),

    #[error("tool already registered: {0}")]
    DuplicateTool(String),

    #[error("provider already registered: {0}")]
    DuplicateProvider(String),

    #[error("agent {agent}: capability name '{name}' is used more than once")]
    DuplicateCapability { agent: String, name: String },

    #[error("cyclic agent nesting: {}", path.join(" -> "))]
    CyclicNesting { path: Vec<String> },

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("agent {agent}: unknown sub-agent '{name}'")]
    UnknownSubAgent { agent: String, name: String },

    #[error("agent {agent}: unknown tool '{tool}'")]
    UnknownTool { agent: String, tool: String },

    #[error("agent {agent}: unknown provider '{provider}'")]
    UnknownProvider { agent: String, provider: String },

    #[error("agent {agent}: malformed intent: {reason}")]
    MalformedIntent { agent: String, reason: String },

    #[error("agent {agent}: failed to embed intent catalog: {source}")]
    Embedding {
        agent: String,
        #[source]
        source: LlmError,
    },

    #[error("invalid agent spec: {0}")]
    Spec(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(AgentError::Cancelled.kind().as_str(), "cancelled");
        assert_eq!(
            AgentError::ToolLoopExceeded { limit: 3 }.kind(),
            ErrorKind::ToolLoopExceeded
        );
        let json = serde_json::to_string(&ErrorKind::UnknownCapability).unwrap();
        assert_eq!(json, "\"unknown_capability\"");
    }

    #[test]
    fn test_delegated_keeps_cancellation() {
        assert!(matches!(
            AgentError::delegated("Greeter", AgentError::Cancelled),
            AgentError::Cancelled
        ));
        let err = AgentError::delegated("Greeter", LlmError::Auth("bad key".into()).into());
        assert_eq!(err.kind(), ErrorKind::Delegation);
        assert!(err.to_string().contains("Greeter"));
    }

    #[test]
    fn test_cycle_message_shows_path() {
        let err = RegistryError::CyclicNesting {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "cyclic agent nesting: A -> B -> A");
    }
}
