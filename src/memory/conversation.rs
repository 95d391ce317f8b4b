//! 对话消息
//!
//! 线程内消息只追加不修改，追加顺序即对话的全序。工具调用通过 ToolCallDescriptor 关联请求与结果。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
        }
    }
}

/// 工具调用描述：assistant 消息上表示「请求」，tool 消息上表示「对应哪次请求」
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCallDescriptor {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallDescriptor>,
    /// 仅 tool 消息：工具执行失败时为 true
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call: None,
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// assistant 发起的工具调用（content 可为模型在调用前输出的文字）
    pub fn tool_request(content: impl Into<String>, call: ToolCallDescriptor) -> Self {
        Self {
            tool_call: Some(call),
            ..Self::with_role(Role::Assistant, content)
        }
    }

    /// 工具结果；失败同样作为数据写回窗口，由模型决定如何回应
    pub fn tool_result(call: &ToolCallDescriptor, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            tool_call: Some(call.clone()),
            is_error,
            ..Self::with_role(Role::Tool, content)
        }
    }

    pub fn is_tool_request(&self) -> bool {
        self.role == Role::Assistant && self.tool_call.is_some()
    }
}

/// 取窗口末尾最多 max 条消息作为模型上下文；不截断持久化的日志本身
pub fn context_window(messages: &[Message], max: usize) -> &[Message] {
    if max == 0 || messages.len() <= max {
        return messages;
    }
    let mut start = messages.len() - max;
    // 不从一对 tool 请求/结果中间切开
    while start > 0 && messages[start].role == Role::Tool {
        start -= 1;
    }
    &messages[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_keeps_call_reference() {
        let call = ToolCallDescriptor::new("add_one", serde_json::json!({"n": 1}));
        let msg = Message::tool_result(&call, "2", false);
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call.as_ref().map(|c| c.id.as_str()), Some(call.id.as_str()));
        assert!(!msg.is_error);
    }

    #[test]
    fn test_context_window_does_not_split_tool_pair() {
        let call = ToolCallDescriptor::new("echo", serde_json::json!({}));
        let messages = vec![
            Message::user("a"),
            Message::tool_request("", call.clone()),
            Message::tool_result(&call, "x", false),
            Message::assistant("done"),
        ];
        let window = context_window(&messages, 2);
        assert_eq!(window.len(), 3);
        assert!(window[0].is_tool_request());
        assert_eq!(context_window(&messages, 0).len(), 4);
    }

    #[test]
    fn test_message_serde_skips_empty_fields() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("tool_call").is_none());
        assert!(json.get("is_error").is_none());
    }
}
