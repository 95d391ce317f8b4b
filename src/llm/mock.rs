//! 本地补全实现（无需 API）
//!
//! - MockLlmClient：回显最后一条用户消息，供 CLI 本地跑通编排流程
//! - ScriptedLlm：按脚本或闭包给出回复 / 工具调用 / 错误 / 挂起，并记录每次请求，供测试断言

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use serde_json::Value;

use crate::llm::{CompletionChunk, CompletionProvider, CompletionRequest, CompletionStream, LlmError};
use crate::memory::{Message, Role, ToolCallDescriptor};

/// 回显客户端
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl CompletionProvider for MockLlmClient {
    async fn complete_stream(
        &self,
        request: CompletionRequest<'_>,
    ) -> Result<CompletionStream, LlmError> {
        let last_user = last_user_text(request.messages).unwrap_or("(no input)");
        let text = format!("Echo from Mock: {last_user}");
        let chunks: Vec<Result<CompletionChunk, LlmError>> = vec![Ok(CompletionChunk::Text(text))];
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// 脚本中的一步
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// 整段回复（单个块）
    Reply(String),
    /// 分块回复
    Chunks(Vec<String>),
    /// 请求调用工具
    Call { tool: String, args: Value },
    /// 返回提供方错误
    Fail(LlmError),
    /// 永不返回（用于超时与取消）
    Hang,
}

impl ScriptStep {
    pub fn reply(text: impl Into<String>) -> Self {
        ScriptStep::Reply(text.into())
    }

    pub fn call(tool: impl Into<String>, args: Value) -> Self {
        ScriptStep::Call {
            tool: tool.into(),
            args,
        }
    }
}

/// 一次被记录的请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

type ScriptFn = dyn Fn(&RecordedRequest) -> ScriptStep + Send + Sync;

enum Script {
    Queue(Mutex<VecDeque<ScriptStep>>),
    Func(Box<ScriptFn>),
}

/// 脚本化补全：队列模式按顺序消费步骤，闭包模式按请求内容决定
pub struct ScriptedLlm {
    script: Script,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ScriptedLlm {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(steps.into_iter().collect())),
            requests: Arc::default(),
        }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&RecordedRequest) -> ScriptStep + Send + Sync + 'static,
    {
        Self {
            script: Script::Func(Box::new(f)),
            requests: Arc::default(),
        }
    }

    /// 每轮都回同一句话
    pub fn constant(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_fn(move |_| ScriptStep::Reply(text.clone()))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_step(&self, recorded: &RecordedRequest) -> ScriptStep {
        match &self.script {
            Script::Func(f) => f(recorded),
            Script::Queue(q) => q
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_else(|| {
                    ScriptStep::Fail(LlmError::InvalidResponse("script exhausted".to_string()))
                }),
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedLlm {
    async fn complete_stream(
        &self,
        request: CompletionRequest<'_>,
    ) -> Result<CompletionStream, LlmError> {
        let recorded = RecordedRequest {
            system_prompt: request.system_prompt.to_string(),
            messages: request.messages.to_vec(),
            tools: request.tools.iter().map(|t| t.name.clone()).collect(),
        };
        let step = self.next_step(&recorded);
        if let Ok(mut log) = self.requests.lock() {
            log.push(recorded);
        }

        let chunks: Vec<Result<CompletionChunk, LlmError>> = match step {
            ScriptStep::Reply(text) => vec![Ok(CompletionChunk::Text(text))],
            ScriptStep::Chunks(parts) => parts.into_iter().map(|p| Ok(CompletionChunk::Text(p))).collect(),
            ScriptStep::Call { tool, args } => {
                vec![Ok(CompletionChunk::ToolCall(ToolCallDescriptor::new(tool, args)))]
            }
            ScriptStep::Fail(e) => return Err(e),
            ScriptStep::Hang => {
                return Ok(Box::pin(stream::pending::<Result<CompletionChunk, LlmError>>()))
            }
        };
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// 窗口中最后一条用户消息
pub fn last_user_text(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Completion;

    fn req<'a>(messages: &'a [Message]) -> CompletionRequest<'a> {
        CompletionRequest {
            system_prompt: "sys",
            messages,
            tools: &[],
        }
    }

    #[tokio::test]
    async fn test_mock_echoes_last_user_message() {
        let msgs = vec![Message::user("first"), Message::assistant("x"), Message::user("second")];
        let out = MockLlmClient.complete(req(&msgs)).await.unwrap();
        assert_eq!(out, Completion::Message("Echo from Mock: second".into()));
    }

    #[tokio::test]
    async fn test_scripted_queue_runs_in_order_then_exhausts() {
        let llm = ScriptedLlm::new(vec![
            ScriptStep::call("add_one", serde_json::json!({"n": 1})),
            ScriptStep::reply("done"),
        ]);
        let msgs = vec![Message::user("go")];
        assert!(matches!(llm.complete(req(&msgs)).await.unwrap(), Completion::ToolCall { .. }));
        assert_eq!(llm.complete(req(&msgs)).await.unwrap(), Completion::Message("done".into()));
        assert!(llm.complete(req(&msgs)).await.is_err());
        assert_eq!(llm.calls(), 3);
        assert_eq!(llm.requests()[0].system_prompt, "sys");
    }

    #[tokio::test]
    async fn test_scripted_fn_sees_request() {
        let llm = ScriptedLlm::from_fn(|r| {
            ScriptStep::reply(format!("Hello, {}!", last_user_text(&r.messages).unwrap_or("")))
        });
        let msgs = vec![Message::user("ABI")];
        assert_eq!(
            llm.complete(req(&msgs)).await.unwrap(),
            Completion::Message("Hello, ABI!".into())
        );
    }
}
