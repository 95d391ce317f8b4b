//! 补全提供方抽象
//!
//! 所有后端实现 CompletionProvider：complete_stream 返回增量块流，
//! 流中出现 ToolCall 块表示「模型想调用工具 X，参数为 Y」，否则是普通回答。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use thiserror::Error;

use crate::memory::{Message, ToolCallDescriptor};
use crate::tools::ToolSchema;

/// 提供方错误（超时、鉴权、限流、响应格式）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("completion request failed: {0}")]
    Request(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("embedding failed: {0}")]
    Embedding(String),
}

/// 一次补全请求：系统提示 + 消息窗口 + 可用工具 schema
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolSchema],
}

/// 流式补全的单个增量
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionChunk {
    Text(String),
    ToolCall(ToolCallDescriptor),
}

/// 补全的最终结果
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// 直接回答
    Message(String),
    /// 请求调用工具；content 为调用前已输出的文字（可为空）
    ToolCall {
        content: String,
        call: ToolCallDescriptor,
    },
}

pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<CompletionChunk, LlmError>> + Send>>;

/// 补全提供方 trait：流式补全，complete 默认收集整条流
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 流式补全，返回增量块流
    async fn complete_stream(
        &self,
        request: CompletionRequest<'_>,
    ) -> Result<CompletionStream, LlmError>;

    /// 非流式完成
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, LlmError> {
        let stream = self.complete_stream(request).await?;
        collect_completion(stream).await
    }
}

/// 收集一条补全流：拼接文本，遇到第一个工具调用即视为工具调用结果
pub async fn collect_completion(mut stream: CompletionStream) -> Result<Completion, LlmError> {
    let mut content = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk? {
            CompletionChunk::Text(text) => content.push_str(&text),
            CompletionChunk::ToolCall(call) => return Ok(Completion::ToolCall { content, call }),
        }
    }
    Ok(Completion::Message(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn test_collect_plain_answer() {
        let s: CompletionStream = Box::pin(stream::iter(vec![
            Ok(CompletionChunk::Text("4".into())),
            Ok(CompletionChunk::Text("2".into())),
        ]));
        assert_eq!(collect_completion(s).await.unwrap(), Completion::Message("42".into()));
    }

    #[tokio::test]
    async fn test_collect_tool_call_keeps_prefix() {
        let call = ToolCallDescriptor::new("add_one", serde_json::json!({"n": 42}));
        let s: CompletionStream = Box::pin(stream::iter(vec![
            Ok(CompletionChunk::Text("let me add".into())),
            Ok(CompletionChunk::ToolCall(call.clone())),
        ]));
        match collect_completion(s).await.unwrap() {
            Completion::ToolCall { content, call: got } => {
                assert_eq!(content, "let me add");
                assert_eq!(got, call);
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_collect_propagates_error() {
        let s: CompletionStream = Box::pin(stream::iter(vec![
            Ok(CompletionChunk::Text("partial".into())),
            Err(LlmError::RateLimited { retry_after_ms: 10 }),
        ]));
        assert!(matches!(
            collect_completion(s).await,
            Err(LlmError::RateLimited { retry_after_ms: 10 })
        ));
    }
}
