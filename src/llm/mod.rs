//! 模型层：补全提供方抽象（流式）、嵌入提供方、本地 / 脚本化实现

pub mod embedding;
pub mod mock;
pub mod traits;

pub use embedding::{EmbeddingProvider, HashingEmbedder};
pub use mock::{last_user_text, MockLlmClient, RecordedRequest, ScriptStep, ScriptedLlm};
pub use traits::{
    collect_completion, Completion, CompletionChunk, CompletionProvider, CompletionRequest,
    CompletionStream, LlmError,
};
