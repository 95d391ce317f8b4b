//! 记忆层：对话消息、线程检查点、会话存储（内存 / SQLite）

pub mod checkpoint;
pub mod conversation;
pub mod sqlite_store;
pub mod store;

pub use checkpoint::{Checkpoint, PendingCandidate, RoutingState, CHECKPOINT_VERSION};
pub use conversation::{context_window, Message, Role, ToolCallDescriptor};
pub use sqlite_store::SqliteStore;
pub use store::{create_store, ConversationStore, MemoryStore, StoreError, ThreadId};
