//! 会话存储抽象层
//!
//! 核心只依赖 get / put 两个方法：按线程 ID 读取与整体覆盖写入检查点。
//! 写入对单个线程是原子的：失败的 put 不会让后续 get 看到半写入的检查点。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::{StoreBackend, StoreSection};
use crate::memory::Checkpoint;

/// 线程 ID（由调用方提供的不透明字符串）
pub type ThreadId = String;

/// 存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 会话存储接口
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// 读取线程检查点；不存在时返回 None
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// 整体覆盖写入线程检查点
    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), StoreError>;

    /// 后端名称（日志用）
    fn backend(&self) -> &'static str;
}

/// 内存会话存储：HashMap 整值替换，天然满足单线程原子写
#[derive(Default)]
pub struct MemoryStore {
    checkpoints: RwLock<HashMap<ThreadId, Checkpoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checkpoints.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.checkpoints.read().await.get(thread_id).cloned())
    }

    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        self.checkpoints
            .write()
            .await
            .insert(thread_id.to_string(), checkpoint.clone());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// 按配置创建会话存储；后端只在启动时选择一次，失败直接返回错误而不静默回退
pub fn create_store(section: &StoreSection) -> Result<Arc<dyn ConversationStore>, StoreError> {
    match section.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory conversation store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let path = section
                .path
                .clone()
                .unwrap_or_else(|| std::path::PathBuf::from("data/hive.db"));
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let store = super::sqlite_store::SqliteStore::open(&path)?;
            tracing::info!("Using sqlite conversation store: {:?}", path);
            Ok(Arc::new(store))
        }
    }
}
