//! SQLite 检查点存储
//!
//! 每个线程一行（thread_id 主键，检查点 JSON）；写入在事务内 UPSERT，失败即回滚，
//! 因此任何时刻只能读到上一次完整提交的检查点。rusqlite 为同步连接，放入 spawn_blocking 执行。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::memory::{Checkpoint, ConversationStore, StoreError};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// 打开（或创建）数据库文件并初始化表
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(backend)?;
        Self::from_connection(conn)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id TEXT PRIMARY KEY,
                agent TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
             );",
        )
        .map_err(backend)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("sqlite connection poisoned".to_string()))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("blocking task failed: {e}")))?
    }
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let thread_id = thread_id.to_string();
        let body: Option<String> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT body FROM checkpoints WHERE thread_id = ?1",
                    params![thread_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(backend)
            })
            .await?;
        match body {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let body = serde_json::to_string(checkpoint)?;
        let thread_id = thread_id.to_string();
        let agent = checkpoint.agent.clone();
        let updated_at = checkpoint.updated_at.to_rfc3339();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(backend)?;
            tx.execute(
                "INSERT INTO checkpoints (thread_id, agent, body, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(thread_id) DO UPDATE SET
                    agent = excluded.agent,
                    body = excluded.body,
                    updated_at = excluded.updated_at",
                params![thread_id, agent, body, updated_at],
            )
            .map_err(backend)?;
            tx.commit().map_err(backend)
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Message, RoutingState};

    #[tokio::test]
    async fn test_sqlite_store_overwrites_checkpoint() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get("t1").await.unwrap().is_none());

        let mut cp = Checkpoint::empty("A");
        cp.messages.push(Message::user("one"));
        store.put("t1", &cp).await.unwrap();

        cp.messages.push(Message::assistant("two"));
        store.put("t1", &cp).await.unwrap();

        let loaded = store.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.routing, RoutingState::Idle);
    }

    #[tokio::test]
    async fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hive.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            let mut cp = Checkpoint::empty("A");
            cp.messages.push(Message::user("persist me"));
            store.put("thread-9", &cp).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.get("thread-9").await.unwrap().unwrap();
        assert_eq!(loaded.messages[0].content, "persist me");
    }
}
