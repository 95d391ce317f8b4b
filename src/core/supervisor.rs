//! 线程监管：每个线程进行中回合的取消令牌
//!
//! 回合开始时登记一个子令牌（调用方令牌取消时一并取消），cancel(thread) 只影响该线程当前回合。
//! 每次登记带唯一编号，finish 只注销自己登记的那一项。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// 一次登记：回合编号 + 令牌
#[derive(Debug, Clone)]
pub struct TurnTicket {
    id: u64,
    token: CancellationToken,
}

impl TurnTicket {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[derive(Debug, Default)]
pub struct ThreadSupervisor {
    running: Mutex<HashMap<String, TurnTicket>>,
    next_id: AtomicU64,
}

impl ThreadSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记回合，返回该回合的票据
    pub fn begin(&self, thread_id: &str, caller: &CancellationToken) -> TurnTicket {
        let ticket = TurnTicket {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            token: caller.child_token(),
        };
        if let Ok(mut running) = self.running.lock() {
            running.insert(thread_id.to_string(), ticket.clone());
        }
        ticket
    }

    /// 注销回合；该线程已被更新的回合登记时不动
    pub fn finish(&self, thread_id: &str, ticket: &TurnTicket) {
        if let Ok(mut running) = self.running.lock() {
            if running.get(thread_id).is_some_and(|t| t.id == ticket.id) {
                running.remove(thread_id);
            }
        }
    }

    /// 取消线程当前回合；没有进行中的回合时返回 false
    pub fn cancel(&self, thread_id: &str) -> bool {
        let token = self
            .running
            .lock()
            .ok()
            .and_then(|running| running.get(thread_id).map(|t| t.token.clone()));
        match token {
            Some(t) => {
                t.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, thread_id: &str) -> bool {
        self.running
            .lock()
            .map(|r| r.contains_key(thread_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_only_targets_thread() {
        let sup = ThreadSupervisor::new();
        let root = CancellationToken::new();
        let a = sup.begin("a", &root);
        let b = sup.begin("b", &root);
        assert!(sup.cancel("a"));
        assert!(a.token().is_cancelled());
        assert!(!b.token().is_cancelled());
        sup.finish("a", &a);
        assert!(!sup.cancel("a"));
        assert!(sup.is_running("b"));
    }

    #[test]
    fn test_caller_token_propagates() {
        let sup = ThreadSupervisor::new();
        let caller = CancellationToken::new();
        let t = sup.begin("x", &caller);
        caller.cancel();
        assert!(t.token().is_cancelled());
    }

    #[test]
    fn test_stale_finish_keeps_newer_turn() {
        let sup = ThreadSupervisor::new();
        let root = CancellationToken::new();
        let old = sup.begin("t", &root);
        let new = sup.begin("t", &root);
        sup.finish("t", &old);
        assert!(sup.is_running("t"));
        assert!(sup.cancel("t"));
        assert!(new.token().is_cancelled());
        assert!(!old.token().is_cancelled());
        sup.finish("t", &new);
        assert!(!sup.is_running("t"));
    }
}
