//! 编排器：线程 → 实例树，回合的加锁、提交与终止事件
//!
//! 每个线程一个槽位（tokio Mutex 作为咨询锁，整回合持有），保证同一线程的回合线性执行；
//! 不同线程的回合可以并发。discard 遇到进行中的回合时只做标记，由持锁方在回合结束后移除槽位；
//! 拿到锁后再确认槽位仍在表中，过期槽位上排队的回合改去新槽位。回合结束时先 put 检查点，成功才发 Done；
//! put 失败、提供方错误、超时、取消、工具循环超限时回滚内存状态并发 Error，存储保持上次提交的内容。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::{AgentDefinition, AgentInstance};
use crate::config::{AppConfig, OrchestratorSection};
use crate::core::{AgentError, ThreadSupervisor, TurnPhase};
use crate::intent::{IntentResolver, ResolverParams};
use crate::memory::{Checkpoint, ConversationStore, ThreadId};
use crate::react::{run_turn, EventKind, EventStream, TurnContext};
use crate::tools::ToolExecutor;

/// 运行期参数（由 [orchestrator] 配置转换）
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub resolver: ResolverParams,
    pub max_tool_loops: usize,
    pub completion_timeout: Duration,
    pub tool_timeout: Duration,
    pub delegation_timeout: Duration,
    /// 0 表示不限
    pub max_context_messages: usize,
    pub sticky_delegation: bool,
    pub mention_routing: bool,
}

impl From<&OrchestratorSection> for OrchestratorSettings {
    fn from(s: &OrchestratorSection) -> Self {
        Self {
            resolver: ResolverParams {
                threshold: s.intent_threshold,
                epsilon: s.disambiguation_epsilon,
                top_k: s.intent_top_k,
            },
            max_tool_loops: s.max_tool_loops,
            completion_timeout: Duration::from_secs(s.completion_timeout_secs),
            tool_timeout: Duration::from_secs(s.tool_timeout_secs),
            delegation_timeout: Duration::from_secs(s.delegation_timeout_secs),
            max_context_messages: s.max_context_messages,
            sticky_delegation: s.sticky_delegation,
            mention_routing: s.mention_routing,
        }
    }
}

impl From<&AppConfig> for OrchestratorSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self::from(&cfg.orchestrator)
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&OrchestratorSection::default())
    }
}

struct ThreadSlot {
    instance: AgentInstance,
    /// 是否已从存储读取过检查点
    loaded: bool,
}

type SharedSlot = Arc<AsyncMutex<ThreadSlot>>;

#[derive(Default)]
struct ThreadTable {
    slots: HashMap<ThreadId, SharedSlot>,
    /// 已请求丢弃、但当时有回合持锁的线程
    discarding: HashSet<ThreadId>,
}

pub struct Orchestrator {
    root: Arc<AgentDefinition>,
    store: Arc<dyn ConversationStore>,
    settings: OrchestratorSettings,
    resolver: IntentResolver,
    executor: ToolExecutor,
    threads: Mutex<ThreadTable>,
    supervisor: ThreadSupervisor,
}

impl Orchestrator {
    pub fn new(
        root: Arc<AgentDefinition>,
        store: Arc<dyn ConversationStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        info!(
            root = %root.name(),
            store = store.backend(),
            threshold = settings.resolver.threshold,
            epsilon = settings.resolver.epsilon,
            "orchestrator ready"
        );
        Self {
            resolver: IntentResolver::new(settings.resolver),
            executor: ToolExecutor::new(settings.tool_timeout),
            root,
            store,
            settings,
            threads: Mutex::new(ThreadTable::default()),
            supervisor: ThreadSupervisor::new(),
        }
    }

    pub fn root(&self) -> &Arc<AgentDefinition> {
        &self.root
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    fn table(&self) -> MutexGuard<'_, ThreadTable> {
        match self.threads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 取或懒创建线程槽位（只创建实例，检查点在首个回合读取）
    fn slot(&self, thread_id: &str) -> SharedSlot {
        let mut table = self.table();
        let slot = table.slots.entry(thread_id.to_string()).or_insert_with(|| {
            let mut instance = AgentInstance::new(Arc::clone(&self.root));
            instance.bind(thread_id);
            Arc::new(AsyncMutex::new(ThreadSlot {
                instance,
                loaded: false,
            }))
        });
        Arc::clone(slot)
    }

    /// 持有 slot 的锁时调用：槽位仍是表中当前槽位且未待丢弃时返回 true；待丢弃的在此移除
    fn settle(&self, thread_id: &str, slot: &SharedSlot) -> bool {
        let mut table = self.table();
        let current = table
            .slots
            .get(thread_id)
            .is_some_and(|s| Arc::ptr_eq(s, slot));
        if current && table.discarding.remove(thread_id) {
            table.slots.remove(thread_id);
            info!(thread = %thread_id, "thread discarded");
            return false;
        }
        current
    }

    /// 锁住线程的当前槽位；等待期间槽位被丢弃则换到新槽位
    async fn lock_slot(&self, thread_id: &str) -> (SharedSlot, OwnedMutexGuard<ThreadSlot>) {
        loop {
            let slot = self.slot(thread_id);
            let guard = Arc::clone(&slot).lock_owned().await;
            if self.settle(thread_id, &slot) {
                return (slot, guard);
            }
        }
    }

    /// 订阅线程的事件流；每个线程只能取走一次（discard 后重新创建）
    pub async fn subscribe(&self, thread_id: &str) -> Option<EventStream> {
        let (_slot, mut guard) = self.lock_slot(thread_id).await;
        guard.instance.take_events()
    }

    pub async fn handle_turn(
        &self,
        thread_id: &str,
        text: impl Into<String>,
    ) -> Result<String, AgentError> {
        self.handle_turn_with_cancel(thread_id, text, &CancellationToken::new())
            .await
    }

    /// 处理一个回合；caller 令牌或 cancel(thread_id) 都可以在下一个等待点中止它
    pub async fn handle_turn_with_cancel(
        &self,
        thread_id: &str,
        text: impl Into<String>,
        caller: &CancellationToken,
    ) -> Result<String, AgentError> {
        let text = text.into();
        let (slot, mut guard) = self.lock_slot(thread_id).await;
        let ticket = self.supervisor.begin(thread_id, caller);
        let result = self
            .turn_locked(thread_id, &mut guard, text, ticket.token())
            .await;
        self.supervisor.finish(thread_id, &ticket);
        // 回合期间收到的 discard 在释放锁之前生效
        self.settle(thread_id, &slot);
        drop(guard);
        result
    }

    async fn turn_locked(
        &self,
        thread_id: &str,
        slot: &mut ThreadSlot,
        text: String,
        token: &CancellationToken,
    ) -> Result<String, AgentError> {
        let instance = &mut slot.instance;
        if !slot.loaded {
            match self.store.get(thread_id).await {
                Ok(Some(checkpoint)) => {
                    info!(
                        thread = %thread_id,
                        messages = checkpoint.total_messages(),
                        "checkpoint loaded"
                    );
                    instance.restore(&checkpoint);
                }
                Ok(None) => {}
                Err(e) => return Err(fail(thread_id, instance, AgentError::Store(e))),
            }
            slot.loaded = true;
        }

        info!(thread = %thread_id, agent = %instance.name(), "turn started");
        let before = instance.checkpoint();
        let ctx = TurnContext {
            settings: &self.settings,
            resolver: &self.resolver,
            executor: &self.executor,
            cancel: token,
        };

        let reply = match run_turn(instance, text, ctx).await {
            Ok(reply) => reply,
            Err(e) => {
                instance.restore(&before);
                return Err(fail(thread_id, instance, e));
            }
        };
        if token.is_cancelled() {
            instance.restore(&before);
            return Err(fail(thread_id, instance, AgentError::Cancelled));
        }

        instance.phase = TurnPhase::Committing;
        let checkpoint = instance.checkpoint();
        if let Err(e) = self.store.put(thread_id, &checkpoint).await {
            instance.restore(&before);
            return Err(fail(thread_id, instance, AgentError::Store(e)));
        }

        instance.phase = TurnPhase::Idle;
        instance.emitter.emit(EventKind::Done {
            message: reply.clone(),
        });
        info!(
            thread = %thread_id,
            messages = checkpoint.total_messages(),
            "turn committed"
        );
        Ok(reply)
    }

    /// 取消线程进行中的回合
    pub fn cancel(&self, thread_id: &str) -> bool {
        self.supervisor.cancel(thread_id)
    }

    /// 丢弃线程的实例树与事件通道；存储中的检查点保留，下次回合重新加载。
    /// 有回合进行中时推迟到该回合结束，之后的回合不会与它重叠
    pub fn discard(&self, thread_id: &str) -> bool {
        let mut table = self.table();
        let Some(slot) = table.slots.get(thread_id) else {
            return false;
        };
        let idle = slot.try_lock().is_ok();
        if idle {
            table.slots.remove(thread_id);
            table.discarding.remove(thread_id);
            info!(thread = %thread_id, "thread discarded");
        } else {
            table.discarding.insert(thread_id.to_string());
            info!(thread = %thread_id, "thread busy, discard deferred to end of turn");
        }
        true
    }

    /// 线程当前的内存状态（未创建或已丢弃时为 None）
    pub async fn snapshot(&self, thread_id: &str) -> Option<Checkpoint> {
        let slot = self.table().slots.get(thread_id).cloned()?;
        let guard = slot.lock().await;
        if !self.settle(thread_id, &slot) {
            return None;
        }
        Some(guard.instance.checkpoint())
    }

    pub fn thread_count(&self) -> usize {
        self.table().slots.len()
    }
}

/// 回合以错误结束：发出唯一的 Error 终止事件
fn fail(thread_id: &str, instance: &mut AgentInstance, err: AgentError) -> AgentError {
    instance.phase = TurnPhase::Terminated;
    warn!(thread = %thread_id, kind = err.kind().as_str(), error = %err, "turn failed");
    instance.emitter.emit(EventKind::Error {
        kind: err.kind(),
        message: err.to_string(),
    });
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentRegistry, AgentSpec};
    use crate::llm::{HashingEmbedder, ScriptedLlm};
    use crate::memory::MemoryStore;

    async fn orchestrator(reply: &str) -> Orchestrator {
        let mut r = AgentRegistry::new();
        r.register_provider("default", Arc::new(ScriptedLlm::constant(reply)))
            .unwrap();
        r.register_agent(AgentSpec::new("Solo")).unwrap();
        let root = r.build("Solo", Arc::new(HashingEmbedder::new(32))).await.unwrap();
        Orchestrator::new(root, Arc::new(MemoryStore::new()), OrchestratorSettings::default())
    }

    #[test]
    fn test_settings_from_config() {
        let mut section = OrchestratorSection::default();
        section.max_tool_loops = 2;
        section.tool_timeout_secs = 5;
        let s = OrchestratorSettings::from(&section);
        assert_eq!(s.max_tool_loops, 2);
        assert_eq!(s.tool_timeout, Duration::from_secs(5));
        assert_eq!(s.resolver.top_k, 10);
    }

    #[tokio::test]
    async fn test_turn_commits_and_returns_to_idle() {
        let orch = orchestrator("ok").await;
        assert_eq!(orch.handle_turn("t", "hello").await.unwrap(), "ok");
        let snap = orch.snapshot("t").await.unwrap();
        assert_eq!(snap.messages.len(), 2);
        assert_eq!(orch.thread_count(), 1);
    }

    #[tokio::test]
    async fn test_discard_reloads_from_store() {
        let orch = orchestrator("ok").await;
        orch.handle_turn("t", "one").await.unwrap();
        assert!(orch.discard("t"));
        assert!(!orch.discard("t"));
        assert!(orch.snapshot("t").await.is_none());
        orch.handle_turn("t", "two").await.unwrap();
        assert_eq!(orch.snapshot("t").await.unwrap().messages.len(), 4);
    }

    #[tokio::test]
    async fn test_subscribe_only_once() {
        let orch = orchestrator("ok").await;
        assert!(orch.subscribe("t").await.is_some());
        assert!(orch.subscribe("t").await.is_none());
        assert!(!orch.cancel("t"));
    }
}
