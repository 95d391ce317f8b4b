//! 智能体实例：定义与某个线程的运行时绑定
//!
//! 实例独占：消息窗口、路由状态、事件通道，以及每个子定义对应的子实例（树形所有权）。
//! 定义、工具、意图目录只按引用共享。duplicate 生成新 id、新通道、深拷贝的子实例树。

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::agent::AgentDefinition;
use crate::core::TurnPhase;
use crate::memory::{Checkpoint, Message, RoutingState, CHECKPOINT_VERSION};
use crate::react::{EventEmitter, EventStream};

#[derive(Debug)]
pub struct AgentInstance {
    id: Uuid,
    definition: Arc<AgentDefinition>,
    path: String,
    pub(crate) messages: Vec<Message>,
    pub(crate) routing: RoutingState,
    /// 最近一次委派的子智能体
    pub(crate) active_agent: Option<String>,
    pub(crate) phase: TurnPhase,
    children: Vec<AgentInstance>,
    pub(crate) emitter: EventEmitter,
    events: Option<EventStream>,
}

impl AgentInstance {
    pub fn new(definition: Arc<AgentDefinition>) -> Self {
        let path = definition.name().to_string();
        Self::at(definition, path, 0)
    }

    fn at(definition: Arc<AgentDefinition>, path: String, depth: usize) -> Self {
        let children = definition
            .sub_agents()
            .iter()
            .map(|sub| Self::at(Arc::clone(sub), format!("{path}/{}", sub.name()), depth + 1))
            .collect();
        let (emitter, events) = EventEmitter::channel(path.clone(), depth);
        Self {
            id: Uuid::new_v4(),
            definition,
            path,
            messages: Vec::new(),
            routing: RoutingState::Idle,
            active_agent: None,
            phase: TurnPhase::Idle,
            children,
            emitter,
            events: Some(events),
        }
    }

    /// 新身份、新事件通道、状态与子实例树的独立副本；定义仍共享
    pub fn duplicate(&self) -> Self {
        let (mut emitter, events) = EventEmitter::channel(self.path.clone(), self.depth());
        emitter.bind(self.emitter.thread_id());
        Self {
            id: Uuid::new_v4(),
            definition: Arc::clone(&self.definition),
            path: self.path.clone(),
            messages: self.messages.clone(),
            routing: self.routing.clone(),
            active_agent: self.active_agent.clone(),
            phase: TurnPhase::Idle,
            children: self.children.iter().map(AgentInstance::duplicate).collect(),
            emitter,
            events: Some(events),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn definition(&self) -> &Arc<AgentDefinition> {
        &self.definition
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// 事件中使用的路径，如 `Hive/Greeter`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.emitter.depth()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn routing(&self) -> &RoutingState {
        &self.routing
    }

    pub fn active_agent(&self) -> Option<&str> {
        self.active_agent.as_deref()
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn children(&self) -> &[AgentInstance] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&AgentInstance> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// 取走本实例的事件接收端（只能取一次，直到放回）
    pub fn take_events(&mut self) -> Option<EventStream> {
        self.events.take()
    }

    pub(crate) fn put_events(&mut self, events: EventStream) {
        self.events = Some(events);
    }

    /// 把整棵树绑定到线程（事件携带 thread_id）
    pub fn bind(&mut self, thread_id: &str) {
        self.emitter.bind(thread_id);
        for child in &mut self.children {
            child.bind(thread_id);
        }
    }

    /// 子实例与本实例发送端的不相交借用（委派时一边运行子实例一边转发事件）
    pub(crate) fn split_child(&mut self, name: &str) -> Option<(&mut AgentInstance, &mut EventEmitter)> {
        let emitter = &mut self.emitter;
        self.children
            .iter_mut()
            .find(|c| c.definition.name() == name)
            .map(|child| (child, emitter))
    }

    /// 当前状态的持久化快照（递归包含子实例）
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            version: CHECKPOINT_VERSION,
            agent: self.name().to_string(),
            messages: self.messages.clone(),
            routing: self.routing.clone(),
            active_agent: self.active_agent.clone(),
            children: self
                .children
                .iter()
                .map(|c| (c.name().to_string(), c.checkpoint()))
                .collect::<BTreeMap<_, _>>(),
            updated_at: Utc::now(),
        }
    }

    /// 从快照恢复状态；快照中缺失的子实例清空，多出的忽略。身份与通道不变
    pub fn restore(&mut self, checkpoint: &Checkpoint) {
        if checkpoint.agent != self.name() {
            warn!(
                expected = %self.name(),
                found = %checkpoint.agent,
                "checkpoint belongs to a different agent, restoring anyway"
            );
        }
        self.messages = checkpoint.messages.clone();
        self.routing = checkpoint.routing.clone();
        self.active_agent = checkpoint.active_agent.clone();
        self.phase = TurnPhase::Idle;
        for child in &mut self.children {
            match checkpoint.children.get(child.definition.name()) {
                Some(cp) => child.restore(cp),
                None => child.reset(),
            }
        }
    }

    fn reset(&mut self) {
        self.messages.clear();
        self.routing = RoutingState::Idle;
        self.active_agent = None;
        self.phase = TurnPhase::Idle;
        for child in &mut self.children {
            child.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentRegistry, AgentSpec};
    use crate::llm::{HashingEmbedder, MockLlmClient};

    async fn tree() -> Arc<AgentDefinition> {
        let mut r = AgentRegistry::new();
        r.register_provider("default", Arc::new(MockLlmClient)).unwrap();
        r.register_agent(AgentSpec::new("Leaf")).unwrap();
        r.register_agent(AgentSpec::new("Mid").sub_agent("Leaf")).unwrap();
        r.register_agent(AgentSpec::new("Root").sub_agent("Mid")).unwrap();
        r.build("Root", Arc::new(HashingEmbedder::new(32))).await.unwrap()
    }

    #[tokio::test]
    async fn test_instance_tree_mirrors_definition() {
        let inst = AgentInstance::new(tree().await);
        assert_eq!(inst.children().len(), 1);
        let mid = inst.child("Mid").unwrap();
        assert_eq!(mid.path(), "Root/Mid");
        assert_eq!(mid.depth(), 1);
        assert_eq!(mid.children()[0].path(), "Root/Mid/Leaf");
    }

    #[tokio::test]
    async fn test_duplicate_is_isolated_but_shares_definition() {
        let mut original = AgentInstance::new(tree().await);
        original.messages.push(Message::user("hello"));
        let mut copy = original.duplicate();

        assert_ne!(copy.id(), original.id());
        assert!(Arc::ptr_eq(copy.definition(), original.definition()));
        let (a, b) = (&original.children()[0], &copy.children()[0]);
        assert_ne!(a.id(), b.id());
        assert!(Arc::ptr_eq(a.definition(), b.definition()));
        assert_ne!(a.children()[0].id(), b.children()[0].id());

        copy.messages.push(Message::assistant("hi"));
        assert_eq!(original.messages().len(), 1);
        assert_eq!(copy.messages().len(), 2);
        assert!(copy.take_events().is_some());
        assert!(original.take_events().is_some());
    }

    #[tokio::test]
    async fn test_checkpoint_restore_roundtrip_includes_children() {
        let mut inst = AgentInstance::new(tree().await);
        inst.messages.push(Message::user("q"));
        if let Some((mid, _)) = inst.split_child("Mid") {
            mid.messages.push(Message::assistant("from mid"));
        }
        inst.active_agent = Some("Mid".into());
        let cp = inst.checkpoint();
        assert_eq!(cp.total_messages(), 2);

        let mut fresh = AgentInstance::new(Arc::clone(inst.definition()));
        fresh.restore(&cp);
        assert_eq!(fresh.messages().len(), 1);
        assert_eq!(fresh.child("Mid").unwrap().messages()[0].content, "from mid");
        assert_eq!(fresh.active_agent(), Some("Mid"));

        fresh.restore(&Checkpoint::empty("Root"));
        assert!(fresh.child("Mid").unwrap().messages().is_empty());
    }
}
