//! 检查点：线程的持久化快照
//!
//! 每个已提交的回合覆盖写入一次；包含本智能体的消息窗口、路由状态，以及按名称索引的子智能体检查点。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::IntentKind;
use crate::memory::Message;

/// 检查点格式版本
pub const CHECKPOINT_VERSION: u32 = 1;

/// 消歧候选项（编号从 1 开始展示给用户）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingCandidate {
    pub kind: IntentKind,
    pub target: String,
    pub phrase: String,
    pub score: f32,
}

/// 路由状态：两个回合之间需要记住的最少信息
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RoutingState {
    #[default]
    Idle,
    /// 已发出编号选择提示，等待下一回合输入数字
    AwaitingChoice {
        utterance: String,
        candidates: Vec<PendingCandidate>,
    },
}

impl RoutingState {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, RoutingState::AwaitingChoice { .. })
    }
}

/// 智能体实例的持久化形式
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default = "default_version")]
    pub version: u32,
    pub agent: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub routing: RoutingState,
    /// 最近一次委派的子智能体（粘性委派用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_agent: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, Checkpoint>,
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    CHECKPOINT_VERSION
}

impl Checkpoint {
    pub fn empty(agent: impl Into<String>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            agent: agent.into(),
            messages: Vec::new(),
            routing: RoutingState::Idle,
            active_agent: None,
            children: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// 整棵树的消息总数
    pub fn total_messages(&self) -> usize {
        self.messages.len()
            + self
                .children
                .values()
                .map(Checkpoint::total_messages)
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_json_roundtrip_keeps_routing() {
        let mut cp = Checkpoint::empty("Abi");
        cp.messages.push(Message::user("search news about rust"));
        cp.routing = RoutingState::AwaitingChoice {
            utterance: "search news about rust".into(),
            candidates: vec![PendingCandidate {
                kind: IntentKind::Agent,
                target: "ChatGPT".into(),
                phrase: "search news about".into(),
                score: 1.0,
            }],
        };
        let mut child = Checkpoint::empty("ChatGPT");
        child.messages.push(Message::assistant("ok"));
        cp.children.insert("ChatGPT".into(), child);

        let json = serde_json::to_string(&cp).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cp);
        assert!(back.routing.is_awaiting());
        assert_eq!(back.total_messages(), 2);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let back: Checkpoint =
            serde_json::from_str(r#"{"agent":"A","updated_at":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(back.version, CHECKPOINT_VERSION);
        assert_eq!(back.routing, RoutingState::Idle);
        assert!(back.children.is_empty());
    }
}
