//! 回合状态机阶段
//!
//! Idle → Resolving → {Completing | ToolCalling | Delegating | Disambiguating} → Committing → {Idle | Terminated}

use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    Resolving,
    Completing,
    ToolCalling,
    Delegating,
    Disambiguating,
    Committing,
    /// 上一回合以错误结束；下一回合照常从 Idle 开始
    Terminated,
}

impl TurnPhase {
    /// 是否处于一个回合之中
    pub fn in_turn(&self) -> bool {
        !matches!(self, TurnPhase::Idle | TurnPhase::Terminated)
    }
}
