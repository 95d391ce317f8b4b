//! 回合层：事件流、消歧、单实例回合主循环（解析 → 补全 / 工具 / 委派 / 消歧）

pub mod disambiguation;
pub mod events;
pub mod loop_;

pub use events::{EventEmitter, EventKind, EventStream, TurnEvent};
pub use loop_::{parse_mention, run_turn, TurnContext};
