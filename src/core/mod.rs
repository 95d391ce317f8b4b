//! 核心编排层：错误类型、回合阶段、线程监管（取消）、编排器

pub mod error;
pub mod orchestrator;
pub mod state;
pub mod supervisor;

pub use error::{AgentError, ErrorKind, RegistryError};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use state::TurnPhase;
pub use supervisor::{ThreadSupervisor, TurnTicket};
