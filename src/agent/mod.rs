//! 智能体层：声明 → 不可变定义（能力表、意图目录、渲染后的提示）→ 每线程实例树

pub mod capability;
pub mod definition;
pub mod instance;
pub mod loader;
pub mod prompt;
pub mod registry;
pub mod spec;

pub use capability::{Capability, CapabilityRegistry};
pub use definition::AgentDefinition;
pub use instance::AgentInstance;
pub use loader::{load_agent_specs, register_dir};
pub use prompt::{PromptSection, PromptTemplate};
pub use registry::AgentRegistry;
pub use spec::{AgentSpec, DEFAULT_PROVIDER};
