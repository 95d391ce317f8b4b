//! 智能体定义：构建后不可变，跨线程按引用共享

use std::fmt;
use std::sync::Arc;

use crate::agent::{CapabilityRegistry, PromptTemplate};
use crate::intent::IntentCatalog;
use crate::llm::CompletionProvider;
use crate::tools::{Tool, ToolSchema};

pub struct AgentDefinition {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) template: PromptTemplate,
    /// 构建时渲染好的系统提示
    pub(crate) system_prompt: String,
    pub(crate) tools: Vec<Arc<dyn Tool>>,
    pub(crate) tool_schemas: Vec<ToolSchema>,
    pub(crate) sub_agents: Vec<Arc<AgentDefinition>>,
    pub(crate) catalog: IntentCatalog,
    pub(crate) capabilities: CapabilityRegistry,
    pub(crate) provider_name: String,
    pub(crate) provider: Arc<dyn CompletionProvider>,
}

impl AgentDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn tool_schemas(&self) -> &[ToolSchema] {
        &self.tool_schemas
    }

    pub fn sub_agents(&self) -> &[Arc<AgentDefinition>] {
        &self.sub_agents
    }

    pub fn catalog(&self) -> &IntentCatalog {
        &self.catalog
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.provider
    }

    /// 按名称查找直接子智能体（大小写不敏感，用于 @ 提及）
    pub fn find_sub_agent(&self, name: &str) -> Option<&Arc<AgentDefinition>> {
        self.sub_agents
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

impl fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("name", &self.name)
            .field("tools", &self.tool_schemas.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field(
                "sub_agents",
                &self.sub_agents.iter().map(|a| &a.name).collect::<Vec<_>>(),
            )
            .field("intents", &self.catalog.len())
            .field("provider", &self.provider_name)
            .finish()
    }
}
