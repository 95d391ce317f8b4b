//! 能力表：名称 → 工具 | 子智能体定义
//!
//! 由定义声明的工具与子智能体列表在构建时生成，O(1) 查找；同一定义内名称重复是构建错误。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::agent::AgentDefinition;
use crate::core::RegistryError;
use crate::tools::Tool;

#[derive(Clone)]
pub enum Capability {
    Tool(Arc<dyn Tool>),
    Agent(Arc<AgentDefinition>),
}

impl Capability {
    pub fn kind(&self) -> &'static str {
        match self {
            Capability::Tool(_) => "tool",
            Capability::Agent(_) => "agent",
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Tool(t) => write!(f, "Tool({})", t.name()),
            Capability::Agent(a) => write!(f, "Agent({})", a.name()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    entries: HashMap<String, Capability>,
}

impl CapabilityRegistry {
    pub fn build(
        agent: &str,
        tools: &[Arc<dyn Tool>],
        sub_agents: &[Arc<AgentDefinition>],
    ) -> Result<Self, RegistryError> {
        let mut entries = HashMap::with_capacity(tools.len() + sub_agents.len());
        let named = tools
            .iter()
            .map(|t| (t.name().to_string(), Capability::Tool(Arc::clone(t))))
            .chain(
                sub_agents
                    .iter()
                    .map(|a| (a.name().to_string(), Capability::Agent(Arc::clone(a)))),
            );
        for (name, capability) in named {
            if entries.contains_key(&name) {
                return Err(RegistryError::DuplicateCapability {
                    agent: agent.to_string(),
                    name,
                });
            }
            entries.insert(name, capability);
        }
        Ok(Self { entries })
    }

    pub fn lookup(&self, name: &str) -> Option<&Capability> {
        self.entries.get(name)
    }

    pub fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        match self.entries.get(name) {
            Some(Capability::Tool(t)) => Some(t),
            _ => None,
        }
    }

    pub fn agent(&self, name: &str) -> Option<&Arc<AgentDefinition>> {
        match self.entries.get(name) {
            Some(Capability::Agent(a)) => Some(a),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoTool, FnTool};

    #[test]
    fn test_lookup_by_name() {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(EchoTool)];
        let reg = CapabilityRegistry::build("A", &tools, &[]).unwrap();
        assert!(matches!(reg.lookup("echo"), Some(Capability::Tool(_))));
        assert!(reg.tool("echo").is_some());
        assert!(reg.agent("echo").is_none());
        assert!(reg.lookup("nope").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(EchoTool),
            Arc::new(FnTool::new("echo", "shadow", |_| Ok(String::new()))),
        ];
        let err = CapabilityRegistry::build("A", &tools, &[]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCapability { ref name, .. } if name == "echo"));
    }
}
