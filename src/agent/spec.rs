//! 智能体声明：注册时的输入，按名称引用工具、子智能体与补全提供方
//!
//! 可以用构建器在代码里声明，也可以从 TOML 文件反序列化（见 loader）。

use serde::Deserialize;

use crate::core::RegistryError;
use crate::intent::{Intent, IntentKind};

pub const DEFAULT_PROVIDER: &str = "default";

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub sub_agents: Vec<String>,
    #[serde(default)]
    pub intents: Vec<Intent>,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: String::new(),
            provider: default_provider(),
            tools: Vec::new(),
            sub_agents: Vec::new(),
            intents: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tools.push(name.into());
        self
    }

    pub fn sub_agent(mut self, name: impl Into<String>) -> Self {
        self.sub_agents.push(name.into());
        self
    }

    pub fn intent(mut self, intent: Intent) -> Self {
        self.intents.push(intent);
        self
    }

    /// 目录本身的合法性：短语与目标非空，Agent / Tool 目标必须在本声明中列出
    pub fn validate_intents(&self) -> Result<(), RegistryError> {
        let malformed = |reason: String| RegistryError::MalformedIntent {
            agent: self.name.clone(),
            reason,
        };
        for intent in &self.intents {
            if intent.phrase.trim().is_empty() {
                return Err(malformed(format!("empty phrase for target '{}'", intent.target)));
            }
            if intent.target.trim().is_empty() {
                return Err(malformed(format!("empty target for phrase '{}'", intent.phrase)));
            }
            let declared = match intent.kind {
                IntentKind::Agent => self.sub_agents.contains(&intent.target),
                IntentKind::Tool => self.tools.contains(&intent.target),
                IntentKind::Raw => true,
            };
            if !declared {
                return Err(malformed(format!(
                    "{} target '{}' is not declared by this agent",
                    intent.kind.as_str(),
                    intent.target
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_spec_defaults() {
        let spec: AgentSpec = toml::from_str(
            r#"
            name = "Greeter"
            system_prompt = "Say hello."

            [[intents]]
            phrase = "hi"
            kind = "raw"
            target = "Hello!"
            scope = "direct"
            "#,
        )
        .unwrap();
        assert_eq!(spec.provider, DEFAULT_PROVIDER);
        assert!(spec.tools.is_empty());
        assert_eq!(spec.intents[0].kind, IntentKind::Raw);
        assert!(spec.validate_intents().is_ok());
    }

    #[test]
    fn test_undeclared_intent_target_is_malformed() {
        let spec = AgentSpec::new("Hive").intent(Intent::agent("greet me", "Greeter"));
        assert!(matches!(
            spec.validate_intents(),
            Err(RegistryError::MalformedIntent { .. })
        ));
    }

    #[test]
    fn test_empty_phrase_is_malformed() {
        let spec = AgentSpec::new("Hive").intent(Intent::raw("  ", "x"));
        assert!(spec.validate_intents().is_err());
    }
}
