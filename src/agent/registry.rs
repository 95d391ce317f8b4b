//! 智能体注册表
//!
//! register_* 在注册时做能在局部判断的检查（重名、嵌套成环、意图目录格式）；
//! build 自底向上构建不可变定义：解析工具 / 子智能体 / 提供方引用、提升子智能体意图、嵌入意图目录、渲染提示。
//! 任一引用悬空都在 build 时报错，运行期不会再遇到配置类错误。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::agent::{AgentDefinition, AgentSpec, CapabilityRegistry, PromptTemplate};
use crate::core::RegistryError;
use crate::intent::{Intent, IntentCatalog, IntentKind, IntentScope};
use crate::llm::{CompletionProvider, EmbeddingProvider};
use crate::tools::{EchoTool, TimeTool, Tool, ToolRegistry, ToolSchema};

#[derive(Default)]
pub struct AgentRegistry {
    tools: ToolRegistry,
    providers: HashMap<String, Arc<dyn CompletionProvider>>,
    specs: HashMap<String, AgentSpec>,
    order: Vec<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预注册内置工具 echo 与 get_time
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        registry.tools.register(Arc::new(EchoTool));
        registry.tools.register(Arc::new(TimeTool));
        registry
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.register(tool) {
            Ok(())
        } else {
            Err(RegistryError::DuplicateTool(name))
        }
    }

    pub fn register_provider(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.providers.contains_key(&name) {
            return Err(RegistryError::DuplicateProvider(name));
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    /// 注册智能体声明；重名、成环或意图目录不合法时失败
    pub fn register_agent(&mut self, spec: AgentSpec) -> Result<(), RegistryError> {
        if spec.name.trim().is_empty() {
            return Err(RegistryError::Spec("agent name must not be empty".to_string()));
        }
        if self.specs.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateAgent(spec.name));
        }
        spec.validate_intents()?;
        let mut path = Vec::new();
        if self.reaches_itself(&spec, &spec.name, &mut path) {
            return Err(RegistryError::CyclicNesting { path });
        }
        debug!(agent = %spec.name, sub_agents = ?spec.sub_agents, "agent registered");
        self.order.push(spec.name.clone());
        self.specs.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// 已有的图无环，新环只可能经过新声明本身
    fn reaches_itself(&self, new: &AgentSpec, current: &str, path: &mut Vec<String>) -> bool {
        let subs = if current == new.name {
            &new.sub_agents
        } else {
            match self.specs.get(current) {
                Some(spec) => &spec.sub_agents,
                None => return false,
            }
        };
        path.push(current.to_string());
        for sub in subs {
            if *sub == new.name {
                path.push(sub.clone());
                return true;
            }
            if path.contains(sub) {
                continue;
            }
            if self.reaches_itself(new, sub, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    pub fn spec(&self, name: &str) -> Option<&AgentSpec> {
        self.specs.get(name)
    }

    /// 按注册顺序
    pub fn agent_names(&self) -> &[String] {
        &self.order
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// 以 root 为根构建定义树
    pub async fn build(
        &self,
        root: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Arc<AgentDefinition>, RegistryError> {
        if !self.specs.contains_key(root) {
            return Err(RegistryError::UnknownAgent(root.to_string()));
        }
        let mut order = Vec::new();
        self.post_order(root, &mut HashSet::new(), &mut order)?;

        let mut built: HashMap<String, Arc<AgentDefinition>> = HashMap::new();
        for name in order {
            let spec = self
                .specs
                .get(&name)
                .ok_or_else(|| RegistryError::UnknownAgent(name.clone()))?;
            let definition = self.build_one(spec, &built, Arc::clone(&embedder)).await?;
            built.insert(name, Arc::new(definition));
        }
        built
            .remove(root)
            .ok_or_else(|| RegistryError::UnknownAgent(root.to_string()))
    }

    fn post_order(
        &self,
        name: &str,
        seen: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), RegistryError> {
        if !seen.insert(name.to_string()) {
            return Ok(());
        }
        let spec = self
            .specs
            .get(name)
            .ok_or_else(|| RegistryError::UnknownAgent(name.to_string()))?;
        for sub in &spec.sub_agents {
            if !self.specs.contains_key(sub) {
                return Err(RegistryError::UnknownSubAgent {
                    agent: name.to_string(),
                    name: sub.clone(),
                });
            }
            self.post_order(sub, seen, order)?;
        }
        order.push(name.to_string());
        Ok(())
    }

    async fn build_one(
        &self,
        spec: &AgentSpec,
        built: &HashMap<String, Arc<AgentDefinition>>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<AgentDefinition, RegistryError> {
        let tools = spec
            .tools
            .iter()
            .map(|name| {
                self.tools.get(name).ok_or_else(|| RegistryError::UnknownTool {
                    agent: spec.name.clone(),
                    tool: name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let sub_agents = spec
            .sub_agents
            .iter()
            .map(|name| {
                built.get(name).cloned().ok_or_else(|| RegistryError::UnknownSubAgent {
                    agent: spec.name.clone(),
                    name: name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let provider = self.providers.get(&spec.provider).cloned().ok_or_else(|| {
            RegistryError::UnknownProvider {
                agent: spec.name.clone(),
                provider: spec.provider.clone(),
            }
        })?;
        let capabilities = CapabilityRegistry::build(&spec.name, &tools, &sub_agents)?;

        let intents = lift_intents(&spec.intents, &sub_agents);
        let catalog = IntentCatalog::build(intents, embedder)
            .await
            .map_err(|source| RegistryError::Embedding {
                agent: spec.name.clone(),
                source,
            })?;

        let tool_schemas: Vec<ToolSchema> = tools.iter().map(|t| t.schema()).collect();
        let tool_list: Vec<(String, String)> = tool_schemas
            .iter()
            .map(|s| (s.name.clone(), s.description.clone()))
            .collect();
        let agent_list: Vec<(String, String)> = sub_agents
            .iter()
            .map(|a| (a.name().to_string(), a.description().to_string()))
            .collect();
        let template = PromptTemplate::parse(&spec.system_prompt);
        let system_prompt = template.render(&tool_list, &agent_list);

        debug!(
            agent = %spec.name,
            tools = tools.len(),
            sub_agents = sub_agents.len(),
            intents = catalog.len(),
            "agent definition built"
        );
        Ok(AgentDefinition {
            name: spec.name.clone(),
            description: spec.description.clone(),
            template,
            system_prompt,
            tools,
            tool_schemas,
            sub_agents,
            catalog,
            capabilities,
            provider_name: spec.provider.clone(),
            provider,
        })
    }
}

/// 自身意图 + 每个子智能体的「Chat with X Agent」（Direct）+ 子智能体 All 范围的意图（改指向该子智能体）
fn lift_intents(own: &[Intent], sub_agents: &[Arc<AgentDefinition>]) -> Vec<Intent> {
    let mut intents = own.to_vec();
    for sub in sub_agents {
        intents.push(
            Intent::agent(format!("Chat with {} Agent", sub.name()), sub.name())
                .with_scope(IntentScope::Direct),
        );
        for lifted in sub.catalog().intents().filter(|i| i.scope == IntentScope::All) {
            intents.push(Intent {
                phrase: lifted.phrase.clone(),
                kind: IntentKind::Agent,
                target: sub.name().to_string(),
                scope: IntentScope::All,
            });
        }
    }
    intents
}
