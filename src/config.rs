//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__STORE__BACKEND=sqlite`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub orchestrator: OrchestratorSection,
    pub store: StoreSection,
    pub embedding: EmbeddingSection,
}

/// [app] 段：应用名、智能体定义目录、根智能体
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// TOML 智能体定义目录，未设置时用 config/agents
    pub agents_dir: Option<PathBuf>,
    /// 作为线程入口的根智能体名
    pub root_agent: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            agents_dir: None,
            root_agent: "Hive".to_string(),
        }
    }
}

/// [orchestrator] 段：意图阈值、消歧 epsilon、工具循环上限与各类外部调用超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    /// 意图置信度下限（低于此值视为未命中）
    pub intent_threshold: f32,
    /// 与最高分差距小于此值的候选视为「同样接近」，触发消歧
    pub disambiguation_epsilon: f32,
    /// 每次解析取最近邻的个数
    pub intent_top_k: usize,
    /// 单回合最多工具调用次数
    pub max_tool_loops: usize,
    pub completion_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub delegation_timeout_secs: u64,
    /// 发给模型的上下文最多消息数（0 表示不限）
    pub max_context_messages: usize,
    /// 未命中意图时沿用上次委派的子智能体
    pub sticky_delegation: bool,
    /// 「@子智能体名」直接委派
    pub mention_routing: bool,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            intent_threshold: 0.85,
            disambiguation_epsilon: 0.05,
            intent_top_k: 10,
            max_tool_loops: 10,
            completion_timeout_secs: 60,
            tool_timeout_secs: 30,
            delegation_timeout_secs: 120,
            max_context_messages: 40,
            sticky_delegation: false,
            mention_routing: true,
        }
    }
}

/// 会话存储后端
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

/// [store] 段：检查点存储后端与路径
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    /// sqlite 文件路径，未设置时用 data/hive.db
    pub path: Option<PathBuf>,
}

/// [embedding] 段：内置哈希嵌入的维度
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub dimension: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self { dimension: 256 }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.orchestrator.intent_top_k, 10);
        assert!((cfg.orchestrator.intent_threshold - 0.85).abs() < f32::EPSILON);
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.app.root_agent, "Hive");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [orchestrator]
            max_tool_loops = 3

            [store]
            backend = "sqlite"
            path = "/tmp/x.db"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.orchestrator.max_tool_loops, 3);
        assert_eq!(cfg.orchestrator.intent_top_k, 10);
        assert_eq!(cfg.store.backend, StoreBackend::Sqlite);
        assert_eq!(cfg.embedding.dimension, 256);
    }
}
