//! 智能体声明加载器
//!
//! 从目录（默认 config/agents/）读取 `*.toml`，每个文件一个 AgentSpec，按文件名排序后注册。

use std::path::{Path, PathBuf};

use tracing::info;

use crate::agent::{AgentRegistry, AgentSpec};
use crate::core::RegistryError;

/// 读取目录下全部声明（不注册）
pub fn load_agent_specs(dir: impl AsRef<Path>) -> Result<Vec<AgentSpec>, RegistryError> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| RegistryError::Spec(format!("cannot read {}: {e}", dir.display())))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    paths.iter().map(|p| parse_spec_file(p)).collect()
}

fn parse_spec_file(path: &Path) -> Result<AgentSpec, RegistryError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RegistryError::Spec(format!("cannot read {}: {e}", path.display())))?;
    toml::from_str(&content).map_err(|e| RegistryError::Spec(format!("{}: {e}", path.display())))
}

/// 加载并注册目录下全部声明，返回注册数量
pub fn register_dir(registry: &mut AgentRegistry, dir: impl AsRef<Path>) -> Result<usize, RegistryError> {
    let specs = load_agent_specs(dir.as_ref())?;
    let count = specs.len();
    for spec in specs {
        registry.register_agent(spec)?;
    }
    info!(dir = %dir.as_ref().display(), agents = count, "agent specs loaded");
    Ok(count)
}
