//! Hive - 智能体编排运行时
//!
//! 入口：加载配置与智能体声明，构建定义树与编排器，从 stdin 逐行读取用户输入，
//! 以 JSON 行把事件流写到 stdout。用法：`hive [thread-id]`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use hive::agent::{register_dir, AgentRegistry, AgentSpec, DEFAULT_PROVIDER};
use hive::config::load_config;
use hive::llm::{HashingEmbedder, MockLlmClient};
use hive::memory::create_store;
use hive::{observability, Orchestrator, OrchestratorSettings};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let thread_id = std::env::args().nth(1).unwrap_or_else(|| "cli".to_string());
    let cfg = load_config(None).context("Failed to load config")?;
    let store = create_store(&cfg.store).context("Failed to open conversation store")?;

    let mut registry = AgentRegistry::with_builtin_tools();
    registry.register_provider(DEFAULT_PROVIDER, Arc::new(MockLlmClient))?;

    let agents_dir = cfg
        .app
        .agents_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("config/agents"));
    if agents_dir.is_dir() {
        register_dir(&mut registry, &agents_dir)
            .with_context(|| format!("Failed to load agents from {}", agents_dir.display()))?;
    }
    if registry.spec(&cfg.app.root_agent).is_none() {
        info!(agent = %cfg.app.root_agent, "no declaration found, using default root agent");
        registry.register_agent(
            AgentSpec::new(cfg.app.root_agent.clone())
                .description("General assistant")
                .system_prompt("You are a helpful assistant.\nTools:\n[TOOLS]")
                .tool("echo")
                .tool("get_time"),
        )?;
    }

    let embedder = Arc::new(HashingEmbedder::new(cfg.embedding.dimension));
    let root = registry
        .build(&cfg.app.root_agent, embedder)
        .await
        .context("Failed to build agent tree")?;
    let orchestrator = Orchestrator::new(root, store, OrchestratorSettings::from(&cfg));

    // 事件流 → stdout（每行一个 JSON 事件）
    let printer = match orchestrator.subscribe(&thread_id).await {
        Some(mut events) => Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!(error = %e, "event serialization failed"),
                }
            }
        })),
        None => None,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }
        // 失败已作为 error 事件输出，这里只保证循环继续
        let _ = orchestrator.handle_turn(&thread_id, text).await;
    }

    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    Ok(())
}
