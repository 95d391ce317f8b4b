//! Hive - 智能体编排运行时
//!
//! 模块划分：
//! - **agent**: 智能体声明、不可变定义、能力表、每线程实例树
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、回合阶段、线程监管、编排器（handle_turn）
//! - **intent**: 意图目录、向量 / 字面匹配、路由判定
//! - **llm**: 补全与嵌入提供方抽象、本地实现
//! - **memory**: 消息、检查点、会话存储（内存 / SQLite）
//! - **observability**: 日志初始化
//! - **react**: 事件流、消歧、回合主循环
//! - **tools**: 工具 trait、工具池、执行器、内置工具

pub mod agent;
pub mod config;
pub mod core;
pub mod intent;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use crate::agent::{AgentDefinition, AgentInstance, AgentRegistry, AgentSpec};
pub use crate::core::{AgentError, ErrorKind, Orchestrator, OrchestratorSettings, RegistryError};
pub use crate::react::{EventKind, EventStream, TurnEvent};
