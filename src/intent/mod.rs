//! 意图层：短语 → 路由目标（子智能体 / 工具 / 字面回复）
//!
//! - **catalog**: 构建时嵌入全部短语，形成每个定义私有的目录
//! - **index**: 余弦相似度最近邻索引
//! - **lexical**: 规范化 + 分词（jieba）+ Jaccard，兜底短字面输入
//! - **resolver**: 排序、阈值、epsilon 消歧判定

pub mod catalog;
pub mod index;
pub mod lexical;
pub mod resolver;

use serde::{Deserialize, Serialize};

pub use catalog::IntentCatalog;
pub use index::{cosine_similarity, VectorIndex};
pub use resolver::{IntentMatch, IntentResolver, ResolverParams, RouteDecision};

/// 意图目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// 委派给同名子智能体
    Agent,
    /// 调用同名工具（空参数），再由模型组织回答
    Tool,
    /// target 即回复原文，不调用模型
    Raw,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Agent => "agent",
            IntentKind::Tool => "tool",
            IntentKind::Raw => "raw",
        }
    }
}

/// 可见范围：Direct 只在直接与该智能体对话时可见，不会被提升到父智能体
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentScope {
    Direct,
    #[default]
    All,
}

/// 一条意图：(短语, 类型, 目标, 范围)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub phrase: String,
    pub kind: IntentKind,
    pub target: String,
    #[serde(default)]
    pub scope: IntentScope,
}

impl Intent {
    pub fn new(kind: IntentKind, phrase: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            kind,
            target: target.into(),
            scope: IntentScope::All,
        }
    }

    pub fn agent(phrase: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(IntentKind::Agent, phrase, target)
    }

    pub fn tool(phrase: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(IntentKind::Tool, phrase, target)
    }

    pub fn raw(phrase: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::new(IntentKind::Raw, phrase, reply)
    }

    pub fn with_scope(mut self, scope: IntentScope) -> Self {
        self.scope = scope;
        self
    }
}
