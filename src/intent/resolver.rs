//! 意图解析与路由判定
//!
//! resolve 是目录 + 输入的纯函数：分数降序，同分按注册顺序。
//! decide 先过阈值，再把与最高分差距小于 epsilon 的候选视为同样接近：
//! 同一 (类型, 目标) 的候选合并，合并后仍多于一个即进入消歧。

use serde::Serialize;

use crate::intent::{Intent, IntentCatalog};
use crate::llm::LlmError;

/// 解析参数（来自 [orchestrator] 配置）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverParams {
    /// 分数须严格大于此值才算命中
    pub threshold: f32,
    pub epsilon: f32,
    pub top_k: usize,
}

impl Default for ResolverParams {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            epsilon: 0.05,
            top_k: 10,
        }
    }
}

/// 单次解析的一个命中；不持久化
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentMatch {
    pub intent: Intent,
    pub score: f32,
    /// 在目录中的注册位置
    pub position: usize,
}

/// 路由判定结果
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// 无命中：直接补全
    NoMatch,
    /// 唯一目标
    Route(IntentMatch),
    /// 多个不同目标同样接近
    Ambiguous(Vec<IntentMatch>),
}

#[derive(Debug, Clone, Default)]
pub struct IntentResolver {
    params: ResolverParams,
}

impl IntentResolver {
    pub fn new(params: ResolverParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ResolverParams {
        &self.params
    }

    /// 解析输入，返回按置信度降序的命中列表（空目录返回空列表）
    pub async fn resolve(
        &self,
        catalog: &IntentCatalog,
        utterance: &str,
    ) -> Result<Vec<IntentMatch>, LlmError> {
        let mut scored = catalog.score(utterance, self.params.top_k).await?;
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(self.params.top_k);
        Ok(scored
            .into_iter()
            .filter_map(|(position, score)| {
                catalog.get(position).map(|intent| IntentMatch {
                    intent: intent.clone(),
                    score,
                    position,
                })
            })
            .collect())
    }

    /// 根据阈值与 epsilon 判定路由；matches 须为 resolve 的输出顺序
    pub fn decide(&self, matches: &[IntentMatch]) -> RouteDecision {
        let candidates: Vec<&IntentMatch> = matches
            .iter()
            .filter(|m| m.score > self.params.threshold)
            .collect();
        let Some(top) = candidates.first().map(|m| m.score) else {
            return RouteDecision::NoMatch;
        };

        let mut close: Vec<IntentMatch> = Vec::new();
        for m in candidates.into_iter().filter(|m| top - m.score < self.params.epsilon) {
            let same_target = close
                .iter()
                .any(|c| c.intent.kind == m.intent.kind && c.intent.target == m.intent.target);
            if !same_target {
                close.push(m.clone());
            }
        }

        if close.len() == 1 {
            RouteDecision::Route(close.remove(0))
        } else {
            RouteDecision::Ambiguous(close)
        }
    }
}
