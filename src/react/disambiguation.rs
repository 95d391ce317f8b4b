//! 消歧：编号选择提示的生成与解析

use crate::intent::IntentMatch;
use crate::memory::PendingCandidate;

pub fn to_pending(matches: &[IntentMatch]) -> Vec<PendingCandidate> {
    matches
        .iter()
        .map(|m| PendingCandidate {
            kind: m.intent.kind,
            target: m.intent.target.clone(),
            phrase: m.intent.phrase.clone(),
            score: m.score,
        })
        .collect()
}

/// 编号提示，每行：`N. 目标 (类型, 置信度)`
pub fn render_prompt(candidates: &[PendingCandidate]) -> String {
    let mut lines = vec!["Several options match your request. Reply with a number to choose:".to_string()];
    for (i, c) in candidates.iter().enumerate() {
        lines.push(format!(
            "{}. {} ({}, {:.2})",
            i + 1,
            c.target,
            c.kind.as_str(),
            c.score
        ));
    }
    lines.join("\n")
}

/// 解析 1 起始的编号，返回下标；越界或非数字返回 None
pub fn parse_choice(input: &str, count: usize) -> Option<usize> {
    let trimmed = input.trim().trim_end_matches(['.', ')']);
    let n: usize = trimmed.parse().ok()?;
    (1..=count).contains(&n).then(|| n - 1)
}
