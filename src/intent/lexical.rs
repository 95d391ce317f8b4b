//! 字面匹配：规范化、分词与 Jaccard 相似度
//!
//! 嵌入对「hi」「42」这类短输入不稳定，规范化后完全相同的短语直接给 1.0。
//! 含 CJK 字符的文本用 jieba 搜索引擎模式切词，其余按空白切分。

use std::collections::HashSet;
use std::sync::OnceLock;

use jieba_rs::Jieba;

static JIEBA: OnceLock<Jieba> = OnceLock::new();

fn jieba() -> &'static Jieba {
    JIEBA.get_or_init(Jieba::new)
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}' |
        '\u{3400}'..='\u{4DBF}' |
        '\u{F900}'..='\u{FAFF}' |
        '\u{3040}'..='\u{309F}' |
        '\u{30A0}'..='\u{30FF}'
    )
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// 小写、标点变空格、合并空白
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || is_cjk(c) {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 对已规范化的文本分词
pub fn tokenize(normalized: &str) -> Vec<String> {
    if normalized.is_empty() {
        return Vec::new();
    }
    if contains_cjk(normalized) {
        jieba()
            .cut_for_search(normalized, true)
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        normalized.split_whitespace().map(str::to_string).collect()
    }
}

/// 预处理后的短语：规范化文本 + 词集合
#[derive(Debug, Clone)]
pub struct LexicalKey {
    pub normalized: String,
    pub tokens: HashSet<String>,
}

impl LexicalKey {
    pub fn new(text: &str) -> Self {
        let normalized = normalize(text);
        let tokens = tokenize(&normalized).into_iter().collect();
        Self { normalized, tokens }
    }

    /// 与另一短语的字面得分：完全相同 1.0，否则 Jaccard
    pub fn score(&self, other: &LexicalKey) -> f32 {
        if self.normalized.is_empty() || other.normalized.is_empty() {
            return 0.0;
        }
        if self.normalized == other.normalized {
            return 1.0;
        }
        jaccard_similarity(&self.tokens, &other.tokens)
    }
}

pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  Hello,   World!! "), "hello world");
        assert_eq!(normalize("@Greeter: hi"), "greeter hi");
    }

    #[test]
    fn test_exact_match_scores_one() {
        let a = LexicalKey::new("Hello!");
        let b = LexicalKey::new("hello");
        assert_eq!(a.score(&b), 1.0);
    }

    #[test]
    fn test_partial_overlap_is_jaccard() {
        let a = LexicalKey::new("search news about");
        let b = LexicalKey::new("search news about rust");
        assert!((a.score(&b) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_chinese_tokenized_with_jieba() {
        let tokens = tokenize(&normalize("我想搜索新闻"));
        assert!(tokens.iter().any(|t| t.contains("搜索") || t.contains("新闻")));
    }

    #[test]
    fn test_empty_never_matches() {
        assert_eq!(LexicalKey::new("").score(&LexicalKey::new("")), 0.0);
    }
}
