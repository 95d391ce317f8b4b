//! 最近邻索引：暴力余弦相似度
//!
//! 目录规模通常是几十到几百条短语，线性扫描足够；结果按分数降序、同分按插入顺序。

/// 余弦相似度；长度不一致或存在零向量时为 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// 相似度 → 置信度：截断到 [0, 1]（单调）
pub fn confidence(similarity: f32) -> f32 {
    if similarity.is_nan() {
        0.0
    } else {
        similarity.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加向量，返回其位置（即注册顺序）
    pub fn push(&mut self, vector: Vec<f32>) -> usize {
        self.vectors.push(vector);
        self.vectors.len() - 1
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// k 个最近邻：(位置, 置信度)，降序；同分时位置小者在前
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, confidence(cosine_similarity(query, v))))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_negative_similarity_clamped() {
        assert_eq!(confidence(-0.4), 0.0);
        assert_eq!(confidence(1.2), 1.0);
        assert_eq!(confidence(f32::NAN), 0.0);
    }

    #[test]
    fn test_nearest_orders_by_score_then_position() {
        let mut idx = VectorIndex::new();
        idx.push(vec![0.0, 1.0]);
        idx.push(vec![1.0, 0.0]);
        idx.push(vec![1.0, 0.0]);
        let hits = idx.nearest(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 1);
        assert_eq!(hits[1].0, 2);
    }
}
