//! 嵌入 API：意图目录在构建时把每条短语编码为定长向量
//!
//! HashingEmbedder 是无需网络的确定性实现（词 + 字符三元组特征哈希），
//! 相同文本永远得到相同向量，适合本地运行与测试。

use async_trait::async_trait;

use crate::intent::lexical;
use crate::llm::LlmError;

/// 嵌入提供方
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 将文本编码为向量
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    /// 批量编码；默认逐条调用
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// 向量维度
    fn dimension(&self) -> usize;
}

/// 特征哈希嵌入
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

const TRIGRAM_WEIGHT: f32 = 0.5;

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }

    fn add_feature(&self, vec: &mut [f32], feature: &str, weight: f32) {
        let h = fnv1a(feature.as_bytes());
        let idx = (h % self.dimension as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        vec[idx] += sign * weight;
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        let normalized = lexical::normalize(text);
        for token in lexical::tokenize(&normalized) {
            self.add_feature(&mut vec, &token, 1.0);
        }
        let chars: Vec<char> = format!(" {normalized} ").chars().collect();
        for window in chars.windows(3) {
            let gram: String = window.iter().collect();
            self.add_feature(&mut vec, &format!("#{gram}"), TRIGRAM_WEIGHT);
        }
        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vec.iter_mut().for_each(|x| *x /= norm);
        }
        vec
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        Ok(self.encode(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// FNV-1a 64 位哈希（跨平台、跨版本稳定）
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::index::cosine_similarity;

    #[tokio::test]
    async fn test_identical_text_identical_vector() {
        let e = HashingEmbedder::new(128);
        let a = e.embed("Search news about Rust").await.unwrap();
        let b = e.embed("search news about rust!").await.unwrap();
        assert_eq!(a.len(), 128);
        assert_eq!(a, b);
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_related_text_scores_higher_than_unrelated() {
        let e = HashingEmbedder::default();
        let q = e.embed("open the knowledge graph").await.unwrap();
        let near = e.embed("open knowledge graph").await.unwrap();
        let far = e.embed("what time is it").await.unwrap();
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(16);
        let v = e.embed("   ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
