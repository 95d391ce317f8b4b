//! 意图目录：构建时一次性嵌入全部短语，之后只读、跨线程共享

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::intent::index::VectorIndex;
use crate::intent::lexical::LexicalKey;
use crate::intent::Intent;
use crate::llm::{EmbeddingProvider, LlmError};

struct CatalogEntry {
    intent: Intent,
    lexical: LexicalKey,
}

/// 某个智能体定义私有的意图目录
pub struct IntentCatalog {
    entries: Vec<CatalogEntry>,
    index: VectorIndex,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl fmt::Debug for IntentCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentCatalog")
            .field("intents", &self.entries.len())
            .finish()
    }
}

impl IntentCatalog {
    /// 嵌入全部短语并建立索引；条目顺序即注册顺序（同分裁决依据）
    pub async fn build(
        intents: Vec<Intent>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, LlmError> {
        let phrases: Vec<String> = intents.iter().map(|i| i.phrase.clone()).collect();
        let vectors = if phrases.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&phrases).await?
        };
        if vectors.len() != intents.len() {
            return Err(LlmError::Embedding(format!(
                "expected {} vectors, got {}",
                intents.len(),
                vectors.len()
            )));
        }

        let mut index = VectorIndex::new();
        let mut entries = Vec::with_capacity(intents.len());
        for (intent, vector) in intents.into_iter().zip(vectors) {
            index.push(vector);
            entries.push(CatalogEntry {
                lexical: LexicalKey::new(&intent.phrase),
                intent,
            });
        }
        Ok(Self {
            entries,
            index,
            embedder,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn intents(&self) -> impl Iterator<Item = &Intent> {
        self.entries.iter().map(|e| &e.intent)
    }

    pub fn get(&self, position: usize) -> Option<&Intent> {
        self.entries.get(position).map(|e| &e.intent)
    }

    /// 最近邻（嵌入）与字面命中的并集；同一意图取两者较高分。返回 (位置, 分数)，未排序
    pub(crate) async fn score(
        &self,
        utterance: &str,
        top_k: usize,
    ) -> Result<Vec<(usize, f32)>, LlmError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let query = self.embedder.embed(utterance).await?;
        let mut merged: BTreeMap<usize, f32> = self
            .index
            .nearest(&query, top_k)
            .into_iter()
            .filter(|(_, s)| *s > 0.0)
            .collect();

        let key = LexicalKey::new(utterance);
        for (pos, entry) in self.entries.iter().enumerate() {
            let lexical = key.score(&entry.lexical);
            if lexical > 0.0 {
                let slot = merged.entry(pos).or_insert(0.0);
                if lexical > *slot {
                    *slot = lexical;
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}
