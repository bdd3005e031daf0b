//! Deterministic local embedder.
//!
//! Hashes tokens into a fixed-dimension bag-of-words vector. No external
//! service, fully deterministic, so identical text always produces an
//! identical vector. Suitable for offline use and tests; real deployments
//! plug in a vendor provider behind the same trait.

use async_trait::async_trait;

use docmind_core::{EmbeddingProvider, Result};

/// Token-hashing embedder: each token lands in a signed bucket, the result
/// is L2-normalized.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text.split_whitespace() {
            let normalized: String = token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if normalized.is_empty() {
                continue;
            }

            let digest = blake3::hash(normalized.as_bytes());
            let bytes = digest.as_bytes();
            let h = u64::from_le_bytes(bytes[..8].try_into().unwrap());
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("quarterly revenue grew").await.unwrap();
        let b = embedder.embed("quarterly revenue grew").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_normalized() {
        let embedder = HashEmbedder::new(32);
        let v = embedder.embed("some document text here").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_similar_texts_closer_than_unrelated() {
        let embedder = HashEmbedder::new(128);
        let a = embedder.embed("total expenses in march").await.unwrap();
        let b = embedder.embed("march total expenses").await.unwrap();
        let c = embedder.embed("unrelated zebra astronomy").await.unwrap();

        let dot = |x: &[f32], y: &[f32]| -> f32 { x.iter().zip(y).map(|(p, q)| p * q).sum() };
        assert!(dot(&a, &b) > dot(&a, &c));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let embedder = HashEmbedder::new(16);
        let batch = embedder.embed_batch(&["one", "two"]).await.unwrap();
        assert_eq!(batch[0], embedder.embed("one").await.unwrap());
        assert_eq!(batch[1], embedder.embed("two").await.unwrap());
    }
}
