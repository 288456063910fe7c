//! Offline embedding provider built from hashed character n-grams.

use crate::embeddings::provider::EmbeddingProvider;
use askbot_core::AppResult;
use std::collections::{HashMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "how", "who",
];

/// Trigram-based embedding provider for local, offline operation.
///
/// Latin-script words contribute their character trigrams plus the whole
/// word; runs of CJK characters, which are not space separated, contribute
/// overlapping character bigrams. Features are hashed into a fixed number
/// of dimensions and the vector is normalised to unit length, so identical
/// texts always score 1.0 against each other.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();
        let (words, cjk_runs) = split_terms(&text.to_lowercase());

        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in words.iter().map(String::as_str) {
            if word.chars().count() > 2 && !stop_words.contains(word) {
                *word_freq.entry(word).or_insert(0) += 1;
            }
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let idx = feature_index(window.iter(), 37, self.dimensions);
                embedding[idx] += (*freq as f32).sqrt();
            }

            let idx = feature_index(chars.iter(), 31, self.dimensions);
            embedding[idx] += *freq as f32;
        }

        for run in &cjk_runs {
            if run.len() == 1 {
                let idx = feature_index(run.iter(), 41, self.dimensions);
                embedding[idx] += 1.0;
                continue;
            }
            for window in run.windows(2) {
                let idx = feature_index(window.iter(), 41, self.dimensions);
                embedding[idx] += 1.0;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

/// Split text into latin words and runs of CJK characters.
fn split_terms(text: &str) -> (Vec<String>, Vec<Vec<char>>) {
    let mut words = Vec::new();
    let mut cjk_runs = Vec::new();
    let mut word = String::new();
    let mut run = Vec::new();

    for ch in text.chars() {
        if is_cjk(ch) {
            if !word.is_empty() {
                words.push(std::mem::take(&mut word));
            }
            run.push(ch);
        } else {
            if !run.is_empty() {
                cjk_runs.push(std::mem::take(&mut run));
            }
            if ch.is_alphanumeric() {
                word.push(ch);
            } else if !word.is_empty() {
                words.push(std::mem::take(&mut word));
            }
        }
    }

    if !word.is_empty() {
        words.push(word);
    }
    if !run.is_empty() {
        cjk_runs.push(run);
    }

    (words, cjk_runs)
}

fn is_cjk(ch: char) -> bool {
    matches!(ch as u32,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF
        | 0x3040..=0x30FF | 0xAC00..=0xD7AF)
}

fn feature_index<'a>(chars: impl Iterator<Item = &'a char>, seed: u64, dimensions: usize) -> usize {
    let mut buf = [0u8; 4];
    let hash = chars.fold(0u64, |acc, ch| {
        ch.encode_utf8(&mut buf)
            .bytes()
            .fold(acc, |acc, b| acc.wrapping_mul(seed).wrapping_add(b as u64))
    });
    (hash % dimensions as u64) as usize
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| self.generate_embedding(text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_trigram_provider_embed_batch() {
        let provider = TrigramProvider::new(384);
        let texts = vec![
            "hello world".to_string(),
            "test embedding".to_string(),
            "rust programming".to_string(),
        ];

        let embeddings = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 3);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), 384);
            assert!((norm(embedding) - 1.0).abs() < 0.001);
        }
    }

    #[tokio::test]
    async fn test_trigram_provider_deterministic() {
        let provider = TrigramProvider::new(384);
        let embedding1 = provider.embed("deterministic test").await.unwrap();
        let embedding2 = provider.embed("deterministic test").await.unwrap();
        assert_eq!(embedding1, embedding2);
    }

    #[tokio::test]
    async fn test_trigram_provider_empty_text() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("").await.unwrap();
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_related_text_scores_higher() {
        let provider = TrigramProvider::new(384);
        let query = provider.embed("capital of France").await.unwrap();
        let related = provider
            .embed("Paris is the capital of France.")
            .await
            .unwrap();
        let unrelated = provider
            .embed("Cooking recipes for fresh pasta")
            .await
            .unwrap();

        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_chinese_text_is_embedded() {
        let provider = TrigramProvider::new(384);
        let query = provider.embed("法国的首都").await.unwrap();
        let related = provider.embed("巴黎是法国的首都。").await.unwrap();
        let unrelated = provider.embed("意大利面的做法").await.unwrap();

        assert!((norm(&query) - 1.0).abs() < 0.001);
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn test_split_terms_mixed_script() {
        let (words, runs) = split_terms("rust 语言 is fast");
        assert_eq!(words, vec!["rust", "is", "fast"]);
        assert_eq!(runs, vec![vec!['语', '言']]);
    }
}
