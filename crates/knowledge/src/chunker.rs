//! Text chunking with configurable size and overlap.

use crate::types::ChunkCandidate;

/// Characters a chunk may end on without splitting a word or sentence.
fn is_break(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '.' | '!' | '?' | '。' | '！' | '？' | '；' | '，')
}

/// Chunk text into overlapping segments.
///
/// Sizes are measured in characters so CJK and Latin text chunk alike. A
/// chunk ends on the last break character in its second half when one
/// exists, otherwise exactly at `chunk_size`.
pub fn chunk_text(
    source_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<ChunkCandidate> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || chunk_size == 0 {
        return vec![];
    }

    let overlap = overlap.min(chunk_size / 2);
    let mut chunks = Vec::new();
    let mut position = 0u32;
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            let floor = start + chunk_size / 2;
            (floor..hard_end)
                .rev()
                .find(|&i| is_break(chars[i]))
                .map(|i| i + 1)
                .unwrap_or(hard_end)
        };

        let segment: String = chars[start..end].iter().collect();
        let trimmed = segment.trim();
        if !trimmed.is_empty() {
            chunks.push(ChunkCandidate {
                source_id: source_id.to_string(),
                position,
                text: trimmed.to_string(),
                metadata: serde_json::json!({
                    "start": start,
                    "end": end,
                }),
            });
            position += 1;
        }

        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_no_overlap() {
        let text = "a".repeat(300);
        let chunks = chunk_text("test-source", &text, 100, 0);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].position, 0);
        assert_eq!(chunks[2].position, 2);
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("test-source", "", 100, 10).is_empty());
        assert!(chunk_text("test-source", "   \n ", 100, 10).is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("s", "Paris is the capital of France.", 512, 64);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Paris is the capital of France.");
    }

    #[test]
    fn test_chunk_text_with_overlap() {
        let text = "abcdefghijklmnopqrstuvwxyz".repeat(4);
        let chunks = chunk_text("test-source", &text, 50, 10);

        assert!(chunks.len() >= 2);
        let first_tail: String = chunks[0].text.chars().rev().take(10).collect::<Vec<_>>().into_iter().rev().collect();
        assert!(chunks[1].text.starts_with(&first_tail));
    }

    #[test]
    fn test_chunks_end_on_word_boundary() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = chunk_text("s", text, 20, 0);

        for chunk in &chunks {
            for word in chunk.text.split_whitespace() {
                assert!(text.split_whitespace().any(|w| w == word), "split word: {}", word);
            }
        }
    }

    #[test]
    fn test_chinese_text_is_chunked_by_characters() {
        let text = "巴黎是法国的首都。".repeat(20);
        let chunks = chunk_text("s", &text, 40, 0);

        assert!(chunks.len() >= 4);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 40));
        assert!(chunks[0].text.ends_with('。'));
    }
}
