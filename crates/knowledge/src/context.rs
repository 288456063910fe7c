//! Reference context construction from retrieved passages.

use crate::retriever::RetrievedPassage;

/// Join the passages scoring strictly above `threshold` into the reference
/// context handed to the answer model.
///
/// Passages keep their given order. Each becomes one `source_id:content`
/// line with line breaks removed from the content, so the context has
/// exactly one line per passage. An empty string means nothing relevant.
pub fn build_reference_context(passages: &[RetrievedPassage], threshold: f32) -> String {
    passages
        .iter()
        .filter(|p| p.score > threshold)
        .map(|p| {
            let content: String = p
                .content
                .chars()
                .filter(|c| *c != '\n' && *c != '\r')
                .collect();
            format!("{}:{}", p.source_id, content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(source_id: &str, content: &str, score: f32) -> RetrievedPassage {
        RetrievedPassage {
            source_id: source_id.to_string(),
            content: content.to_string(),
            score,
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        let passages = vec![
            passage("a", "kept", 0.81),
            passage("b", "boundary", 0.8),
            passage("c", "noise", 0.42),
        ];
        assert_eq!(build_reference_context(&passages, 0.8), "a:kept");
    }

    #[test]
    fn test_order_and_newline_stripping() {
        let passages = vec![
            passage("faq.md#1", "line one\nline two", 0.95),
            passage("faq.md#0", "windows\r\nbreaks", 0.9),
        ];
        assert_eq!(
            build_reference_context(&passages, 0.8),
            "faq.md#1:line oneline two\nfaq.md#0:windowsbreaks"
        );
    }

    #[test]
    fn test_empty_when_nothing_relevant() {
        assert_eq!(build_reference_context(&[], 0.8), "");
        assert_eq!(
            build_reference_context(&[passage("a", "x", 0.1)], 0.8),
            ""
        );
    }
}
