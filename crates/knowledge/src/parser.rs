//! Source file parsing and text extraction.

use askbot_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    PlainText,
    Unsupported,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("txt") | Some("text") | Some("csv") | Some("json") | Some("yaml")
            | Some("yml") => Self::PlainText,
            _ => Self::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::PlainText => "text",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// Parse a source file and extract clean text.
pub fn parse_file(path: &Path) -> AppResult<String> {
    let content_type = ContentType::from_path(path);
    if !content_type.is_supported() {
        return Err(AppError::Knowledge(format!(
            "Unsupported file type: {:?}",
            path
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    if raw.contains('\0') {
        return Err(AppError::Knowledge(format!(
            "Binary content in {:?}",
            path
        )));
    }

    Ok(parse_text(content_type, &raw))
}

/// Extract clean text from already-loaded content.
pub fn parse_text(content_type: ContentType, raw: &str) -> String {
    match content_type {
        ContentType::Markdown => clean_markdown(raw),
        ContentType::Html => clean_html(raw),
        ContentType::PlainText | ContentType::Unsupported => raw.trim().to_string(),
    }
}

/// Strip markdown structure while keeping prose and code content.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_front_matter = false;

    for (i, line) in text.lines().enumerate() {
        let trimmed = line.trim();

        if i == 0 && trimmed == "---" {
            in_front_matter = true;
            continue;
        }
        if in_front_matter {
            if trimmed == "---" {
                in_front_matter = false;
            }
            continue;
        }

        // Skip horizontal rules and code fences
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~")
        {
            continue;
        }

        let content = trimmed
            .trim_start_matches('#')
            .trim_start_matches('>')
            .trim();
        if !content.is_empty() {
            result.push_str(content);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Clean HTML by stripping tags and the content of script/style blocks.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        result.push_str(&rest[..open]);
        result.push(' ');
        let tag = &rest[open..];

        let skip_to = ["script", "style"].iter().find_map(|name| {
            let prefix_len = name.len() + 1;
            let is_block = tag
                .get(1..prefix_len)
                .is_some_and(|s| s.eq_ignore_ascii_case(name))
                && tag
                    .get(prefix_len..)
                    .is_some_and(|s| !s.starts_with(|c: char| c.is_alphanumeric()));
            if !is_block {
                return None;
            }
            let closing = format!("</{}", name);
            let lower = tag.to_ascii_lowercase();
            Some(
                lower
                    .find(&closing)
                    .and_then(|pos| lower[pos..].find('>').map(|end| pos + end + 1))
                    .unwrap_or(tag.len()),
            )
        });

        rest = match skip_to {
            Some(offset) => &tag[offset..],
            None => match tag.find('>') {
                Some(close) => &tag[close + 1..],
                None => "",
            },
        };
    }
    result.push_str(rest);

    decode_entities(&result)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(
            ContentType::from_path(Path::new("file.md")),
            ContentType::Markdown
        );
        assert_eq!(
            ContentType::from_path(Path::new("PAGE.HTML")),
            ContentType::Html
        );
        assert_eq!(
            ContentType::from_path(Path::new("file.txt")),
            ContentType::PlainText
        );
        assert!(!ContentType::from_path(Path::new("image.png")).is_supported());
    }

    #[test]
    fn test_clean_markdown() {
        let input = "---\ntitle: FAQ\n---\n# Header\n\nSome text\n\n```rust\ncode\n```\n\n> quoted\nMore text";
        let output = clean_markdown(input);
        assert!(output.starts_with("Header"));
        assert!(output.contains("Some text"));
        assert!(output.contains("code"));
        assert!(output.contains("quoted"));
        assert!(!output.contains("```"));
        assert!(!output.contains("title: FAQ"));
    }

    #[test]
    fn test_clean_html() {
        let input = "<html><head><style>p { color: red; }</style><script>var x = 1;</script></head><body><p>Hello <b>world</b> &amp; friends</p></body></html>";
        assert_eq!(clean_html(input), "Hello world & friends");
    }

    #[test]
    fn test_clean_html_non_ascii() {
        let input = "<p>巴黎是<b>法国</b>的首都</p>";
        assert_eq!(clean_html(input), "巴黎是 法国 的首都");
    }

    #[test]
    fn test_parse_file_rejects_unsupported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logo.png");
        std::fs::write(&path, "not really an image").unwrap();
        assert!(parse_file(&path).is_err());
    }

    #[test]
    fn test_parse_file_markdown() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("faq.md");
        std::fs::write(&path, "# Hours\n\nWe open at 9.").unwrap();
        assert_eq!(parse_file(&path).unwrap(), "Hours\nWe open at 9.");
    }
}
