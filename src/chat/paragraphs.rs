//! Paragraph splitting and reveal pacing for bot messages.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Shortest pause between revealed paragraphs.
pub const MIN_REVEAL_MS: u64 = 2000;
/// Longest pause between revealed paragraphs.
pub const MAX_REVEAL_MS: u64 = 6000;

fn heading_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#{1,6}\s").ok()).as_ref()
}

fn is_heading(line: &str) -> bool {
    heading_re().is_some_and(|re| re.is_match(line))
}

/// Split a message into paragraphs on blank-line or markdown-heading
/// boundaries. Paragraphs are trimmed; whitespace-only input yields an
/// empty vector.
#[must_use]
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                blocks.push(current.trim().to_string());
                current = String::new();
            }
            continue;
        }
        if is_heading(trimmed) && !current.is_empty() {
            blocks.push(current.trim().to_string());
            current = String::new();
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        blocks.push(current.trim().to_string());
    }

    blocks
}

/// Reading delay for a revealed paragraph: proportional to length
/// (100 ms per character over a notional 10 chars/second reading rate),
/// clamped to a 2–6 second window.
#[must_use]
pub fn reveal_delay(text: &str) -> Duration {
    let millis = (text.len() as u64).saturating_mul(100);
    Duration::from_millis(millis.clamp(MIN_REVEAL_MS, MAX_REVEAL_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_floor() {
        assert_eq!(reveal_delay(""), Duration::from_millis(2000));
        assert_eq!(reveal_delay("hi"), Duration::from_millis(2000));
    }

    #[test]
    fn test_delay_ceiling() {
        let long = "x".repeat(1000);
        assert_eq!(reveal_delay(&long), Duration::from_millis(6000));
    }

    #[test]
    fn test_delay_proportional_in_window() {
        let text = "y".repeat(40);
        assert_eq!(reveal_delay(&text), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_monotonic() {
        let mut last = Duration::ZERO;
        for len in [0, 10, 25, 40, 55, 80, 500, 2000] {
            let delay = reveal_delay(&"z".repeat(len));
            assert!(delay >= last, "delay regressed at len {len}");
            last = delay;
        }
    }

    #[test]
    fn test_split_on_blank_lines() {
        let text = "first paragraph\n\nsecond paragraph\n\n\nthird";
        assert_eq!(
            split_paragraphs(text),
            vec!["first paragraph", "second paragraph", "third"]
        );
    }

    #[test]
    fn test_split_on_headings() {
        let text = "intro line\n## Details\nmore text\n### Deeper\nend";
        assert_eq!(
            split_paragraphs(text),
            vec!["intro line", "## Details\nmore text", "### Deeper\nend"]
        );
    }

    #[test]
    fn test_hash_without_space_is_not_heading() {
        let text = "line one\n#hashtag continues\nline three";
        assert_eq!(
            split_paragraphs(text),
            vec!["line one\n#hashtag continues\nline three"]
        );
    }

    #[test]
    fn test_split_blank_input() {
        assert!(split_paragraphs("").is_empty());
        assert!(split_paragraphs("  \n\n  ").is_empty());
    }

    #[test]
    fn test_single_block() {
        assert_eq!(split_paragraphs("just one line"), vec!["just one line"]);
    }
}
