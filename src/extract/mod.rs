//! Fenced code block extraction from free-form engine replies.

const FENCE: &str = "```";

/// Isolate the first complete fenced code block in `text`.
///
/// Extraction is a fallible parse: `None` means "no valid code produced",
/// which the controller reports separately from an execution failure. The
/// language tag after the opening fence and surrounding whitespace are
/// stripped. When several fences are present the first complete one wins.
pub fn extract_code_block(text: &str) -> Option<String> {
    let open = text.find(FENCE)?;
    let after_open = &text[open + FENCE.len()..];

    // Skip the language tag (e.g. "json") up to the end of the opening line.
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(after_open.len());
    let body = &after_open[body_start..];

    let close = body.find(FENCE)?;
    let fragment = body[..close].trim();
    if fragment.is_empty() {
        return None;
    }
    Some(fragment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tagged_block() {
        let reply = "Here you go:\n```json\n{\"fig\": 1}\n```\nEnjoy!";
        assert_eq!(extract_code_block(reply).as_deref(), Some("{\"fig\": 1}"));
    }

    #[test]
    fn extracts_untagged_block() {
        let reply = "```\n{\"a\": [1, 2]}\n```";
        assert_eq!(extract_code_block(reply).as_deref(), Some("{\"a\": [1, 2]}"));
    }

    #[test]
    fn first_of_many_fences_wins() {
        let reply = "```json\nfirst\n```\ntext\n```json\nsecond\n```";
        assert_eq!(extract_code_block(reply).as_deref(), Some("first"));
    }

    #[test]
    fn prose_without_fence_is_not_found() {
        assert_eq!(extract_code_block("I cannot draw that."), None);
    }

    #[test]
    fn unclosed_fence_is_not_found() {
        assert_eq!(extract_code_block("```json\n{\"fig\": 1}"), None);
    }

    #[test]
    fn empty_block_is_not_found() {
        assert_eq!(extract_code_block("```json\n\n```"), None);
    }
}
