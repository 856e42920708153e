/// Escape text for embedding into rendered markup.
///
/// Each of `< > " ' &` maps to a fixed entity in a single pass, so entities
/// produced here are never escaped a second time.
pub fn sanitize_input(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Clean free text before it is stored: drop control characters, cap the
/// length at `max_chars`, collapse whitespace runs and trim.
pub fn normalize_text(input: &str, max_chars: usize) -> String {
    let kept: String = input
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .take(max_chars)
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_input() {
        assert_eq!(sanitize_input("<script>&"), "&lt;script&gt;&amp;");
        assert_eq!(
            sanitize_input(r#"say "hi" & 'bye'"#),
            "say &quot;hi&quot; &amp; &#39;bye&#39;"
        );
        assert_eq!(sanitize_input("plain text"), "plain text");
    }

    #[test]
    fn test_existing_entities_are_escaped_literally() {
        assert_eq!(sanitize_input("&lt;"), "&amp;lt;");
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  hello\u{0}\u{7}   world \n\t ok ", 1000), "hello world ok");
        assert_eq!(normalize_text("abcdef", 3), "abc");
        assert_eq!(normalize_text("", 10), "");
    }
}
