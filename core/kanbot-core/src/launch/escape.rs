//! Shell escaping for values interpolated into emitted command text.
//!
//! Ticket titles and worktree paths are user-controlled. Every such value is
//! wrapped in double quotes with `\`, `"`, `$`, `` ` `` and `!` backslash-escaped.

const ESCAPED: [char; 5] = ['\\', '"', '$', '`', '!'];

/// Escapes shell metacharacters for use inside a double-quoted string.
pub fn escape_double_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        if ESCAPED.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Escapes and wraps a value in double quotes.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", escape_double_quoted(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// True when every occurrence of `target` is preceded by an odd run of backslashes.
    fn all_escaped(text: &str, target: char) -> bool {
        let chars: Vec<char> = text.chars().collect();
        chars.iter().enumerate().all(|(index, ch)| {
            if *ch != target {
                return true;
            }
            let backslashes = chars[..index]
                .iter()
                .rev()
                .take_while(|candidate| **candidate == '\\')
                .count();
            backslashes % 2 == 1
        })
    }

    #[test]
    fn escapes_each_metacharacter() {
        assert_eq!(escape_double_quoted(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_double_quoted("$HOME"), "\\$HOME");
        assert_eq!(escape_double_quoted("`id`"), "\\`id\\`");
        assert_eq!(escape_double_quoted("wow!"), "wow\\!");
        assert_eq!(escape_double_quoted(r"C:\dir"), r"C:\\dir");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(escape_double_quoted("Fix login flow (#42)"), "Fix login flow (#42)");
        assert_eq!(quote("/repo/work tree"), "\"/repo/work tree\"");
    }

    #[test]
    fn hostile_values_have_no_unescaped_metacharacters() {
        let hostile = r#"/tmp/"; rm -rf / #`whoami`$(id)\"!"#;
        let escaped = escape_double_quoted(hostile);
        for target in ['"', '`', '$', '!'] {
            assert!(all_escaped(&escaped, target), "unescaped {target} in {escaped}");
        }
    }

    #[test]
    fn trailing_backslash_cannot_escape_closing_quote() {
        let quoted = quote("path\\");
        assert_eq!(quoted, "\"path\\\\\"");
        assert!(all_escaped(&quoted[1..quoted.len() - 1], '"'));
    }
}
