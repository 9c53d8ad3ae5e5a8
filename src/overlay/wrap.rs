const LATIN_PUNCTUATION: &str = ".,!?'\"()-:;";

/// True when the trimmed text is only ASCII letters, digits, whitespace and
/// common sentence punctuation.
pub fn is_plain_latin(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty()
        && trimmed.chars().all(|ch| {
            ch.is_ascii_alphanumeric() || ch.is_whitespace() || LATIN_PUNCTUATION.contains(ch)
        })
}

/// Breaks `text` into lines of at most `chars_per_line` characters.
///
/// Text that already carries a newline is returned as is. Plain Latin text is
/// wrapped at spaces; anything else is cut at exact character counts.
pub fn insert_line_breaks(text: &str, chars_per_line: usize) -> String {
    if text.is_empty() || chars_per_line == 0 || text.contains('\n') {
        return text.to_string();
    }
    if is_plain_latin(text) {
        return wrap_words(text, chars_per_line);
    }
    wrap_chars(text, chars_per_line)
}

pub fn wrap_chars(text: &str, chars_per_line: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars_per_line == 0 {
        return text.to_string();
    }
    chars
        .chunks(chars_per_line)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Greedy word wrap on single spaces. A word longer than the limit keeps a
/// line of its own.
pub fn wrap_words(text: &str, chars_per_line: usize) -> String {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split(' ') {
        let word_len = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= chars_per_line {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn latin_detection() {
        assert!(is_plain_latin("Hey! What's that (thing)?"));
        assert!(is_plain_latin("  3 - 2: done;  "));
        assert!(!is_plain_latin("なにこれ"));
        assert!(!is_plain_latin("Café"));
        assert!(!is_plain_latin("   "));
    }

    #[test]
    fn char_wrap_keeps_full_lines() {
        let text = "あいうえおかきくけこさしすせそたちつてと";
        let wrapped = wrap_chars(text, 6);
        let lines: Vec<&str> = wrapped.split('\n').collect();
        assert_eq!(lines.len(), 4);
        for line in &lines[..3] {
            assert_eq!(line.chars().count(), 6);
        }
        assert_eq!(lines[3].chars().count(), 2);
    }

    #[test]
    fn char_wrap_exact_multiple_has_no_trailing_break() {
        assert_eq!(wrap_chars("abcdef", 3), "abc\ndef");
    }

    #[test]
    fn word_wrap_is_greedy() {
        let wrapped = wrap_words("I can't believe you did that again", 12);
        assert_snapshot!(wrapped, @r"
        I can't
        believe you
        did that
        again
        ");
    }

    #[test]
    fn long_word_gets_its_own_line() {
        assert_eq!(wrap_words("a extraordinarily b", 5), "a\nextraordinarily\nb");
    }

    #[test]
    fn existing_breaks_win() {
        assert_eq!(insert_line_breaks("ab\ncdef", 1), "ab\ncdef");
    }

    #[test]
    fn dispatch_by_script() {
        assert_eq!(insert_line_breaks("go go go", 5), "go go\ngo");
        assert_eq!(insert_line_breaks("いくぞいくぞ", 3), "いくぞ\nいくぞ");
        assert_eq!(insert_line_breaks("", 3), "");
    }
}
