//! Character classes used by the construct tokenizers.
//!
//! Every predicate takes a [`Code`], the tokenizers' unit of input. `None` is the end-of-input
//! sentinel and never belongs to any class except [`is_whitespace_or_line_start`].

/// One input character, or `None` at the end of input.
pub type Code = Option<char>;

/// The closing marker shared by every bracketed construct.
pub const CLOSE_MARKER: char = ']';

/// Separates a note-embed id from its label.
pub const SEPARATOR: char = '|';

pub fn is_digit(code: Code) -> bool {
    matches!(code, Some(c) if c.is_ascii_digit())
}

pub fn is_alpha(code: Code) -> bool {
    matches!(code, Some(c) if c.is_ascii_alphabetic())
}

/// Letters, digits, `_` and `-`.
pub fn is_name_char(code: Code) -> bool {
    is_alpha(code) || is_digit(code) || matches!(code, Some('_' | '-'))
}

pub fn is_line_ending(code: Code) -> bool {
    matches!(code, Some('\n' | '\r'))
}

/// Characters allowed in a note-embed id.
///
/// Embeds reference uploaded files by loose filename as well as numeric note ids, so this
/// admits spaces and most punctuation. Control characters, the separator and brackets are
/// excluded.
pub fn is_filename_char(code: Code) -> bool {
    match code {
        Some(c) => !c.is_control() && !matches!(c, SEPARATOR | '[' | CLOSE_MARKER),
        None => false,
    }
}

/// Anything on the current line that isn't the closing marker.
pub fn is_free_text_char(code: Code) -> bool {
    code.is_some() && !is_line_ending(code) && code != Some(CLOSE_MARKER)
}

/// True when `code` precedes a position where a tag-link may start: start of input, a line
/// ending, or any other whitespace.
pub fn is_whitespace_or_line_start(code: Code) -> bool {
    match code {
        None => true,
        Some(c) => c.is_whitespace(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_chars() {
        for c in ['a', 'Z', '0', '9', '_', '-'] {
            assert!(is_name_char(Some(c)), "{c:?} should be a name char");
        }
        for c in [' ', '#', '.', '/', 'é'] {
            assert!(!is_name_char(Some(c)), "{c:?} should not be a name char");
        }
        assert!(!is_name_char(None));
    }

    #[test]
    fn test_filename_chars() {
        for c in ['a', '1', ' ', '.', '/', '(', '!', '#'] {
            assert!(is_filename_char(Some(c)), "{c:?} should be a filename char");
        }
        for c in ['|', '[', ']', '\n', '\t'] {
            assert!(!is_filename_char(Some(c)), "{c:?} should not be a filename char");
        }
        assert!(!is_filename_char(None));
    }

    #[test]
    fn test_free_text_chars() {
        assert!(is_free_text_char(Some(' ')));
        assert!(is_free_text_char(Some('|')));
        assert!(is_free_text_char(Some('[')));
        assert!(!is_free_text_char(Some(']')));
        assert!(!is_free_text_char(Some('\n')));
        assert!(!is_free_text_char(Some('\r')));
        assert!(!is_free_text_char(None));
    }

    #[test]
    fn test_tag_preconditions() {
        assert!(is_whitespace_or_line_start(None));
        assert!(is_whitespace_or_line_start(Some(' ')));
        assert!(is_whitespace_or_line_start(Some('\n')));
        assert!(is_whitespace_or_line_start(Some('\t')));
        assert!(!is_whitespace_or_line_start(Some('o')));
        assert!(!is_whitespace_or_line_start(Some('/')));
    }
}
