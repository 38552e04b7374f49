//! Whitespace tokenization of a single input line.
//!
//! Tokens are never copied: the lexer only reports where each run of
//! non-whitespace starts and ends, and the parser keeps those ranges.

use std::ops::Range;

/// Bytes that separate tokens: space, tab, CR, LF, vertical tab and form feed.
pub(crate) fn is_blank(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n' | '\x0b' | '\x0c')
}

/// Strip separator bytes from both ends of `line`.
pub(crate) fn trim_blanks(line: &str) -> &str {
    line.trim_matches(is_blank)
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Scanner { input, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(ch) = self.peek_char() {
            if !pred(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    /// Next run of non-blank characters, or `None` once only blanks remain.
    fn next_word(&mut self) -> Option<Range<usize>> {
        self.skip_while(is_blank);
        if self.pos == self.input.len() {
            return None;
        }
        let start = self.pos;
        self.skip_while(|ch| !is_blank(ch));
        Some(start..self.pos)
    }
}

/// Split `line` into the byte ranges of its whitespace-separated words.
///
/// A line holding only blanks yields no ranges.
pub(crate) fn split_into_spans(line: &str) -> Vec<Range<usize>> {
    let mut scanner = Scanner::new(line);
    let mut spans = Vec::new();
    while let Some(span) = scanner.next_word() {
        spans.push(span);
    }
    spans
}

/// Byte length of the leading run of blanks in `line`.
pub(crate) fn blank_prefix_len(line: &str) -> usize {
    line.len() - line.trim_start_matches(is_blank).len()
}

/// Byte length of `line` once trailing blanks are dropped.
pub(crate) fn trimmed_end_len(line: &str) -> usize {
    line.trim_end_matches(is_blank).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<&str> {
        split_into_spans(line)
            .into_iter()
            .map(|s| &line[s])
            .collect()
    }

    #[test]
    fn test_split_on_every_blank_kind() {
        assert_eq!(
            words("a\tb  c\x0bd\x0ce\r\n"),
            vec!["a", "b", "c", "d", "e"]
        );
    }

    #[test]
    fn test_blank_line_has_no_words() {
        assert!(words("").is_empty());
        assert!(words(" \t\r\n").is_empty());
    }

    #[test]
    fn test_spans_point_into_line() {
        let line = "  ls -l  ";
        assert_eq!(split_into_spans(line), vec![2..4, 5..7]);
    }

    #[test]
    fn test_non_ascii_words() {
        assert_eq!(words("grep héllo wörld"), vec!["grep", "héllo", "wörld"]);
    }

    #[test]
    fn test_trim_helpers() {
        assert_eq!(trim_blanks("\t echo hi \n"), "echo hi");
        assert_eq!(blank_prefix_len("  \tx"), 3);
        assert_eq!(trimmed_end_len("x y \r\n"), 3);
        assert_eq!(trimmed_end_len("   "), 0);
    }
}
