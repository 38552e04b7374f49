//! Turns one raw input line into a [`CommandRecord`].

use crate::builtin::Builtin;
use crate::command::{Argv, CommandRecord};
use crate::history::History;
use crate::lexer::{self, is_blank};
use std::ops::Range;
use std::rc::Rc;
use thiserror::Error;

/// Reasons a non-blank line produces no command. None of them change any state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// `!` not followed by a positive decimal number.
    #[error("strtoul: invalid history reference: !{0}")]
    InvalidEventNumber(String),
    /// `!N` with N past the newest surviving history entry.
    #[error("!{0}: event not found")]
    EventNotFound(u64),
    /// A line whose only word is the background operator.
    #[error("syntax error near: '&'")]
    DanglingBackground,
}

/// Parse one input line against the current history.
///
/// Returns `Ok(None)` for a blank line. A builtin keyword only counts at the
/// very start of the line. A `!N` reference anywhere in a non-builtin line
/// replaces the whole line with the N-th history entry.
pub fn parse_line(line: &str, history: &History) -> Result<Option<CommandRecord>, ParseError> {
    let text = lexer::trim_blanks(line);
    if text.is_empty() {
        return Ok(None);
    }

    if let Some(builtin) = Builtin::match_prefix(line) {
        return Ok(Some(parse_builtin(text, builtin)));
    }

    if let Some(bang) = text.find('!') {
        return resolve_reference(&text[bang + 1..], history).map(Some);
    }

    let mut spans = lexer::split_into_spans(text);
    let background = strip_background(text, &mut spans);
    if spans.is_empty() {
        return Err(ParseError::DanglingBackground);
    }
    Ok(Some(CommandRecord {
        argv: Rc::new(Argv::new(text.to_string(), spans)),
        builtin: None,
        background,
        from_history: false,
    }))
}

/// A builtin line keeps its keyword as `argv[0]` and everything after the
/// following blanks as one opaque `argv[1]`.
fn parse_builtin(text: &str, builtin: Builtin) -> CommandRecord {
    let keyword_end = builtin.name().len();
    let rest = &text[keyword_end..];
    let args_start = keyword_end + lexer::blank_prefix_len(rest);

    let mut spans = vec![0..keyword_end];
    if args_start < text.len() {
        spans.push(args_start..text.len());
    }
    let background = strip_background(text, &mut spans);

    CommandRecord {
        argv: Rc::new(Argv::new(text.to_string(), spans)),
        builtin: Some(builtin),
        background,
        from_history: false,
    }
}

/// Detect a trailing `&` on the final span.
///
/// A lone `&` is dropped; an attached one is cut off, along with any blanks
/// that preceded it. Returns whether the line is backgrounded.
fn strip_background(text: &str, spans: &mut Vec<Range<usize>>) -> bool {
    let Some(last) = spans.last_mut() else {
        return false;
    };
    let word = &text[last.clone()];
    if word == "&" {
        spans.pop();
        return true;
    }
    if let Some(kept) = word.strip_suffix('&') {
        let kept_len = lexer::trimmed_end_len(kept);
        if kept_len == 0 {
            spans.pop();
        } else {
            last.end = last.start + kept_len;
        }
        return true;
    }
    false
}

/// Resolve the text following a `!` against `history`. Blanks right after the
/// `!` are skipped; the reference ends at the next blank.
fn resolve_reference(reference: &str, history: &History) -> Result<CommandRecord, ParseError> {
    let reference = reference
        .trim_start_matches(is_blank)
        .split(is_blank)
        .next()
        .unwrap_or_default();
    let n = parse_event_number(reference)
        .ok_or_else(|| ParseError::InvalidEventNumber(reference.to_string()))?;
    history
        .resolve(n)
        .map(|entry| entry.replay())
        .ok_or(ParseError::EventNotFound(n))
}

/// Leading decimal digits of `reference`, after an optional sign, as a count.
///
/// Overflow saturates. A `-` wraps the count around like an unsigned
/// conversion does. `None` when there are no digits or the count is zero.
fn parse_event_number(reference: &str) -> Option<u64> {
    let (negative, unsigned) = match reference.as_bytes().first() {
        Some(b'-') => (true, &reference[1..]),
        Some(b'+') => (false, &reference[1..]),
        _ => (false, reference),
    };
    let digits = unsigned.bytes().take_while(u8::is_ascii_digit).try_fold(0u64, |acc, d| {
        acc.checked_mul(10)?.checked_add(u64::from(d - b'0'))
    });
    let n = match digits {
        Some(n) if negative => n.wrapping_neg(),
        Some(n) => n,
        None => u64::MAX,
    };
    (n != 0).then_some(n)
}
