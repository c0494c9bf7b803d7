use thiserror::Error;

/// Structural problems found while reading serialized content. Offsets are
/// byte positions into the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("unterminated tag starting at byte {offset}")]
    UnterminatedTag { offset: usize },
    #[error("unterminated comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },
    #[error("malformed tag at byte {offset}")]
    MalformedTag { offset: usize },
    #[error("closing tag </{name}> at byte {offset} has no matching opening tag")]
    UnexpectedClosingTag { name: String, offset: usize },
    #[error("expected </{expected}> but found </{found}> at byte {offset}")]
    MismatchedTag {
        expected: String,
        found: String,
        offset: usize,
    },
    #[error("<{name}> opened at byte {offset} is never closed")]
    UnclosedTag { name: String, offset: usize },
}
