use std::error::Error as StdError;
use std::fmt;

/// An error raised while turning tokens into an encoded program.
///
/// Most variants carry the source line that produced them, mirroring
/// [`crate::lexer::LexError`]; the capacity variant does not, since it is
/// raised once the whole program has already grown past the word limit
/// rather than at any single offending line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssembleError {
    AtLine { line: u32, message: String },
    ProgramTooLarge,
}

impl AssembleError {
    pub fn at_line(line: u32, message: impl Into<String>) -> AssembleError {
        AssembleError::AtLine {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssembleError::AtLine { line, message } => {
                write!(f, "[Compiler][Line {}]: {}", line, message)
            }
            AssembleError::ProgramTooLarge => {
                write!(f, "[Compiler]: Program exceeds maximum size of 65536 words")
            }
        }
    }
}

impl StdError for AssembleError {}
