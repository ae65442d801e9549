/// The type of error that can occur when compiling a grammar, building a [`crate::Generator`],
/// or drawing a string from it.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error(transparent)]
pub struct Error(pub(crate) ErrorRepr);

impl Error {
    /// Returns `true` for errors caused by the arguments or grammar given by the caller,
    /// i.e. everything except an abort from the decision source.
    pub fn is_invalid_argument(&self) -> bool {
        !matches!(self.0, ErrorRepr::Draw(_))
    }

    /// Returns the error raised by the decision source, if the run was aborted by it.
    ///
    /// This is how budget exhaustion (e.g. from [`crate::Bounded`]) or running out of
    /// fuzzer data surfaces; the error is passed through unchanged.
    pub fn abort(&self) -> Option<arbitrary::Error> {
        match self.0 {
            ErrorRepr::Draw(e) => Some(e),
            _ => None,
        }
    }
}

impl From<arbitrary::Error> for Error {
    fn from(e: arbitrary::Error) -> Self {
        Self(ErrorRepr::Draw(e))
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub(crate) enum ErrorRepr {
    #[error("{0}")]
    Grammar(peg::error::ParseError<peg::str::LineCol>),
    #[error("Invalid pattern for terminal {terminal}: {source}")]
    InvalidPattern {
        terminal: String,
        #[source]
        source: crate::regex::Error,
    },
    #[error("Unknown symbol reference: {0}")]
    UnknownVar(String),
    #[error("Duplicate symbol definitions: {0:?}")]
    DuplicateVars(Vec<String>),
    #[error("No start symbol was given and the grammar has no default start")]
    NoStart,
    #[error("Start symbols not defined in the grammar: {0:?}")]
    UnknownStart(Vec<String>),
    #[error(
        "The following names were passed as explicit strategies, \
         but there is no such terminal in this grammar: {0:?}"
    )]
    UnknownExplicit(Vec<String>),
    #[error("Unsupported import: {0}")]
    UnsupportedImport(String),
    #[error("Terminal {0} is defined in terms of itself")]
    RecursiveTerminal(String),
    #[error("Terminal {terminal} refers to rule {rule}")]
    RuleInTerminal { terminal: String, rule: String },
    #[error(
        "Undefined terminal {0:?}. Terminals without a pattern (e.g. from %declare) \
         need an explicit strategy, e.g. `.explicit({0:?}, Just::from(\"\"))`"
    )]
    UndefinedTerminal(String),
    #[error("Pattern {0:?} produced bytes that are not valid UTF-8")]
    NotUtf8(String),
    #[error("Decision source aborted the draw: {0}")]
    Draw(arbitrary::Error),
}

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_is_passed_through() {
        let e = Error::from(arbitrary::Error::NotEnoughData);
        assert_eq!(e.abort(), Some(arbitrary::Error::NotEnoughData));
        assert!(!e.is_invalid_argument());

        let e = Error(ErrorRepr::UndefinedTerminal("NAME".into()));
        assert_eq!(e.abort(), None);
        assert!(e.is_invalid_argument());
    }

    #[test]
    fn messages_name_the_offender() {
        let e = Error(ErrorRepr::UnknownExplicit(vec!["A".into(), "B".into()]));
        assert!(e.to_string().contains(r#"["A", "B"]"#));

        let e = Error(ErrorRepr::UndefinedTerminal("NAME".into()));
        assert!(e.to_string().contains(r#"explicit("NAME""#));
    }
}
