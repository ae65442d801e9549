use crate::source::DecisionSource;
use crate::Result;

/// Produces the string value of a terminal.
///
/// Every terminal with a pattern gets a [`crate::Regex`] by default. Pass your own to
/// [`crate::Builder::explicit`] to replace it, or to give a value to a terminal that has no
/// pattern (e.g. one introduced with `%declare`).
///
/// Closures `Fn(&mut dyn DecisionSource) -> Result<String>` implement this trait.
/// All randomness must come from `src`, otherwise runs cannot be replayed.
pub trait Strategy: Send + Sync {
    fn draw(&self, src: &mut dyn DecisionSource) -> Result<String>;
}

impl<F> Strategy for F
where
    F: Fn(&mut dyn DecisionSource) -> Result<String> + Send + Sync,
{
    fn draw(&self, src: &mut dyn DecisionSource) -> Result<String> {
        self(src)
    }
}

/// Always the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Just(pub String);

impl From<&str> for Just {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Strategy for Just {
    fn draw(&self, _src: &mut dyn DecisionSource) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// One of a fixed list of values, chosen by the decision source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOf(pub Vec<String>);

impl<S: Into<String>> FromIterator<S> for OneOf {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl Strategy for OneOf {
    fn draw(&self, src: &mut dyn DecisionSource) -> Result<String> {
        Ok(self.0[src.choose_index(self.0.len())?].clone())
    }
}
