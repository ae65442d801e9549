use crate::compiled::CompileGrammar;
use crate::error::ErrorRepr;
use crate::source::{DecisionSource, Label};
use crate::strategy::Strategy;
use crate::table::{Symbol, Table};
use crate::visitor::{DrawState, Visitor};
use crate::{Error, Result};

use std::collections::BTreeMap;
use std::fmt;

/// Generates strings in the language of a context-free grammar, driven by a [`DecisionSource`].
///
/// # Implementation
/// ## Construction
/// The grammar is compiled (see [`CompileGrammar`]) into terminals and BNF rules, which are
/// indexed into an immutable symbol table:
/// - every terminal gets a [`Strategy`]: the explicit one given to [`Builder::explicit`], or a
///   [`crate::Regex`] for its pattern.
/// - every rule's expansions are sorted by length, so that answer `0` to a choice is always the
///   shortest expansion.
/// - every rule gets a label (see [`crate::rule_label`]).
///
/// ## Generation
/// Starting from a start symbol, each rule opens a scope labelled with its rule label, asks the
/// source which expansion to use, and draws each symbol of the expansion in turn. After every
/// symbol inside an expansion, ignored symbols (e.g. `%ignore WS`) are inserted with
/// probability 1/4 each. Terminals draw a value from their strategy inside a scope of their own.
///
/// A `Generator` is `Send + Sync`; any number of runs can use it at once, each with its own
/// decision source.
///
/// ```
/// use arbitrary::Unstructured;
/// use spindle_cfg::{Generator, LarkGrammar};
///
/// let grammar: LarkGrammar = r#"
///     start : "(" start ")" | "x"
/// "#.parse().unwrap();
/// let generator = Generator::new(&grammar).unwrap();
///
/// let mut u = Unstructured::new(&[1, 1, 0]);
/// assert_eq!(generator.draw(&mut u).unwrap(), "((x))");
/// ```
#[derive(Debug)]
pub struct Generator {
    table: Table,
}

impl Generator {
    /// Builds a generator for `grammar`'s default start symbols, with no explicit strategies.
    pub fn new(grammar: &impl CompileGrammar) -> Result<Self> {
        Self::builder().build(grammar)
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Returns a resulting `Visitor` after one run.
    ///
    /// Fails with an error for which [`Error::abort`] is `Some` when `src` aborts the run.
    /// Nothing of a failed run is returned.
    pub fn generate<V: Visitor, S: DecisionSource>(&self, src: &mut S) -> Result<V> {
        self.table.draw(src)
    }

    /// Returns a string in the language of the grammar.
    pub fn draw<S: DecisionSource>(&self, src: &mut S) -> Result<String> {
        Ok(self.generate::<DrawState, S>(src)?.into_string())
    }

    /// Returns the label of the scopes opened for rule `name`, if the grammar has such a rule.
    pub fn rule_label(&self, name: &str) -> Option<Label> {
        match self.table.get(name)? {
            Symbol::NonTerminal(i) => Some(self.table.nonterminals[i].label),
            Symbol::Terminal(_) => None,
        }
    }
}

/// Pretty prints the compiled grammar.
///
/// One rule per line, with its expansions in the order answers index them, followed by the
/// ignored symbols and the terminals that have no strategy.
impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.table, f)
    }
}

/// Configures a [`Generator`].
///
/// ```
/// use spindle_cfg::{Generator, Just, LarkGrammar, Replay};
///
/// let grammar: LarkGrammar = r#"
///     greeting : "hello" NAME
///     NAME : /[a-z]+/
///     %declare PUNCT
///     start : greeting PUNCT
/// "#.parse().unwrap();
///
/// let generator = Generator::builder()
///     .start("greeting")
///     .explicit("NAME", Just::from("world"))
///     .build(&grammar)
///     .unwrap();
/// assert_eq!(generator.draw(&mut Replay::new([])).unwrap(), "helloworld");
/// ```
pub struct Builder {
    start: Option<Vec<String>>,
    explicit: BTreeMap<String, Box<dyn Strategy>>,
    max_repeat: u32,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            start: None,
            explicit: BTreeMap::new(),
            max_repeat: crate::DEFAULT_MAX_REPEAT,
        }
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("start", &self.start)
            .field("explicit", &self.explicit.keys().collect::<Vec<_>>())
            .field("max_repeat", &self.max_repeat)
            .finish()
    }
}

impl Builder {
    /// Generates from `name` only. Replaces any start symbols set before.
    pub fn start(self, name: impl Into<String>) -> Self {
        self.starts([name])
    }

    /// Generates from one of `names`, chosen by the decision source.
    ///
    /// Defaults to the grammar's [`CompileGrammar::default_start`].
    pub fn starts<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.start = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Draws the values of terminal `name` from `strategy` instead of its pattern.
    ///
    /// `name` must be a terminal of the grammar (including terminals that only appear in
    /// rules or in `%ignore`), otherwise [`Builder::build`] fails.
    pub fn explicit(mut self, name: impl Into<String>, strategy: impl Strategy + 'static) -> Self {
        self.explicit.insert(name.into(), Box::new(strategy));
        self
    }

    /// Maximum number of extra repetitions of unbounded regex repetitions (`*`, `+`, `{n,}`).
    /// Defaults to [`crate::DEFAULT_MAX_REPEAT`].
    pub fn max_repeat(mut self, max_repeat: u32) -> Self {
        self.max_repeat = max_repeat;
        self
    }

    pub fn build(self, grammar: &impl CompileGrammar) -> Result<Generator> {
        let start = self.start.unwrap_or_else(|| grammar.default_start());
        if start.is_empty() {
            return Err(Error(ErrorRepr::NoStart));
        }
        let compiled = grammar.compile(&start)?;
        let table = Table::build(&compiled, &start, self.explicit, self.max_repeat)?;
        Ok(Generator { table })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Compiled, OneOf, Replay};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn shared_between_threads() {
        assert_send_sync::<Generator>();
    }

    #[test]
    fn start_symbols() {
        let grammar: crate::LarkGrammar = r#"
            start : a | b
            a : "a"
            b : "b"
            "#
        .parse()
        .unwrap();

        let g = Generator::builder().starts(["b", "a"]).build(&grammar).unwrap();
        assert_eq!(g.draw(&mut Replay::new([0])).unwrap(), "b");
        assert_eq!(g.draw(&mut Replay::new([1])).unwrap(), "a");

        let e = Generator::builder()
            .starts(Vec::<String>::new())
            .build(&grammar)
            .unwrap_err();
        assert_eq!(e, Error(ErrorRepr::NoStart));
        assert!(e.is_invalid_argument());

        assert_eq!(
            Generator::new(&Compiled::default()).unwrap_err(),
            Error(ErrorRepr::NoStart)
        );
    }

    #[test]
    fn rule_labels() {
        let grammar: crate::LarkGrammar = "start : A\nA : \"a\"".parse().unwrap();
        let g = Generator::new(&grammar).unwrap();
        assert_eq!(g.rule_label("start"), Some(crate::rule_label("start")));
        assert_eq!(g.rule_label("A"), None);
        assert_eq!(g.rule_label("missing"), None);
    }

    #[test]
    fn explicit_replaces_pattern() {
        let grammar: crate::LarkGrammar = r#"
            start : NUM
            NUM : /[0-9]+/
            "#
        .parse()
        .unwrap();
        let g = Generator::builder()
            .explicit("NUM", ["one", "two"].into_iter().collect::<OneOf>())
            .build(&grammar)
            .unwrap();
        assert_eq!(g.draw(&mut Replay::new([1])).unwrap(), "two");
        assert!(format!("{:?}", Generator::builder().explicit("NUM", OneOf(vec![])))
            .contains("NUM"));
    }

    #[test]
    fn display() {
        let grammar: crate::LarkGrammar = r#"
            start : "(" start ")" | "x"
            "#
        .parse()
        .unwrap();
        let g = Generator::new(&grammar).unwrap();
        assert_eq!(g.to_string(), "start : X | LPAR start RPAR\n");
    }
}
