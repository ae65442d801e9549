//! What a grammar compiles to, and the trait grammars implement to be generated from.

use crate::Result;

/// A grammar that can be turned into terminals and BNF rules.
///
/// [`crate::LarkGrammar`] implements this for Lark's EBNF. A hand-built [`Compiled`] also
/// implements it, starting at the origin of its first rule.
pub trait CompileGrammar {
    /// The start symbols to use when the caller does not pick any.
    fn default_start(&self) -> Vec<String>;

    /// Compiles the grammar for the given start symbols.
    ///
    /// An implementation may drop rules that cannot be reached from `start`.
    fn compile(&self, start: &[String]) -> Result<Compiled>;
}

/// The pattern a terminal matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Exactly this string.
    Str(String),
    /// A regular expression in `regex-syntax` syntax.
    Re(String),
}

impl Pattern {
    /// The pattern as a regular expression.
    pub fn to_regexp(&self) -> String {
        match self {
            Self::Str(s) => regex_syntax::escape(s),
            Self::Re(r) => r.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalDef {
    pub name: String,
    pub pattern: Pattern,
}

/// A reference to a symbol from inside a rule's expansion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolRef {
    Terminal(String),
    NonTerminal(String),
}

impl SymbolRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Terminal(n) | Self::NonTerminal(n) => n,
        }
    }
}

/// One alternative of a non-terminal: `origin : expansion`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub origin: String,
    pub expansion: Vec<SymbolRef>,
}

/// A compiled grammar.
///
/// `terminals` are the terminals with a pattern. A terminal may also appear only in `rules`
/// (e.g. from Lark's `%declare`); it then has no value unless one is given with
/// [`crate::Builder::explicit`].
/// `ignore` names the symbols that may appear between any two symbols, such as whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compiled {
    pub terminals: Vec<TerminalDef>,
    pub rules: Vec<Rule>,
    pub ignore: Vec<String>,
}

impl CompileGrammar for Compiled {
    fn default_start(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.origin.clone()).take(1).collect()
    }

    fn compile(&self, _start: &[String]) -> Result<Compiled> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_patterns_are_escaped() {
        assert_eq!(Pattern::Str("a+b".into()).to_regexp(), r"a\+b");
        assert_eq!(Pattern::Re("a+b".into()).to_regexp(), "a+b");
    }

    #[test]
    fn hand_built_starts_at_first_rule() {
        let compiled = Compiled {
            rules: vec![
                Rule {
                    origin: "expr".into(),
                    expansion: vec![SymbolRef::NonTerminal("num".into())],
                },
                Rule {
                    origin: "num".into(),
                    expansion: vec![SymbolRef::Terminal("DIGIT".into())],
                },
            ],
            ..Default::default()
        };
        assert_eq!(compiled.default_start(), vec!["expr".to_string()]);
        assert_eq!(Compiled::default().default_start(), Vec::<String>::new());
    }
}
