//! The immutable symbol table a [`crate::Generator`] walks.

use crate::compiled::{Compiled, SymbolRef};
use crate::error::ErrorRepr;
use crate::regex::Regex;
use crate::source::Label;
use crate::strategy::Strategy;
use crate::{Error, Result};

use fxhash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;

/// Returns the label of the scope opened around every expansion of rule `name`.
///
/// Labels only depend on the rule's name, so they are stable across runs, processes and
/// grammar edits that keep the name. A shrinker can use them to line up the spans
/// (see [`crate::Recorder`]) of two runs.
pub fn rule_label(name: &str) -> Label {
    fxhash::hash64(&("rule", name))
}

/// Label of the scope opened around every draw of terminal `name`.
pub(crate) fn terminal_label(name: &str) -> Label {
    fxhash::hash64(&("terminal", name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Symbol {
    Terminal(usize),
    NonTerminal(usize),
}

pub(crate) struct Terminal {
    pub(crate) name: String,
    // `None` for terminals without a pattern or explicit strategy
    pub(crate) strategy: Option<Box<dyn Strategy>>,
    pub(crate) label: Label,
}

pub(crate) struct NonTerminal {
    pub(crate) name: String,
    // sorted by length, shortest first
    pub(crate) expansions: Vec<Box<[Symbol]>>,
    pub(crate) label: Label,
}

pub(crate) struct Table {
    pub(crate) terminals: Vec<Terminal>,
    pub(crate) nonterminals: Vec<NonTerminal>,
    names: FxHashMap<String, Symbol>,
    pub(crate) start: Vec<Symbol>,
    pub(crate) ignored: Vec<Symbol>,
}

impl Table {
    pub(crate) fn build(
        compiled: &Compiled,
        start: &[String],
        explicit: BTreeMap<String, Box<dyn Strategy>>,
        max_repeat: u32,
    ) -> Result<Self> {
        if start.is_empty() {
            return Err(Error(ErrorRepr::NoStart));
        }

        let mut names: FxHashMap<String, Symbol> = FxHashMap::default();
        let mut nonterminals = Vec::new();
        for rule in &compiled.rules {
            if !names.contains_key(&rule.origin) {
                let symbol = Symbol::NonTerminal(nonterminals.len());
                names.insert(rule.origin.clone(), symbol);
                nonterminals.push(NonTerminal {
                    name: rule.origin.clone(),
                    expansions: Vec::new(),
                    label: rule_label(&rule.origin),
                });
            }
        }

        let mut terminals = Vec::new();
        let mut dups = Vec::new();
        // only definitions may clash, references just register the name if it is new
        let mut add_terminal = |name: &str, defined: bool| match names.get(name) {
            None => {
                names.insert(name.to_string(), Symbol::Terminal(terminals.len()));
                terminals.push(Terminal {
                    name: name.to_string(),
                    strategy: None,
                    label: terminal_label(name),
                });
            }
            Some(_) if defined => dups.push(name.to_string()),
            Some(_) => {}
        };
        for def in &compiled.terminals {
            add_terminal(&def.name, true);
        }
        for name in &compiled.ignore {
            add_terminal(name, false);
        }
        for rule in &compiled.rules {
            for s in &rule.expansion {
                if let SymbolRef::Terminal(name) = s {
                    add_terminal(name, false);
                }
            }
        }
        if !dups.is_empty() {
            dups.sort();
            dups.dedup();
            return Err(Error(ErrorRepr::DuplicateVars(dups)));
        }

        for rule in &compiled.rules {
            let expansion = rule
                .expansion
                .iter()
                .map(|s| match (s, names.get(s.name())) {
                    (SymbolRef::Terminal(_), Some(t @ Symbol::Terminal(_)))
                    | (SymbolRef::NonTerminal(_), Some(t @ Symbol::NonTerminal(_))) => Ok(*t),
                    _ => Err(Error(ErrorRepr::UnknownVar(s.name().to_string()))),
                })
                .collect::<Result<Box<[Symbol]>>>()?;
            if let Some(&Symbol::NonTerminal(i)) = names.get(&rule.origin) {
                nonterminals[i].expansions.push(expansion);
            }
        }
        for nt in &mut nonterminals {
            nt.expansions.sort_by_key(|e| e.len());
        }

        let unknown: Vec<String> = explicit
            .keys()
            .filter(|k| !matches!(names.get(k.as_str()), Some(Symbol::Terminal(_))))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(Error(ErrorRepr::UnknownExplicit(unknown)));
        }

        for def in &compiled.terminals {
            if explicit.contains_key(&def.name) {
                continue;
            }
            let regex = Regex::with_max_repeat(&def.pattern.to_regexp(), max_repeat).map_err(
                |source| {
                    Error(ErrorRepr::InvalidPattern {
                        terminal: def.name.clone(),
                        source,
                    })
                },
            )?;
            if let Some(&Symbol::Terminal(i)) = names.get(&def.name) {
                terminals[i].strategy = Some(Box::new(regex));
            }
        }
        for (name, strategy) in explicit {
            if let Some(&Symbol::Terminal(i)) = names.get(&name) {
                terminals[i].strategy = Some(strategy);
            }
        }

        let mut missing = Vec::new();
        let mut start_symbols = Vec::new();
        for name in start {
            match names.get(name) {
                Some(&s) => start_symbols.push(s),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(Error(ErrorRepr::UnknownStart(missing)));
        }

        let ignored = compiled
            .ignore
            .iter()
            .filter_map(|name| names.get(name).copied())
            .collect();

        let table = Self {
            terminals,
            nonterminals,
            names,
            start: start_symbols,
            ignored,
        };
        tracing::debug!(
            terminals = table.terminals.len(),
            nonterminals = table.nonterminals.len(),
            start = table.start.len(),
            ignored = table.ignored.len(),
            "built symbol table"
        );
        Ok(table)
    }

    pub(crate) fn get(&self, name: &str) -> Option<Symbol> {
        self.names.get(name).copied()
    }

    fn name(&self, symbol: Symbol) -> &str {
        match symbol {
            Symbol::Terminal(i) => &self.terminals[i].name,
            Symbol::NonTerminal(i) => &self.nonterminals[i].name,
        }
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terminals: Vec<_> = self
            .terminals
            .iter()
            .map(|t| (&t.name, t.strategy.is_some()))
            .collect();
        f.debug_struct("Table")
            .field("terminals", &terminals)
            .field("nonterminals", &self.nonterminals.len())
            .field("start", &self.start)
            .field("ignored", &self.ignored)
            .finish()
    }
}

/// One rule per line, with its expansions in the order they are chosen from.
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for nt in &self.nonterminals {
            write!(f, "{} :", nt.name)?;
            for (i, expansion) in nt.expansions.iter().enumerate() {
                if i > 0 {
                    write!(f, " |")?;
                }
                if expansion.is_empty() {
                    write!(f, " <empty>")?;
                }
                for &s in expansion.iter() {
                    write!(f, " {}", self.name(s))?;
                }
            }
            writeln!(f)?;
        }
        for &s in &self.ignored {
            writeln!(f, "%ignore {}", self.name(s))?;
        }
        for t in self.terminals.iter().filter(|t| t.strategy.is_none()) {
            writeln!(f, "%declare {}", t.name)?;
        }
        Ok(())
    }
}
