use crate::common::Common;
use crate::compiled::{CompileGrammar, Compiled, Pattern, Rule, SymbolRef, TerminalDef};
use crate::error::ErrorRepr;
use crate::ir::{self, is_terminal_name, Expr, Item};
use crate::{Error, Result};

use fxhash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::str::FromStr;

/// A grammar written in (a subset of) [Lark](https://lark-parser.readthedocs.io/en/latest/grammar.html)'s EBNF.
///
/// Supported:
/// - rules (`lowercase: ...`) and terminals (`UPPERCASE: ...`), one definition per name,
///   with `?`/`!` rule modifiers and `.N` priorities accepted and ignored
/// - `|` alternatives, also at the start of a continuation line
/// - `"literal"`, `"literal"i`, `/regex/flags`, `"a".."z"`, `( )`, `[ ]`,
///   `?`, `*`, `+`, `~ n`, `~ n..m`
/// - `%ignore`, `%declare`, and `%import common.NAME` (see below)
/// - `-> alias` after an alternative, accepted and ignored
/// - `//` comments
///
/// The built-in `common` library provides `DIGIT`, `HEXDIGIT`, `INT`, `SIGNED_INT`,
/// `DECIMAL`, `FLOAT`, `SIGNED_FLOAT`, `NUMBER`, `SIGNED_NUMBER`, `LCASE_LETTER`,
/// `UCASE_LETTER`, `LETTER`, `WORD`, `CNAME`, `ESCAPED_STRING`, `WS_INLINE`, `WS`, `CR`,
/// `LF`, `NEWLINE`, `SH_COMMENT` and `CPP_COMMENT`.
///
/// Regexes use `regex-syntax`'s syntax rather than Python's, so look-around is not supported,
/// and neither are word boundaries (see [`crate::Regex`]).
/// Pass an explicit strategy for terminals that need it.
///
/// ## Compilation
/// Like Lark, rules are compiled to BNF: groups, optionals and bounded repetitions are expanded
/// into alternatives of the rule itself, and `x+` becomes a helper rule
/// `__<rule>_plus_<n> : x | x __<rule>_plus_<n>`. A repeated group with several alternatives
/// becomes a helper rule `__<rule>_group_<n>` first, and a repetition range of 50 or more
/// becomes a chain of optional helper rules `__<rule>_repeat_<n>`. Literals and regexes inside rules become
/// anonymous terminals, named like Lark does (`"if"` is `IF`, `"+"` is `PLUS`, otherwise
/// `__ANON_<n>`) unless a terminal with the same pattern already exists.
#[derive(Debug, Clone)]
pub struct LarkGrammar {
    items: Vec<Item>,
    start: Vec<String>,
}

impl LarkGrammar {
    /// Replaces the default start symbols, initially `["start"]`.
    pub fn with_start<S: Into<String>>(mut self, start: impl IntoIterator<Item = S>) -> Self {
        self.start = start.into_iter().map(Into::into).collect();
        self
    }
}

impl FromStr for LarkGrammar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let items = ir::lark::grammar(s).map_err(|e| Error(ErrorRepr::Grammar(e)))?;

        let names: Vec<&str> = items
            .iter()
            .flat_map(|item| match item {
                Item::Def(name, _) => vec![name.as_str()],
                Item::Declare(names) => names.iter().map(String::as_str).collect(),
                Item::Import(_, names) => names
                    .iter()
                    .map(|(name, alias)| alias.as_deref().unwrap_or(name))
                    .collect(),
                Item::Ignore(_) => vec![],
            })
            .collect();
        if let Some(dups) = find_duplicates(&names) {
            return Err(Error(ErrorRepr::DuplicateVars(dups)));
        }

        Ok(Self {
            items,
            start: vec![String::from("start")],
        })
    }
}

impl CompileGrammar for LarkGrammar {
    fn default_start(&self) -> Vec<String> {
        self.start.clone()
    }

    fn compile(&self, start: &[String]) -> Result<Compiled> {
        let compiled = Lowering::new(&self.items)?.run(start)?;
        tracing::debug!(
            ?start,
            terminals = compiled.terminals.len(),
            rules = compiled.rules.len(),
            ignore = ?compiled.ignore,
            "compiled lark grammar"
        );
        Ok(compiled)
    }
}

/// Returns the sorted names that appear more than once.
pub(crate) fn find_duplicates(names: &[&str]) -> Option<Vec<String>> {
    let mut seen = FxHashSet::default();
    let mut dups: Vec<String> = names
        .iter()
        .filter(|&&n| !seen.insert(n))
        .map(|n| n.to_string())
        .collect();
    dups.sort();
    dups.dedup();
    (!dups.is_empty()).then_some(dups)
}

/// State of the translation from the ir to BNF.
struct Lowering<'a> {
    rule_defs: Vec<(&'a str, &'a Expr)>,
    term_defs: FxHashMap<&'a str, &'a Expr>,
    term_order: Vec<&'a str>,
    imports: Vec<(String, Common)>,
    declared: FxHashSet<&'a str>,
    ignore_exprs: Vec<&'a Expr>,

    // terminal name -> regex, filled in as terminal definitions are resolved
    resolved: FxHashMap<&'a str, String>,
    terminals: Vec<TerminalDef>,
    by_pattern: FxHashMap<Pattern, String>,
    anon_count: usize,
    helper_count: usize,
    helpers: Vec<Rule>,
}

impl<'a> Lowering<'a> {
    fn new(items: &'a [Item]) -> Result<Self> {
        let mut this = Self {
            rule_defs: Vec::new(),
            term_defs: FxHashMap::default(),
            term_order: Vec::new(),
            imports: Vec::new(),
            declared: FxHashSet::default(),
            ignore_exprs: Vec::new(),
            resolved: FxHashMap::default(),
            terminals: Vec::new(),
            by_pattern: FxHashMap::default(),
            anon_count: 0,
            helper_count: 0,
            helpers: Vec::new(),
        };

        for item in items {
            match item {
                Item::Def(name, expr) if is_terminal_name(name) => {
                    this.term_defs.insert(name.as_str(), expr);
                    this.term_order.push(name.as_str());
                }
                Item::Def(name, expr) => this.rule_defs.push((name.as_str(), expr)),
                Item::Ignore(expr) => this.ignore_exprs.push(expr),
                Item::Declare(names) => this.declared.extend(names.iter().map(String::as_str)),
                Item::Import(module, names) => {
                    for (name, alias) in names {
                        if module.len() != 1 || module[0] != "common" {
                            let path = format!("{}.{}", module.join("."), name);
                            return Err(Error(ErrorRepr::UnsupportedImport(path)));
                        }
                        let common = Common::from_str(name).map_err(Error)?;
                        this.imports
                            .push((alias.clone().unwrap_or_else(|| name.clone()), common));
                    }
                }
            }
        }
        Ok(this)
    }

    fn run(mut self, start: &[String]) -> Result<Compiled> {
        // named terminals keep their names, and claim their patterns for anonymous uses
        for (name, common) in std::mem::take(&mut self.imports) {
            self.add_terminal(name, Pattern::Re(common.pattern()));
        }
        for name in self.term_order.clone() {
            let expr: &'a Expr = self.term_defs[name];
            let pattern = match expr {
                Expr::Literal(s, false) => Pattern::Str(s.clone()),
                _ => Pattern::Re(self.resolve(name, &mut Vec::new())?),
            };
            self.add_terminal(name.to_string(), pattern);
        }

        let mut ignore = Vec::new();
        for expr in std::mem::take(&mut self.ignore_exprs) {
            let name = match expr {
                Expr::Name(n) => {
                    self.symbol(n)?;
                    n.clone()
                }
                _ => {
                    let pattern = Pattern::Re(self.term_regex(expr, &mut Vec::new())?);
                    self.anonymous(pattern)
                }
            };
            ignore.push(name);
        }

        let mut rules = Vec::new();
        for (origin, expr) in self.rule_defs.clone() {
            for expansion in self.expand(origin, expr)? {
                rules.push(Rule {
                    origin: origin.to_string(),
                    expansion,
                });
            }
        }
        rules.append(&mut self.helpers);

        Ok(Compiled {
            terminals: self.terminals,
            rules: prune(rules, start.iter().chain(&ignore)),
            ignore,
        })
    }

    fn add_terminal(&mut self, name: String, pattern: Pattern) {
        self.by_pattern
            .entry(pattern.clone())
            .or_insert_with(|| name.clone());
        self.terminals.push(TerminalDef { name, pattern });
    }

    fn is_terminal_defined(&self, name: &str) -> bool {
        self.term_defs.contains_key(name)
            || self.declared.contains(name)
            || self.terminals.iter().any(|t| t.name == name)
    }

    /// Resolves a reference from inside a rule.
    fn symbol(&self, name: &str) -> Result<SymbolRef> {
        if is_terminal_name(name) {
            if self.is_terminal_defined(name) {
                return Ok(SymbolRef::Terminal(name.to_string()));
            }
        } else if self.rule_defs.iter().any(|(n, _)| *n == name) {
            return Ok(SymbolRef::NonTerminal(name.to_string()));
        }
        Err(Error(ErrorRepr::UnknownVar(name.to_string())))
    }

    /// Returns the regex of the named terminal definition, inlining the terminals it refers to.
    /// `stack` holds the definitions being resolved, to catch recursion.
    fn resolve(&mut self, name: &'a str, stack: &mut Vec<&'a str>) -> Result<String> {
        if let Some(r) = self.resolved.get(name) {
            return Ok(r.clone());
        }
        if stack.contains(&name) {
            return Err(Error(ErrorRepr::RecursiveTerminal(name.to_string())));
        }
        let expr = self.term_defs[name];
        stack.push(name);
        let r = self.term_regex(expr, stack)?;
        stack.pop();
        self.resolved.insert(name, r.clone());
        Ok(r)
    }

    fn term_regex(&mut self, expr: &'a Expr, stack: &mut Vec<&'a str>) -> Result<String> {
        Ok(match expr {
            Expr::Literal(s, false) => regex_syntax::escape(s),
            Expr::Literal(s, true) => format!("(?i:{})", regex_syntax::escape(s)),
            Expr::Regex(r) => format!("(?:{})", r),
            Expr::Range(a, b) => format!(
                "[{}-{}]",
                regex_syntax::escape(&a.to_string()),
                regex_syntax::escape(&b.to_string())
            ),
            Expr::Name(n) if !is_terminal_name(n) => {
                let terminal = stack
                    .last()
                    .map_or_else(|| String::from("%ignore"), |t| t.to_string());
                return Err(Error(ErrorRepr::RuleInTerminal {
                    terminal,
                    rule: n.clone(),
                }));
            }
            Expr::Name(n) => match self.term_defs.get_key_value(n.as_str()).map(|(&k, _)| k) {
                Some(n) => format!("(?:{})", self.resolve(n, stack)?),
                None => match self.terminals.iter().find(|t| t.name == *n) {
                    Some(t) => format!("(?:{})", t.pattern.to_regexp()),
                    None => return Err(Error(ErrorRepr::UnknownVar(n.clone()))),
                },
            },
            Expr::Seq(v) => v
                .iter()
                .map(|x| self.term_regex(x, stack))
                .collect::<Result<Vec<_>>>()?
                .concat(),
            Expr::Alt(v) => format!(
                "(?:{})",
                v.iter()
                    .map(|x| self.term_regex(x, stack))
                    .collect::<Result<Vec<_>>>()?
                    .join("|")
            ),
            Expr::Maybe(x) => format!("(?:{})?", self.term_regex(x, stack)?),
            Expr::Repeat(x, min, Some(max)) => {
                format!("(?:{}){{{},{}}}", self.term_regex(x, stack)?, min, max)
            }
            Expr::Repeat(x, min, None) => {
                format!("(?:{}){{{},}}", self.term_regex(x, stack)?, min)
            }
        })
    }

    /// Returns the terminal for an anonymous pattern, creating it if needed.
    fn anonymous(&mut self, pattern: Pattern) -> String {
        if let Some(name) = self.by_pattern.get(&pattern) {
            return name.clone();
        }
        let name = match &pattern {
            Pattern::Str(s) => literal_name(s).filter(|n| !self.is_terminal_defined(n)),
            Pattern::Re(_) => None,
        };
        let name = name.unwrap_or_else(|| loop {
            let n = format!("__ANON_{}", self.anon_count);
            self.anon_count += 1;
            if !self.is_terminal_defined(&n) {
                break n;
            }
        });
        self.add_terminal(name.clone(), pattern);
        name
    }

    /// Returns the BNF expansions of `expr`, an (E)BNF expression inside rule `origin`.
    fn expand(&mut self, origin: &str, expr: &'a Expr) -> Result<Vec<Vec<SymbolRef>>> {
        Ok(match expr {
            Expr::Name(n) => vec![vec![self.symbol(n)?]],
            Expr::Literal(s, false) => vec![vec![self.anonymous_ref(Pattern::Str(s.clone()))]],
            Expr::Literal(..) | Expr::Regex(_) | Expr::Range(..) => {
                let pattern = Pattern::Re(self.term_regex(expr, &mut Vec::new())?);
                vec![vec![self.anonymous_ref(pattern)]]
            }
            Expr::Alt(v) => {
                let mut out = Vec::new();
                for x in v {
                    out.extend(self.expand(origin, x)?);
                }
                out
            }
            Expr::Seq(v) => {
                let mut out = vec![vec![]];
                for x in v {
                    let alts = self.expand(origin, x)?;
                    out = product(&out, &alts);
                }
                out
            }
            Expr::Maybe(x) => {
                let mut out = vec![vec![]];
                out.extend(self.expand(origin, x)?);
                out
            }
            Expr::Repeat(x, min, Some(max)) => {
                // one sequence per repetition, so the expansions grow with `max` only
                let item = match <[_; 1]>::try_from(self.expand(origin, x)?) {
                    Ok([item]) => item,
                    Err(alts) => vec![self.group_rule(origin, alts)],
                };
                if max - min < REPEAT_BREAK_THRESHOLD {
                    (*min..=*max).map(|n| repeated(&item, n)).collect()
                } else {
                    let mut out = repeated(&item, *min);
                    out.extend(self.repeat_chain(origin, &item, max - min));
                    vec![out]
                }
            }
            Expr::Repeat(x, min, None) => {
                let alts = self.expand(origin, x)?;
                let plus = vec![vec![self.plus_rule(origin, &alts)]];
                let mut prefix = vec![vec![]];
                for _ in 1..*min {
                    prefix = product(&prefix, &alts);
                }
                let mut out = product(&prefix, &plus);
                if *min == 0 {
                    out.insert(0, vec![]);
                }
                out
            }
        })
    }

    fn anonymous_ref(&mut self, pattern: Pattern) -> SymbolRef {
        SymbolRef::Terminal(self.anonymous(pattern))
    }

    fn helper_name(&mut self, origin: &str, kind: &str) -> String {
        let name = format!("__{}_{}_{}", origin.trim_start_matches('_'), kind, self.helper_count);
        self.helper_count += 1;
        name
    }

    fn push_helper(&mut self, origin: &str, expansion: Vec<SymbolRef>) {
        self.helpers.push(Rule {
            origin: origin.to_string(),
            expansion,
        });
    }

    /// Adds `__<origin>_plus_<n> : x | x __<origin>_plus_<n>` and returns a reference to it.
    fn plus_rule(&mut self, origin: &str, alts: &[Vec<SymbolRef>]) -> SymbolRef {
        let name = self.helper_name(origin, "plus");
        let this = SymbolRef::NonTerminal(name.clone());
        for alt in alts {
            self.push_helper(&name, alt.clone());
            let mut recurse = alt.clone();
            recurse.push(this.clone());
            self.push_helper(&name, recurse);
        }
        this
    }

    /// Adds `__<origin>_group_<n>` with `alts` as its expansions.
    fn group_rule(&mut self, origin: &str, alts: Vec<Vec<SymbolRef>>) -> SymbolRef {
        let name = self.helper_name(origin, "group");
        for alt in alts {
            self.push_helper(&name, alt);
        }
        SymbolRef::NonTerminal(name)
    }

    /// Adds rules for up to `count` optional repetitions of `item`, each one
    /// `__<origin>_repeat_<n> : | item __<origin>_repeat_<n - 1>`, and returns the outermost
    /// (nothing when `count` is 0).
    fn repeat_chain(&mut self, origin: &str, item: &[SymbolRef], count: u32) -> Option<SymbolRef> {
        let mut next = None;
        for _ in 0..count {
            let name = self.helper_name(origin, "repeat");
            let mut more = item.to_vec();
            more.extend(next);
            self.push_helper(&name, Vec::new());
            self.push_helper(&name, more);
            next = Some(SymbolRef::NonTerminal(name));
        }
        next
    }
}

/// Bounded repetitions with a wider range than this become a chain of helper rules.
const REPEAT_BREAK_THRESHOLD: u32 = 50;

fn repeated(item: &[SymbolRef], n: u32) -> Vec<SymbolRef> {
    (0..n).flat_map(|_| item.iter().cloned()).collect()
}

fn product(prefixes: &[Vec<SymbolRef>], suffixes: &[Vec<SymbolRef>]) -> Vec<Vec<SymbolRef>> {
    prefixes
        .iter()
        .flat_map(|p| {
            suffixes.iter().map(move |s| {
                let mut x = p.clone();
                x.extend(s.iter().cloned());
                x
            })
        })
        .collect()
}

/// Lark's name for an anonymous literal terminal, if it has one.
fn literal_name(s: &str) -> Option<String> {
    let is_ident = s.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if is_ident {
        return Some(s.to_ascii_uppercase());
    }
    if s.is_empty() {
        return None;
    }
    s.chars().map(punctuation_name).collect()
}

fn punctuation_name(c: char) -> Option<&'static str> {
    Some(match c {
        '.' => "DOT",
        ',' => "COMMA",
        ':' => "COLON",
        ';' => "SEMICOLON",
        '+' => "PLUS",
        '-' => "MINUS",
        '*' => "STAR",
        '/' => "SLASH",
        '\\' => "BACKSLASH",
        '|' => "VBAR",
        '?' => "QMARK",
        '!' => "BANG",
        '@' => "AT",
        '#' => "HASH",
        '$' => "DOLLAR",
        '%' => "PERCENT",
        '^' => "CIRCUMFLEX",
        '&' => "AMPERSAND",
        '_' => "UNDERSCORE",
        '<' => "LESSTHAN",
        '>' => "MORETHAN",
        '=' => "EQUAL",
        '"' => "DBLQUOTE",
        '\'' => "QUOTE",
        '`' => "BACKQUOTE",
        '~' => "TILDE",
        '(' => "LPAR",
        ')' => "RPAR",
        '{' => "LBRACE",
        '}' => "RBRACE",
        '[' => "LSQB",
        ']' => "RSQB",
        '\n' => "NEWLINE",
        '\r' => "CRLF",
        '\t' => "TAB",
        ' ' => "SPACE",
        _ => return None,
    })
}

/// Drops the rules that cannot be reached from `roots`.
fn prune<'r>(rules: Vec<Rule>, roots: impl Iterator<Item = &'r String>) -> Vec<Rule> {
    let mut by_origin: FxHashMap<&str, Vec<&Rule>> = FxHashMap::default();
    for rule in &rules {
        by_origin.entry(rule.origin.as_str()).or_default().push(rule);
    }

    let mut reachable: FxHashSet<String> = FxHashSet::default();
    let mut queue: VecDeque<String> = roots.cloned().collect();
    while let Some(name) = queue.pop_front() {
        if !reachable.insert(name.clone()) {
            continue;
        }
        for rule in by_origin.get(name.as_str()).into_iter().flatten() {
            for s in &rule.expansion {
                if let SymbolRef::NonTerminal(n) = s {
                    queue.push_back(n.clone());
                }
            }
        }
    }

    rules
        .into_iter()
        .filter(|r| reachable.contains(&r.origin))
        .collect()
}
