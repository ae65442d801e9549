use arbitrary::Unstructured;
use rand::RngCore;
use regex::Regex;
use spindle_cfg::{Compiled, SymbolRef};
use std::collections::{BTreeSet, HashMap};

pub fn rand_u<'a>(buf: &'a mut [u8]) -> Unstructured<'a> {
    let mut rng = rand::rng();
    rng.fill_bytes(buf);
    Unstructured::new(buf)
}

/// Checks that a string derives from a start symbol, allowing ignored symbols after every
/// symbol of an expansion.
///
/// Memoized top-down search over all parses; left recursive rules are not supported.
pub struct Recognizer {
    terminals: HashMap<String, Regex>,
    rules: HashMap<String, Vec<Vec<SymbolRef>>>,
    ignore: Vec<SymbolRef>,
}

type Memo = HashMap<(SymbolRef, usize), BTreeSet<usize>>;

impl Recognizer {
    pub fn new(compiled: &Compiled) -> Self {
        let mut this = Self {
            terminals: HashMap::new(),
            rules: HashMap::new(),
            ignore: Vec::new(),
        };
        for t in &compiled.terminals {
            this = this.with_terminal(&t.name, &t.pattern.to_regexp());
        }
        for r in &compiled.rules {
            this.rules
                .entry(r.origin.clone())
                .or_default()
                .push(r.expansion.clone());
        }
        this.ignore = compiled
            .ignore
            .iter()
            .map(|name| match this.rules.contains_key(name) {
                true => SymbolRef::NonTerminal(name.clone()),
                false => SymbolRef::Terminal(name.clone()),
            })
            .collect();
        this
    }

    /// Sets (or replaces) the pattern a terminal's values must fully match.
    pub fn with_terminal(mut self, name: &str, pattern: &str) -> Self {
        let re = Regex::new(&format!("^(?:{})$", pattern)).unwrap();
        self.terminals.insert(name.to_string(), re);
        self
    }

    pub fn matches(&self, start: &str, s: &str) -> bool {
        let mut memo = Memo::new();
        self.ends(&SymbolRef::NonTerminal(start.to_string()), s, 0, &mut memo)
            .contains(&s.len())
    }

    fn ends(&self, symbol: &SymbolRef, s: &str, pos: usize, memo: &mut Memo) -> BTreeSet<usize> {
        let key = (symbol.clone(), pos);
        if let Some(ends) = memo.get(&key) {
            return ends.clone();
        }
        memo.insert(key.clone(), BTreeSet::new());

        let ends = match symbol {
            SymbolRef::Terminal(name) => {
                let re = &self.terminals[name];
                (pos..=s.len())
                    .filter(|&e| s.is_char_boundary(e) && re.is_match(&s[pos..e]))
                    .collect()
            }
            SymbolRef::NonTerminal(name) => {
                let mut ends = BTreeSet::new();
                for expansion in &self.rules[name] {
                    let mut cur = BTreeSet::from([pos]);
                    for sym in expansion {
                        let mut next = BTreeSet::new();
                        for &p in &cur {
                            next.extend(self.ends(sym, s, p, memo));
                        }
                        cur = self.with_ignored(next, s, memo);
                    }
                    ends.extend(cur);
                }
                ends
            }
        };
        memo.insert(key, ends.clone());
        ends
    }

    fn with_ignored(&self, mut cur: BTreeSet<usize>, s: &str, memo: &mut Memo) -> BTreeSet<usize> {
        let mut todo: Vec<usize> = cur.iter().copied().collect();
        while let Some(p) = todo.pop() {
            for sym in &self.ignore {
                for e in self.ends(sym, s, p, memo) {
                    if cur.insert(e) {
                        todo.push(e);
                    }
                }
            }
        }
        cur
    }
}
