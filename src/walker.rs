//! The recursive walk that turns decisions into a derivation of the grammar.

use crate::error::ErrorRepr;
use crate::source::{DecisionSource, Scope};
use crate::table::{Symbol, Table};
use crate::{Error, Result, Visitor};

/// Picks an index in `0..len`. A single option consumes no decision.
fn choose(src: &mut dyn DecisionSource, len: usize) -> Result<usize> {
    if len == 1 {
        Ok(0)
    } else {
        Ok(src.choose_index(len)?)
    }
}

impl Table {
    /// Draws one derivation of a start symbol into a fresh `V`.
    pub(crate) fn draw<V: Visitor>(&self, src: &mut dyn DecisionSource) -> Result<V> {
        let mut visitor = V::new();
        let start = self.start[choose(src, self.start.len())?];
        self.draw_symbol(start, src, &mut visitor)?;
        Ok(visitor)
    }

    fn draw_symbol<V: Visitor>(
        &self,
        symbol: Symbol,
        src: &mut dyn DecisionSource,
        visitor: &mut V,
    ) -> Result<()> {
        match symbol {
            Symbol::Terminal(i) => {
                let terminal = &self.terminals[i];
                let strategy = terminal
                    .strategy
                    .as_deref()
                    .ok_or_else(|| Error(ErrorRepr::UndefinedTerminal(terminal.name.clone())))?;
                let value = {
                    let mut scope = Scope::enter(src, terminal.label)?;
                    strategy.draw(&mut *scope)?
                };
                visitor.visit_terminal(&terminal.name, &value);
            }
            Symbol::NonTerminal(i) => {
                let rule = &self.nonterminals[i];
                let mut scope = Scope::enter(src, rule.label)?;
                let index = choose(&mut *scope, rule.expansions.len())?;
                tracing::trace!(rule = %rule.name, index, "expanding");
                visitor.visit_rule(&rule.name, index);
                for &s in rule.expansions[index].iter() {
                    self.draw_symbol(s, &mut *scope, visitor)?;
                    self.gen_ignore(&mut *scope, visitor)?;
                }
            }
        }
        Ok(())
    }

    /// Inserts at most one ignored symbol at the current position, with probability 1/4 (two
    /// bits, both set). An ignored rule gets insertions of its own while it is drawn.
    fn gen_ignore<V: Visitor>(&self, src: &mut dyn DecisionSource, visitor: &mut V) -> Result<()> {
        if self.ignored.is_empty() {
            return Ok(());
        }
        if src.draw_bits(2)? == 3 {
            let symbol = self.ignored[choose(src, self.ignored.len())?];
            self.draw_symbol(symbol, src, visitor)?;
            visitor.visit_ignore();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::source::{Bounded, Recorder, Replay};
    use crate::table::rule_label;
    use crate::{DrawState, Generator, Just, LarkGrammar};

    fn generator(s: &str) -> Generator {
        Generator::new(&s.parse::<LarkGrammar>().unwrap()).unwrap()
    }

    #[test]
    fn recursion_follows_decisions() {
        let g = generator(r#"start : "a" start | "a""#);
        let mut r = Replay::new([1, 1, 0]);
        assert_eq!(g.draw(&mut r).unwrap(), "aaa");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn ignore_insertion() {
        let g = generator(
            r#"
            start : "a" "b"
            WS : " "
            %ignore WS
            "#,
        );
        assert_eq!(g.draw(&mut Replay::new([3, 0])).unwrap(), "a b");
        assert_eq!(g.draw(&mut Replay::new([0, 0])).unwrap(), "ab");
        // one insertion per position, also after the last symbol of an expansion
        assert_eq!(g.draw(&mut Replay::new([3, 3])).unwrap(), "a b ");
    }

    #[test]
    fn one_insertion_per_position() {
        let g = generator(
            r#"
            start : "a"
            %ignore " "
            "#,
        );
        let mut r = Replay::new([3, 3, 0]);
        assert_eq!(g.draw(&mut r).unwrap(), "a ");
        assert_eq!(r.remaining(), 2);
    }

    #[test]
    fn ignored_rules_get_their_own_insertions() {
        let g = generator(
            r#"
            start : "a"
            filler : "-" "-"
            %ignore filler
            "#,
        );
        // after "a": insert filler, which inserts another filler after its first "-"
        let mut r = Replay::new([3, 3, 0, 0, 0]);
        assert_eq!(g.draw(&mut r).unwrap(), "a----");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn single_options_consume_nothing() {
        let g = generator(
            r#"
            start : a
            a : "x" "y"
            "#,
        );
        let mut r = Replay::new([]);
        assert_eq!(g.draw(&mut r).unwrap(), "xy");
    }

    #[test]
    fn undefined_terminal_fails_when_reached() {
        let grammar: LarkGrammar = r#"
            start : "a" | "b" INDENT
            %declare INDENT
            "#
        .parse()
        .unwrap();
        let g = Generator::new(&grammar).unwrap();
        assert_eq!(g.draw(&mut Replay::new([0])).unwrap(), "a");
        let e = g.draw(&mut Replay::new([1])).unwrap_err();
        assert!(e.is_invalid_argument());
        assert!(e.to_string().contains("INDENT"));

        let g = Generator::builder()
            .explicit("INDENT", Just::from(">>"))
            .build(&grammar)
            .unwrap();
        assert_eq!(g.draw(&mut Replay::new([1])).unwrap(), "b>>");
    }

    #[test]
    fn aborts_propagate() {
        let g = generator(r#"start : "a" start | "a""#);
        let e = g.draw(&mut Replay::new([1, 1])).unwrap_err();
        assert_eq!(e.abort(), Some(arbitrary::Error::NotEnoughData));

        let mut src = Bounded::new(Replay::new(vec![1; 100])).max_depth(10);
        let e = g.draw(&mut src).unwrap_err();
        assert_eq!(e.abort(), Some(arbitrary::Error::IncorrectFormat));
    }

    #[test]
    fn scopes_are_labelled() {
        let g = generator(
            r#"
            start : "a" b
            b : "b"
            "#,
        );
        let mut rec = Recorder::new(Replay::new([]));
        assert_eq!(g.draw(&mut rec).unwrap(), "ab");
        let rules: Vec<_> = rec
            .spans()
            .iter()
            .filter(|s| s.label == rule_label("start") || s.label == rule_label("b"))
            .map(|s| (s.label, s.depth))
            .collect();
        assert_eq!(rules, [(rule_label("b"), 1), (rule_label("start"), 0)]);
        // two terminal draws
        assert_eq!(rec.spans().len(), 4);
    }

    #[test]
    fn wide_repetition_ranges() {
        let g = generator(r#"start : "x"~0..100"#);
        let mut r = Replay::new([1, 1, 1, 0]);
        assert_eq!(g.draw(&mut r).unwrap(), "xxx");
        assert_eq!(r.remaining(), 0);
        assert_eq!(g.draw(&mut Replay::new(vec![1; 100])).unwrap(), "x".repeat(100));
    }

    #[test]
    fn fragments_are_terminal_values() {
        let g = generator(
            r#"
            start : "x" ("+" "x")*
            "#,
        );
        let state: DrawState = g.generate(&mut Replay::new([1, 1, 0])).unwrap();
        assert_eq!(state.fragments(), ["x", "+", "x", "+", "x"]);
        assert_eq!(state.into_string(), "x+x+x");
    }
}
