//! Sources of the decisions that drive generation.
//!
//! Every choice the generator makes (which expansion, which character, whether to insert an
//! ignored token) is asked of a [`DecisionSource`]. This is what makes a generated string a pure
//! function of the answers, lets a fuzzer's bytes steer generation, and lets a budget abort a run
//! that would otherwise recurse forever.

use arbitrary::{Error, Result, Unstructured};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

/// Identifies a structural scope, e.g. one expansion of a rule. See [`crate::rule_label`].
pub type Label = u64;

/// Supplier of the (pseudo-)random decisions consumed by generation.
///
/// Implementations may fail any call to abort the run; the error is propagated to the caller of
/// [`crate::Generator::generate`] unchanged.
pub trait DecisionSource {
    /// Returns an index in `0..len`.
    fn choose_index(&mut self, len: usize) -> Result<usize>;

    /// Returns a value in `0..2^n`. `n` is at most 64.
    fn draw_bits(&mut self, n: u32) -> Result<u64>;

    /// Opens a scope tagged with `label`. Scopes nest and are always closed with
    /// [`DecisionSource::stop_scope`] in LIFO order, see [`Scope`].
    fn start_scope(&mut self, label: Label) -> Result<()>;

    /// Closes the most recently opened scope.
    fn stop_scope(&mut self);

    fn draw_bool(&mut self) -> Result<bool> {
        Ok(self.draw_bits(1)? == 1)
    }
}

pub(crate) fn mask(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1 << n) - 1
    }
}

/// Decisions read from fuzzer-provided bytes.
///
/// Once the bytes run out every answer is `0`, which means the first (shortest) expansion
/// and no ignored tokens, so generation tends to wind down on its own.
/// Scopes are not tracked.
impl DecisionSource for Unstructured<'_> {
    fn choose_index(&mut self, len: usize) -> Result<usize> {
        Unstructured::choose_index(self, len)
    }

    fn draw_bits(&mut self, n: u32) -> Result<u64> {
        self.int_in_range(0..=mask(n))
    }

    fn start_scope(&mut self, _label: Label) -> Result<()> {
        Ok(())
    }

    fn stop_scope(&mut self) {}
}

impl<S: DecisionSource + ?Sized> DecisionSource for &mut S {
    fn choose_index(&mut self, len: usize) -> Result<usize> {
        (**self).choose_index(len)
    }

    fn draw_bits(&mut self, n: u32) -> Result<u64> {
        (**self).draw_bits(n)
    }

    fn start_scope(&mut self, label: Label) -> Result<()> {
        (**self).start_scope(label)
    }

    fn stop_scope(&mut self) {
        (**self).stop_scope()
    }
}

/// An open scope on a [`DecisionSource`], closed when dropped.
///
/// Dereferences to the source, so draws made inside the scope go through the guard.
pub struct Scope<'a> {
    src: &'a mut dyn DecisionSource,
}

impl<'a> Scope<'a> {
    pub fn enter(src: &'a mut dyn DecisionSource, label: Label) -> Result<Self> {
        src.start_scope(label)?;
        Ok(Self { src })
    }
}

impl<'a> Deref for Scope<'a> {
    type Target = dyn DecisionSource + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.src
    }
}

impl<'a> DerefMut for Scope<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.src
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        self.src.stop_scope();
    }
}

/// Limits the work another source allows.
///
/// - `max_depth`: maximum number of nested scopes. Opening one more fails with
///   [`Error::IncorrectFormat`]. Every rule expansion and every terminal draw is a scope,
///   so this bounds recursion.
/// - `max_draws`: maximum number of answered decisions. One more fails with
///   [`Error::NotEnoughData`].
#[derive(Debug)]
pub struct Bounded<S> {
    inner: S,
    max_depth: usize,
    max_draws: usize,
    depth: usize,
    draws: usize,
}

impl<S: DecisionSource> Bounded<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            max_depth: usize::MAX,
            max_draws: usize::MAX,
            depth: 0,
            draws: 0,
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_draws(mut self, max_draws: usize) -> Self {
        self.max_draws = max_draws;
        self
    }

    /// Number of decisions answered so far.
    pub fn draws(&self) -> usize {
        self.draws
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn tick(&mut self) -> Result<()> {
        if self.draws >= self.max_draws {
            return Err(Error::NotEnoughData);
        }
        self.draws += 1;
        Ok(())
    }
}

impl<S: DecisionSource> DecisionSource for Bounded<S> {
    fn choose_index(&mut self, len: usize) -> Result<usize> {
        self.tick()?;
        self.inner.choose_index(len)
    }

    fn draw_bits(&mut self, n: u32) -> Result<u64> {
        self.tick()?;
        self.inner.draw_bits(n)
    }

    fn start_scope(&mut self, label: Label) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(Error::IncorrectFormat);
        }
        self.inner.start_scope(label)?;
        self.depth += 1;
        Ok(())
    }

    fn stop_scope(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.inner.stop_scope();
    }
}

/// A closed scope as seen by a [`Recorder`].
///
/// `start..end` indexes into [`Recorder::choices`]: the answers drawn while the scope was open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub label: Label,
    pub depth: usize,
    pub start: usize,
    pub end: usize,
}

/// Records every answer and scope of another source.
///
/// The recorded answers replay the same run through [`Replay`], and the spans tell a shrinker
/// which answers belong to which rule expansion.
#[derive(Debug)]
pub struct Recorder<S> {
    inner: S,
    choices: Vec<u64>,
    open: Vec<(Label, usize)>,
    spans: Vec<Span>,
}

impl<S: DecisionSource> Recorder<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            choices: Vec::new(),
            open: Vec::new(),
            spans: Vec::new(),
        }
    }

    pub fn choices(&self) -> &[u64] {
        &self.choices
    }

    /// Closed scopes, in the order they were closed (children before their parent).
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: DecisionSource> DecisionSource for Recorder<S> {
    fn choose_index(&mut self, len: usize) -> Result<usize> {
        let i = self.inner.choose_index(len)?;
        self.choices.push(i as u64);
        Ok(i)
    }

    fn draw_bits(&mut self, n: u32) -> Result<u64> {
        let x = self.inner.draw_bits(n)?;
        self.choices.push(x);
        Ok(x)
    }

    fn start_scope(&mut self, label: Label) -> Result<()> {
        self.inner.start_scope(label)?;
        self.open.push((label, self.choices.len()));
        Ok(())
    }

    fn stop_scope(&mut self) {
        if let Some((label, start)) = self.open.pop() {
            self.spans.push(Span {
                label,
                depth: self.open.len(),
                start,
                end: self.choices.len(),
            });
        }
        self.inner.stop_scope();
    }
}

/// Answers from a fixed script, e.g. recorded by a [`Recorder`] or written by hand in a test.
///
/// `choose_index(len)` takes the next answer as the index and fails with
/// [`Error::IncorrectFormat`] if it is out of range. `draw_bits(n)` keeps the low `n` bits.
/// Running out of answers fails with [`Error::NotEnoughData`].
#[derive(Debug, Clone, Default)]
pub struct Replay {
    answers: VecDeque<u64>,
}

impl Replay {
    pub fn new(answers: impl IntoIterator<Item = u64>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }

    /// Number of answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self) -> Result<u64> {
        self.answers.pop_front().ok_or(Error::NotEnoughData)
    }
}

impl DecisionSource for Replay {
    fn choose_index(&mut self, len: usize) -> Result<usize> {
        if len == 0 {
            return Err(Error::EmptyChoose);
        }
        match usize::try_from(self.next()?) {
            Ok(i) if i < len => Ok(i),
            _ => Err(Error::IncorrectFormat),
        }
    }

    fn draw_bits(&mut self, n: u32) -> Result<u64> {
        Ok(self.next()? & mask(n))
    }

    fn start_scope(&mut self, _label: Label) -> Result<()> {
        Ok(())
    }

    fn stop_scope(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unstructured_bits_are_masked() {
        let data = [0xff; 32];
        let mut u = Unstructured::new(&data);
        for n in [0, 1, 2, 7, 8, 63, 64] {
            assert_eq!(DecisionSource::draw_bits(&mut u, n).unwrap(), mask(n));
        }
    }

    #[test]
    fn unstructured_exhausted_answers_zero() {
        let mut u = Unstructured::new(&[]);
        assert_eq!(DecisionSource::choose_index(&mut u, 5).unwrap(), 0);
        assert_eq!(DecisionSource::draw_bits(&mut u, 2).unwrap(), 0);
        assert!(!u.draw_bool().unwrap());
    }

    #[test]
    fn replay_follows_script() {
        let mut r = Replay::new([2, 7, 1]);
        assert_eq!(r.choose_index(3).unwrap(), 2);
        assert_eq!(r.draw_bits(2).unwrap(), 3);
        assert_eq!(r.choose_index(1), Err(Error::IncorrectFormat));
        assert_eq!(r.draw_bits(1), Err(Error::NotEnoughData));
        assert_eq!(r.choose_index(0), Err(Error::EmptyChoose));
    }

    #[test]
    fn bounded_depth_and_draws() {
        let mut b = Bounded::new(Replay::new([0; 10])).max_depth(2).max_draws(3);
        b.start_scope(1).unwrap();
        b.start_scope(2).unwrap();
        assert_eq!(b.start_scope(3), Err(Error::IncorrectFormat));
        b.stop_scope();
        b.start_scope(3).unwrap();

        for _ in 0..3 {
            b.draw_bits(1).unwrap();
        }
        assert_eq!(b.draw_bits(1), Err(Error::NotEnoughData));
        assert_eq!(b.draws(), 3);
    }

    #[test]
    fn recorder_spans_nest() {
        let mut r = Recorder::new(Replay::new([1, 0, 3]));
        r.start_scope(10).unwrap();
        r.choose_index(2).unwrap();
        r.start_scope(20).unwrap();
        r.draw_bits(1).unwrap();
        r.stop_scope();
        r.draw_bits(2).unwrap();
        r.stop_scope();

        assert_eq!(r.choices(), &[1, 0, 3]);
        assert_eq!(
            r.spans(),
            &[
                Span {
                    label: 20,
                    depth: 1,
                    start: 1,
                    end: 2
                },
                Span {
                    label: 10,
                    depth: 0,
                    start: 0,
                    end: 3
                },
            ]
        );
    }

    #[test]
    fn scope_closes_on_early_return() {
        fn fails(src: &mut dyn DecisionSource) -> Result<u64> {
            let mut scope = Scope::enter(src, 7)?;
            scope.draw_bits(2)?;
            scope.draw_bits(2)
        }

        let mut r = Recorder::new(Replay::new([1]));
        assert_eq!(fails(&mut r), Err(Error::NotEnoughData));
        assert_eq!(r.spans().len(), 1);
        assert_eq!(r.spans()[0].label, 7);
    }
}
