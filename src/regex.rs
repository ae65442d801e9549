//! Strings matching a regular expression, built from decisions.

use crate::error::ErrorRepr;
use crate::source::DecisionSource;
use crate::strategy::Strategy;

use regex_syntax::hir::{Class, Hir, HirKind};

/// Errors from compiling a pattern into a [`Regex`].
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] regex_syntax::Error),
    #[error("pattern {0:?} contains a class that matches nothing")]
    Unsatisfiable(String),
    #[error("pattern {0:?} contains a word boundary assertion, which is not supported")]
    WordBoundary(String),
}

/// Produces strings that fully match a regular expression.
///
/// The pattern is parsed by `regex-syntax` and compiled into a tree that is walked with an
/// explicit stack during generation, consulting a [`DecisionSource`] at each:
/// - class: one code point (or byte), uniformly. Answer `0` is the smallest member.
/// - alternation: one branch.
/// - repetition: keeps repeating while `draw_bool` is `true`, up to the maximum. Unbounded
///   repetitions (`*`, `+`, `{n,}`) stop after `max_repeat` extra repetitions.
///
/// Anchors (`^`, `$`, `\A`, `\z`) produce nothing, which is what they mean at either end of
/// the pattern. Word boundaries (`\b`, `\B`, `\<`, ...) are rejected with
/// [`Error::WordBoundary`]; give such terminals an explicit strategy instead.
#[derive(Debug, Clone)]
pub struct Regex {
    pattern: String,
    root: Node,
}

#[derive(Debug, Clone)]
enum Node {
    Literal(Box<[u8]>),
    Unicode(Ranges),
    Bytes(Ranges),
    Repeat(Box<Node>, u32, u32),
    // reversed, so `generate` can push children straight onto its stack
    Concat(Vec<Node>),
    Alt(Vec<Node>),
}

/// Inclusive ranges of code points or bytes, with the running total of members before each.
#[derive(Debug, Clone)]
struct Ranges {
    ranges: Vec<(u32, u32)>,
    offsets: Vec<usize>,
    len: usize,
}

const SURROGATES: (u32, u32) = (0xD800, 0xDFFF);

impl Ranges {
    fn new(ranges: impl Iterator<Item = (u32, u32)>) -> Self {
        let mut out = Self {
            ranges: Vec::new(),
            offsets: Vec::new(),
            len: 0,
        };
        for (lo, hi) in ranges {
            // a code point range can span the surrogates, which are not `char`s
            if lo < SURROGATES.0 && hi > SURROGATES.1 {
                out.push(lo, SURROGATES.0 - 1);
                out.push(SURROGATES.1 + 1, hi);
            } else {
                out.push(lo, hi);
            }
        }
        out
    }

    fn push(&mut self, lo: u32, hi: u32) {
        self.offsets.push(self.len);
        self.ranges.push((lo, hi));
        self.len += (hi - lo) as usize + 1;
    }

    /// Returns the `i`th member.
    fn get(&self, i: usize) -> Option<u32> {
        let r = self.offsets.partition_point(|&o| o <= i).checked_sub(1)?;
        let (lo, hi) = self.ranges[r];
        let x = lo.checked_add(u32::try_from(i - self.offsets[r]).ok()?)?;
        (x <= hi).then_some(x)
    }
}

impl Regex {
    /// Compiles `pattern` with [`crate::DEFAULT_MAX_REPEAT`].
    pub fn new(pattern: &str) -> Result<Self, Error> {
        Self::with_max_repeat(pattern, crate::DEFAULT_MAX_REPEAT)
    }

    pub fn with_max_repeat(pattern: &str, max_repeat: u32) -> Result<Self, Error> {
        let hir = regex_syntax::ParserBuilder::new().build().parse(pattern)?;
        if hir.properties().look_set().contains_word() {
            return Err(Error::WordBoundary(pattern.to_string()));
        }
        let root = Node::try_new(&hir, max_repeat)
            .ok_or_else(|| Error::Unsatisfiable(pattern.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            root,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Draws one string matching the pattern.
    pub fn generate(&self, src: &mut dyn DecisionSource) -> crate::Result<String> {
        let mut buf = Vec::new();
        let mut to_write = vec![&self.root];

        while let Some(node) = to_write.pop() {
            match node {
                Node::Literal(bytes) => buf.extend_from_slice(bytes),
                Node::Unicode(ranges) => {
                    let c = ranges
                        .get(src.choose_index(ranges.len)?)
                        .and_then(char::from_u32)
                        .ok_or(arbitrary::Error::IncorrectFormat)?;
                    let mut b = [0; 4];
                    buf.extend_from_slice(c.encode_utf8(&mut b).as_bytes());
                }
                Node::Bytes(ranges) => {
                    let b = ranges
                        .get(src.choose_index(ranges.len)?)
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or(arbitrary::Error::IncorrectFormat)?;
                    buf.push(b);
                }
                Node::Repeat(x, min, max) => {
                    let mut reps = *min;
                    while reps < *max && src.draw_bool()? {
                        reps += 1;
                    }
                    to_write.extend(std::iter::repeat(&**x).take(reps as usize));
                }
                Node::Concat(v) => to_write.extend(v.iter()),
                Node::Alt(v) => to_write.push(&v[src.choose_index(v.len())?]),
            }
        }

        String::from_utf8(buf).map_err(|_| crate::Error(ErrorRepr::NotUtf8(self.pattern.clone())))
    }
}

impl Strategy for Regex {
    fn draw(&self, src: &mut dyn DecisionSource) -> crate::Result<String> {
        self.generate(src)
    }
}

impl Node {
    /// Returns `None` if `hir` can never match.
    fn try_new(hir: &Hir, max_repeat: u32) -> Option<Self> {
        Some(match hir.kind() {
            HirKind::Empty | HirKind::Look(_) => Self::Concat(Vec::new()),
            HirKind::Literal(lit) => Self::Literal(lit.0.clone()),
            HirKind::Class(Class::Unicode(c)) => {
                let ranges = Ranges::new(
                    c.ranges()
                        .iter()
                        .map(|r| (r.start() as u32, r.end() as u32)),
                );
                if ranges.len == 0 {
                    return None;
                }
                Self::Unicode(ranges)
            }
            HirKind::Class(Class::Bytes(c)) => {
                let ranges = Ranges::new(
                    c.ranges()
                        .iter()
                        .map(|r| (u32::from(r.start()), u32::from(r.end()))),
                );
                if ranges.len == 0 {
                    return None;
                }
                Self::Bytes(ranges)
            }
            HirKind::Repetition(rep) => {
                let max = rep
                    .max
                    .unwrap_or_else(|| rep.min.saturating_add(max_repeat));
                match Self::try_new(&rep.sub, max_repeat) {
                    Some(child) => Self::Repeat(Box::new(child), rep.min, max),
                    // `x{0,n}` still matches the empty string
                    None if rep.min == 0 => Self::Concat(Vec::new()),
                    None => return None,
                }
            }
            HirKind::Capture(cap) => Self::try_new(&cap.sub, max_repeat)?,
            HirKind::Concat(v) => {
                let mut children = v
                    .iter()
                    .map(|h| Self::try_new(h, max_repeat))
                    .collect::<Option<Vec<_>>>()?;
                children.reverse(); // reverse so that `generate` can use a stack
                Self::Concat(children)
            }
            HirKind::Alternation(v) => {
                let children: Vec<_> = v
                    .iter()
                    .filter_map(|h| Self::try_new(h, max_repeat))
                    .collect();
                if children.is_empty() {
                    return None;
                }
                Self::Alt(children)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Replay;
    use arbitrary::Unstructured;
    use rand::{rngs::StdRng, RngCore, SeedableRng};

    fn assert_fullmatch(pattern: &str) {
        let regex = Regex::new(pattern).unwrap();
        let check = ::regex::Regex::new(&format!("^(?:{})$", pattern)).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let mut buf = [0u8; 256];
        for _ in 0..200 {
            rng.fill_bytes(&mut buf);
            let mut u = Unstructured::new(&buf);
            let s = regex.generate(&mut u).unwrap();
            assert!(check.is_match(&s), "{:?} does not match {:?}", s, pattern);
        }
    }

    #[test]
    fn generates_full_matches() {
        for pattern in [
            r"[0-9]+",
            r"-|\+|\*|÷",
            r"[a-zA-Z_][a-zA-Z_0-9]*",
            r"(ab|cd){2,3}x?",
            r"\d{3}-\w+",
            r#""(?:[^"\\]|\\["\\/bfnrt])*""#,
            r"(?i:select)",
            r"^[ \t]+$",
            r"[^a-z]{4}",
            r".\s.",
            r"(?s:.)*",
        ] {
            assert_fullmatch(pattern);
        }
    }

    #[test]
    fn exhausted_data_gives_shortest() {
        let mut u = Unstructured::new(&[]);
        assert_eq!(Regex::new("[a-z]+").unwrap().generate(&mut u).unwrap(), "a");
        assert_eq!(Regex::new("(x|yy)*z").unwrap().generate(&mut u).unwrap(), "z");
        assert_eq!(Regex::new("a{3}").unwrap().generate(&mut u).unwrap(), "aaa");
    }

    #[test]
    fn follows_replayed_decisions() {
        let regex = Regex::new("[a-c](x|y)+").unwrap();
        // 'c', one extra repetition then stop, then 'y' and 'x'
        let mut r = Replay::new([2, 1, 0, 1, 0]);
        assert_eq!(regex.generate(&mut r).unwrap(), "cyx");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn skips_surrogates() {
        let ranges = Ranges::new([(0xD000, 0xE000)].into_iter());
        assert_eq!(ranges.len, 0x801);
        assert_eq!(ranges.get(0x7FF), Some(0xD7FF));
        assert_eq!(ranges.get(0x800), Some(0xE000));
        assert_eq!(ranges.get(0x801), None);
    }

    #[test]
    fn repetition_is_bounded() {
        let regex = Regex::with_max_repeat("a*", 3).unwrap();
        let data = [0xff; 64];
        let mut u = Unstructured::new(&data);
        assert_eq!(regex.generate(&mut u).unwrap(), "aaa");
    }

    #[test]
    fn rejects_bad_patterns() {
        assert!(matches!(Regex::new("(unclosed"), Err(Error::Parse(_))));
        assert_eq!(
            Regex::new(r"[^\x00-\x{10FFFF}]").unwrap_err(),
            Error::Unsatisfiable(r"[^\x00-\x{10FFFF}]".into())
        );
        // an impossible branch is dropped, an impossible optional part becomes empty
        assert!(Regex::new(r"a|[^\x00-\x{10FFFF}]").is_ok());
        assert!(Regex::new(r"a[^\x00-\x{10FFFF}]*").is_ok());
    }

    #[test]
    fn rejects_word_boundaries() {
        // satisfiable, but only by some of the strings the parts would produce
        for pattern in [r"(a| )\b(b| )", r"\bfoo\b", r"x\B", r"(?-u:\b)a", r"\<word\>"] {
            assert_eq!(
                Regex::new(pattern).unwrap_err(),
                Error::WordBoundary(pattern.into()),
                "{}",
                pattern
            );
        }
        assert_fullmatch(r"^\Aab$\z");
    }
}
