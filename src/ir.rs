//! Intermediary representation (ir) for a parsed Lark grammar.

use peg::parser;

parser! {
/// This parser is not meant to efficient, since parsing the grammar is not meant to be
/// on the hot path (unlike generating strings).
///
/// Lark is line oriented: a definition ends at the end of its line, unless the next
/// line continues it with `|`.
pub grammar lark() for str {
    pub rule grammar() -> Vec<Item>
        = blank_lines() items:(item() ** line_break()) blank_lines() _ comment()? { items }

    rule item() -> Item
        = _ d:directive() { d }
        / _ d:definition() { d }

    rule definition() -> Item
        = ['?' | '!']? n:name() priority()? _ ":" a:alternatives() { Item::Def(n, a) }

    rule priority()
        = "." "-"? ['0'..='9']+

    rule directive() -> Item
        = "%ignore" a:alternatives() { Item::Ignore(a) }
        / "%declare" n:(_ n:name() { n })+ { Item::Declare(n) }
        / "%import" _ m:path() _ "(" _ n:(name() ++ (_ "," _)) _ ")" {
            Item::Import(m, n.into_iter().map(|n| (n, None)).collect())
          }
        / "%import" _ p:path() a:(_ "->" _ a:name() { a })? {? import_one(p, a) }

    rule path() -> Vec<String>
        = p:(name() ++ ".") { p }

    rule alternatives() -> Expr
        = l:(expansion() ++ (eol()* _ "|")) { Expr::alt(l) }

    // an alias names the tree node of an alternative, which generation has no use for
    rule expansion() -> Expr
        = _ l:(expr() ** _) _ alias()? { Expr::seq(l) }

    rule alias()
        = "->" _ name() _

    rule expr() -> Expr
        = a:atom() o:(_ o:op() { o })? {
            match o {
                Some(o) => o.apply(a),
                None => a,
            }
          }

    rule op() -> Op
        = "?" { Op::Maybe }
        / "*" { Op::Star }
        / "+" { Op::Plus }
        / "~" _ n:number() m:(_ ".." _ m:number() { m })? {? Op::range(n, m) }

    rule atom() -> Expr
        = "(" a:alternatives() eol()* _ ")" { a }
        / "[" a:alternatives() eol()* _ "]" { Expr::Maybe(Box::new(a)) }
        / a:string() _ ".." _ b:string() {? char_range(&a, &b) }
        / s:string() i:("i" !name_char())? { Expr::Literal(s, i.is_some()) }
        / regexp()
        / n:name() { Expr::Name(n) }

    rule name() -> String
        = n:$(['_']* ['a'..='z' | 'A'..='Z'] name_char()*) { n.to_string() }

    rule name_char()
        = ['a'..='z' | 'A'..='Z' | '0'..='9' | '_']

    rule number() -> u32
        = n:$(['0'..='9']+) {? n.parse().or(Err("valid u32")) }

    rule regexp() -> Expr
        = "/" p:$(("\\" [^'\n'] / [^'/' | '\\' | '\n'])+) "/" f:$(['i' | 'm' | 's' | 'x' | 'u']*) !name_char() {
            Expr::Regex(regex_with_flags(p, f))
          }

    rule string() -> String
        = "\"" l:string_part()* "\"" { l.concat() }

    rule string_part() -> String
        = "\\" e:escape() { e }
        / c:[^'"' | '\\' | '\n'] { c.to_string() }

    // unknown escapes are kept as written, backslash included
    rule escape() -> String
        = "n" { "\n".into() }
        / "t" { "\t".into() }
        / "r" { "\r".into() }
        / "0" { "\0".into() }
        / "\\" { "\\".into() }
        / "\"" { "\"".into() }
        / "'" { "'".into() }
        / "x" h:$(hex()*<2>) {? code_point(h) }
        / "u" h:$(hex()*<4>) {? code_point(h) }
        / "U" h:$(hex()*<8>) {? code_point(h) }
        / c:[_] { format!("\\{}", c) }

    rule hex()
        = ['0'..='9' | 'a'..='f' | 'A'..='F']

    rule comment()
        = "//" [^'\n']*

    rule eol()
        = _ comment()? "\r"? "\n"

    rule blank_lines()
        = eol()*

    rule line_break()
        = eol()+

    rule _ = quiet!{([' ' | '\t'] / "\\" "\r"? "\n")*}
}}

/// A top level statement of a grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// A rule or terminal definition. Terminal names start with an uppercase letter
    /// (after any leading underscores).
    Def(String, Expr),
    Ignore(Expr),
    Declare(Vec<String>),
    /// `%import module.NAME -> ALIAS` or `%import module (A, B)`.
    Import(Vec<String>, Vec<(String, Option<String>)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Alt(Vec<Expr>),
    Seq(Vec<Expr>),
    Maybe(Box<Expr>),
    /// `x{min,max}`, unbounded when `max` is `None`.
    Repeat(Box<Expr>, u32, Option<u32>),
    Name(String),
    /// A string literal and whether it is case-insensitive.
    Literal(String, bool),
    Regex(String),
    Range(char, char),
}

impl Expr {
    fn alt(l: Vec<Expr>) -> Expr {
        match <[Expr; 1]>::try_from(l) {
            Ok([x]) => x,
            Err(l) => Expr::Alt(l),
        }
    }

    fn seq(l: Vec<Expr>) -> Expr {
        match <[Expr; 1]>::try_from(l) {
            Ok([x]) => x,
            Err(l) => Expr::Seq(l),
        }
    }
}

pub(crate) fn is_terminal_name(name: &str) -> bool {
    name.trim_start_matches('_')
        .starts_with(|c: char| c.is_ascii_uppercase())
}

enum Op {
    Maybe,
    Star,
    Plus,
    Range(u32, u32),
}

impl Op {
    fn range(n: u32, m: Option<u32>) -> Result<Self, &'static str> {
        let m = m.unwrap_or(n);
        if n <= m {
            Ok(Self::Range(n, m))
        } else {
            Err("repetition range with min <= max")
        }
    }

    fn apply(self, x: Expr) -> Expr {
        let x = Box::new(x);
        match self {
            Self::Maybe => Expr::Maybe(x),
            Self::Star => Expr::Repeat(x, 0, None),
            Self::Plus => Expr::Repeat(x, 1, None),
            Self::Range(n, m) => Expr::Repeat(x, n, Some(m)),
        }
    }
}

fn import_one(mut path: Vec<String>, alias: Option<String>) -> Result<Item, &'static str> {
    match path.pop() {
        Some(name) if !path.is_empty() => Ok(Item::Import(path, vec![(name, alias)])),
        _ => Err("import of the form module.NAME"),
    }
}

fn char_range(a: &str, b: &str) -> Result<Expr, &'static str> {
    let mut a = a.chars();
    let mut b = b.chars();
    match (a.next(), a.next(), b.next(), b.next()) {
        (Some(a), None, Some(b), None) if a <= b => Ok(Expr::Range(a, b)),
        _ => Err("range between two single characters"),
    }
}

fn code_point(hex: &str) -> Result<String, &'static str> {
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .map(String::from)
        .ok_or("valid unicode code point")
}

/// Lark's regex flags become an inline flag group. `u` is always on.
fn regex_with_flags(pattern: &str, flags: &str) -> String {
    let pattern = pattern.replace("\\/", "/");
    let flags: String = flags.chars().filter(|&c| c != 'u').collect();
    if flags.is_empty() {
        pattern
    } else {
        format!("(?{}:{})", flags, pattern)
    }
}
