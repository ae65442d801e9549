#![allow(rustdoc::bare_urls)]
#![doc = include_str!("../README.md")]

mod common;
mod compiled;
mod error;
mod generator;
mod ir;
mod lark;
mod regex;
mod source;
mod strategy;
mod table;
mod visitor;
mod walker;

pub use compiled::{CompileGrammar, Compiled, Pattern, Rule, SymbolRef, TerminalDef};
pub use error::{Error, Result};
pub use generator::{Builder, Generator};
pub use lark::LarkGrammar;
pub use regex::{Error as RegexError, Regex};
pub use source::{Bounded, DecisionSource, Label, Recorder, Replay, Scope, Span};
pub use strategy::{Just, OneOf, Strategy};
pub use table::rule_label;
pub use visitor::{DrawState, Visitor};

/// Default bound on the extra repetitions of an unbounded regex repetition, see
/// [`Builder::max_repeat`].
pub const DEFAULT_MAX_REPEAT: u32 = 8;
