use crate::error::ErrorRepr;
use std::str::FromStr;

/// Terminals of Lark's `common` library, available through `%import common.NAME`.
///
/// Patterns follow `common.lark`, rewritten without look-behind so they can be synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, enum_iterator::Sequence)]
#[allow(clippy::upper_case_acronyms)]
pub(crate) enum Common {
    Digit,
    HexDigit,
    Int,
    SignedInt,
    Decimal,
    Float,
    SignedFloat,
    Number,
    SignedNumber,
    LcaseLetter,
    UcaseLetter,
    Letter,
    Word,
    Cname,
    EscapedString,
    WsInline,
    Ws,
    Cr,
    Lf,
    Newline,
    ShComment,
    CppComment,
}

const EXP: &str = r"[eE][+\-]?[0-9]+";
const DECIMAL: &str = r"[0-9]+\.[0-9]*|\.[0-9]+";

impl Common {
    pub(crate) fn all() -> impl Iterator<Item = Self> {
        enum_iterator::all::<Self>()
    }

    pub(crate) const fn as_str(&self) -> &'static str {
        match self {
            Self::Digit => "DIGIT",
            Self::HexDigit => "HEXDIGIT",
            Self::Int => "INT",
            Self::SignedInt => "SIGNED_INT",
            Self::Decimal => "DECIMAL",
            Self::Float => "FLOAT",
            Self::SignedFloat => "SIGNED_FLOAT",
            Self::Number => "NUMBER",
            Self::SignedNumber => "SIGNED_NUMBER",
            Self::LcaseLetter => "LCASE_LETTER",
            Self::UcaseLetter => "UCASE_LETTER",
            Self::Letter => "LETTER",
            Self::Word => "WORD",
            Self::Cname => "CNAME",
            Self::EscapedString => "ESCAPED_STRING",
            Self::WsInline => "WS_INLINE",
            Self::Ws => "WS",
            Self::Cr => "CR",
            Self::Lf => "LF",
            Self::Newline => "NEWLINE",
            Self::ShComment => "SH_COMMENT",
            Self::CppComment => "CPP_COMMENT",
        }
    }

    /// The terminal's pattern, in `regex-syntax` syntax.
    pub(crate) fn pattern(&self) -> String {
        let float = format!("[0-9]+{EXP}|(?:{DECIMAL})(?:{EXP})?");
        match self {
            Self::Digit => "[0-9]".into(),
            Self::HexDigit => "[a-fA-F0-9]".into(),
            Self::Int => "[0-9]+".into(),
            Self::SignedInt => r"[+\-]?[0-9]+".into(),
            Self::Decimal => DECIMAL.into(),
            Self::Float => float,
            Self::SignedFloat => format!(r"[+\-]?(?:{float})"),
            Self::Number => format!("{float}|[0-9]+"),
            Self::SignedNumber => format!(r"[+\-]?(?:{float}|[0-9]+)"),
            Self::LcaseLetter => "[a-z]".into(),
            Self::UcaseLetter => "[A-Z]".into(),
            Self::Letter => "[A-Za-z]".into(),
            Self::Word => "[A-Za-z]+".into(),
            Self::Cname => "[_A-Za-z][_A-Za-z0-9]*".into(),
            Self::EscapedString => r#""(?:[^"\\\n]|\\["\\/bfnrt])*""#.into(),
            Self::WsInline => r"[ \t]+".into(),
            Self::Ws => r"[ \t\x0C\r\n]+".into(),
            Self::Cr => r"\r".into(),
            Self::Lf => r"\n".into(),
            Self::Newline => r"(?:\r?\n)+".into(),
            Self::ShComment => r"#[^\n]*".into(),
            Self::CppComment => r"//[^\n]*".into(),
        }
    }
}

impl FromStr for Common {
    type Err = ErrorRepr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ErrorRepr::UnsupportedImport(format!("common.{s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Regex;

    #[test]
    fn str_conversions() {
        for c in Common::all() {
            assert_eq!(c, Common::from_str(c.as_str()).unwrap());
        }
        assert_eq!(
            Common::from_str("NOPE"),
            Err(ErrorRepr::UnsupportedImport("common.NOPE".into()))
        );
    }

    #[test]
    fn patterns_compile() {
        for c in Common::all() {
            let check = ::regex::Regex::new(&format!("^(?:{})$", c.pattern())).unwrap();
            let regex = Regex::new(&c.pattern()).unwrap();
            for seed in 0..20u8 {
                let data = [seed.wrapping_mul(37); 64];
                let mut u = arbitrary::Unstructured::new(&data);
                let s = regex.generate(&mut u).unwrap();
                assert!(check.is_match(&s), "{}: {:?}", c.as_str(), s);
            }
        }
    }
}
