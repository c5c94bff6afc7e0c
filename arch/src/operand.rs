use crate::{num::parse_with_prefix, reg::Reg};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use strum::{Display as StrumDisplay, EnumIter, EnumString};

// ----------------------------------------------------------------------------
// Argument kind

/// Operand kind, written as `%type` in instruction patterns and macro openers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    StrumDisplay,
)]
pub enum ArgKind {
    #[strum(serialize = "%label")]
    Label,
    #[strum(serialize = "%variable")]
    Variable,
    #[strum(serialize = "%address")]
    Address,
    #[strum(serialize = "%number")]
    Number,
    #[strum(serialize = "%register")]
    Register,
    #[strum(serialize = "%registerpointer")]
    RegisterPointer,
    #[strum(serialize = "%string")]
    String,
}

impl ArgKind {
    pub fn parse(s: &str) -> Result<Self, String> {
        s.parse::<Self>().map_err(|_| {
            format!(
                "Invalid argument type `{s}`, valid are [%label, %variable, %address, %number, %register, %registerpointer, %string]"
            )
        })
    }

    /// Regex fragment matching one operand of this kind.
    pub fn pattern(&self) -> &'static str {
        match self {
            ArgKind::Label => r"([a-z_][a-z0-9_.]*)",
            ArgKind::Variable => r"(\*[a-z_][a-z0-9_.]*)",
            ArgKind::Address => r"(\$(?:0x[0-9a-f]+|0b[01]+|0o[0-7]+|[0-9]+))",
            ArgKind::Number => r"(-?(?:0x[0-9a-f]+|0b[01]+|0o[0-7]+|[0-9]+))",
            ArgKind::Register => r"(&r[0-9]+)",
            ArgKind::RegisterPointer => r"(\*&r[0-9]+)",
            ArgKind::String => r#"("[^"]*")"#,
        }
    }
}

// ----------------------------------------------------------------------------
// Operand

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Reg(Reg),
    RegPtr(Reg),
    Var(String),
    Addr(i32),
    Num(i32),
    Label(String),
    Str(String),
}

impl Operand {
    pub fn parse(s: &str) -> Result<Operand, String> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix('*') {
            if rest.starts_with('&') {
                return Ok(Operand::RegPtr(Reg::parse(rest)?));
            }
            if is_ident(rest) {
                return Ok(Operand::Var(rest.to_string()));
            }
            return Err(format!("Invalid variable: {s}"));
        }
        if s.starts_with('&') {
            return Ok(Operand::Reg(Reg::parse(s)?));
        }
        if let Some(rest) = s.strip_prefix('$') {
            return parse_with_prefix(rest)
                .map(Operand::Addr)
                .map_err(|_| format!("Invalid address: {s}"));
        }
        if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
            return Ok(Operand::Str(s[1..s.len() - 1].to_string()));
        }
        if let Ok(v) = parse_with_prefix(s) {
            return Ok(Operand::Num(v));
        }
        if is_ident(s) {
            return Ok(Operand::Label(s.to_string()));
        }
        Err(format!("Cannot parse operand `{s}`"))
    }

    pub fn kind(&self) -> ArgKind {
        match self {
            Operand::Reg(_) => ArgKind::Register,
            Operand::RegPtr(_) => ArgKind::RegisterPointer,
            Operand::Var(_) => ArgKind::Variable,
            Operand::Addr(_) => ArgKind::Address,
            Operand::Num(_) => ArgKind::Number,
            Operand::Label(_) => ArgKind::Label,
            Operand::Str(_) => ArgKind::String,
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{r}"),
            Operand::RegPtr(r) => write!(f, "*{r}"),
            Operand::Var(v) => write!(f, "*{v}"),
            Operand::Addr(a) => write!(f, "${a}"),
            Operand::Num(n) => write!(f, "{n}"),
            Operand::Label(l) => write!(f, "{l}"),
            Operand::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

pub fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_operands() {
        assert_eq!(Operand::parse("&r1"), Ok(Operand::Reg(Reg(1))));
        assert_eq!(Operand::parse("*&r2"), Ok(Operand::RegPtr(Reg(2))));
        assert_eq!(Operand::parse("*counter"), Ok(Operand::Var("counter".into())));
        assert_eq!(Operand::parse("$0x10"), Ok(Operand::Addr(16)));
        assert_eq!(Operand::parse("0x00"), Ok(Operand::Num(0)));
        assert_eq!(Operand::parse("-3"), Ok(Operand::Num(-3)));
        assert_eq!(Operand::parse("loop"), Ok(Operand::Label("loop".into())));
        assert_eq!(Operand::parse("\"hi there\""), Ok(Operand::Str("hi there".into())));
        assert!(Operand::parse("*1x").is_err());
        assert!(Operand::parse("$zz").is_err());
        assert!(Operand::parse("9lives").is_err());
        assert!(Operand::parse("--5").is_err());
        assert!(Operand::parse("-0x-5").is_err());
        assert!(Operand::parse("$-0x-5").is_err());
    }

    #[test]
    fn kinds() {
        assert_eq!(ArgKind::parse("%register"), Ok(ArgKind::Register));
        assert_eq!(ArgKind::parse("%registerpointer"), Ok(ArgKind::RegisterPointer));
        assert!(ArgKind::parse("%float").is_err());
        assert_eq!(ArgKind::Number.to_string(), "%number");
        assert_eq!(Operand::parse("*&r2").unwrap().kind(), ArgKind::RegisterPointer);
    }
}
