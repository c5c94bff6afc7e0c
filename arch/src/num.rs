use std::{fmt::Display, num::ParseIntError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumError {
    Sign,
    Int(ParseIntError),
}

impl Display for NumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumError::Sign => write!(f, "only one leading `-` is allowed"),
            NumError::Int(e) => write!(f, "{e}"),
        }
    }
}

impl From<ParseIntError> for NumError {
    fn from(e: ParseIntError) -> Self {
        NumError::Int(e)
    }
}

/// Parse `0x`, `0b`, `0o` prefixed or decimal literal, with an optional leading `-`.
pub fn parse_with_prefix(s: &str) -> Result<i32, NumError> {
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    // from_str_radix takes its own sign
    let digits = match body.get(..2) {
        Some("0b" | "0o" | "0x") => &body[2..],
        _ => body,
    };
    if digits.starts_with(|c: char| c == '+' || c == '-') {
        return Err(NumError::Sign);
    }
    let val = match body.get(..2) {
        Some("0b") => i32::from_str_radix(digits, 2)?,
        Some("0o") => i32::from_str_radix(digits, 8)?,
        Some("0x") => i32::from_str_radix(digits, 16)?,
        _ => i32::from_str_radix(body, 10)?,
    };
    Ok(if neg { -val } else { val })
}
