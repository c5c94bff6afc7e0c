use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Register index. Written as `&r<N>` in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Reg(pub u8);

impl Reg {
    pub fn parse(s: &str) -> Result<Self, String> {
        let idx = s
            .strip_prefix("&r")
            .ok_or_else(|| format!("Not a register: {s}"))?;
        if idx.is_empty() || !idx.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("Not a register: {s}"));
        }
        match idx.parse::<u8>() {
            Ok(n) => Ok(Reg(n)),
            Err(_) => Err(format!("Register index out of range: {s}")),
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "&r{}", self.0)
    }
}

impl From<Reg> for u16 {
    fn from(reg: Reg) -> u16 {
        reg.0 as u16
    }
}

#[test]
fn test() {
    assert_eq!(Reg::parse("&r0"), Ok(Reg(0)));
    assert_eq!(Reg::parse("&r15"), Ok(Reg(15)));
    assert!(Reg::parse("&r").is_err());
    assert!(Reg::parse("r1").is_err());
    assert!(Reg::parse("&r-1").is_err());
    assert!(Reg::parse("&r256").is_err());
    assert_eq!(Reg(3).to_string(), "&r3");
}
