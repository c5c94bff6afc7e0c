use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Default,
    FromPrimitive,
    IntoPrimitive,
    EnumString,
    EnumIter,
    Display,
)]
#[repr(u8)]
pub enum OpKind {
    #[default]
    NOP,
    MOV,
    LDI,
    LD,
    ST,
    LDP,
    STP,
    ADD,
    ADDI,
    SUB,
    SUBI,
    AND,
    OR,
    XOR,
    NOT,
    SHL,
    SHR,
    INC,
    DEC,
    JMP,
    JZ,
    JNZ,
    PUSH,
    POP,
    CALL,
    RET,
    OUT,
    HLT,
}

impl OpKind {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_uppercase().parse::<Self>() {
            Ok(a) => Ok(a),
            Err(_) => Err(format!("Undefined Op: {s}")),
        }
    }

    /// Mnemonic written in source. Several ops share one (`mov`).
    pub fn mnemonic(&self) -> &'static str {
        use OpKind::*;
        match self {
            NOP => "nop",
            MOV | LDI | LD | ST | LDP | STP => "mov",
            ADD | ADDI => "add",
            SUB | SUBI => "sub",
            AND => "and",
            OR => "or",
            XOR => "xor",
            NOT => "not",
            SHL => "shl",
            SHR => "shr",
            INC => "inc",
            DEC => "dec",
            JMP => "jmp",
            JZ => "jz",
            JNZ => "jnz",
            PUSH => "push",
            POP => "pop",
            CALL => "call",
            RET => "ret",
            OUT => "out",
            HLT => "hlt",
        }
    }
}

#[test]
fn test() {
    assert_eq!(OpKind::parse("ldi"), Ok(OpKind::LDI));
    assert_eq!(OpKind::parse("HLT"), Ok(OpKind::HLT));
    assert!(OpKind::parse("hoge").is_err());
    assert_eq!(u8::from(OpKind::MOV), 1);
    assert_eq!(u8::from(OpKind::HLT), 27);
    assert_eq!(OpKind::from(24u8), OpKind::CALL);
    assert_eq!(OpKind::from(200u8), OpKind::NOP);
    assert_eq!(OpKind::ST.mnemonic(), "mov");
}
