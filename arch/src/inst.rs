use crate::{
    op::OpKind,
    operand::{ArgKind, Operand},
};
use color_print::cformat;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

// ----------------------------------------------------------------------------
// Native instruction table

const NATIVE_PATTERNS: &[(OpKind, &str)] = &[
    (OpKind::NOP, "nop"),
    (OpKind::MOV, "mov %register, %register"),
    (OpKind::LDI, "mov %register, %number"),
    (OpKind::LD, "mov %register, %address"),
    (OpKind::LD, "mov %register, %variable"),
    (OpKind::ST, "mov %address, %register"),
    (OpKind::ST, "mov %variable, %register"),
    (OpKind::LDP, "mov %register, %registerpointer"),
    (OpKind::STP, "mov %registerpointer, %register"),
    (OpKind::ADD, "add %register, %register"),
    (OpKind::ADDI, "add %register, %number"),
    (OpKind::SUB, "sub %register, %register"),
    (OpKind::SUBI, "sub %register, %number"),
    (OpKind::AND, "and %register, %register"),
    (OpKind::OR, "or %register, %register"),
    (OpKind::XOR, "xor %register, %register"),
    (OpKind::NOT, "not %register"),
    (OpKind::SHL, "shl %register"),
    (OpKind::SHR, "shr %register"),
    (OpKind::INC, "inc %register"),
    (OpKind::DEC, "dec %register"),
    (OpKind::JMP, "jmp %label"),
    (OpKind::JZ, "jz %register, %label"),
    (OpKind::JNZ, "jnz %register, %label"),
    (OpKind::PUSH, "push %register"),
    (OpKind::POP, "pop %register"),
    (OpKind::CALL, "call %label"),
    (OpKind::RET, "ret"),
    (OpKind::OUT, "out %register"),
    (OpKind::HLT, "hlt"),
];

pub static NATIVE_INSTRUCTIONS: Lazy<Vec<InstPattern>> = Lazy::new(|| {
    NATIVE_PATTERNS
        .iter()
        .map(|(op, pat)| InstPattern::parse(*op, pat).expect("malformed native pattern"))
        .collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstPattern {
    pub op: OpKind,
    pub mnemonic: String,
    pub args: Vec<ArgKind>,
}

impl InstPattern {
    pub fn parse(op: OpKind, pattern: &str) -> Result<Self, String> {
        let (mnemonic, args) = split_instruction(pattern);
        let args = args
            .into_iter()
            .map(ArgKind::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(InstPattern {
            op,
            mnemonic: mnemonic.to_string(),
            args,
        })
    }

    pub fn accepts(&self, mnemonic: &str, operands: &[Operand]) -> bool {
        self.mnemonic == mnemonic
            && self.args.len() == operands.len()
            && self
                .args
                .iter()
                .zip(operands)
                .all(|(kind, operand)| *kind == operand.kind())
    }
}

impl Display for InstPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        for (i, arg) in self.args.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { " " } else { ", " }, arg)?;
        }
        Ok(())
    }
}

/// Split `mnemonic a, b` into the mnemonic and its comma separated operands.
pub fn split_instruction(line: &str) -> (&str, Vec<&str>) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((mnemonic, rest)) => {
            let rest = rest.trim();
            if rest.is_empty() {
                (mnemonic, vec![])
            } else {
                (mnemonic, rest.split(',').map(str::trim).collect())
            }
        }
        None => (line, vec![]),
    }
}

pub fn match_instruction(pattern: &InstPattern, line: &str) -> bool {
    let (mnemonic, args) = split_instruction(line);
    match args
        .into_iter()
        .map(Operand::parse)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(operands) => pattern.accepts(mnemonic, &operands),
        Err(_) => false,
    }
}

// ----------------------------------------------------------------------------
// Instruction (unresolved)

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inst {
    pub op: OpKind,
    pub args: Vec<Operand>,
}

impl Inst {
    pub fn parse(line: &str) -> Result<Inst, String> {
        let (mnemonic, args) = split_instruction(line);
        if mnemonic.is_empty() {
            return Err("Syntax Error: empty instruction".to_string());
        }
        let operands = args
            .into_iter()
            .map(Operand::parse)
            .collect::<Result<Vec<_>, _>>()?;
        match NATIVE_INSTRUCTIONS
            .iter()
            .find(|pat| pat.accepts(mnemonic, &operands))
        {
            Some(pat) => Ok(Inst {
                op: pat.op,
                args: operands,
            }),
            None => Err(format!("Unknown instruction: `{}`", line.trim())),
        }
    }

    /// Patterns sharing the mnemonic of `line`, for diagnostics.
    pub fn candidates(line: &str) -> Vec<&'static InstPattern> {
        let (mnemonic, _) = split_instruction(line);
        NATIVE_INSTRUCTIONS
            .iter()
            .filter(|pat| pat.mnemonic == mnemonic)
            .collect()
    }

    pub fn resolve<F>(&self, mut f: F) -> Result<RomInst, String>
    where
        F: FnMut(&Operand) -> Result<u16, String>,
    {
        let a = match self.args.first() {
            Some(arg) => f(arg)?,
            None => 0,
        };
        let b = match self.args.get(1) {
            Some(arg) => f(arg)?,
            None => 0,
        };
        Ok(RomInst { op: self.op, a, b })
    }

    pub fn cformat(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                Operand::Reg(_) | Operand::RegPtr(_) => cformat!("<blue>{}</>", arg),
                Operand::Var(_) | Operand::Addr(_) => cformat!("<c>{}</>", arg),
                Operand::Num(_) | Operand::Str(_) => cformat!("<y>{}</>", arg),
                Operand::Label(_) => cformat!("<g>{}</>", arg),
            })
            .collect::<Vec<_>>()
            .join(", ");
        cformat!("<red>{:<5}</>{}", self.op.mnemonic(), args)
    }
}

impl Display for Inst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.op.mnemonic())?;
        for (i, arg) in self.args.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { " " } else { ", " }, arg)?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// ROM instruction

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomInst {
    pub op: OpKind,
    pub a: u16,
    pub b: u16,
}

impl RomInst {
    pub fn new(op: OpKind, a: u16, b: u16) -> Self {
        Self { op, a, b }
    }

    pub fn to_words(&self) -> [u16; 3] {
        [u8::from(self.op) as u16, self.a, self.b]
    }
}

impl Display for RomInst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", u8::from(self.op), self.a, self.b)
    }
}
