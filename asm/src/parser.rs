use crate::{
    label::Labels,
    msg::{Msg, Report},
    source::Line,
};
use arch::{inst::Inst, operand::is_ident};

/// ROM slots. The index past the last instruction still fits in `u16`.
pub const ROM_CAPACITY: usize = u16::MAX as usize;

// ----------------------------------------------------------------------------
// Statement

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Label(String),
    Inst(Inst),
}

impl Stmt {
    /// `Ok(None)` for lines without code.
    pub fn parse(code: &str) -> Result<Option<Stmt>, String> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }
        // main:
        if let Some(name) = code.strip_suffix(':') {
            let name = name.trim();
            if is_ident(name) {
                return Ok(Some(Stmt::Label(name.to_string())));
            }
            return Err(format!("Invalid label name `{name}`"));
        }
        Inst::parse(code).map(|inst| Some(Stmt::Inst(inst)))
    }
}

/// One code line with its statement and, for instructions, its ROM index.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub line: Line,
    pub stmt: Option<Stmt>,
    pub pc: Option<u16>,
}

pub fn parse_program(lines: &[Line], report: &mut Report) -> (Vec<Parsed>, Labels) {
    let mut parsed = vec![];
    let mut labels = Labels::new();
    let mut pc: usize = 0;

    for line in lines {
        let stmt = match Stmt::parse(&line.code) {
            Ok(stmt) => stmt,
            Err(e) => {
                let mut msg = Msg::error(e).at(line.pos());
                for cand in Inst::candidates(&line.code) {
                    msg = msg.note(format!("`{}` accepts `{}`", cand.mnemonic, cand), None);
                }
                report.push(msg);
                None
            }
        };

        let at = match &stmt {
            Some(Stmt::Inst(_)) => {
                if pc >= ROM_CAPACITY {
                    report.push(
                        Msg::error(format!("Program does not fit in ROM of {ROM_CAPACITY} instructions"))
                            .at(line.pos()),
                    );
                    break;
                }
                pc += 1;
                Some((pc - 1) as u16)
            }
            Some(Stmt::Label(name)) => {
                if let Some((_, prev)) = labels.insert(name.clone(), pc as u16, line.pos()) {
                    report.push(
                        Msg::warn(format!("Re-defined label: `{name}`"))
                            .at(line.pos())
                            .note(
                                "Already defined here. The value has been overridden.",
                                Some(prev),
                            ),
                    );
                }
                None
            }
            None => None,
        };

        parsed.push(Parsed {
            line: line.clone(),
            stmt,
            pc: at,
        });
    }
    (parsed, labels)
}
