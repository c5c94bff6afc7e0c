use super::{block_comment, LanguageTarget};
use crate::{
    compile::Program,
    config::CompilerArgs,
    error::Error,
    template::{Template, Values},
};
use arch::{inst::RomInst, op::OpKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    C,
    CSharp,
}

/// C family targets: a `switch (pc++)` dispatch loop inside the language template.
pub struct CLike {
    dialect: Dialect,
}

impl CLike {
    pub fn c() -> Self {
        CLike { dialect: Dialect::C }
    }

    pub fn csharp() -> Self {
        CLike {
            dialect: Dialect::CSharp,
        }
    }

    fn template(&self) -> &'static str {
        match self.dialect {
            Dialect::C => "C.c",
            Dialect::CSharp => "CSharp.cs",
        }
    }

    fn out(&self, reg: u16) -> String {
        match self.dialect {
            Dialect::C => format!("printf(\"%d\\n\", registers[{reg}]);"),
            Dialect::CSharp => format!("Console.WriteLine(registers[{reg}]);"),
        }
    }

    /// Statements of one ROM instruction. `pc` already points at the next one.
    fn stmts(&self, inst: &RomInst) -> Vec<String> {
        let (a, b) = (inst.a, inst.b);
        let push = |value: String| {
            vec![
                format!("stack[sp] = {value};"),
                "sp = (sp + 1) % STACK_SIZE;".to_string(),
            ]
        };
        let pop = |into: &str| {
            vec![
                "sp = (sp + STACK_SIZE - 1) % STACK_SIZE;".to_string(),
                format!("{into}stack[sp];"),
            ]
        };
        let binary = |sym: &str| vec![format!("registers[{a}] = (byte)(registers[{a}] {sym} registers[{b}]);")];
        let imm = |sym: &str| vec![format!("registers[{a}] = (byte)(registers[{a}] {sym} {b});")];

        match inst.op {
            OpKind::NOP => vec![],
            OpKind::MOV => vec![format!("registers[{a}] = registers[{b}];")],
            OpKind::LDI => vec![format!("registers[{a}] = {b};")],
            OpKind::LD => vec![format!("registers[{a}] = memory[{b}];")],
            OpKind::ST => vec![format!("memory[{a}] = registers[{b}];")],
            OpKind::LDP => vec![format!("registers[{a}] = memory[registers[{b}] % MEMORY_SIZE];")],
            OpKind::STP => vec![format!("memory[registers[{a}] % MEMORY_SIZE] = registers[{b}];")],
            OpKind::ADD => binary("+"),
            OpKind::ADDI => imm("+"),
            OpKind::SUB => binary("-"),
            OpKind::SUBI => imm("-"),
            OpKind::AND => binary("&"),
            OpKind::OR => binary("|"),
            OpKind::XOR => binary("^"),
            OpKind::NOT => vec![format!("registers[{a}] = (byte)~registers[{a}];")],
            OpKind::SHL => vec![format!("registers[{a}] = (byte)(registers[{a}] << 1);")],
            OpKind::SHR => vec![format!("registers[{a}] = (byte)(registers[{a}] >> 1);")],
            OpKind::INC => vec![format!("registers[{a}] = (byte)(registers[{a}] + 1);")],
            OpKind::DEC => vec![format!("registers[{a}] = (byte)(registers[{a}] - 1);")],
            OpKind::JMP => vec![format!("pc = {a};")],
            OpKind::JZ => vec![format!("if (registers[{a}] == 0) pc = {b};")],
            OpKind::JNZ => vec![format!("if (registers[{a}] != 0) pc = {b};")],
            OpKind::PUSH => push(format!("registers[{a}]")),
            OpKind::POP => pop(&format!("registers[{a}] = ")),
            OpKind::CALL => {
                let mut v = push("(byte)(pc & 0xff)".to_string());
                v.extend(push("(byte)((pc >> 8) & 0xff)".to_string()));
                v.push(format!("pc = {a};"));
                v
            }
            OpKind::RET => {
                let mut v = pop("pc = ");
                v.push("pc <<= 8;".to_string());
                v.extend(pop("pc |= "));
                v
            }
            OpKind::OUT => vec![self.out(a)],
            OpKind::HLT => vec!["running = 0;".to_string()],
        }
    }

    pub fn code(&self, program: &Program) -> String {
        let mut out = vec![
            "int pc = 0;".to_string(),
            "int sp = 0;".to_string(),
            "int running = 1;".to_string(),
            "while (running != 0)".to_string(),
            "{".to_string(),
            "    switch (pc++)".to_string(),
            "    {".to_string(),
        ];
        for (pc, inst) in program.rom.iter().enumerate() {
            match program.source.get(pc) {
                Some(src) => out.push(format!("        case {pc}: /* {} */", block_comment(src))),
                None => out.push(format!("        case {pc}:")),
            }
            for stmt in self.stmts(inst) {
                out.push(format!("            {stmt}"));
            }
            out.push("            break;".to_string());
        }
        out.extend(
            [
                "        default:",
                "            running = 0;",
                "            break;",
                "    }",
                "}",
            ]
            .map(String::from),
        );
        out.join("\n")
    }
}

impl LanguageTarget for CLike {
    fn id(&self) -> &'static str {
        match self.dialect {
            Dialect::C => "c",
            Dialect::CSharp => "csharp",
        }
    }

    fn extension(&self) -> &'static str {
        match self.dialect {
            Dialect::C => "c",
            Dialect::CSharp => "cs",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self.dialect {
            Dialect::C => &[],
            Dialect::CSharp => &["c#", "cs"],
        }
    }

    fn transpile(&self, program: &Program, args: &CompilerArgs) -> Result<String, Error> {
        let template = Template::load(self.template(), args.template_dir.as_deref())?;
        Ok(template.render(&Values::new(args, self.code(program))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_and_ret_use_the_stack() {
        let c = CLike::c();
        let call = c.stmts(&RomInst::new(OpKind::CALL, 7, 0));
        assert_eq!(call.len(), 5);
        assert_eq!(call[0], "stack[sp] = (byte)(pc & 0xff);");
        assert_eq!(call[4], "pc = 7;");
        let ret = c.stmts(&RomInst::new(OpKind::RET, 0, 0));
        assert_eq!(
            ret,
            vec![
                "sp = (sp + STACK_SIZE - 1) % STACK_SIZE;",
                "pc = stack[sp];",
                "pc <<= 8;",
                "sp = (sp + STACK_SIZE - 1) % STACK_SIZE;",
                "pc |= stack[sp];",
            ]
        );
    }

    #[test]
    fn out_per_dialect() {
        let inst = RomInst::new(OpKind::OUT, 2, 0);
        assert_eq!(CLike::c().stmts(&inst), vec!["printf(\"%d\\n\", registers[2]);"]);
        assert_eq!(CLike::csharp().stmts(&inst), vec!["Console.WriteLine(registers[2]);"]);
    }
}
