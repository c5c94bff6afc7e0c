use super::LanguageTarget;
use crate::{
    compile::Program,
    config::CompilerArgs,
    error::Error,
    template::{Template, Values},
};
use arch::{inst::RomInst, op::OpKind};

/// NASM x86-64. MCCPU registers, memory and stack live in `.bss`, `rbx` holds
/// the return target and `r12` the emulated stack pointer.
pub struct Nasm;

impl Nasm {
    fn label(pc: u16, rom_size: usize) -> String {
        if (pc as usize) < rom_size {
            format!("mccpu_{pc}")
        } else {
            "mccpu_end".to_string()
        }
    }

    fn asm(inst: &RomInst, pc: usize, rom_size: usize) -> Vec<String> {
        let (a, b) = (inst.a, inst.b);
        let reg = |r: u16| format!("[registers + {r}]");
        let via_al = |load: String, op: &str, store: String| {
            vec![format!("mov al, {load}"), format!("{op} {store}, al")]
        };
        // memory[registers[r] % MEMORY_SIZE] address into rcx + rdx
        let pointer = |r: u16| {
            vec![
                format!("movzx eax, byte {}", reg(r)),
                "xor edx, edx".to_string(),
                "mov ecx, MEMORY_SIZE".to_string(),
                "div ecx".to_string(),
                "lea rcx, [memory]".to_string(),
            ]
        };
        let push_byte = |value: usize| vec![format!("mov al, {value}"), "call mccpu_push".to_string()];

        match inst.op {
            OpKind::NOP => vec!["nop".to_string()],
            OpKind::MOV => via_al(reg(b), "mov", reg(a)),
            OpKind::LDI => vec![format!("mov byte {}, {b}", reg(a))],
            OpKind::LD => via_al(format!("[memory + {b}]"), "mov", reg(a)),
            OpKind::ST => via_al(reg(b), "mov", format!("[memory + {a}]")),
            OpKind::LDP => {
                let mut v = pointer(b);
                v.push("mov al, [rcx + rdx]".to_string());
                v.push(format!("mov {}, al", reg(a)));
                v
            }
            OpKind::STP => {
                let mut v = pointer(a);
                v.push(format!("mov al, {}", reg(b)));
                v.push("mov [rcx + rdx], al".to_string());
                v
            }
            OpKind::ADD => via_al(reg(b), "add", reg(a)),
            OpKind::ADDI => vec![format!("add byte {}, {b}", reg(a))],
            OpKind::SUB => via_al(reg(b), "sub", reg(a)),
            OpKind::SUBI => vec![format!("sub byte {}, {b}", reg(a))],
            OpKind::AND => via_al(reg(b), "and", reg(a)),
            OpKind::OR => via_al(reg(b), "or", reg(a)),
            OpKind::XOR => via_al(reg(b), "xor", reg(a)),
            OpKind::NOT => vec![format!("not byte {}", reg(a))],
            OpKind::SHL => vec![format!("shl byte {}, 1", reg(a))],
            OpKind::SHR => vec![format!("shr byte {}, 1", reg(a))],
            OpKind::INC => vec![format!("inc byte {}", reg(a))],
            OpKind::DEC => vec![format!("dec byte {}", reg(a))],
            OpKind::JMP => vec![format!("jmp {}", Self::label(a, rom_size))],
            OpKind::JZ => vec![
                format!("cmp byte {}, 0", reg(a)),
                format!("je {}", Self::label(b, rom_size)),
            ],
            OpKind::JNZ => vec![
                format!("cmp byte {}, 0", reg(a)),
                format!("jne {}", Self::label(b, rom_size)),
            ],
            OpKind::PUSH => vec![format!("mov al, {}", reg(a)), "call mccpu_push".to_string()],
            OpKind::POP => vec!["call mccpu_pop".to_string(), format!("mov {}, al", reg(a))],
            OpKind::CALL => {
                let ret = pc + 1;
                let mut v = push_byte(ret & 0xff);
                v.extend(push_byte((ret >> 8) & 0xff));
                v.push(format!("jmp {}", Self::label(a, rom_size)));
                v
            }
            OpKind::RET => vec![
                "call mccpu_pop".to_string(),
                "movzx ebx, al".to_string(),
                "shl ebx, 8".to_string(),
                "call mccpu_pop".to_string(),
                "or bl, al".to_string(),
                "jmp mccpu_dispatch".to_string(),
            ],
            OpKind::OUT => vec![
                format!("movzx edi, byte {}", reg(a)),
                "call mccpu_out".to_string(),
            ],
            OpKind::HLT => vec!["jmp mccpu_end".to_string()],
        }
    }

    pub fn code(program: &Program) -> String {
        let rom_size = program.rom.len();
        let mut out = vec![];
        for (pc, inst) in program.rom.iter().enumerate() {
            match program.source.get(pc) {
                Some(src) => out.push(format!("mccpu_{pc}: ; {src}")),
                None => out.push(format!("mccpu_{pc}:")),
            }
            out.extend(Self::asm(inst, pc, rom_size).into_iter().map(|l| format!("    {l}")));
        }
        out.push("    jmp mccpu_end".to_string());
        out.push(String::new());
        out.push(format!("ROM_SIZE equ {rom_size}"));
        out.push(String::new());
        out.push("section .data".to_string());
        out.push("rom_table:".to_string());
        let labels: Vec<String> = (0..rom_size).map(|pc| format!("mccpu_{pc}")).collect();
        for chunk in labels.chunks(8) {
            out.push(format!("    dq {}", chunk.join(", ")));
        }
        // template text after %code stays in .text
        out.push(String::new());
        out.push("section .text".to_string());
        out.join("\n")
    }
}

impl LanguageTarget for Nasm {
    fn id(&self) -> &'static str {
        "nasm-x64"
    }

    fn extension(&self) -> &'static str {
        "asm"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["nasm"]
    }

    fn transpile(&self, program: &Program, args: &CompilerArgs) -> Result<String, Error> {
        let template = Template::load("nasm-x64.asm", args.template_dir.as_deref())?;
        Ok(template.render(&Values::new(args, Self::code(program))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jumps_past_rom_end_stop() {
        let jmp = Nasm::asm(&RomInst::new(OpKind::JMP, 5, 0), 0, 5);
        assert_eq!(jmp, vec!["jmp mccpu_end"]);
        let jz = Nasm::asm(&RomInst::new(OpKind::JZ, 1, 2), 0, 5);
        assert_eq!(jz, vec!["cmp byte [registers + 1], 0", "je mccpu_2"]);
    }

    #[test]
    fn call_pushes_return_address() {
        let call = Nasm::asm(&RomInst::new(OpKind::CALL, 0, 0), 300, 400);
        assert_eq!(call[0], "mov al, 45");
        assert_eq!(call[2], "mov al, 1");
        assert_eq!(call[4], "jmp mccpu_0");
    }
}
