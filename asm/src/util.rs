use crate::{compile::Program, parser::Stmt};
use color_print::cformat;

pub fn print_dump(program: &Program) {
    let mut rom = program.rom.iter();
    let mut current = String::new();
    for parsed in &program.parsed {
        let line = &parsed.line;
        // Print file header when the file changes
        if line.path != current {
            current = line.path.clone();
            println!(
                "{}+------[{}]{}",
                "-".repeat(19),
                current,
                "-".repeat(45usize.saturating_sub(current.len()))
            );
        }

        let comment_str = line
            .comment
            .as_ref()
            .map(|s| cformat!("<dim>// {}</>", s))
            .unwrap_or_default();

        let body = match &parsed.stmt {
            None => format!("{:19}| {:>4}: {}", "", line.no(), comment_str),
            Some(Stmt::Label(key)) => {
                let label = cformat!("<g>{}:</>", key);
                format!("{:19}| {:>4}: {} {}", "", line.no(), label, comment_str)
            }
            Some(Stmt::Inst(inst)) => {
                let bin_str = match rom.next() {
                    Some(r) => {
                        let [op, a, b] = r.to_words();
                        format!("{:02X} {:04X} {:04X}", op, a, b)
                    }
                    None => cformat!("<r,s>!! !!!! !!!!</>"),
                };
                let pc_str = parsed
                    .pc
                    .map(|pc| format!("{:04X}", pc))
                    .unwrap_or_else(|| "????".to_string());
                format!(
                    "[{}] {} | {:>4}: {} {}",
                    pc_str,
                    bin_str,
                    line.no(),
                    inst.cformat(),
                    comment_str
                )
            }
        };
        println!("{}", body);
    }
    println!("-------------------+-----------------------------------------------------");

    if !program.variables.is_empty() {
        for (name, addr) in &program.variables {
            println!("{}", cformat!("{:19}| <c>${:04X} *{}</>", "", addr, name));
        }
        println!("-------------------+-----------------------------------------------------");
    }
}
