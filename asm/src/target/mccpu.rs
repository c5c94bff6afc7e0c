use super::LanguageTarget;
use crate::{
    compile::Program,
    config::CompilerArgs,
    error::Error,
};

/// Resolved native lines.
pub struct Mccpu;

impl LanguageTarget for Mccpu {
    fn id(&self) -> &'static str {
        "mccpu"
    }

    fn extension(&self) -> &'static str {
        "mccpu"
    }

    fn transpile(&self, program: &Program, _args: &CompilerArgs) -> Result<String, Error> {
        let mut out = String::new();
        for line in &program.lines {
            out.push_str(line);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Listing followed by the ROM, with and without labels.
pub struct MccpuAll;

impl LanguageTarget for MccpuAll {
    fn id(&self) -> &'static str {
        "mccpuall"
    }

    fn extension(&self) -> &'static str {
        "mccpu"
    }

    fn transpile(&self, program: &Program, _args: &CompilerArgs) -> Result<String, Error> {
        let mut out = vec![];
        out.extend(program.listing.iter().cloned());
        out.push("// ROM Instructions".to_string());
        out.extend(program.rom.iter().map(|inst| format!("// {inst}")));
        out.push("// ROM Instructions LBL".to_string());
        out.extend(program.rom_with_labels.iter().map(|entry| format!("// {entry}")));
        let mut text = out.join("\n");
        text.push('\n');
        Ok(text)
    }
}
