use crate::{compile::Program, config::CompilerArgs, error::Error};

pub mod clike;
pub mod mccpu;
pub mod nasm;

/// Output language of a compilation.
pub trait LanguageTarget {
    fn id(&self) -> &'static str;
    fn extension(&self) -> &'static str;
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }
    fn transpile(&self, program: &Program, args: &CompilerArgs) -> Result<String, Error>;
}

pub fn targets() -> Vec<Box<dyn LanguageTarget>> {
    vec![
        Box::new(mccpu::Mccpu),
        Box::new(mccpu::MccpuAll),
        Box::new(clike::CLike::c()),
        Box::new(clike::CLike::csharp()),
        Box::new(nasm::Nasm),
    ]
}

pub fn ids() -> Vec<&'static str> {
    targets().iter().map(|t| t.id()).collect()
}

/// Look up a target by id or alias, ignoring case.
pub fn find(id: &str) -> Result<Box<dyn LanguageTarget>, Error> {
    let key = id.trim().to_lowercase();
    targets()
        .into_iter()
        .find(|t| t.id() == key || t.aliases().contains(&key.as_str()))
        .ok_or_else(|| Error::UnknownTarget(id.to_string(), ids().join(", ")))
}

/// `/* */` safe text.
pub(crate) fn block_comment(text: &str) -> String {
    text.replace("*/", "* /")
}
