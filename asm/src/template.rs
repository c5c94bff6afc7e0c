use crate::{config::CompilerArgs, error::Error};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::Path;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"%([a-z_]+)").unwrap());

const BUILTIN: &[(&str, &str)] = &[
    ("C.c", include_str!("../templates/C.c")),
    ("CSharp.cs", include_str!("../templates/CSharp.cs")),
    ("nasm-x64.asm", include_str!("../templates/nasm-x64.asm")),
];

/// Values substituted into a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Values {
    pub memory_size: usize,
    pub stack_size: usize,
    pub register_count: usize,
    pub code: String,
}

impl Values {
    pub fn new(args: &CompilerArgs, code: String) -> Self {
        Values {
            memory_size: args.memory_size,
            stack_size: args.stack_size,
            register_count: args.register_count,
            code,
        }
    }

    fn get(&self, name: &str) -> Option<String> {
        match name {
            "memory_size" => Some(self.memory_size.to_string()),
            "stack_size" => Some(self.stack_size.to_string()),
            "register_count" => Some(self.register_count.to_string()),
            "code" => Some(self.code.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub text: String,
}

impl Template {
    pub fn new(name: &str, text: &str) -> Result<Self, Error> {
        let has_code = PLACEHOLDER
            .captures_iter(text)
            .any(|cap| &cap[1] == "code");
        if !has_code {
            return Err(Error::TemplateWithoutCode(name.to_string()));
        }
        Ok(Template {
            name: name.to_string(),
            text: text.to_string(),
        })
    }

    pub fn builtin(file: &str) -> Option<&'static str> {
        BUILTIN
            .iter()
            .find(|(name, _)| *name == file)
            .map(|(_, text)| *text)
    }

    /// `template_dir/file` when it exists, the built-in template otherwise.
    pub fn load(file: &str, template_dir: Option<&Path>) -> Result<Self, Error> {
        if let Some(path) = template_dir.map(|dir| dir.join(file)).filter(|p| p.is_file()) {
            let name = path.display().to_string();
            let text = std::fs::read_to_string(&path).map_err(|e| Error::FileOpen(name.clone(), e))?;
            return Self::new(&name, &text);
        }
        match Self::builtin(file) {
            Some(text) => Self::new(file, text),
            None => Err(Error::InvalidArgument(format!("no template named `{file}`"))),
        }
    }

    /// Replace the known placeholders in one pass. Multi-line values keep the
    /// indentation of the placeholder's line.
    pub fn render(&self, values: &Values) -> String {
        let mut out = String::with_capacity(self.text.len() + values.code.len());
        for line in self.text.split_inclusive('\n') {
            let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
            let replaced = PLACEHOLDER.replace_all(line, |cap: &Captures| match values.get(&cap[1]) {
                Some(value) => value.replace('\n', &format!("\n{indent}")),
                None => cap[0].to_string(),
            });
            out.push_str(&replaced);
        }
        out
    }
}
