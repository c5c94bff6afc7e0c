use crate::{
    config::CompilerArgs,
    error::Error,
    label::Labels,
    macros::{copy_lines_exclude_compiler_instructions, load_macros, resolve_macros},
    memory::{allocate, find_layout},
    msg::{Level, Msg, Report},
    parser::{parse_program, Parsed, Stmt},
    source::{self, collect_includes, parse_lines, Line},
    target,
};
use arch::{
    inst::{Inst, RomInst},
    operand::Operand,
};
use indexmap::IndexMap;
use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

const DIRECTIVES: &[&str] = &["macro", "endmacro", "includemacrofile", "memorylayout", "end"];

// ----------------------------------------------------------------------------
// Program

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RomEntry {
    Label(String),
    Inst(RomInst),
}

impl Display for RomEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RomEntry::Label(name) => write!(f, "{name}:"),
            RomEntry::Inst(inst) => write!(f, "{inst}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    /// Native lines with labels and variables replaced by numbers.
    pub lines: Vec<String>,
    /// Code lines with label definitions and comments.
    pub listing: Vec<String>,
    pub rom: Vec<RomInst>,
    pub rom_with_labels: Vec<RomEntry>,
    pub variables: IndexMap<String, u16>,
    pub labels: Labels,
    /// Instruction text per ROM index, before resolution.
    pub source: Vec<String>,
    pub parsed: Vec<Parsed>,
}

#[derive(Debug)]
pub struct Compilation {
    pub report: Report,
    /// `None` when compilation stopped or produced errors.
    pub program: Option<Program>,
}

impl Compilation {
    /// Process exit code: 1 when the exit level was reached or no program was produced.
    pub fn exit_code(&self, exit_level: Level) -> i32 {
        if self.report.reached(exit_level) || self.program.is_none() {
            1
        } else {
            0
        }
    }
}

// ----------------------------------------------------------------------------
// Pipeline

pub fn compile_file(path: &Path, args: &CompilerArgs) -> Result<Compilation, Error> {
    let lines = source::load(path)?;
    compile_lines(path, lines, args)
}

/// Compile `text` as if it was read from `name`. Includes resolve relative to `name`.
pub fn compile_str(name: &str, text: &str, args: &CompilerArgs) -> Result<Compilation, Error> {
    compile_lines(Path::new(name), parse_lines(name, text), args)
}

pub fn compile_lines(path: &Path, main: Vec<Line>, args: &CompilerArgs) -> Result<Compilation, Error> {
    args.validate()?;
    let mut report = Report::new();

    macro_rules! checkpoint {
        () => {
            if report.reached(args.exit_level) {
                return Ok(Compilation {
                    report,
                    program: None,
                });
            }
        };
    }

    check_directives(&main, &mut report);

    let includes = collect_includes(path, &main, &mut report)?;
    checkpoint!();

    let mut macros = IndexMap::new();
    for lines in includes.values() {
        load_macros(&mut macros, lines, &mut report);
    }
    load_macros(&mut macros, &main, &mut report);
    checkpoint!();

    let code = copy_lines_exclude_compiler_instructions(&main);
    let code = resolve_macros(code, &macros, &mut report);
    checkpoint!();

    let layout = find_layout(&main, &mut report);
    let variables = allocate(&layout, &code, args, &mut report);
    checkpoint!();

    let (parsed, labels) = parse_program(&code, &mut report);
    checkpoint!();

    let program = build(parsed, labels, variables, args, &mut report);
    checkpoint!();

    let program = if report.has_error() {
        None
    } else {
        Some(program)
    };
    Ok(Compilation { report, program })
}

fn check_directives(lines: &[Line], report: &mut Report) {
    for line in lines {
        match line.directive() {
            Some(("macrogenerator", _)) => report.push(
                Msg::warn("#macrogenerator is not supported, the directive is ignored")
                    .at(line.pos()),
            ),
            Some((name, _)) if !DIRECTIVES.contains(&name) => report.push(
                Msg::warn(format!("Unknown directive `#{name}` is ignored")).at(line.pos()),
            ),
            _ => {}
        }
    }
}

struct Resolver<'a> {
    args: &'a CompilerArgs,
    labels: &'a Labels,
    variables: &'a IndexMap<String, u16>,
}

impl Resolver<'_> {
    fn value(&self, operand: &Operand) -> Result<u16, String> {
        match operand {
            Operand::Reg(r) | Operand::RegPtr(r) => {
                if r.index() >= self.args.register_count {
                    return Err(format!(
                        "Register {r} does not exist, register count is {}",
                        self.args.register_count
                    ));
                }
                Ok((*r).into())
            }
            Operand::Var(name) => self
                .variables
                .get(name)
                .copied()
                .ok_or_else(|| format!("Variable `{name}` has no address")),
            Operand::Addr(a) => {
                if *a < 0 || *a as usize >= self.args.memory_size {
                    return Err(format!(
                        "Address {a} is outside of memory, memory size is {}",
                        self.args.memory_size
                    ));
                }
                Ok(*a as u16)
            }
            Operand::Num(n) => {
                if !(-128..=255).contains(n) {
                    return Err(format!("Number {n} does not fit in a byte"));
                }
                Ok((*n & 0xff) as u16)
            }
            Operand::Label(name) => self
                .labels
                .get(name)
                .ok_or_else(|| format!("Undefined label `{name}`")),
            Operand::Str(_) => Err("Strings can only be used as macro arguments".to_string()),
        }
    }

    /// The instruction with variables as `$addr` and labels as ROM indices.
    fn native(&self, inst: &Inst) -> String {
        let args: Vec<String> = inst
            .args
            .iter()
            .map(|arg| match arg {
                Operand::Var(name) => match self.variables.get(name) {
                    Some(addr) => format!("${addr}"),
                    None => arg.to_string(),
                },
                Operand::Label(name) => match self.labels.get(name) {
                    Some(pc) => pc.to_string(),
                    None => arg.to_string(),
                },
                _ => arg.to_string(),
            })
            .collect();
        if args.is_empty() {
            inst.op.mnemonic().to_string()
        } else {
            format!("{} {}", inst.op.mnemonic(), args.join(", "))
        }
    }
}

fn build(
    parsed: Vec<Parsed>,
    labels: Labels,
    variables: IndexMap<String, u16>,
    args: &CompilerArgs,
    report: &mut Report,
) -> Program {
    let resolver = Resolver {
        args,
        labels: &labels,
        variables: &variables,
    };
    let mut lines = vec![];
    let mut listing = vec![];
    let mut rom = vec![];
    let mut rom_with_labels = vec![];
    let mut source = vec![];

    for p in &parsed {
        let comment = p.line.comment.as_deref().filter(|c| !c.is_empty());
        let code = match &p.stmt {
            Some(Stmt::Label(name)) => {
                rom_with_labels.push(RomEntry::Label(name.clone()));
                Some(format!("{name}:"))
            }
            Some(Stmt::Inst(inst)) => {
                match inst.resolve(|arg| resolver.value(arg)) {
                    Ok(r) => {
                        rom.push(r);
                        rom_with_labels.push(RomEntry::Inst(r));
                        lines.push(resolver.native(inst));
                        source.push(inst.to_string());
                    }
                    Err(e) => report.push(Msg::error(e).at(p.line.pos())),
                }
                Some(inst.to_string())
            }
            None => None,
        };
        match (code, comment) {
            (Some(code), Some(c)) => listing.push(format!("{code} // {c}")),
            (Some(code), None) => listing.push(code),
            (None, Some(c)) => listing.push(format!("// {c}")),
            (None, None) => {}
        }
    }

    Program {
        lines,
        listing,
        rom,
        rom_with_labels,
        variables,
        labels,
        source,
        parsed,
    }
}

// ----------------------------------------------------------------------------
// Output

/// `<out_file>.<ext>`
pub fn output_path(out_file: &Path, ext: &str) -> PathBuf {
    let mut path = out_file.as_os_str().to_owned();
    path.push(".");
    path.push(ext);
    PathBuf::from(path)
}

/// Render the program with the configured target and write it next to `out_file`.
pub fn emit(program: &Program, args: &CompilerArgs) -> Result<PathBuf, Error> {
    let target = target::find(&args.target)?;
    let text = target.transpile(program, args)?;
    let path = output_path(&args.out_file, target.extension());
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::FileCreate(dir.display().to_string(), e))?;
    }
    std::fs::write(&path, text).map_err(|e| Error::FileWrite(path.display().to_string(), e))?;
    Ok(path)
}
