use crate::{
    config::CompilerArgs,
    msg::{Msg, Pos, Report},
    source::Line,
};
use arch::{num::parse_with_prefix, operand::is_ident};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Directive

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    /// Variable names listed until `#end`.
    Static,
    /// Variables discovered from the code.
    StaticAuto,
    /// `name address` pairs until `#end`.
    Explicit,
}

impl LayoutKind {
    pub fn parse(rest: &str) -> Result<Self, String> {
        let words: Vec<&str> = rest.split_whitespace().collect();
        if words.contains(&"explicit") {
            Ok(LayoutKind::Explicit)
        } else if words.contains(&"static") && words.contains(&"auto") {
            Ok(LayoutKind::StaticAuto)
        } else if words.contains(&"static") {
            Ok(LayoutKind::Static)
        } else {
            Err(format!(
                "#memorylayout `{rest}` has no valid layout type [static / static auto / explicit]"
            ))
        }
    }

    /// Layouts followed by a declaration block closed by `#end`.
    pub fn has_block(&self) -> bool {
        matches!(self, LayoutKind::Static | LayoutKind::Explicit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Balance {
    Incremental,
    Balanced,
}

impl Balance {
    fn parse(rest: &str) -> Option<Self> {
        let words: Vec<&str> = rest.split_whitespace().collect();
        if words.contains(&"balanced") {
            Some(Balance::Balanced)
        } else if words.contains(&"incremental") {
            Some(Balance::Incremental)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub name: String,
    pub addr: Option<usize>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub kind: LayoutKind,
    pub balance: Balance,
    pub decls: Vec<Decl>,
    pub pos: Option<Pos>,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            kind: LayoutKind::StaticAuto,
            balance: Balance::Incremental,
            decls: vec![],
            pos: None,
        }
    }
}

/// Find the `#memorylayout` directive of the main file and read its declaration block.
pub fn find_layout(lines: &[Line], report: &mut Report) -> Layout {
    let mut layout: Option<Layout> = None;
    let mut iter = lines.iter();
    let mut in_macro = false;
    while let Some(line) = iter.next() {
        let rest = match line.directive() {
            Some(("macro", _)) => {
                in_macro = true;
                continue;
            }
            Some(("endmacro", _)) => {
                in_macro = false;
                continue;
            }
            Some(("memorylayout", rest)) if !in_macro => rest,
            _ => continue,
        };
        let kind = match LayoutKind::parse(rest) {
            Ok(kind) => kind,
            Err(e) => {
                report.push(
                    Msg::warn(e)
                        .at(line.pos())
                        .note("continuing search for other #memorylayout sections", None),
                );
                continue;
            }
        };
        let balance = match (kind, Balance::parse(rest)) {
            (LayoutKind::Explicit, _) => Balance::Incremental,
            (_, Some(balance)) => balance,
            (_, None) => {
                report.push(
                    Msg::warn("#memorylayout has no balancing type [incremental / balanced], defaulting to incremental")
                        .at(line.pos()),
                );
                Balance::Incremental
            }
        };

        let mut block = vec![];
        if kind.has_block() {
            let mut closed = false;
            for inner in iter.by_ref() {
                if let Some(("end", _)) = inner.directive() {
                    closed = true;
                    break;
                }
                block.push(inner);
            }
            if !closed {
                report.push(Msg::error("Expected #end after #memorylayout block").at(line.pos()));
            }
        }

        if let Some(first) = &layout {
            report.push(
                Msg::warn("Only one #memorylayout is used, this one is ignored")
                    .at(line.pos())
                    .note("first #memorylayout is here", first.pos.clone()),
            );
            continue;
        }
        layout = Some(Layout {
            kind,
            balance,
            decls: read_decls(kind, &block, report),
            pos: Some(line.pos()),
        });
    }

    layout.unwrap_or_else(|| {
        report.push(Msg::warn(
            "No #memorylayout found, defaulting to static auto incremental",
        ));
        Layout::default()
    })
}

fn read_decls(kind: LayoutKind, block: &[&Line], report: &mut Report) -> Vec<Decl> {
    let mut decls: Vec<Decl> = vec![];
    for line in block {
        if line.code.is_empty() {
            continue;
        }
        let words: Vec<&str> = line.code.split_whitespace().collect();
        let (name, addr) = match (kind, words.as_slice()) {
            (LayoutKind::Static, [name]) => (name.trim_start_matches('*'), None),
            (LayoutKind::Explicit, [name, addr]) => {
                let addr = addr.trim_start_matches('$');
                match parse_with_prefix(addr) {
                    Ok(a) if a >= 0 => (name.trim_start_matches('*'), Some(a as usize)),
                    _ => {
                        report.push(
                            Msg::error(format!("Invalid address `{addr}` for variable `{name}`"))
                                .at(line.pos()),
                        );
                        continue;
                    }
                }
            }
            (LayoutKind::Explicit, _) => {
                report.push(Msg::error("Expected `name address`").at(line.pos()));
                continue;
            }
            _ => {
                report.push(Msg::error("Expected a single variable name").at(line.pos()));
                continue;
            }
        };
        if !is_ident(name) {
            report.push(Msg::error(format!("Invalid variable name `{name}`")).at(line.pos()));
            continue;
        }
        if let Some(prev) = decls.iter().find(|d| d.name == name) {
            report.push(
                Msg::warn(format!("Variable `{name}` is declared twice"))
                    .at(line.pos())
                    .note("first declared here", Some(prev.pos.clone())),
            );
            continue;
        }
        decls.push(Decl {
            name: name.to_string(),
            addr,
            pos: line.pos(),
        });
    }
    decls
}

// ----------------------------------------------------------------------------
// Variable usage

static VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([a-z_][a-z0-9_.]*)").unwrap());

/// Variables referenced by `*name`, in first-use order.
pub fn used_variables(lines: &[Line]) -> IndexMap<String, Pos> {
    let mut used = IndexMap::new();
    for line in lines {
        for cap in VARIABLE.captures_iter(&line.code) {
            used.entry(cap[1].to_string()).or_insert_with(|| line.pos());
        }
    }
    used
}

// ----------------------------------------------------------------------------
// Allocator

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocError {
    #[error("`{0}` at address {1} is outside of memory [0, {2}]")]
    OutOfRange(String, usize, usize),

    #[error("`{0}` at address {1} overlaps `{2}`")]
    Overlapped(String, usize, String),

    #[error("Out of memory: no free address for `{0}` in [{1}, {2}]")]
    Full(String, usize, usize),
}

#[derive(Debug, Clone)]
struct Section {
    begin: usize,
    end: usize,
    name: Option<String>, // None means free
}

impl Section {
    fn new(begin: usize, end: usize, name: Option<String>) -> Self {
        Self { begin, end, name }
    }

    fn contains(&self, addr: usize) -> bool {
        self.begin <= addr && addr <= self.end
    }

    fn split(&self, addr: usize, name: &str) -> Vec<Self> {
        let mut result = Vec::new();
        if addr > self.begin {
            result.push(Section::new(self.begin, addr - 1, None));
        }
        result.push(Section::new(addr, addr, Some(name.to_string())));
        if addr < self.end {
            result.push(Section::new(addr + 1, self.end, None));
        }
        result
    }
}

/// One byte per variable over `[0, size)`.
pub struct Allocator {
    map: Vec<Section>,
    end: usize,
}

impl Allocator {
    pub fn new(size: usize) -> Self {
        let end = size.saturating_sub(1);
        Self {
            map: vec![Section::new(0, end, None)],
            end,
        }
    }

    /// Allocate at a fixed address.
    pub fn allocate(&mut self, addr: usize, name: &str) -> Result<(), AllocError> {
        let Some(i) = self.map.iter().position(|s| s.contains(addr)) else {
            return Err(AllocError::OutOfRange(name.to_string(), addr, self.end));
        };
        let section = &self.map[i];
        if let Some(owner) = &section.name {
            return Err(AllocError::Overlapped(name.to_string(), addr, owner.clone()));
        }
        let parts = section.split(addr, name);
        self.map.splice(i..=i, parts);
        Ok(())
    }

    /// Allocate the first free address within `[start, end]`.
    pub fn section(&mut self, start: usize, end: usize, name: &str) -> Result<usize, AllocError> {
        let found = self
            .map
            .iter()
            .filter(|s| s.name.is_none())
            .map(|s| (s.begin.max(start), s.end.min(end)))
            .find(|(begin, end)| begin <= end);
        match found {
            Some((addr, _)) => {
                self.allocate(addr, name)?;
                Ok(addr)
            }
            None => Err(AllocError::Full(name.to_string(), start, end)),
        }
    }
}

// ----------------------------------------------------------------------------
// Layout

/// Assign an address to every variable of the program.
pub fn allocate(
    layout: &Layout,
    code: &[Line],
    args: &CompilerArgs,
    report: &mut Report,
) -> IndexMap<String, u16> {
    let used = used_variables(code);
    let mut alloc = Allocator::new(args.memory_size);
    let mut vars = IndexMap::new();

    if layout.kind == LayoutKind::Explicit {
        for decl in &layout.decls {
            let Some(addr) = decl.addr else { continue };
            match alloc.allocate(addr, &decl.name) {
                Ok(()) => {
                    vars.insert(decl.name.clone(), addr as u16);
                }
                Err(e) => report.push(Msg::error(e.to_string()).at(decl.pos.clone())),
            }
        }
    } else {
        let names: Vec<(&str, Option<&Pos>)> = match layout.kind {
            LayoutKind::StaticAuto => used.iter().map(|(n, p)| (n.as_str(), Some(p))).collect(),
            _ => layout
                .decls
                .iter()
                .map(|d| (d.name.as_str(), Some(&d.pos)))
                .collect(),
        };
        let banks = args.memory_blocks.max(1);
        let bank_size = args.memory_size / banks;
        for (i, (name, pos)) in names.into_iter().enumerate() {
            let result = match layout.balance {
                Balance::Incremental => alloc.section(0, alloc.end, name),
                Balance::Balanced => {
                    let bank = i % banks;
                    let start = bank * bank_size;
                    let end = if bank + 1 == banks {
                        alloc.end
                    } else {
                        start + bank_size - 1
                    };
                    alloc
                        .section(start, end, name)
                        .or_else(|_| alloc.section(0, alloc.end, name))
                }
            };
            match result {
                Ok(addr) => {
                    vars.insert(name.to_string(), addr as u16);
                }
                Err(e) => {
                    let mut msg = Msg::error(e.to_string());
                    if let Some(pos) = pos {
                        msg = msg.at(pos.clone());
                    }
                    report.push(msg);
                }
            }
        }
    }

    if layout.kind != LayoutKind::StaticAuto {
        for (name, pos) in &used {
            if !layout.decls.iter().any(|d| &d.name == name) {
                report.push(
                    Msg::error(format!("Variable `{name}` is used but not declared"))
                        .at(pos.clone())
                        .note("declared variables are listed in #memorylayout", layout.pos.clone()),
                );
            }
        }
        for decl in &layout.decls {
            if !used.contains_key(&decl.name) {
                report.push(
                    Msg::info(format!("Variable `{}` is declared but never used", decl.name))
                        .at(decl.pos.clone()),
                );
            }
        }
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{macros::copy_lines_exclude_compiler_instructions, msg::Level, source::parse_lines};

    fn run(src: &str, args: &CompilerArgs) -> (IndexMap<String, u16>, Report) {
        let lines = parse_lines("main.mccpu", src);
        let mut report = Report::new();
        let layout = find_layout(&lines, &mut report);
        let code = copy_lines_exclude_compiler_instructions(&lines);
        let vars = allocate(&layout, &code, args, &mut report);
        (vars, report)
    }

    #[test]
    fn directive_kinds() {
        assert_eq!(LayoutKind::parse("static auto balanced"), Ok(LayoutKind::StaticAuto));
        assert_eq!(LayoutKind::parse("static incremental"), Ok(LayoutKind::Static));
        assert_eq!(LayoutKind::parse("explicit"), Ok(LayoutKind::Explicit));
        assert!(LayoutKind::parse("dynamic").is_err());
        assert_eq!(Balance::parse("static balanced"), Some(Balance::Balanced));
        assert_eq!(Balance::parse("static"), None);
    }

    #[test]
    fn default_layout_warns() {
        let (vars, report) = run("mov &r1, *a\nmov *b, &r1\nmov &r2, *a", &CompilerArgs::default());
        assert_eq!(report.count(Level::Warning), 1);
        assert_eq!(vars["a"], 0);
        assert_eq!(vars["b"], 1);
    }

    #[test]
    fn static_incremental() {
        let src = "#memorylayout static incremental\nb\na\n#end\nmov &r1, *a\nmov *b, &r1";
        let (vars, report) = run(src, &CompilerArgs::default());
        assert!(report.is_empty(), "{report}");
        assert_eq!(vars.iter().map(|(k, v)| (k.as_str(), *v)).collect::<Vec<_>>(), vec![("b", 0), ("a", 1)]);
    }

    #[test]
    fn static_auto_balanced() {
        let src = "#memorylayout static auto balanced\nmov &r1, *a\nmov &r1, *b\nmov &r1, *c";
        let mut args = CompilerArgs::default();
        args.memory_size = 16;
        args.memory_blocks = 2;
        let (vars, report) = run(src, &args);
        assert!(report.is_empty(), "{report}");
        assert_eq!(vars["a"], 0);
        assert_eq!(vars["b"], 8);
        assert_eq!(vars["c"], 1);
    }

    #[test]
    fn balanced_falls_back_when_bank_is_full() {
        let src = "#memorylayout static auto balanced\nmov &r1, *a\nmov &r1, *b\nmov &r1, *c";
        let mut args = CompilerArgs::default();
        args.memory_size = 3;
        args.memory_blocks = 2;
        let (vars, report) = run(src, &args);
        assert!(!report.has_error(), "{report}");
        assert_eq!(vars.values().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn explicit_addresses() {
        let src = "#memorylayout explicit\nx 0x10\ny $3\n#end\nmov &r1, *x\nmov *y, &r1";
        let (vars, report) = run(src, &CompilerArgs::default());
        assert!(report.is_empty(), "{report}");
        assert_eq!(vars["x"], 16);
        assert_eq!(vars["y"], 3);
    }

    #[test]
    fn explicit_conflicts() {
        let src = "#memorylayout explicit\nx 1\ny 1\nz 999\n#end\nmov &r1, *x\nmov &r1, *y\nmov &r1, *z";
        let (_, report) = run(src, &CompilerArgs::default());
        assert_eq!(report.count(Level::Error), 2);
    }

    #[test]
    fn undeclared_variable() {
        let src = "#memorylayout static incremental\na\n#end\nmov &r1, *a\nmov &r1, *missing";
        let (_, report) = run(src, &CompilerArgs::default());
        assert_eq!(report.count(Level::Error), 1);
    }

    #[test]
    fn out_of_memory() {
        let mut args = CompilerArgs::default();
        args.memory_size = 2;
        args.memory_blocks = 1;
        let (vars, report) = run(
            "#memorylayout static auto incremental\nmov &r1, *a\nmov &r1, *b\nmov &r1, *c",
            &args,
        );
        assert_eq!(vars.len(), 2);
        assert!(report.has_error());
    }

    #[test]
    fn invalid_layout_keeps_searching() {
        let src = "#memorylayout dynamic\n#memorylayout static incremental\nb\na\n#end\nmov &r1, *a\nmov *b, &r1";
        let (vars, report) = run(src, &CompilerArgs::default());
        assert_eq!(report.count(Level::Warning), 1);
        assert_eq!(report.msgs()[0].pos.as_ref().map(|p| p.line), Some(1));
        assert_eq!(report.msgs()[0].notes.len(), 1);
        assert_eq!(vars["b"], 0);
        assert_eq!(vars["a"], 1);
    }

    #[test]
    fn only_first_layout_is_used() {
        let src = "\
#memorylayout explicit
x 5
#end
#memorylayout static incremental
x
#end
mov &r1, *x";
        let (vars, report) = run(src, &CompilerArgs::default());
        assert_eq!(report.count(Level::Warning), 1);
        assert_eq!(report.msgs()[0].pos.as_ref().map(|p| p.line), Some(4));
        assert_eq!(report.msgs()[0].notes[0].pos.as_ref().map(|p| p.line), Some(1));
        assert_eq!(vars["x"], 5);
    }

    #[test]
    fn missing_end() {
        let (_, report) = run("#memorylayout static incremental\na\nb", &CompilerArgs::default());
        assert!(report.has_error());
    }

    #[test]
    fn allocator_split() {
        let mut alloc = Allocator::new(8);
        alloc.allocate(3, "x").unwrap();
        assert_eq!(alloc.section(0, 7, "a"), Ok(0));
        assert_eq!(alloc.section(3, 7, "b"), Ok(4));
        assert_eq!(
            alloc.allocate(3, "y"),
            Err(AllocError::Overlapped("y".into(), 3, "x".into()))
        );
        assert!(matches!(alloc.allocate(8, "z"), Err(AllocError::OutOfRange(..))));
    }
}
