use crate::{
    error::Error,
    msg::{Msg, Pos, Report},
};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

// ----------------------------------------------------------------------------
// Line

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub path: String,
    pub idx: usize,
    pub raw: String,
    /// Lowercased text before `//`, trimmed.
    pub code: String,
    pub comment: Option<String>,
}

impl Line {
    pub fn new(path: &str, idx: usize, raw: &str) -> Self {
        let (code, comment) = match raw.split_once("//") {
            Some((code, comment)) => (code, Some(comment.trim().to_string())),
            None => (raw, None),
        };
        Line {
            path: path.to_string(),
            idx,
            raw: raw.to_string(),
            code: code.trim().to_lowercase(),
            comment,
        }
    }

    /// Line produced by a macro expansion of `self`.
    pub fn expanded(&self, code: String) -> Self {
        Line {
            path: self.path.clone(),
            idx: self.idx,
            raw: self.raw.clone(),
            code,
            comment: None,
        }
    }

    pub fn pos(&self) -> Pos {
        Pos {
            file: self.path.clone(),
            line: self.idx + 1,
            raw: self.raw.clone(),
        }
    }

    pub fn no(&self) -> usize {
        self.idx + 1
    }

    /// `#name rest` split into (`name`, `rest`).
    pub fn directive(&self) -> Option<(&str, &str)> {
        let body = self.code.strip_prefix('#')?.trim_start();
        Some(match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        })
    }
}

pub fn parse_lines(path: &str, text: &str) -> Vec<Line> {
    text.lines()
        .enumerate()
        .map(|(idx, raw)| Line::new(path, idx, raw))
        .collect()
}

pub fn load(path: &Path) -> Result<Vec<Line>, Error> {
    let name = path.display().to_string();
    let file = File::open(path).map_err(|e| Error::FileOpen(name.clone(), e))?;
    let mut lines = vec![];
    for (idx, raw) in BufReader::new(file).lines().enumerate() {
        let raw = raw.map_err(|e| Error::FileRead(name.clone(), e))?;
        lines.push(Line::new(&name, idx, &raw));
    }
    Ok(lines)
}

// ----------------------------------------------------------------------------
// Includes

static INCLUDE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^<>\s]+)>").unwrap());

/// Resolve `#includemacrofile <name>` relative to the including file.
fn resolve_include(dir: &Path, name: &str) -> Option<PathBuf> {
    [
        dir.join("macrodefs").join(format!("{name}.mccpu")),
        dir.join(format!("{name}.mccpu")),
        dir.join(name),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Collect every file reachable through `#includemacrofile`, each once, in discovery order.
pub fn collect_includes(
    root: &Path,
    lines: &[Line],
    report: &mut Report,
) -> Result<IndexMap<PathBuf, Vec<Line>>, Error> {
    let mut files = IndexMap::new();
    collect_into(root, root, lines, &mut files, report)?;
    Ok(files)
}

fn collect_into(
    root: &Path,
    path: &Path,
    lines: &[Line],
    files: &mut IndexMap<PathBuf, Vec<Line>>,
    report: &mut Report,
) -> Result<(), Error> {
    let dir = path.parent().unwrap_or(Path::new("."));
    for line in lines {
        let Some((name, rest)) = line.directive() else {
            continue;
        };
        if name != "includemacrofile" {
            continue;
        }
        let names: Vec<&str> = INCLUDE_NAME
            .captures_iter(rest)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        if names.is_empty() {
            report.push(Msg::error("#includemacrofile expects one or more <name>").at(line.pos()));
            continue;
        }
        for inc in names {
            let Some(found) = resolve_include(dir, inc) else {
                report.push(
                    Msg::error(format!("Macro file `{inc}` was not found"))
                        .at(line.pos())
                        .note(
                            format!(
                                "searched {0}/macrodefs/{1}.mccpu, {0}/{1}.mccpu and {0}/{1}",
                                dir.display(),
                                inc
                            ),
                            None,
                        ),
                );
                continue;
            };
            if same_file(&found, root) || files.keys().any(|f| same_file(f, &found)) {
                continue;
            }
            let included = load(&found)?;
            files.insert(found.clone(), included.clone());
            collect_into(root, &found, &included, files, report)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_code_and_comment() {
        let line = Line::new("main.mccpu", 4, "  MOV &R1, 0x00 // Clear R1");
        assert_eq!(line.code, "mov &r1, 0x00");
        assert_eq!(line.comment.as_deref(), Some("Clear R1"));
        assert_eq!(line.no(), 5);
        assert_eq!(line.pos().to_string(), "main.mccpu:5");
    }

    #[test]
    fn directives() {
        let line = Line::new("m", 0, "#  memorylayout static auto  balanced");
        assert_eq!(line.directive(), Some(("memorylayout", "static auto  balanced")));
        let line = Line::new("m", 0, "#endmacro");
        assert_eq!(line.directive(), Some(("endmacro", "")));
        assert_eq!(Line::new("m", 0, "nop").directive(), None);
    }
}
