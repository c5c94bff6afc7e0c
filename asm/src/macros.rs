use crate::{
    msg::{Msg, Pos, Report},
    source::Line,
};
use arch::operand::ArgKind;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound of expansions in one compilation, guards against recursive macros.
pub const EXPANSION_LIMIT: usize = 10_000;

static TYPE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"%[a-z]*").unwrap());
static BODY_ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r"%(uid|[0-9]+)").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").unwrap());

// ----------------------------------------------------------------------------
// Macro

#[derive(Debug, Clone)]
pub struct Macro {
    pub opener: String,
    pub closer: Option<String>,
    pub args: Vec<ArgKind>,
    pub top: Vec<String>,
    pub bottom: Vec<String>,
    pub complex: bool,
    pub pos: Option<Pos>,
    matcher: Regex,
}

impl PartialEq for Macro {
    fn eq(&self, other: &Self) -> bool {
        self.opener == other.opener
            && self.closer == other.closer
            && self.args == other.args
            && self.top == other.top
            && self.bottom == other.bottom
            && self.complex == other.complex
    }
}

impl Macro {
    pub fn new(
        opener: &str,
        closer: Option<&str>,
        top: Vec<String>,
        bottom: Vec<String>,
        complex: bool,
    ) -> Result<Macro, String> {
        let opener = normalize(opener);
        if opener.is_empty() {
            return Err("Macro without a name".to_string());
        }
        let args = TYPE_TOKEN
            .find_iter(&opener)
            .map(|m| ArgKind::parse(m.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let matcher = Regex::new(&opener_pattern(&opener))
            .map_err(|e| format!("Cannot build matcher for macro `{opener}`: {e}"))?;
        Ok(Macro {
            opener,
            closer: closer.map(normalize).filter(|c| !c.is_empty()),
            args,
            top,
            bottom,
            complex,
            pos: None,
            matcher,
        })
    }

    /// Arguments of `code` when it is a use of this macro.
    pub fn captures<'a>(&self, code: &'a str) -> Option<Vec<&'a str>> {
        let caps = self.matcher.captures(code)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str()).unwrap_or(""))
                .collect(),
        )
    }
}

/// Collapse whitespace and drop it around commas.
fn normalize(s: &str) -> String {
    let s = SPACES.replace_all(s.trim(), " ");
    COMMA.replace_all(&s, ",").into_owned()
}

fn opener_pattern(opener: &str) -> String {
    let literal = |s: &str| {
        regex::escape(s)
            .replace(',', r"\s*,\s*")
            .replace(' ', r"\s+")
    };
    let mut pattern = String::from(r"^\s*");
    let mut last = 0;
    for m in TYPE_TOKEN.find_iter(opener) {
        pattern.push_str(&literal(&opener[last..m.start()]));
        if let Ok(kind) = ArgKind::parse(m.as_str()) {
            pattern.push_str(kind.pattern());
        }
        last = m.end();
    }
    pattern.push_str(&literal(&opener[last..]));
    pattern.push_str(r"\s*$");
    pattern
}

/// Replace `%1`, `%2`, ... with the arguments and `%uid` with the expansion id.
pub fn resolve_args(line: &str, args: &[&str], uid: usize) -> Result<String, String> {
    let mut err = None;
    let out = BODY_ARG.replace_all(line, |caps: &regex::Captures| {
        let key = &caps[1];
        if key == "uid" {
            return uid.to_string();
        }
        match key.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) {
            Some(n) if n < args.len() => args[n].to_string(),
            _ => {
                err = Some(format!(
                    "Macro argument `%{key}` is out of range, the macro takes {} argument(s)",
                    args.len()
                ));
                String::new()
            }
        }
    });
    match err {
        Some(e) => Err(e),
        None => Ok(out.into_owned()),
    }
}

// ----------------------------------------------------------------------------
// Loading

struct Loading {
    opener: String,
    start: Line,
    top: Vec<String>,
    bottom: Vec<String>,
    complex: bool,
}

/// Register every `#macro ... #endmacro` block of `lines`.
pub fn load_macros(macros: &mut IndexMap<String, Macro>, lines: &[Line], report: &mut Report) {
    let mut state: Option<Loading> = None;
    for line in lines {
        let directive = line.directive();
        match (state.as_mut(), directive) {
            (None, Some(("macro", opener))) => {
                state = Some(Loading {
                    opener: opener.to_string(),
                    start: line.clone(),
                    top: vec![],
                    bottom: vec![],
                    complex: false,
                });
            }
            (None, Some(("endmacro", _))) => {
                report.push(Msg::error("#endmacro without #macro").at(line.pos()));
            }
            (None, _) => {}
            (Some(_), Some(("macro", _))) => {
                report.push(
                    Msg::error("Nested #macro is not allowed, expected #endmacro first")
                        .at(line.pos()),
                );
            }
            (Some(_), Some(("endmacro", closer))) => {
                let Some(loading) = state.take() else {
                    continue;
                };
                finish(macros, loading, closer, line, report);
            }
            (Some(loading), _) => {
                if line.code == "..." {
                    if loading.complex {
                        report.push(Msg::error("Macro has more than one `...`").at(line.pos()));
                    }
                    loading.complex = true;
                } else if !line.code.is_empty() {
                    if loading.complex {
                        loading.bottom.push(line.code.clone());
                    } else {
                        loading.top.push(line.code.clone());
                    }
                }
            }
        }
    }
    if let Some(loading) = state {
        report.push(
            Msg::error(format!(
                "Expected #endmacro after #macro `{}`",
                loading.opener
            ))
            .at(loading.start.pos()),
        );
    }
}

fn finish(
    macros: &mut IndexMap<String, Macro>,
    loading: Loading,
    closer: &str,
    end: &Line,
    report: &mut Report,
) {
    let closer = if closer.is_empty() { None } else { Some(closer) };
    if loading.complex && closer.is_none() {
        report.push(
            Msg::error("Complex macros (macros using `...`) need a closing expression after #endmacro")
                .at(end.pos()),
        );
        return;
    }
    let mut mac = match Macro::new(
        &loading.opener,
        closer,
        loading.top,
        loading.bottom,
        loading.complex,
    ) {
        Ok(mac) => mac,
        Err(e) => {
            report.push(Msg::error(e).at(loading.start.pos()));
            return;
        }
    };
    mac.pos = Some(loading.start.pos());
    if let Some(prev) = macros.get(&mac.opener) {
        report.push(
            Msg::warn(format!("Re-defined macro: `{}`", mac.opener))
                .at(loading.start.pos())
                .note(
                    "Already defined here. The later definition is used.",
                    prev.pos.clone(),
                ),
        );
    }
    macros.insert(mac.opener.clone(), mac);
}

/// Lines that are neither directives nor inside a `#macro` / `#memorylayout` block.
pub fn copy_lines_exclude_compiler_instructions(lines: &[Line]) -> Vec<Line> {
    let mut out = vec![];
    let mut in_macro = false;
    let mut in_layout = false;
    for line in lines {
        match line.directive() {
            Some(("macro", _)) => in_macro = true,
            Some(("endmacro", _)) => in_macro = false,
            Some(("memorylayout", rest)) if !in_macro => {
                in_layout = crate::memory::LayoutKind::parse(rest)
                    .map(|kind| kind.has_block())
                    .unwrap_or(false);
            }
            Some(("end", _)) => in_layout = false,
            Some(_) => {}
            None if in_macro || in_layout => {}
            None => out.push(line.clone()),
        }
    }
    out
}

// ----------------------------------------------------------------------------
// Resolution

fn find_use<'m, 'c>(
    macros: &'m IndexMap<String, Macro>,
    code: &'c str,
) -> Option<(&'m Macro, Vec<&'c str>)> {
    macros
        .values()
        .find_map(|m| m.captures(code).map(|args| (m, args)))
}

fn expand(mac_lines: &[String], args: &[&str], uid: usize, at: &Line) -> Result<Vec<Line>, String> {
    mac_lines
        .iter()
        .map(|l| resolve_args(l, args, uid).map(|code| at.expanded(code)))
        .collect()
}

/// Index of the closer matching the complex macro used at `start`.
fn find_closer(lines: &[Line], start: usize, mac: &Macro, closer: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, line) in lines.iter().enumerate().skip(start + 1) {
        if mac.captures(&line.code).is_some() {
            depth += 1;
        } else if normalize(&line.code) == closer {
            if depth == 0 {
                return Some(idx);
            }
            depth -= 1;
        }
    }
    None
}

/// Expand macro uses until no line matches a macro.
pub fn resolve_macros(
    lines: Vec<Line>,
    macros: &IndexMap<String, Macro>,
    report: &mut Report,
) -> Vec<Line> {
    let mut lines = lines;
    let mut expansions = 0usize;
    let mut idx = 0;
    while idx < lines.len() {
        let line = lines[idx].clone();
        let Some((mac, args)) = find_use(macros, &line.code) else {
            idx += 1;
            continue;
        };

        expansions += 1;
        if expansions > EXPANSION_LIMIT {
            report.push(
                Msg::error(format!(
                    "Macro expansion limit ({EXPANSION_LIMIT}) reached, `{}` is probably recursive",
                    mac.opener
                ))
                .at(line.pos()),
            );
            return lines;
        }
        let uid = expansions;

        let top = match expand(&mac.top, &args, uid, &line) {
            Ok(top) => top,
            Err(e) => {
                report.push(Msg::error(e).at(line.pos()));
                lines.remove(idx);
                continue;
            }
        };

        if mac.complex {
            let closer = match &mac.closer {
                Some(c) => match resolve_args(c, &args, uid) {
                    Ok(c) => c,
                    Err(e) => {
                        report.push(Msg::error(e).at(line.pos()));
                        lines.remove(idx);
                        continue;
                    }
                },
                None => String::new(),
            };
            let Some(end) = find_closer(&lines, idx, mac, &closer) else {
                report.push(
                    Msg::error(format!(
                        "Complex macro `{}` is not closed, expected `{}`",
                        mac.opener, closer
                    ))
                    .at(line.pos()),
                );
                lines.remove(idx);
                continue;
            };
            let end_line = lines[end].clone();
            let bottom = match expand(&mac.bottom, &args, uid, &end_line) {
                Ok(bottom) => bottom,
                Err(e) => {
                    report.push(Msg::error(e).at(end_line.pos()));
                    vec![]
                }
            };
            lines.splice(end..=end, bottom);
        }
        lines.splice(idx..=idx, top);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::parse_lines;

    fn zero() -> Macro {
        Macro::new("zero %register", None, vec!["mov %1, 0x00".into()], vec![], false).unwrap()
    }

    #[test]
    fn macro_arg_resolve() {
        let mac = Macro::new(
            "test %register, %register",
            None,
            vec!["mov %1, %2".into()],
            vec![],
            false,
        )
        .unwrap();
        assert_eq!(mac.args, vec![ArgKind::Register, ArgKind::Register]);
        let args = mac.captures("test &r1,   &r2").unwrap();
        assert_eq!(resolve_args("mov %1, %2", &args, 0).unwrap(), "mov &r1, &r2");
        assert!(mac.captures("test &r1").is_none());
        assert!(mac.captures("test 1, &r2").is_none());
    }

    #[test]
    fn arg_out_of_range() {
        assert!(resolve_args("mov %1, %3", &["&r1", "&r2"], 0).is_err());
        assert!(resolve_args("mov %0, %1", &["&r1"], 0).is_err());
        assert_eq!(resolve_args("l_%uid:", &[], 7).unwrap(), "l_7:");
    }

    #[test]
    fn macro_resolve() {
        let mut macros = IndexMap::new();
        macros.insert("zero %register".to_string(), zero());
        let mut report = Report::new();
        let lines = resolve_macros(parse_lines("t", "zero &r1"), &macros, &mut report);
        assert!(report.is_empty(), "{report}");
        let codes: Vec<_> = lines.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["mov &r1, 0x00"]);
        assert_eq!(lines[0].no(), 1);
    }

    #[test]
    fn load_macro() {
        let mut macros = IndexMap::new();
        let mut report = Report::new();
        let lines = parse_lines("tests", "#macro zero %register\nmov %1, 0x00\n#endmacro");
        load_macros(&mut macros, &lines, &mut report);
        assert!(report.is_empty(), "{report}");
        assert_eq!(macros.len(), 1);
        assert_eq!(macros.values().last().unwrap(), &zero());
    }

    #[test]
    fn load_errors() {
        let mut macros = IndexMap::new();
        let mut report = Report::new();
        let lines = parse_lines("t", "#macro broken %float\nnop\n#endmacro");
        load_macros(&mut macros, &lines, &mut report);
        assert!(report.has_error());
        assert!(macros.is_empty());

        let mut report = Report::new();
        let lines = parse_lines("t", "#macro open %register\nnop");
        load_macros(&mut macros, &lines, &mut report);
        assert!(report.has_error());

        let mut report = Report::new();
        let lines = parse_lines("t", "#macro loop\n...\n#endmacro");
        load_macros(&mut macros, &lines, &mut report);
        assert!(report.has_error());
    }

    #[test]
    fn redefinition_warns() {
        let mut macros = IndexMap::new();
        let mut report = Report::new();
        let lines = parse_lines(
            "t",
            "#macro zero %register\nmov %1, 0\n#endmacro\n#macro zero %register\nmov %1, 0x00\n#endmacro",
        );
        load_macros(&mut macros, &lines, &mut report);
        assert_eq!(report.count(crate::msg::Level::Warning), 1);
        assert_eq!(macros["zero %register"].top, vec!["mov %1, 0x00".to_string()]);
    }

    #[test]
    fn exclude_comp_instr() {
        let lines = parse_lines(
            "t",
            "#macro zero %register\nmov %1, 0x00\n#endmacro\nzero &r1",
        );
        let codes: Vec<_> = copy_lines_exclude_compiler_instructions(&lines)
            .into_iter()
            .map(|l| l.code)
            .collect();
        assert_eq!(codes, vec!["zero &r1"]);
    }

    #[test]
    fn exclude_layout_blocks() {
        let lines = parse_lines(
            "t",
            "#memorylayout static incremental\na\nb\n#end\nnop\n#memorylayout static auto\nhlt",
        );
        let codes: Vec<_> = copy_lines_exclude_compiler_instructions(&lines)
            .into_iter()
            .map(|l| l.code)
            .collect();
        assert_eq!(codes, vec!["nop", "hlt"]);
    }

    #[test]
    fn complex_and_nested() {
        let mut macros = IndexMap::new();
        let mut report = Report::new();
        let src = "\
#macro repeat %register
loop_%uid:
...
dec %1
jnz %1, loop_%uid
#endmacro endrepeat
#macro zero %register
mov %1, 0
#endmacro";
        load_macros(&mut macros, &parse_lines("defs", src), &mut report);
        assert!(report.is_empty(), "{report}");
        assert!(macros["repeat %register"].complex);

        let code = "repeat &r1\nrepeat &r2\nzero &r3\nendrepeat\nendrepeat";
        let lines = resolve_macros(parse_lines("main", code), &macros, &mut report);
        assert!(report.is_empty(), "{report}");
        let codes: Vec<_> = lines.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![
                "loop_1:",
                "loop_2:",
                "mov &r3, 0",
                "dec &r2",
                "jnz &r2, loop_2",
                "dec &r1",
                "jnz &r1, loop_1",
            ]
        );
    }

    #[test]
    fn closer_ignores_spacing() {
        let mut macros = IndexMap::new();
        let mut report = Report::new();
        load_macros(
            &mut macros,
            &parse_lines("d", "#macro block\nnop\n...\nhlt\n#endmacro end repeat"),
            &mut report,
        );
        let lines = resolve_macros(parse_lines("m", "block\ninc &r1\nend   repeat"), &macros, &mut report);
        assert!(report.is_empty(), "{report}");
        let codes: Vec<_> = lines.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["nop", "inc &r1", "hlt"]);
    }

    #[test]
    fn unclosed_complex_macro() {
        let mut macros = IndexMap::new();
        let mut report = Report::new();
        load_macros(
            &mut macros,
            &parse_lines("d", "#macro block\nnop\n...\nnop\n#endmacro endblock"),
            &mut report,
        );
        let lines = resolve_macros(parse_lines("m", "block\nhlt"), &macros, &mut report);
        assert!(report.has_error());
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn recursion_is_bounded() {
        let mut macros = IndexMap::new();
        macros.insert(
            "again".to_string(),
            Macro::new("again", None, vec!["again".into()], vec![], false).unwrap(),
        );
        let mut report = Report::new();
        resolve_macros(parse_lines("m", "again"), &macros, &mut report);
        assert!(report.has_error());
    }
}
