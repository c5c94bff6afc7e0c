use color_print::cprintln;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

// ----------------------------------------------------------------------------
// Level

/// Diagnostic severity, lowest first. `Ok` is only a status and `None` only an exit level.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Ok,
    Warning,
    Error,
    None,
}

impl Level {
    pub fn parse(s: &str) -> Result<Self, String> {
        <Self as clap::ValueEnum>::from_str(s.trim(), true)
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Level::Info => "INFO",
            Level::Ok => "OK",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::None => "NONE",
        };
        write!(f, "{s}")
    }
}

// ----------------------------------------------------------------------------
// Message

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pos {
    pub file: String,
    pub line: usize,
    pub raw: String,
}

impl Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub text: String,
    pub pos: Option<Pos>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msg {
    pub level: Level,
    pub text: String,
    pub pos: Option<Pos>,
    pub notes: Vec<Note>,
}

impl Msg {
    fn new(level: Level, text: impl Into<String>) -> Self {
        Msg {
            level,
            text: text.into(),
            pos: None,
            notes: vec![],
        }
    }
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(Level::Info, text)
    }
    pub fn warn(text: impl Into<String>) -> Self {
        Self::new(Level::Warning, text)
    }
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Level::Error, text)
    }

    pub fn at(mut self, pos: Pos) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn note(mut self, text: impl Into<String>, pos: Option<Pos>) -> Self {
        self.notes.push(Note {
            text: text.into(),
            pos,
        });
        self
    }

    pub fn print(&self) {
        match self.level {
            Level::Error => cprintln!("<red,bold>error</>: {}", self.text),
            Level::Warning => cprintln!("<yellow,bold>warn</>: {}", self.text),
            _ => cprintln!("<cyan,bold>info</>: {}", self.text),
        }
        if let Some(pos) = &self.pos {
            print_pos(pos);
        }
        for note in &self.notes {
            cprintln!("<green,bold>note</>: {}", note.text);
            if let Some(pos) = &note.pos {
                print_pos(pos);
            }
        }
    }
}

fn print_pos(pos: &Pos) {
    cprintln!("     <blue>--></> <underline>{}</>", pos);
    cprintln!("      <blue>|</>");
    cprintln!(" <blue>{:>4} |</> {}", pos.line, pos.raw);
    cprintln!("      <blue>|</>");
}

impl Display for Msg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.pos {
            Some(pos) => write!(f, "[{}] {} at {}", self.level, self.text, pos),
            None => write!(f, "[{}] {}", self.level, self.text),
        }
    }
}

// ----------------------------------------------------------------------------
// Report

/// Messages accumulated over one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    msgs: Vec<Msg>,
}

impl Report {
    pub fn new() -> Self {
        Report { msgs: vec![] }
    }

    pub fn push(&mut self, msg: Msg) {
        self.msgs.push(msg);
    }

    pub fn accumulate(&mut self, other: Report) -> &mut Self {
        self.msgs.extend(other.msgs);
        self
    }

    pub fn msgs(&self) -> &[Msg] {
        &self.msgs
    }

    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty()
    }

    pub fn status(&self) -> Level {
        self.msgs
            .iter()
            .map(|msg| msg.level)
            .max()
            .unwrap_or(Level::Ok)
    }

    /// True when a message at or above `exit_level` was reported.
    pub fn reached(&self, exit_level: Level) -> bool {
        exit_level != Level::None && self.msgs.iter().any(|msg| msg.level >= exit_level)
    }

    pub fn has_error(&self) -> bool {
        self.msgs.iter().any(|msg| msg.level == Level::Error)
    }

    pub fn count(&self, level: Level) -> usize {
        self.msgs.iter().filter(|msg| msg.level == level).count()
    }

    pub fn print(&self) {
        for msg in &self.msgs {
            msg.print();
        }
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.msgs.is_empty() {
            return write!(f, "[{}] ", self.status());
        }
        for msg in &self.msgs {
            writeln!(f, "{msg}")?;
        }
        Ok(())
    }
}
