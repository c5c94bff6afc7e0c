use crate::{error::Error, msg::Level};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_TARGET: &str = "mccpu";
pub const DEFAULT_MEMORY_SIZE: usize = 256;
pub const DEFAULT_MEMORY_BLOCKS: usize = 8;
pub const DEFAULT_STACK_SIZE: usize = 64;
pub const DEFAULT_REGISTER_COUNT: usize = 16;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "mccpu.yaml";

#[derive(Debug, Clone, PartialEq)]
pub struct CompilerArgs {
    pub target: String,
    pub memory_size: usize,
    pub memory_blocks: usize,
    pub stack_size: usize,
    pub register_count: usize,
    pub exit_level: Level,
    /// Output path without extension, the target appends its own.
    pub out_file: PathBuf,
    pub template_dir: Option<PathBuf>,
}

impl Default for CompilerArgs {
    fn default() -> Self {
        CompilerArgs {
            target: DEFAULT_TARGET.to_string(),
            memory_size: DEFAULT_MEMORY_SIZE,
            memory_blocks: DEFAULT_MEMORY_BLOCKS,
            stack_size: DEFAULT_STACK_SIZE,
            register_count: DEFAULT_REGISTER_COUNT,
            exit_level: Level::Error,
            out_file: PathBuf::from("out"),
            template_dir: None,
        }
    }
}

impl CompilerArgs {
    /// Defaults, then the config file, then command line `flags`. The output
    /// defaults to `<input>.out`.
    pub fn merge(input: &Path, file: Option<FileConfig>, flags: FileConfig) -> Self {
        let mut args = CompilerArgs {
            out_file: input.with_extension("out"),
            ..CompilerArgs::default()
        };
        if let Some(file) = file {
            args.apply(file);
        }
        args.apply(flags);
        args
    }

    pub fn validate(&self) -> Result<(), Error> {
        macro_rules! check {
            ($cond:expr, $($msg:tt)*) => {
                if !$cond {
                    return Err(Error::InvalidArgument(format!($($msg)*)));
                }
            };
        }
        check!(
            (1..=65536).contains(&self.memory_size),
            "memory size must be in 1..=65536, got {}",
            self.memory_size
        );
        check!(
            (1..=self.memory_size).contains(&self.memory_blocks),
            "memory blocks must be in 1..={}, got {}",
            self.memory_size,
            self.memory_blocks
        );
        check!(
            (1..=65536).contains(&self.stack_size),
            "stack size must be in 1..=65536, got {}",
            self.stack_size
        );
        check!(
            (1..=256).contains(&self.register_count),
            "register count must be in 1..=256, got {}",
            self.register_count
        );
        check!(
            !self.out_file.as_os_str().is_empty(),
            "output file must not be empty"
        );
        Ok(())
    }

    pub fn apply(&mut self, cfg: FileConfig) {
        if let Some(v) = cfg.target {
            self.target = v;
        }
        if let Some(v) = cfg.memory_size {
            self.memory_size = v;
        }
        if let Some(v) = cfg.memory_blocks {
            self.memory_blocks = v;
        }
        if let Some(v) = cfg.stack_size {
            self.stack_size = v;
        }
        if let Some(v) = cfg.register_count {
            self.register_count = v;
        }
        if let Some(v) = cfg.exit_level {
            self.exit_level = v;
        }
        if let Some(v) = cfg.out_file {
            self.out_file = v;
        }
        if let Some(v) = cfg.template_dir {
            self.template_dir = Some(v);
        }
    }
}

// ----------------------------------------------------------------------------
// Config file

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub target: Option<String>,
    pub memory_size: Option<usize>,
    pub memory_blocks: Option<usize>,
    pub stack_size: Option<usize>,
    pub register_count: Option<usize>,
    pub exit_level: Option<Level>,
    pub out_file: Option<PathBuf>,
    pub template_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let name = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| Error::FileOpen(name.clone(), e))?;
        Self::parse(&name, &text)
    }

    pub fn parse(name: &str, text: &str) -> Result<Self, Error> {
        if text.trim().is_empty() {
            return Ok(FileConfig::default());
        }
        serde_yaml::from_str(text).map_err(|e| Error::Config(name.to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let args = CompilerArgs::default();
        assert!(args.validate().is_ok());
        assert_eq!(args.memory_size, 256);
        assert_eq!(args.memory_blocks, 8);
    }

    #[test]
    fn rejects_bad_sizes() {
        let mut args = CompilerArgs::default();
        args.register_count = 0;
        assert!(matches!(args.validate(), Err(Error::InvalidArgument(_))));

        let mut args = CompilerArgs::default();
        args.memory_blocks = 512;
        assert!(args.validate().is_err());

        let mut args = CompilerArgs::default();
        args.stack_size = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn file_overrides_defaults() {
        let cfg = FileConfig::parse(
            "mccpu.yaml",
            "target: c\nmemory_size: 1024\nexit_level: warning\n",
        )
        .unwrap();
        let mut args = CompilerArgs::default();
        args.apply(cfg);
        assert_eq!(args.target, "c");
        assert_eq!(args.memory_size, 1024);
        assert_eq!(args.exit_level, Level::Warning);
        assert_eq!(args.stack_size, DEFAULT_STACK_SIZE);
    }

    #[test]
    fn flags_override_file() {
        let file = FileConfig::parse(
            "mccpu.yaml",
            "target: c\nmemory_size: 1024\nstack_size: 32\nout_file: build/app\n",
        )
        .unwrap();
        let flags = FileConfig {
            target: Some("nasm-x64".into()),
            stack_size: Some(16),
            ..FileConfig::default()
        };
        let args = CompilerArgs::merge(Path::new("src/main.mccpu"), Some(file), flags);
        assert_eq!(args.target, "nasm-x64");
        assert_eq!(args.stack_size, 16);
        assert_eq!(args.memory_size, 1024);
        assert_eq!(args.out_file, PathBuf::from("build/app"));
        assert_eq!(args.register_count, DEFAULT_REGISTER_COUNT);

        let args = CompilerArgs::merge(Path::new("src/main.mccpu"), None, FileConfig::default());
        assert_eq!(args.out_file, PathBuf::from("src/main.out"));
        assert_eq!(args.target, DEFAULT_TARGET);
    }

    #[test]
    fn file_rejects_unknown_keys() {
        assert!(matches!(
            FileConfig::parse("bad.yaml", "memroy_size: 12\n"),
            Err(Error::Config(..))
        ));
        assert_eq!(
            FileConfig::parse("empty.yaml", "  \n").unwrap(),
            FileConfig::default()
        );
    }
}
