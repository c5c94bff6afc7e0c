pub mod compile;
pub mod config;
pub mod error;
pub mod label;
pub mod macros;
pub mod memory;
pub mod msg;
pub mod parser;
pub mod source;
pub mod target;
pub mod template;
pub mod util;

pub use compile::{compile_file, compile_str, emit, Compilation, Program};
pub use config::CompilerArgs;
pub use error::Error;
pub use msg::{Level, Report};
