use color_print::cprintln;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to read line of {0}")]
    FileRead(String, #[source] std::io::Error),

    #[error("Failed to create file: {0}")]
    FileCreate(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Config(String, #[source] serde_yaml::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown target: `{0}`, known targets are [{1}]")]
    UnknownTarget(String, String),

    #[error("Template `{0}` has no %code placeholder")]
    TemplateWithoutCode(String),
}

impl Error {
    pub fn print(&self) {
        cprintln!("<red,bold>error</>: {}", self);
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            cprintln!("     <blue>=</> caused by: {}", cause);
            source = cause.source();
        }
    }
}
