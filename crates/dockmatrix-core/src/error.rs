use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Matrix selection ──
    #[error("unknown {axis} '{value}'; expected one of: {}", expected.join(", "))]
    UnknownAxisValue {
        axis: &'static str,
        value: String,
        expected: Vec<&'static str>,
    },

    #[error("{value} is an invalid number of CPU cores")]
    InvalidCoreCount { value: String },
}
