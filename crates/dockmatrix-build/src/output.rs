use std::path::{Path, PathBuf};

/// Comment block every generated file starts with.
pub const HEADER: &str = "#\n# This file was created by dockmatrix\n#";

/// Whether a run persists the generated text or compares it against disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Write,
    Check,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Written(PathBuf),
    Consistent(PathBuf),
    /// The file on disk differs from the freshly generated text.
    Mismatch(PathBuf),
}

/// Text buffer for one generated file, seeded with [`HEADER`].
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    content: String,
}

impl OutputFile {
    pub fn new(dir: &Path, file_name: &str) -> Self {
        Self {
            path: dir.join(file_name),
            content: HEADER.to_owned(),
        }
    }

    pub fn push_str(&mut self, text: &str) {
        self.content.push_str(text);
    }

    /// Writes the buffer, or compares it byte-for-byte with the existing file.
    pub fn finish(self, mode: Mode) -> Result<Outcome, OutputError> {
        match mode {
            Mode::Write => {
                std::fs::write(&self.path, &self.content).map_err(|e| OutputError::Write {
                    path: self.path.clone(),
                    source: e,
                })?;
                tracing::debug!(path = %self.path.display(), bytes = self.content.len(), "wrote file");
                Ok(Outcome::Written(self.path))
            }
            Mode::Check => {
                let existing =
                    std::fs::read_to_string(&self.path).map_err(|e| OutputError::Read {
                        path: self.path.clone(),
                        source: e,
                    })?;
                if existing == self.content {
                    Ok(Outcome::Consistent(self.path))
                } else {
                    tracing::warn!(path = %self.path.display(), "file differs from generated content");
                    Ok(Outcome::Mismatch(self.path))
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read {path} for consistency check")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}
