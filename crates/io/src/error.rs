use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum IoError {
    /// File could not be opened or has an unsupported extension.
    Open { path: PathBuf, message: String },
    /// Requested worksheet does not exist in the workbook.
    MissingSheet {
        path: PathBuf,
        sheet: String,
        available: Vec<String>,
    },
    /// No header row could be found.
    EmptyTable { path: PathBuf },
    /// Malformed delimited text.
    Csv { path: PathBuf, message: String },
    /// Export target could not be written.
    Write { path: PathBuf, message: String },
}

impl IoError {
    pub(crate) fn open(path: &Path, err: impl fmt::Display) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub(crate) fn csv(path: &Path, err: impl fmt::Display) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub(crate) fn write(path: &Path, err: impl fmt::Display) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, message } => {
                write!(f, "cannot open {}: {message}", path.display())
            }
            Self::MissingSheet {
                path,
                sheet,
                available,
            } => write!(
                f,
                "{}: no sheet named '{sheet}' (available: {})",
                path.display(),
                available.join(", ")
            ),
            Self::EmptyTable { path } => write!(f, "{}: no header row found", path.display()),
            Self::Csv { path, message } => write!(f, "{}: {message}", path.display()),
            Self::Write { path, message } => {
                write!(f, "cannot write {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for IoError {}
