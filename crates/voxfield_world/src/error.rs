use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum SettingsError {
    Read { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, message: String },
    Write { path: PathBuf, source: io::Error },
    Serialize { message: String },
}

impl SettingsError {
    /// True when the settings file simply does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read settings {}: {source}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "failed to parse settings {}: {message}", path.display())
            }
            Self::Write { path, source } => {
                write!(f, "failed to write settings {}: {source}", path.display())
            }
            Self::Serialize { message } => write!(f, "failed to serialize settings: {message}"),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } => Some(source),
            Self::Parse { .. } | Self::Serialize { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum WorldError {
    JobPool(rayon::ThreadPoolBuildError),
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JobPool(err) => write!(f, "failed to start chunk worker pool: {err}"),
        }
    }
}

impl std::error::Error for WorldError {}

impl From<rayon::ThreadPoolBuildError> for WorldError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::JobPool(err)
    }
}
