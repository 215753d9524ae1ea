use std::path::PathBuf;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the application
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    MissingFile { what: &'static str, path: PathBuf },
    MissingExecutable(String),
    CommandFailed { command: String, message: String },
    ParseError { file: PathBuf, message: String },
    InvalidArgument(String),
    Http(String),
    SerializationError(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::MissingFile { what, path } => {
                write!(f, "{} not found: {}", what, path.display())
            }
            Error::MissingExecutable(name) => write!(f, "{} executable not found on PATH.", name),
            Error::CommandFailed { command, message } => {
                write!(f, "{} failed. {}", command, message)
            }
            Error::ParseError { file, message } => {
                write!(f, "Parse error in {}: {}", file.display(), message)
            }
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Http(msg) => write!(f, "HTTP error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML: {}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_message() {
        let err = Error::MissingFile {
            what: "Lockfile",
            path: PathBuf::from("/tmp/pnpm-lock.yaml"),
        };
        assert_eq!(err.to_string(), "Lockfile not found: /tmp/pnpm-lock.yaml");
    }

    #[test]
    fn test_missing_executable_message() {
        let err = Error::MissingExecutable("pnpm".to_string());
        assert_eq!(err.to_string(), "pnpm executable not found on PATH.");
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error as _;
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("gone"));
    }
}
