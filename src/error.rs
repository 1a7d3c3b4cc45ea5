use thiserror::Error;

/// Errors raised by the flatpak service layer and the action orchestrators.
///
/// Every variant carries owned strings so the error can be cloned into UI
/// messages and across the background task channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlatpakError {
    #[error("flatpak is not installed or could not be started: {0}")]
    ServiceUnavailable(String),
    #[error("flatpak {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("could not parse flatpak output: {0}")]
    Parse(String),
    #[error("invalid reference: {0}")]
    InvalidRef(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("could not read {path}: {reason}")]
    ReadFailed { path: String, reason: String },
    #[error("invalid flatpakref descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("{0} does not describe an application")]
    NotAnApplication(String),
    #[error("none of the applications are selected")]
    SelectionRequired,
    #[error("input entered is invalid: {0}")]
    InvalidInput(String),
    #[error("application not found: {0}")]
    NotFound(String),
    #[error("could not run {0}")]
    LaunchFailed(String),
    #[error("an update of all applications is already running")]
    ActionInProgress,
    #[error("operation on {name} failed: {reason}")]
    OperationFailed { name: String, reason: String },
    #[error("transaction aborted after {name} failed: {reason}")]
    TransactionAborted { name: String, reason: String },
    #[error("operation cancelled")]
    Cancelled,
}

impl FlatpakError {
    /// Dialog title shown above the error text.
    pub fn title(&self) -> &'static str {
        match self {
            FlatpakError::FileNotFound(_) | FlatpakError::ReadFailed { .. } => "File Not Found Error",
            FlatpakError::InvalidDescriptor(_) | FlatpakError::NotAnApplication(_) => "Reference Error",
            FlatpakError::SelectionRequired => "Selection Error",
            FlatpakError::InvalidInput(_) | FlatpakError::NotFound(_) => "Input Error",
            FlatpakError::LaunchFailed(_) => "Running Error",
            FlatpakError::ActionInProgress => "Busy",
            FlatpakError::ServiceUnavailable(_)
            | FlatpakError::CommandFailed { .. }
            | FlatpakError::Parse(_)
            | FlatpakError::InvalidRef(_) => "Flatpak Error",
            FlatpakError::OperationFailed { .. }
            | FlatpakError::TransactionAborted { .. }
            | FlatpakError::Cancelled => "Transaction Error",
        }
    }
}

impl From<std::io::Error> for FlatpakError {
    fn from(err: std::io::Error) -> Self {
        FlatpakError::ServiceUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_follow_error_class() {
        assert_eq!(FlatpakError::SelectionRequired.title(), "Selection Error");
        assert_eq!(FlatpakError::FileNotFound("a.flatpakref".into()).title(), "File Not Found Error");
        assert_eq!(FlatpakError::NotAnApplication("org.gnome.Platform".into()).title(), "Reference Error");
        assert_eq!(FlatpakError::LaunchFailed("org.gnome.Maps".into()).title(), "Running Error");
    }

    #[test]
    fn io_errors_mean_service_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        assert!(matches!(FlatpakError::from(io), FlatpakError::ServiceUnavailable(_)));
    }
}
