/// Crate-wide error carrying the process exit code it maps to.
///
/// Exit codes:
/// - `2`: local I/O or configuration problem
/// - `3`: malformed input (schema mismatch, bad cell, empty table)
/// - `4`: resource unavailable (network failure, missing input file)
/// - `5`: output backend failure (charts, SQL store)
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    /// True when the input data could not be obtained at all.
    pub fn is_unavailable(&self) -> bool {
        self.exit_code == 4
    }

    /// True when the input data was present but did not have the expected shape.
    pub fn is_malformed(&self) -> bool {
        self.exit_code == 3
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::new(5, format!("SQLite error: {e}"))
    }
}
