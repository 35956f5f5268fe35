//! Exit codes following sysexits.h conventions.
//!
//! Scripts can tell a rejected duplicate apart from a broken input or a
//! failed write without parsing output.

/// Successful execution; for `check`, the submission is novel.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// The submission duplicates a stored record.
/// Maps to EX_DATAERR from sysexits.h.
pub const DUPLICATE_FOUND: i32 = 65;

/// Cannot open or decode an input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// I/O error (cannot write the records file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify error by inspecting the chain
        let code = if message.contains("Failed to read") || message.contains("Invalid image") {
            INPUT_ERROR
        } else if message.contains("Invalid coordinate") || message.contains("must be given together") {
            USAGE_ERROR
        } else if message.contains("Failed to write") {
            IO_ERROR
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_classifies_error_chain() {
        let err = Err::<(), _>(anyhow!("No such file"))
            .context("Failed to read file: a.jpg")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);

        let err = anyhow!("Failed to write records: disk full");
        assert_eq!(ExitCode::from_anyhow(&err).code, IO_ERROR);

        let err = anyhow!("--lat and --lon must be given together");
        assert_eq!(ExitCode::from_anyhow(&err).code, USAGE_ERROR);

        let err = anyhow!("something else");
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, GENERAL_ERROR);
        assert_eq!(exit.message.as_deref(), Some("something else"));
    }
}
