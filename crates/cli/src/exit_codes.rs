//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 60-69   | recon            | Reconciliation run codes                 |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use nutslink_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing config file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Recon (60-69)
// =============================================================================

/// Config file does not parse or fails validation.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 60;

/// A source file cannot be read, or a record in it is malformed.
pub const EXIT_RECON_SOURCE: u8 = 61;

/// The name directory could not be queried. Matching was skipped but the
/// rest of the result was still written.
pub const EXIT_RECON_DIRECTORY: u8 = 62;

/// Discrepancies found and `--strict` was given.
pub const EXIT_RECON_DISCREPANCIES: u8 = 63;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::MissingColumn { .. }
        | ReconError::Csv { .. }
        | ReconError::MalformedRecord { .. } => EXIT_RECON_SOURCE,
        ReconError::DirectorySource { .. } => EXIT_RECON_DIRECTORY,
    }
}
