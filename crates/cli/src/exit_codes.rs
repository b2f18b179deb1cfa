//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scheduled jobs rely on them.
//!
//! # Exit Code Ranges
//!
//! | Code | Meaning                                             |
//! |------|-----------------------------------------------------|
//! | 0    | Success                                             |
//! | 1    | Products need action (only with `--fail-on-action`) |
//! | 2    | CLI usage error (bad args)                          |
//! | 3    | Config could not be read, parsed or validated      |
//! | 4    | Input report could not be read                      |
//! | 5    | Input report lacks a required column                |
//! | 6    | Export or JSON output could not be written          |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above

use shopsync_io::IoError;
use shopsync_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// At least one bucket is non-empty and `--fail-on-action` was given.
pub const EXIT_ACTIONS: u8 = 1;

/// Usage error - bad arguments, malformed `--threshold`.
pub const EXIT_USAGE: u8 = 2;

/// Config file missing, not TOML, or failing validation.
pub const EXIT_CONFIG: u8 = 3;

/// Report file missing, unreadable, missing sheet, or without a header row.
pub const EXIT_INPUT: u8 = 4;

/// Report is readable but a required column has no matching header.
pub const EXIT_SCHEMA: u8 = 5;

/// Export files or JSON output could not be written.
pub const EXIT_OUTPUT: u8 = 6;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_CONFIG,
        ReconError::Schema(_) => EXIT_SCHEMA,
    }
}

/// Map a reader/exporter error to its exit code.
pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::Open { .. }
        | IoError::MissingSheet { .. }
        | IoError::EmptyTable { .. }
        | IoError::Csv { .. } => EXIT_INPUT,
        IoError::Write { .. } => EXIT_OUTPUT,
    }
}
