//! CLI Exit Code Registry
//!
//! Single source of truth for `conbridge` exit codes. Scripts that drive
//! `conbridge run` rely on them.
//!
//! | Code | Meaning                                            |
//! |------|----------------------------------------------------|
//! | 0    | Success                                            |
//! | 1    | The script reported errors in the transcript       |
//! | 2    | CLI usage error (bad args, unknown meta-command)   |
//! | 3    | I/O error reading a script or writing output       |
//! | 4    | Settings file could not be read or is invalid      |
//! | 5    | Script ended inside an unfinished statement        |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// The script ran to the end but at least one line produced error output.
pub const EXIT_SCRIPT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Script file could not be read, or output could not be written.
pub const EXIT_IO: u8 = 3;

/// Settings file unreadable, unparsable, or failed validation.
pub const EXIT_CONFIG: u8 = 4;

/// End of script reached while the console was still waiting for the rest
/// of a statement.
pub const EXIT_INCOMPLETE: u8 = 5;
