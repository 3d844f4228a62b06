//! Exit codes for kitctl

/// Success, or nothing needed doing.
pub const EXIT_SUCCESS: i32 = 0;

/// General error (bad arguments, unreadable installation).
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Fetching the manifest or release content failed; nothing was mutated.
pub const EXIT_FETCH_FAILED: i32 = 2;

/// Apply failed; the pre-run snapshot was restored successfully.
pub const EXIT_APPLY_ROLLED_BACK: i32 = 3;

/// Rollback failed; the installation needs manual recovery.
pub const EXIT_ROLLBACK_FAILED: i32 = 4;
