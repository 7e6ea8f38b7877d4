//! Process exit codes. Part of the CLI contract; scripts branch on them.

pub const SUCCESS: i32 = 0;
pub const INVALID_INPUT: i32 = 1; // Bad payload, schema, key or config
pub const REJECTED: i32 = 2; // Approver declined, timed out or was interrupted
pub const FORBIDDEN_DOMAIN: i32 = 3; // Transaction-shaped domain tag or body
pub const SIGNATURE_INVALID: i32 = 4; // Verification or signing failure
