//! Script execution limits and verification flag bits

/// Maximum script length in bytes
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum size of a single stack element
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum combined stack and altstack depth during execution
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of non-push operations per script
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// Require the recorded unlocking script to contain only data pushes
/// before a P2SH redeem-script swap is accepted
pub const VERIFY_SIGPUSHONLY: u32 = 1 << 5;

/// Require data pushes to use their shortest possible encoding
pub const VERIFY_MINIMALDATA: u32 = 1 << 6;
