//! # Script-Stepper
//!
//! Step-wise execution core for a Bitcoin-style Script debugger.
//!
//! A driver constructs an [`ExecutionEnv`] over a script and an initial data
//! stack, then calls [`ExecutionEnv::step`] repeatedly, inspecting stacks and
//! cursor between calls. Each step consumes exactly one opcode or push-data
//! unit; when the script is exhausted the environment either runs the
//! Pay-to-Script-Hash epilogue (swapping in the redeem script and continuing)
//! or performs the termination check.
//!
//! ## Design Principles
//!
//! 1. **Single ownership**: an environment is exclusively owned and mutated
//!    by the one call site driving it; there is no internal concurrency.
//! 2. **Terminal states are absorbing**: a finished or failed environment
//!    can be stepped again without changing observable state.
//! 3. **Exact Version Pinning**: consensus-critical cryptography dependencies
//!    are pinned to exact versions.
//!
//! ## Usage
//!
//! ```rust
//! use script_stepper::{ExecutionEnv, NoSignatureChecker, SigVersion, StepOutcome};
//!
//! // OP_1 OP_1 OP_EQUAL
//! let script = vec![0x51, 0x51, 0x87];
//! let mut env =
//!     ExecutionEnv::new(Vec::new(), script, 0, NoSignatureChecker, SigVersion::Base).unwrap();
//! while let Ok(StepOutcome::Continue) = env.step() {}
//! assert!(env.is_done());
//! assert_eq!(env.stack(), &vec![vec![1]]);
//! ```

pub mod checker;
pub mod constants;
pub mod env;
pub mod error;
pub mod opcodes;
pub mod script;
mod stepper;
pub mod types;

// Re-export commonly used items
pub use checker::{NoSignatureChecker, SecpSignatureChecker, SignatureChecker};
pub use constants::*;
pub use env::{run, ExecutionEnv};
pub use error::{Result, ScriptError};
pub use script::{cast_to_bool, disassemble, hex_str, is_pay_to_script_hash, is_push_only};
pub use types::{ByteString, SigVersion, Stack, StepOutcome};
