//! Error taxonomy for script execution

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal error kinds raised by the execution core and the opcode stepper.
///
/// Every failure is terminal for the run: once a step returns one of these,
/// the environment stays in that state and further stepping returns the same
/// error again.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptError {
    /// Legacy pending sentinel, kept in the taxonomy for drivers that map
    /// error codes; the core itself never returns it.
    #[error("unknown error")]
    UnknownError,

    #[error("script evaluated without error but finished with a false/empty top stack element")]
    EvalFalse,

    #[error("OP_RETURN was encountered")]
    OpReturn,

    #[error("script is over the maximum allowed size")]
    ScriptSize,

    #[error("push value size limit exceeded")]
    PushSize,

    #[error("operation limit exceeded")]
    OpCount,

    #[error("stack size limit exceeded")]
    StackSize,

    #[error("OP_VERIFY failed")]
    Verify,

    #[error("OP_EQUALVERIFY failed")]
    EqualVerify,

    #[error("OP_CHECKSIGVERIFY failed")]
    CheckSigVerify,

    #[error("opcode missing or not understood")]
    BadOpcode,

    #[error("attempted use of a disabled opcode")]
    DisabledOpcode,

    #[error("operation not valid with the current stack size")]
    InvalidStackOperation,

    #[error("operation not valid with the current altstack size")]
    InvalidAltstackOperation,

    #[error("invalid OP_IF construction")]
    UnbalancedConditional,

    #[error("script number overflow")]
    ScriptNumOverflow,

    #[error("non-minimally encoded script number or push")]
    MinimalData,

    #[error("unlocking script must contain only push operations")]
    SigPushOnly,
}

pub type Result<T> = std::result::Result<T, ScriptError>;
