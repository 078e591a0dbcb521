//! Core types for script execution

use serde::{Deserialize, Serialize};

/// Byte string type
pub type ByteString = Vec<u8>;

/// Data stack: ordered byte strings, LIFO, top = last element
pub type Stack = Vec<ByteString>;

/// Signature-hashing semantics tag.
///
/// Opaque to the execution core; it is forwarded to the signature checker
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigVersion {
    Base,
    WitnessV0,
}

/// Outcome of a single successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// More stepping is required; the script is not finished.
    Continue,
    /// The script terminated successfully.
    Done,
}
