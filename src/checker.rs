//! Signature-checking capability forwarded through the execution environment

use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, VerifyOnly};

use crate::types::SigVersion;

/// Opaque signature-checking capability.
///
/// The execution core never interprets signatures itself; it forwards this
/// capability to the opcode stepper, which consults it for OP_CHECKSIG and
/// OP_CHECKSIGVERIFY.
pub trait SignatureChecker {
    /// Verify `signature` (DER, optionally followed by a one-byte sighash
    /// type) against `pubkey` under the given signature version.
    fn check_ecdsa_signature(&self, signature: &[u8], pubkey: &[u8], sig_version: SigVersion)
        -> bool;
}

/// Checker that rejects every signature. Used for pure stack debugging where
/// no transaction context exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSignatureChecker;

impl SignatureChecker for NoSignatureChecker {
    fn check_ecdsa_signature(&self, _: &[u8], _: &[u8], _: SigVersion) -> bool {
        false
    }
}

/// Checker that verifies ECDSA signatures over a caller-supplied 32-byte
/// message digest using secp256k1.
pub struct SecpSignatureChecker {
    secp: Secp256k1<VerifyOnly>,
    digest: [u8; 32],
}

impl SecpSignatureChecker {
    pub fn new(digest: [u8; 32]) -> Self {
        Self {
            secp: Secp256k1::verification_only(),
            digest,
        }
    }
}

impl SignatureChecker for SecpSignatureChecker {
    fn check_ecdsa_signature(
        &self,
        signature: &[u8],
        pubkey: &[u8],
        _sig_version: SigVersion,
    ) -> bool {
        let Ok(pubkey) = PublicKey::from_slice(pubkey) else {
            return false;
        };
        // Script signatures append a sighash-type byte to the DER body;
        // accept either form.
        let signature = match Signature::from_der(signature) {
            Ok(sig) => sig,
            Err(_) => {
                let Some((_, der)) = signature.split_last() else {
                    return false;
                };
                match Signature::from_der(der) {
                    Ok(sig) => sig,
                    Err(_) => return false,
                }
            }
        };
        let Ok(message) = Message::from_digest_slice(&self.digest) else {
            return false;
        };
        self.secp
            .verify_ecdsa(&message, &signature, &pubkey)
            .is_ok()
    }
}
