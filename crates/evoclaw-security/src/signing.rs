//! Ed25519 signatures over the canonical serialization of [`GenomeConstraints`].
//!
//! API usage only — no direct source in the corpus signs with
//! `ed25519-dalek` (grounded on `surrealdb-surrealdb`'s choice of the crate
//! for its IAM layer, which signs JWTs rather than JSON payloads).

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use evoclaw_core::{Error, Result};

use crate::canonical::canonical_bytes;
use crate::constraints::GenomeConstraints;

/// Sign `constraints` with `signing_key`, returning the signature as hex.
pub fn sign_constraints(signing_key: &SigningKey, constraints: &GenomeConstraints) -> String {
    let sig: Signature = signing_key.sign(&canonical_bytes(constraints));
    hex::encode(sig.to_bytes())
}

/// Verify `signature_hex` over `constraints` against `public_key_hex`.
/// Returns `Ok(false)` on a genuine signature mismatch (including any field
/// tamper); returns `Err` only when the key/signature encoding itself is
/// malformed.
pub fn verify_constraints(public_key_hex: &str, constraints: &GenomeConstraints, signature_hex: &str) -> Result<bool> {
    let pubkey_bytes: [u8; 32] = hex::decode(public_key_hex)
        .map_err(|e| Error::invalid_argument(format!("bad owner_public_key encoding: {e}")))?
        .try_into()
        .map_err(|_| Error::invalid_argument("owner_public_key must be 32 bytes"))?;
    let verifying_key = VerifyingKey::from_bytes(&pubkey_bytes)
        .map_err(|e| Error::invalid_argument(format!("invalid owner_public_key: {e}")))?;

    let sig_bytes: [u8; 64] = hex::decode(signature_hex)
        .map_err(|e| Error::invalid_argument(format!("bad constraint_signature encoding: {e}")))?
        .try_into()
        .map_err(|_| Error::invalid_argument("constraint_signature must be 64 bytes"))?;
    let signature = Signature::from_bytes(&sig_bytes);

    Ok(verifying_key.verify(&canonical_bytes(constraints), &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn constraints() -> GenomeConstraints {
        GenomeConstraints {
            max_loss_usd: Some(500.0),
            blocked_actions: vec!["sell_all".into()],
            extra: Default::default(),
        }
    }

    #[test]
    fn valid_signature_verifies() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let pubkey_hex = hex::encode(signing_key.verifying_key().to_bytes());
        let c = constraints();
        let sig = sign_constraints(&signing_key, &c);
        assert!(verify_constraints(&pubkey_hex, &c, &sig).unwrap());
    }

    #[test]
    fn tampered_field_flips_verification() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let pubkey_hex = hex::encode(signing_key.verifying_key().to_bytes());
        let c = constraints();
        let sig = sign_constraints(&signing_key, &c);

        let mut tampered = c.clone();
        tampered.max_loss_usd = Some(999_999.0);
        assert!(!verify_constraints(&pubkey_hex, &tampered, &sig).unwrap());
    }

    #[test]
    fn malformed_key_is_an_error_not_a_false() {
        let c = constraints();
        assert!(verify_constraints("not-hex", &c, "also-not-hex").is_err());
    }
}
