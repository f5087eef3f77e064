//! Argon2id password hashing and single-use reset tokens.
//!
//! Password hashes are PHC strings (`$argon2id$v=19$...`) so parameters can
//! change later without invalidating stored hashes. Reset tokens are random
//! URL-safe strings; only their SHA-256 digest is stored.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::{CoreError, Result};

/// Memory cost in KiB (19 MiB).
pub const M_COST: u32 = 19_456;
/// Iterations.
pub const T_COST: u32 = 2;
/// Parallelism lanes.
pub const P_COST: u32 = 1;

fn hasher() -> Result<Argon2<'static>> {
    let params = Params::new(M_COST, T_COST, P_COST, None)
        .map_err(|e| CoreError::PasswordHash(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| CoreError::PasswordHash(e.to_string()))?;

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CoreError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Check `password` against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch; `Err` only when the stored hash is unparsable.
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| CoreError::PasswordHash(e.to_string()))?;
    Ok(hasher()?
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// 32 random bytes, base64url without padding.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of a token, the form kept in the database.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Secret123").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Secret123", &hash).expect("verify"));
        assert!(!verify_password("secret123", &hash).expect("verify"));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("Secret123").expect("hash");
        let b = hash_password("Secret123").expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn test_unparsable_hash_is_error() {
        assert!(verify_password("Secret123", "plaintext").is_err());
    }

    #[test]
    fn test_reset_tokens() {
        let t1 = random_token();
        let t2 = random_token();
        assert_ne!(t1, t2);
        assert_eq!(t1.len(), 43);
        assert_eq!(hash_token(&t1), hash_token(&t1));
        assert_eq!(hash_token(&t1).len(), 64);
        assert_ne!(hash_token(&t1), hash_token(&t2));
    }
}
