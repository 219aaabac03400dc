use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use tracing::{error, warn};

/// Salted argon2id hash in PHC string format.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Errors when `hash` is not a PHC string.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Like `verify_password`, but a stored value that is not a hash never matches.
pub fn password_matches(plain: &str, stored: &str) -> bool {
    verify_password(plain, stored).unwrap_or_else(|e| {
        warn!(error = %e, "stored credential is not an argon2 hash");
        false
    })
}

pub fn is_phc_hash(stored: &str) -> bool {
    PasswordHash::new(stored).is_ok()
}

/// Exact comparison against a value stored before hashing was introduced.
pub fn plaintext_matches(plain: &str, stored: &str) -> bool {
    let (a, b) = (plain.as_bytes(), stored.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
