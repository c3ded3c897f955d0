//! Salted one-way password hashing (Argon2id, PHC string format).

use argon2::password_hash::SaltString;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version,
};

/// Argon2 work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes over memory
    pub iterations: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
        }
    }
}

impl HashCost {
    /// Cheapest parameters Argon2 accepts. Only for tests.
    pub const fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hash parameters: {0}")]
    Params(argon2::Error),
    #[error("failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
}

/// Password hasher with a fixed work factor.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Digest of a random password at this work factor, verified against
    /// when there is no stored digest so the caller still pays for a hash
    decoy: String,
}

impl PasswordHasher {
    pub fn new(cost: HashCost) -> Result<Self, HashError> {
        let params =
            Params::new(cost.memory_kib, cost.iterations, 1, None).map_err(HashError::Params)?;
        let mut hasher = Self {
            params,
            decoy: String::new(),
        };
        hasher.decoy = hasher.hash(&uuid::Uuid::new_v4().to_string())?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        let salt = salt()?;
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(HashError::Hash)
    }

    /// Check a plaintext password against a stored digest.
    /// A malformed digest is treated as a mismatch.
    ///
    /// Verification uses the parameters embedded in the digest, so digests
    /// produced under an older work factor keep verifying.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        PasswordHash::new(digest)
            .ok()
            .as_ref()
            .map(|hash| {
                self.argon2()
                    .verify_password(password.as_bytes(), hash)
                    .is_ok()
            })
            .unwrap_or(false)
    }

    /// Digest to verify against when no account matched.
    pub fn decoy_digest(&self) -> &str {
        &self.decoy
    }
}

fn salt() -> Result<SaltString, HashError> {
    use rand::Rng;
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    SaltString::encode_b64(&bytes).map_err(HashError::Hash)
}
