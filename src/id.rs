//! Random opaque IDs for expense transaction IDs and session tokens.

use base64::{Engine, engine::general_purpose::URL_SAFE};
use rand::{RngCore, rngs::OsRng};

use crate::Error;

/// The number of random bytes in a transaction ID or session token.
pub const TRANSACTION_ID_BYTES: usize = 16;

/// Produces URL-safe, collision-resistant opaque strings.
///
/// The ledger and session store take this as an injected capability so tests can
/// substitute predictable IDs.
pub trait IdGenerator: Send + Sync {
    /// Generate a new ID.
    ///
    /// # Errors
    ///
    /// Returns [Error::IdGenerationError] if no ID could be generated.
    fn generate_id(&self) -> Result<String, Error>;
}

/// Generates IDs from the operating system's cryptographically secure random number
/// generator, encoded as URL-safe base64.
#[derive(Debug, Clone, Copy)]
pub struct RandomIdGenerator {
    num_bytes: usize,
}

impl RandomIdGenerator {
    /// Create a generator that draws `num_bytes` random bytes for each ID.
    pub fn new(num_bytes: usize) -> Self {
        Self { num_bytes }
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new(TRANSACTION_ID_BYTES)
    }
}

impl IdGenerator for RandomIdGenerator {
    fn generate_id(&self) -> Result<String, Error> {
        let mut bytes = vec![0u8; self.num_bytes];

        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|error| Error::IdGenerationError(error.to_string()))?;

        Ok(URL_SAFE.encode(bytes))
    }
}

/// Hands out `prefix-1`, `prefix-2`, ... in order.
#[cfg(test)]
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: &'static str,
    next: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl SequentialIdGenerator {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: std::sync::atomic::AtomicUsize::new(1),
        }
    }
}

#[cfg(test)]
impl IdGenerator for SequentialIdGenerator {
    fn generate_id(&self) -> Result<String, Error> {
        let n = self
            .next
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        Ok(format!("{}-{n}", self.prefix))
    }
}
