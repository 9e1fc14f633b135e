//! Session resumption tokens
//!
//! A `SessionToken` is the only credential a client holds: it names a
//! resumable game session and nothing else.
//!
//! ## Notes
//!
//! - **Copy trait**: Token is only 32 bytes, cheap to copy
//! - **Hash trait**: Used as the registry map key
//! - **Random generation**: Uses thread_rng() from rand crate
//! - **Wire form**: 64 lowercase hex characters

use crate::error::CoreError;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// Token size in bytes (256-bit)
const TOKEN_SIZE: usize = 32;

/// Opaque, unguessable session resumption token
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken([u8; TOKEN_SIZE]);

impl SessionToken {
    /// Generate a new random token
    ///
    /// # Example
    /// ```
    /// # use cellquest_core::auth::SessionToken;
    /// let token = SessionToken::generate();
    /// assert_eq!(token.as_bytes().len(), 32);
    /// ```
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_SIZE];
        rand::thread_rng().fill(&mut bytes);
        Self(bytes)
    }

    /// Create token from hexadecimal string
    ///
    /// # Errors
    /// - `InvalidTokenFormat` if hex string is not exactly 64 characters
    /// - `InvalidTokenFormat` if hex string contains non-hex characters
    pub fn from_hex(hex: &str) -> Result<Self, CoreError> {
        if hex.len() != TOKEN_SIZE * 2 || !hex.is_ascii() {
            return Err(CoreError::InvalidTokenFormat);
        }

        let mut bytes = [0u8; TOKEN_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| CoreError::InvalidTokenFormat)?;
        }
        Ok(Self(bytes))
    }

    /// Export token as a 64-character lowercase hex string
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Get raw bytes reference
    pub fn as_bytes(&self) -> &[u8; TOKEN_SIZE] {
        &self.0
    }

    /// Short prefix for log lines; never log the whole token.
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({}..)", self.short())
    }
}

impl FromStr for SessionToken {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}
