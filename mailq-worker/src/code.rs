//! Verification code generation.
//!
//! Codes are six decimal digits drawn from the operating system's CSPRNG:
//! four random bytes are read as a big-endian `u32`, reduced modulo 900000
//! and offset by 100000. The modulo bias is bounded by 900000 / 2^32.

use std::fmt;
use std::time::{Duration, SystemTime};

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use thiserror::Error;

/// How long an issued code stays valid.
pub const CODE_TTL: Duration = Duration::from_secs(60 * 60);

const CODE_MIN: u32 = 100_000;
const CODE_SPAN: u32 = 900_000;

/// The secure random source could not supply entropy.
#[derive(Debug, Error)]
#[error("secure random source unavailable: {0}")]
pub struct RandomSourceError(#[from] rand::Error);

/// A freshly issued six digit verification code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCode {
    digits: String,
    issued_at: SystemTime,
}

impl VerificationCode {
    pub fn as_str(&self) -> &str {
        &self.digits
    }

    pub fn issued_at(&self) -> SystemTime {
        self.issued_at
    }

    pub fn expires_at(&self) -> SystemTime {
        self.issued_at + CODE_TTL
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now > self.expires_at()
    }
}

impl fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digits)
    }
}

/// Generate a code from the OS random source.
pub fn generate_code() -> Result<VerificationCode, RandomSourceError> {
    generate_code_with(&mut OsRng)
}

/// Generate a code from the given cryptographically secure generator.
pub fn generate_code_with<R>(rng: &mut R) -> Result<VerificationCode, RandomSourceError>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let mut bytes = [0u8; 4];
    rng.try_fill_bytes(&mut bytes)?;

    Ok(VerificationCode {
        digits: code_from_bytes(bytes),
        issued_at: SystemTime::now(),
    })
}

fn code_from_bytes(bytes: [u8; 4]) -> String {
    let n = u32::from_be_bytes(bytes);
    format!("{:06}", CODE_MIN + n % CODE_SPAN)
}
