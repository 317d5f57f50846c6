use chrono::{DateTime, Duration, Utc};
use rand::Rng;

pub const OTP_LENGTH: usize = 6;
pub const OTP_TTL_MINUTES: i64 = 10;

/// Uniformly random six-digit code. The range starts at 100000 so every code
/// has exactly six digits.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Expiry timestamp for a code generated now.
pub fn otp_expiry() -> DateTime<Utc> {
    Utc::now() + Duration::minutes(OTP_TTL_MINUTES)
}

pub fn is_valid_format(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.chars().all(|c| c.is_ascii_digit())
}
