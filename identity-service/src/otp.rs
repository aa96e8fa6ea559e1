//! OTP engine - pure generation and validation of 6-digit codes.
//!
//! Nothing in here touches storage; the verification service owns all state
//! transitions. Validation checks expiry before correctness so an expired
//! code is always rejected as expired, even when it would have matched.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::rngs::OsRng;

use crate::models::OtpChallenge;

pub const CODE_LENGTH: usize = 6;

/// Why a submitted code was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpRejection {
    IncorrectCode,
    Expired,
}

impl OtpRejection {
    /// Stable wire identifier returned to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpRejection::IncorrectCode => "incorrect_code",
            OtpRejection::Expired => "otp_expired",
        }
    }
}

/// Generate a uniformly distributed 6-digit code, leading zeros allowed.
pub fn generate() -> String {
    let n: u32 = OsRng.gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// Expiry timestamp for a challenge issued at `now`.
pub fn expiry_from(now: DateTime<Utc>, ttl_minutes: i64) -> DateTime<Utc> {
    now + Duration::minutes(ttl_minutes)
}

/// Validate a submitted code against a stored challenge at time `now`.
///
/// Expiry dominates correctness: an expired-but-correct code is rejected as
/// `Expired`. The comparison is an exact string match on the trimmed input,
/// with no numeric coercion ("007" never equals "7").
pub fn validate(
    challenge: &OtpChallenge,
    submitted: &str,
    now: DateTime<Utc>,
) -> Result<(), OtpRejection> {
    if now >= challenge.expiry_utc {
        return Err(OtpRejection::Expired);
    }

    if submitted.trim() != challenge.code {
        return Err(OtpRejection::IncorrectCode);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(code: &str, expiry_utc: DateTime<Utc>) -> OtpChallenge {
        OtpChallenge {
            code: code.to_string(),
            phone: "+3212345678".to_string(),
            expiry_utc,
        }
    }

    #[test]
    fn generated_codes_are_six_ascii_digits() {
        for _ in 0..100 {
            let code = generate();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn generated_codes_are_not_sequential() {
        let codes: Vec<String> = (0..20).map(|_| generate()).collect();
        let all_equal = codes.windows(2).all(|w| w[0] == w[1]);
        assert!(!all_equal);
    }

    #[test]
    fn expiry_is_ttl_minutes_after_now() {
        let now = Utc::now();
        assert_eq!(expiry_from(now, 10), now + Duration::minutes(10));
    }

    #[test]
    fn matching_code_within_window_is_valid() {
        let now = Utc::now();
        let c = challenge("042137", now + Duration::minutes(5));
        assert_eq!(validate(&c, "042137", now), Ok(()));
    }

    #[test]
    fn submitted_value_is_trimmed() {
        let now = Utc::now();
        let c = challenge("042137", now + Duration::minutes(5));
        assert_eq!(validate(&c, "  042137 \n", now), Ok(()));
    }

    #[test]
    fn expiry_dominates_correctness() {
        let now = Utc::now();
        let c = challenge("042137", now - Duration::seconds(1));
        // Correct code, expired challenge: must be Expired, not accepted.
        assert_eq!(validate(&c, "042137", now), Err(OtpRejection::Expired));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let c = challenge("042137", now);
        assert_eq!(validate(&c, "042137", now), Err(OtpRejection::Expired));
    }

    #[test]
    fn leading_zero_mismatch_is_incorrect() {
        let now = Utc::now();
        let c = challenge("012345", now + Duration::minutes(5));
        assert_eq!(
            validate(&c, "12345", now),
            Err(OtpRejection::IncorrectCode)
        );

        let c = challenge("007007", now + Duration::minutes(5));
        assert_eq!(
            validate(&c, "7007", now),
            Err(OtpRejection::IncorrectCode)
        );
    }

    #[test]
    fn wrong_code_is_incorrect() {
        let now = Utc::now();
        let c = challenge("042137", now + Duration::minutes(5));
        assert_eq!(
            validate(&c, "042138", now),
            Err(OtpRejection::IncorrectCode)
        );
    }
}
