pub mod account;
pub mod provider_link;

pub use account::Account;
pub use provider_link::{InviteState, OtpChallenge, ProviderLink, VerificationStatus};
