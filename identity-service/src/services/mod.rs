pub mod error;
pub mod identity;
pub mod invitation;
pub mod session;
pub mod verification;

pub use error::ServiceError;
pub use identity::IdentityService;
pub use invitation::{InvitationService, IssuedInvitation};
pub use session::{JwtSessionIssuer, SessionClaims, SessionHandle, SessionIssuer};
pub use verification::{VerificationService, VerifyOutcome};
