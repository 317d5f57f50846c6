pub mod token_revocation;
pub mod user;

pub use token_revocation::{RevocationReason, RevokedToken, TokenKind};
pub use user::{User, UserRole, UserSummary};
