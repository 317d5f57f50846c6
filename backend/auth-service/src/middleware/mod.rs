pub mod admin;
pub mod jwt_auth;

pub use admin::RequireAdmin;
pub use jwt_auth::{CurrentUser, JwtAuth};
