pub mod email;
pub mod sessions;
