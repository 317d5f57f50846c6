pub mod jwt;
pub mod otp;
pub mod password;
