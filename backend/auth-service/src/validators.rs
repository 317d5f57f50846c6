use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap()
});

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{3,30}$").unwrap());

pub const PASSWORD_MIN_LENGTH: usize = 6;

pub fn validate_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Usernames are 3-30 characters of letters, digits, hyphens and underscores.
pub fn validate_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}

pub fn validate_password(password: &str) -> bool {
    password.len() >= PASSWORD_MIN_LENGTH
}

/// How a password-reset requester identified the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Email,
    Username,
}

/// Reset requests carry a single identifier that is either an email address
/// or a username. Anything shaped like an email is treated as one.
pub fn classify_identifier(identifier: &str) -> IdentifierKind {
    if validate_email(identifier) {
        IdentifierKind::Email
    } else {
        IdentifierKind::Username
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alice@example.com"));
        assert!(validate_email("alice.smith+tag@sub.example.co"));
        assert!(!validate_email("alice"));
        assert!(!validate_email("alice@"));
        assert!(!validate_email("@example.com"));
        assert!(!validate_email("alice @example.com"));
    }

    #[test]
    fn test_validate_email_length_cap() {
        let local = "a".repeat(250);
        let email = format!("{}@example.com", local);
        assert!(!validate_email(&email));
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice"));
        assert!(validate_username("alice_123"));
        assert!(validate_username("al-ice"));
        assert!(!validate_username("ab"));
        assert!(!validate_username(&"a".repeat(31)));
        assert!(!validate_username("alice smith"));
        assert!(!validate_username("alice!"));
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("longpw1"));
        assert!(validate_password("123456"));
        assert!(!validate_password("12345"));
        assert!(!validate_password(""));
    }

    #[test]
    fn test_classify_identifier() {
        assert_eq!(
            classify_identifier("alice@example.com"),
            IdentifierKind::Email
        );
        assert_eq!(classify_identifier("alice"), IdentifierKind::Username);
        assert_eq!(classify_identifier("al-ice_99"), IdentifierKind::Username);
    }
}
