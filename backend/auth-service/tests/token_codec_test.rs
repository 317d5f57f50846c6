use auth_service::config::JwtConfig;
use auth_service::db::token_revocation::hash_token;
use auth_service::error::AppError;
use auth_service::security::jwt::{TokenCodec, TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH};
use uuid::Uuid;

fn codec() -> TokenCodec {
    TokenCodec::new(&JwtConfig {
        access_secret: "integration-access-secret".to_string(),
        refresh_secret: "integration-refresh-secret".to_string(),
        access_token_ttl: 900,
        refresh_token_ttl: 604_800,
    })
}

#[test]
fn access_token_round_trips_with_identity_claims() {
    let codec = codec();
    let user_id = Uuid::new_v4();

    let token = codec
        .issue_access(user_id, "alice", "alice@example.com")
        .unwrap();
    let claims = codec.verify_access(&token).unwrap();

    assert_eq!(claims.sub, user_id.to_string());
    assert_eq!(claims.token_type, TOKEN_TYPE_ACCESS);
    assert_eq!(claims.username.as_deref(), Some("alice"));
    assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
    assert_eq!(claims.exp - claims.iat, 900);
}

#[test]
fn refresh_token_carries_only_the_subject() {
    let codec = codec();
    let user_id = Uuid::new_v4();

    let token = codec.issue_refresh(user_id).unwrap();
    let claims = codec.verify_refresh(&token).unwrap();

    assert_eq!(claims.sub, user_id.to_string());
    assert_eq!(claims.token_type, TOKEN_TYPE_REFRESH);
    assert!(claims.username.is_none());
    assert!(claims.email.is_none());
    assert_eq!(claims.exp - claims.iat, 604_800);
}

#[test]
fn token_classes_reject_each_other() {
    let codec = codec();
    let user_id = Uuid::new_v4();

    let access = codec
        .issue_access(user_id, "alice", "alice@example.com")
        .unwrap();
    let refresh = codec.issue_refresh(user_id).unwrap();

    assert!(matches!(
        codec.verify_refresh(&access),
        Err(AppError::InvalidToken)
    ));
    assert!(matches!(
        codec.verify_access(&refresh),
        Err(AppError::InvalidToken)
    ));
}

#[test]
fn tokens_signed_elsewhere_are_rejected() {
    let ours = codec();
    let theirs = TokenCodec::new(&JwtConfig {
        access_secret: "someone-elses-access-secret".to_string(),
        refresh_secret: "someone-elses-refresh-secret".to_string(),
        access_token_ttl: 900,
        refresh_token_ttl: 604_800,
    });

    let foreign = theirs
        .issue_access(Uuid::new_v4(), "mallory", "mallory@example.com")
        .unwrap();
    assert!(matches!(
        ours.verify_access(&foreign),
        Err(AppError::InvalidToken)
    ));
}

#[test]
fn expired_tokens_are_reported_as_expired() {
    let codec = TokenCodec::new(&JwtConfig {
        access_secret: "integration-access-secret".to_string(),
        refresh_secret: "integration-refresh-secret".to_string(),
        access_token_ttl: -300,
        refresh_token_ttl: -300,
    });

    let access = codec
        .issue_access(Uuid::new_v4(), "alice", "alice@example.com")
        .unwrap();
    let refresh = codec.issue_refresh(Uuid::new_v4()).unwrap();

    assert!(matches!(
        codec.verify_access(&access),
        Err(AppError::ExpiredToken)
    ));
    assert!(matches!(
        codec.verify_refresh(&refresh),
        Err(AppError::ExpiredToken)
    ));
}

#[test]
fn garbage_input_is_invalid_not_a_panic() {
    let codec = codec();
    for input in ["", "not-a-jwt", "a.b", "a.b.c.d", "  "] {
        assert!(matches!(
            codec.verify_access(input),
            Err(AppError::InvalidToken)
        ));
    }
}

#[test]
fn ledger_hash_is_stable_across_token_copies() {
    let codec = codec();
    let token = codec.issue_refresh(Uuid::new_v4()).unwrap();

    let copy = token.clone();
    assert_eq!(hash_token(&token), hash_token(&copy));
    assert_eq!(hash_token(&token).len(), 64);
    assert_ne!(
        hash_token(&token),
        hash_token(&codec.issue_refresh(Uuid::new_v4()).unwrap())
    );
}
