use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ticketing_backend::{
    models::user::{User, UserRole},
    utils::jwt::{TokenError, TokenIssuer},
};

fn issuer(secret: &str) -> TokenIssuer {
    TokenIssuer::new(
        Some(secret.to_string()),
        "ticketing-test",
        "ticketing-test-client",
        Duration::minutes(5),
    )
}

fn organizer() -> User {
    User::new(
        "o@x.com".into(),
        "hash".into(),
        "Olga".into(),
        UserRole::Organizer,
        true,
    )
}

#[test]
fn expired_token_passes_refresh_validation_but_not_verification() {
    let issuer = issuer("secret");
    let user = organizer();
    let mut claims = issuer.claims_for(&user);
    claims.iat = (Utc::now() - Duration::hours(2)).timestamp();
    claims.exp = (Utc::now() - Duration::hours(1)).timestamp();
    let token = issuer.sign(&claims).expect("sign");

    let decoded = issuer
        .validate_expired_access_token(&token)
        .expect("expired token still decodes for refresh");
    assert_eq!(decoded.email, "o@x.com");
    assert_eq!(decoded.role, UserRole::Organizer);

    assert!(matches!(
        issuer.verify_access_token(&token),
        Err(TokenError::Invalid(_))
    ));
}

#[test]
fn token_signed_with_other_algorithm_is_rejected() {
    let issuer = issuer("secret");
    let claims = issuer.claims_for(&organizer());
    let token = encode(
        &Header::new(Algorithm::HS384),
        &claims,
        &EncodingKey::from_secret(b"secret"),
    )
    .expect("encode");

    assert!(issuer.validate_expired_access_token(&token).is_err());
    assert!(issuer.verify_access_token(&token).is_err());
}

#[test]
fn token_signed_with_other_secret_is_rejected() {
    let token = issuer("secret1")
        .issue_access_token(&organizer())
        .expect("issue");
    let other = issuer("secret2");
    assert!(other.validate_expired_access_token(&token).is_err());
    assert!(other.verify_access_token(&token).is_err());
}

#[test]
fn refresh_validation_ignores_issuer_and_audience() {
    let foreign = TokenIssuer::new(
        Some("secret".into()),
        "someone-else",
        "another-client",
        Duration::minutes(5),
    );
    let token = foreign.issue_access_token(&organizer()).expect("issue");

    let ours = issuer("secret");
    assert!(ours.validate_expired_access_token(&token).is_ok());
    assert!(ours.verify_access_token(&token).is_err());
}

#[test]
fn malformed_token_is_rejected() {
    let issuer = issuer("secret");
    assert!(issuer.validate_expired_access_token("not.a.jwt").is_err());
    assert!(issuer.validate_expired_access_token("").is_err());
}

#[test]
fn absent_key_fails_validation_with_config_error() {
    let token = issuer("secret")
        .issue_access_token(&organizer())
        .expect("issue");
    let unconfigured = TokenIssuer::new(None, "iss", "aud", Duration::minutes(5));
    assert!(matches!(
        unconfigured.validate_expired_access_token(&token),
        Err(TokenError::MissingSigningKey)
    ));
}
