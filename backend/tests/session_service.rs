use std::sync::Arc;

use ticketing_backend::{
    config::Config,
    models::user::UserRole,
    repositories::{InMemoryUserRepository, UserRepository},
    services::{AuthError, AuthService},
};

mod support;

fn service_with_config(config: &Config) -> AuthService {
    AuthService::from_config(Arc::new(InMemoryUserRepository::new()), config)
}

fn service() -> AuthService {
    service_with_config(&support::test_config())
}

#[tokio::test]
async fn concurrent_refreshes_with_same_pair_have_one_winner() {
    let auth = service();
    auth.register("a@x.com", "secret1", "Ann", "Attendee")
        .await
        .expect("register");
    let session = auth.login("a@x.com", "secret1").await.expect("login");

    let (first, second) = tokio::join!(
        auth.refresh(&session.access_token, &session.refresh_token),
        auth.refresh(&session.access_token, &session.refresh_token),
    );

    let winners = [first.is_ok(), second.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(winners, 1);
    let loser = first.err().or(second.err()).expect("one loser");
    assert!(matches!(loser, AuthError::Unauthorized));
}

#[tokio::test]
async fn registration_only_accepts_attendee_and_organizer() {
    let auth = service();
    assert!(matches!(
        auth.register("x@x.com", "secret1", "X", "Admin").await,
        Err(AuthError::UnauthorizedRole)
    ));
    assert!(matches!(
        auth.register("x@x.com", "secret1", "X", "Superuser").await,
        Err(AuthError::UnauthorizedRole)
    ));

    let attendee = auth
        .register("a@x.com", "secret1", "Ann", "Attendee")
        .await
        .expect("attendee");
    assert!(attendee.is_approved);
    let organizer = auth
        .register("o@x.com", "secret1", "Olga", "Organizer")
        .await
        .expect("organizer");
    assert!(!organizer.is_approved);

    assert!(matches!(
        auth.register("a@x.com", "other1", "Ann", "Attendee").await,
        Err(AuthError::DuplicateEmail)
    ));
}

#[tokio::test]
async fn auto_approve_option_lets_organizers_log_in_immediately() {
    let config = Config {
        organizer_auto_approve: true,
        ..support::test_config()
    };
    let auth = service_with_config(&config);
    auth.register("o@x.com", "secret1", "Olga", "Organizer")
        .await
        .expect("register");
    let session = auth.login("o@x.com", "secret1").await.expect("login");
    assert_eq!(session.role, UserRole::Organizer);
}

#[tokio::test]
async fn organizer_login_waits_for_approval() {
    let auth = service();
    let organizer = auth
        .register("o@x.com", "secret1", "Olga", "Organizer")
        .await
        .expect("register");

    assert!(matches!(
        auth.login("o@x.com", "secret1").await,
        Err(AuthError::PendingApproval)
    ));
    // Wrong password never reveals the pending state.
    assert!(matches!(
        auth.login("o@x.com", "wrong!").await,
        Err(AuthError::InvalidCredentials)
    ));

    auth.approve_organizer(organizer.id).await.expect("approve");
    assert!(matches!(
        auth.approve_organizer(organizer.id).await,
        Err(AuthError::BadRequest("Organizer is already approved"))
    ));
    assert!(auth.login("o@x.com", "secret1").await.is_ok());
}

#[tokio::test]
async fn approving_non_organizer_is_not_found() {
    let auth = service();
    let attendee = auth
        .register("a@x.com", "secret1", "Ann", "Attendee")
        .await
        .expect("register");
    assert!(matches!(
        auth.approve_organizer(attendee.id).await,
        Err(AuthError::NotFound("Organizer not found"))
    ));
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() {
    let auth = service();
    auth.register("a@x.com", "secret1", "Ann", "Attendee")
        .await
        .expect("register");

    let unknown = auth.login("nobody@x.com", "secret1").await.unwrap_err();
    let wrong = auth.login("a@x.com", "secret2").await.unwrap_err();
    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[tokio::test]
async fn second_login_invalidates_first_refresh_token() {
    let auth = service();
    auth.register("a@x.com", "secret1", "Ann", "Attendee")
        .await
        .expect("register");
    let first = auth.login("a@x.com", "secret1").await.expect("login");
    let _second = auth.login("a@x.com", "secret1").await.expect("login");

    assert!(matches!(
        auth.refresh(&first.access_token, &first.refresh_token).await,
        Err(AuthError::Unauthorized)
    ));
}

#[tokio::test]
async fn refresh_input_checks() {
    let auth = service();
    assert!(matches!(
        auth.refresh("", "token").await,
        Err(AuthError::BadRequest("Invalid client request"))
    ));
    assert!(matches!(
        auth.refresh("garbage", "token").await,
        Err(AuthError::InvalidToken)
    ));
}

#[tokio::test]
async fn logout_is_idempotent_and_ends_session() {
    let auth = service();
    auth.register("a@x.com", "secret1", "Ann", "Attendee")
        .await
        .expect("register");
    let session = auth.login("a@x.com", "secret1").await.expect("login");

    auth.logout("a@x.com").await.expect("logout");
    auth.logout("a@x.com").await.expect("second logout");
    assert!(matches!(
        auth.refresh(&session.access_token, &session.refresh_token).await,
        Err(AuthError::Unauthorized)
    ));
    assert!(matches!(
        auth.logout("nobody@x.com").await,
        Err(AuthError::NotFound(_))
    ));
}

#[tokio::test]
async fn change_password_keeps_existing_session() {
    let auth = service();
    auth.register("a@x.com", "secret1", "Ann", "Attendee")
        .await
        .expect("register");
    let session = auth.login("a@x.com", "secret1").await.expect("login");

    assert!(matches!(
        auth.change_password("a@x.com", "wrong1", "secret2").await,
        Err(AuthError::InvalidCredentials)
    ));
    auth.change_password("a@x.com", "secret1", "secret2")
        .await
        .expect("change password");

    assert!(auth.login("a@x.com", "secret1").await.is_err());
    assert!(auth
        .refresh(&session.access_token, &session.refresh_token)
        .await
        .is_ok());
    assert!(matches!(
        auth.change_password("nobody@x.com", "a", "secret3").await,
        Err(AuthError::NotFound(_))
    ));
}

#[tokio::test]
async fn missing_signing_key_surfaces_as_config_error() {
    let config = Config {
        jwt_secret: None,
        ..support::test_config()
    };
    let auth = service_with_config(&config);
    auth.register("a@x.com", "secret1", "Ann", "Attendee")
        .await
        .expect("register");
    assert!(matches!(
        auth.login("a@x.com", "secret1").await,
        Err(AuthError::MissingSigningKey)
    ));
}

#[tokio::test]
async fn admin_account_management_rules() {
    let auth = service();
    assert!(auth.ensure_admin("root@x.com", "secret1").await.expect("bootstrap"));
    assert!(!auth.ensure_admin("root@x.com", "secret1").await.expect("again"));
    let root = auth
        .users()
        .find_by_email("root@x.com")
        .await
        .expect("lookup")
        .expect("root exists");

    assert!(matches!(
        auth.create_user("att@x.com", "secret1", "Att", "Attendee").await,
        Err(AuthError::BadRequest("Only Organizer or Admin can be created"))
    ));
    let organizer = auth
        .create_user("org@x.com", "secret1", "Org", "Organizer")
        .await
        .expect("create organizer");
    assert!(organizer.is_approved);

    assert!(matches!(
        auth.delete_user(root.id, root.id).await,
        Err(AuthError::BadRequest("You cannot delete your own account."))
    ));

    let second_admin = auth
        .create_user("admin2@x.com", "secret1", "Second", "Admin")
        .await
        .expect("create admin");
    auth.delete_user(second_admin.id, root.id)
        .await
        .expect("delete one of two admins");
    let other = auth
        .create_user("admin3@x.com", "secret1", "Third", "Admin")
        .await
        .expect("create admin");
    auth.delete_user(second_admin.id, other.id)
        .await
        .expect("delete third admin");
    assert!(matches!(
        auth.delete_user(organizer.id, second_admin.id).await,
        Err(AuthError::BadRequest("Cannot delete the last admin."))
    ));

    auth.delete_user(second_admin.id, organizer.id)
        .await
        .expect("delete organizer");
    assert!(matches!(
        auth.delete_user(second_admin.id, organizer.id).await,
        Err(AuthError::NotFound(_))
    ));
}

#[tokio::test]
async fn pending_organizers_are_listed_until_approved() {
    let auth = service();
    let organizer = auth
        .register("o@x.com", "secret1", "Olga", "Organizer")
        .await
        .expect("register");
    auth.register("a@x.com", "secret1", "Ann", "Attendee")
        .await
        .expect("register");

    let pending = auth.list_pending_organizers().await.expect("list");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, organizer.id);

    auth.approve_organizer(organizer.id).await.expect("approve");
    assert!(auth.list_pending_organizers().await.expect("list").is_empty());
}
