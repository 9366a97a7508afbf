use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketing_backend::{
    config::Config,
    repositories::{InMemoryUserRepository, PgUserRepository, UserRepository},
    router,
    state::AppState,
};

fn mask_secret(s: Option<&str>) -> String {
    match s {
        None | Some("") => "<unset>".into(),
        Some(s) => {
            let prefix = s.chars().take(4).collect::<String>();
            format!("{}*** (len={})", prefix, s.len())
        }
    }
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn UserRepository>> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            Ok(Arc::new(PgUserRepository::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
            Ok(Arc::new(InMemoryUserRepository::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticketing_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database = config.database_url.is_some(),
        jwt_secret = %mask_secret(config.jwt_secret.as_deref()),
        jwt_issuer = %config.jwt_issuer,
        jwt_audience = %config.jwt_audience,
        access_token_ttl_minutes = config.access_token_ttl_minutes,
        refresh_token_expiration_days = config.refresh_token_expiration_days,
        organizer_auto_approve = config.organizer_auto_approve,
        "Loaded configuration from environment/.env"
    );
    if config.jwt_secret.is_none() {
        tracing::warn!("JWT_SECRET not set; logins will fail until it is configured");
    }

    let users = connect_store(&config).await?;
    let addr = config.bind_addr;
    let state = AppState::new(config, users);

    if let (Some(email), Some(password)) = (
        state.config.admin_email.as_deref(),
        state.config.admin_password.as_deref(),
    ) {
        state.auth.ensure_admin(email, password).await?;
    }

    let app = router(state);

    tracing::info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
