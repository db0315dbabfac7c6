//! Polls - a small polling web application

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use polls::{
    api::{self, AppState},
    config::Config,
    db::{
        self, DatabasePool,
        repositories::{
            SqlxChoiceRepository, SqlxQuestionRepository, SqlxSessionRepository,
            SqlxUserRepository, SqlxVoteRepository,
        },
    },
    hooks::HookManager,
    services::{AuthEventLogger, PollService, UserService, VotingService},
    templates::TemplateEngine,
};

/// How often expired sessions are swept
const SESSION_CLEANUP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polls=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting polls...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Auth events are logged through hooks on the user service
    let hook_manager = Arc::new(HookManager::new());
    Arc::new(AuthEventLogger::with_tracing()).subscribe(&hook_manager);

    // Create repositories
    let question_repo = SqlxQuestionRepository::boxed(pool.clone());
    let choice_repo = SqlxChoiceRepository::boxed(pool.clone());
    let vote_repo = SqlxVoteRepository::boxed(pool.clone());
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());

    // Initialize services
    let poll_service = Arc::new(PollService::new(question_repo.clone(), choice_repo.clone()));
    let voting_service = Arc::new(VotingService::new(question_repo, choice_repo, vote_repo));
    let user_service = Arc::new(
        UserService::new(user_repo, session_repo)
            .with_session_ttl_days(config.session.ttl_days)
            .with_hooks(hook_manager),
    );

    // Initialize template engine
    let override_dir = match config.templates.path.as_deref() {
        Some(dir) if dir.is_dir() => Some(dir),
        Some(dir) => {
            tracing::warn!("Template directory {:?} not found, using embedded templates", dir);
            None
        }
        None => None,
    };
    let templates = Arc::new(TemplateEngine::new(override_dir)?);
    tracing::info!("Template engine initialized");

    // Sweep expired sessions periodically
    {
        let user_service = user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(
                SESSION_CLEANUP_INTERVAL_SECS,
            ));
            loop {
                interval.tick().await;
                match user_service.cleanup_expired_sessions(chrono::Utc::now()).await {
                    Ok(0) => {}
                    Ok(count) => tracing::info!("Removed {} expired sessions", count),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    let state = AppState {
        poll_service,
        voting_service,
        user_service,
        templates,
    };

    // Build router
    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
