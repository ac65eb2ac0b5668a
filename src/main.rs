use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use unimatch_engine::config::Settings;
use unimatch_engine::services::{GenerateOutcome, HttpBackend, MatchBackend, SessionContext};
use unimatch_engine::session::{MatchSession, SessionEvent, SessionOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize logging
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting match engine against {}", settings.backend.base_url);

    let mut context = SessionContext::new(settings.backend.feature.clone());
    match (
        std::env::var("UNIMATCH_USER_ID"),
        std::env::var("UNIMATCH_ACCESS_TOKEN"),
    ) {
        (Ok(user), Ok(token)) => context = context.with_user(user, token),
        _ => warn!("No UNIMATCH_USER_ID/UNIMATCH_ACCESS_TOKEN set, running anonymously"),
    }

    let backend: Arc<dyn MatchBackend> = Arc::new(HttpBackend::new(
        settings.backend.base_url.clone(),
        settings.backend.timeout(),
        context.clone(),
    )?);

    let (session, mut events) =
        MatchSession::start(context, backend, SessionOptions::from_settings(&settings)).await;

    let board = session.status_board();
    for (section, status) in &board.sections {
        info!("Section {}: {:?}", section, status);
    }
    info!("Weights: {:?}", board.weights);
    info!("Usage: {}", session.remaining_display());

    match session.generate().await {
        Ok(GenerateOutcome::Ranked { shown, total_count }) => {
            info!("Ranked {} universities ({} matched in total)", shown, total_count);
            if let Some(ranked) = session.ranked() {
                for candidate in &ranked.results {
                    info!("  {:>3}  {}", candidate.score_original, candidate.name);
                }
                if ranked.locked_count() > 0 {
                    info!("  ... and {} more on a paid plan", ranked.locked_count());
                }
            }
        }
        Ok(GenerateOutcome::Gated(decision)) => warn!("{}", decision.message),
        Ok(GenerateOutcome::Failed(notice)) => warn!("{}", notice.message),
        Ok(other) => info!("Generate finished: {:?}", other),
        Err(e) => error!("Generate failed: {}", e),
    }

    session.usage_settled().await;
    info!("Usage after attempt: {}", session.remaining_display());

    while let Ok(SessionEvent::AuthPrompt(decision)) = events.try_recv() {
        warn!("{}", decision.message);
    }

    session.teardown();
    Ok(())
}
