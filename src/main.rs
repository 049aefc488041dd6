// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout Nagger API server and scheduler.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workout_nagger::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, MemoryStore, NagStore},
    models::{Stats, User},
    services::{scheduler, Notifiers},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        timezone = %config.timezone,
        "Starting Workout Nagger"
    );

    let store: Arc<dyn NagStore> = match config.store {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, state is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    ensure_primary_user(store.as_ref(), &config).await?;

    // Parse schedules before serving so a bad expression fails startup.
    let jobs = scheduler::jobs_from_config(&config)?;

    let notifiers = Notifiers::from_config(&config);
    let state = Arc::new(AppState::new(config.clone(), store, notifiers));

    scheduler::spawn(state.nagger.clone(), jobs);

    // Build router
    let app = workout_nagger::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the primary user (with empty stats) on first start.
async fn ensure_primary_user(store: &dyn NagStore, config: &Config) -> anyhow::Result<()> {
    let email = &config.primary_user_email;
    if store.get_user_by_email(email).await?.is_some() {
        return Ok(());
    }

    let user = User {
        id: email.to_string(),
        email: email.to_string(),
        name: None,
        phone: config.primary_user_phone.clone(),
        whoop_user_id: None,
        credential: None,
    };
    store.upsert_user(&user).await?;
    store.set_stats(&user.id, &Stats::default()).await?;

    tracing::info!(user_id = %user.id, "Primary user created");
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("workout_nagger=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
