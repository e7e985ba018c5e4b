//! Gather HTTP server.
//!
//! Wires the PostgreSQL store, the notification pipeline and the reminder
//! scheduler behind the REST API, then serves until SIGINT/SIGTERM.

use anyhow::Context;
use gather_core::delivery::DeliveryChannel;
use gather_core::environment::{Clock, SystemClock};
use gather_core::event_store::EventStore;
use gather_postgres::{PostgresEventStore, PostgresUserDirectory, migrate};
use gather_runtime::dispatcher::NotificationDispatcher;
use gather_runtime::metrics::MetricsServer;
use gather_runtime::queue::DispatchQueue;
use gather_runtime::scheduler::{DailySchedule, ReminderScheduler};
use gather_server::config::{Config, MailTransport};
use gather_server::delivery::{ConsoleMailer, SmtpMailer};
use gather_server::{AppState, EventService, build_router};
use gather_web::JwtVerifier;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Invalid configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gather server");
    info!(
        address = %config.server_addr(),
        metrics = %config.metrics_addr(),
        mail = ?config.mail.transport,
        reminders = config.reminders.enabled,
        "Configuration loaded"
    );

    let mut metrics_server = MetricsServer::new(
        config
            .metrics_addr()
            .parse()
            .context("Invalid metrics address")?,
    );
    metrics_server.start()?;

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .min_connections(config.postgres.min_connections)
        .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
        .connect(&config.postgres.url)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected");

    if config.postgres.run_migrations {
        migrate(&pool).await.context("Failed to run migrations")?;
        info!("Migrations applied");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn EventStore> =
        Arc::new(PostgresEventStore::from_pool(pool.clone()).with_clock(clock.clone()));
    let directory = Arc::new(PostgresUserDirectory::new(pool));
    let channel = build_channel(&config)?;

    let dispatcher = NotificationDispatcher::new(directory, channel)
        .with_send_timeout(Duration::from_millis(config.notifications.send_timeout_ms));
    let queue = DispatchQueue::start(dispatcher.clone(), config.notifications.queue_capacity);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = if config.reminders.enabled {
        let scheduler = ReminderScheduler::new(store.clone(), dispatcher, clock.clone())
            .with_schedule(DailySchedule::new(config.reminders.at));
        Some(tokio::spawn(scheduler.run(shutdown_rx)))
    } else {
        info!("Reminder scheduler disabled");
        None
    };

    let verifier = JwtVerifier::new(
        config.auth.jwt_secret.as_bytes(),
        config.auth.jwt_issuer.clone(),
    );
    let state = AppState::new(EventService::new(store, queue.clone(), clock), verifier);
    let app = build_router(state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("HTTP server stopped, draining background work");
    shutdown_tx.send(true).ok();
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            error!(error = %e, "Reminder scheduler task failed");
        }
    }
    if let Err(e) = queue.shutdown(config.shutdown_timeout()).await {
        warn!(error = %e, "Dispatch queue did not drain before the shutdown timeout");
    }

    info!("Server stopped");
    Ok(())
}

fn build_channel(config: &Config) -> anyhow::Result<Arc<dyn DeliveryChannel>> {
    match config.mail.transport {
        MailTransport::Console => {
            info!("Using console mailer");
            Ok(Arc::new(ConsoleMailer))
        }
        MailTransport::Smtp => {
            let server = config
                .mail
                .smtp_server
                .as_deref()
                .context("SMTP_SERVER is required for the SMTP transport")?;
            let credentials = config
                .mail
                .smtp_username
                .clone()
                .zip(config.mail.smtp_password.clone());
            let mailer = SmtpMailer::new(
                server,
                config.mail.smtp_port,
                credentials,
                &config.mail.from_email,
                &config.mail.from_name,
            )?;
            info!(server = %server, port = config.mail.smtp_port, "Using SMTP mailer");
            Ok(Arc::new(mailer))
        }
    }
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
