use marketplace_payments::{ Config, Result };
use marketplace_payments::db::{ ConfirmationStore, MemoryConfirmationStore, SeaOrmConfirmationStore };
use marketplace_payments::services::{ DeadlineEvaluator, PaymentConfirmationService };
use migration::MigratorTrait;
use std::sync::Arc;
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

const IN_MEMORY_DATABASE_URL: &str = "memory://";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber
        ::registry()
        .with(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_| "marketplace_payments=debug,tower_http=debug".into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e|
        marketplace_payments::AppError::Config(e.to_string())
    )?;

    let store: Arc<dyn ConfirmationStore> = if config.database_url == IN_MEMORY_DATABASE_URL {
        tracing::warn!("Using in-memory confirmation store, data is lost on restart");
        Arc::new(MemoryConfirmationStore::new())
    } else {
        let db = sea_orm::Database
            ::connect(&config.database_url).await
            .map_err(marketplace_payments::AppError::Database)?;

        tracing::info!("Database connected successfully");

        if config.run_migrations {
            migration::Migrator
                ::up(&db, None).await
                .map_err(marketplace_payments::AppError::Database)?;

            tracing::info!("Migrations completed successfully");
        }

        Arc::new(SeaOrmConfirmationStore::new(db))
    };

    // Initialize services
    let deadline_evaluator = Arc::new(DeadlineEvaluator::new(store.clone(), config.store_timeout));
    let confirmation_service = Arc::new(
        PaymentConfirmationService::new(store, config.store_timeout)
    );

    if let Some(period) = config.scan_interval {
        tracing::info!("In-process deadline scan every {:?}", period);
        let scheduler = marketplace_payments::scheduler::DeadlineScheduler::new(
            deadline_evaluator.clone(),
            period
        );
        tokio::spawn(scheduler.start());
    }

    // Create app state
    let app_state = marketplace_payments::api::AppState::new(
        confirmation_service,
        deadline_evaluator,
        marketplace_payments::api::CronSecret::new(&config.cron_secret)
    );

    let app = marketplace_payments::api::router(app_state);

    // Start server
    let addr = config.bind_addr();
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener
        ::bind(&addr).await
        .map_err(|e| marketplace_payments::AppError::Internal(e.to_string()))?;

    axum::serve(listener, app).await.map_err(|e|
        marketplace_payments::AppError::Internal(e.to_string())
    )?;

    Ok(())
}
