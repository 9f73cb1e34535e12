use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use texas_auth::auth::{AuthServices, TokenFamily};
use texas_auth::configuration::get_configuration;
use texas_auth::email::build_transport;
use texas_auth::secrets::SecretResolver;
use texas_auth::startup::run;
use texas_auth::store::{InMemoryUserStore, PgUserStore, UserStore};
use texas_auth::telemetry::init_telemetry;

fn startup_error(kind: std::io::ErrorKind, what: &str, e: impl std::fmt::Display) -> std::io::Error {
    tracing::error!(error = %e, "{}", what);
    std::io::Error::new(kind, what.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = get_configuration().map_err(|e| {
        startup_error(std::io::ErrorKind::InvalidInput, "Failed to read configuration", e)
    })?;
    tracing::info!("Configuration loaded successfully");

    let secrets = SecretResolver::from_settings(&configuration.secrets).map_err(|e| {
        startup_error(std::io::ErrorKind::InvalidInput, "Failed to set up secret resolver", e)
    })?;
    // Every signing secret and lifetime must resolve before serving
    secrets
        .preload(&TokenFamily::required_names())
        .await
        .map_err(|e| startup_error(std::io::ErrorKind::NotFound, "Required secret unavailable", e))?;
    let secrets = Arc::new(secrets);

    let store: Arc<dyn UserStore> = match &configuration.database {
        Some(database) => {
            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(database.max_connections)
                .connect(&database.connection_string())
                .await
                .map_err(|e| {
                    startup_error(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                        e,
                    )
                })?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| startup_error(std::io::ErrorKind::Other, "Migration failed", e))?;
            tracing::info!("Database connection pool created successfully");
            Arc::new(PgUserStore::new(pool))
        }
        None => {
            tracing::warn!("No database configured; users are kept in memory");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let transport = build_transport(&configuration.email).map_err(|e| {
        startup_error(std::io::ErrorKind::InvalidInput, "Failed to set up email transport", e)
    })?;

    let services = AuthServices::new(store, secrets, transport, &configuration).map_err(|e| {
        startup_error(std::io::ErrorKind::InvalidInput, "Failed to set up auth services", e)
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, services)?.await
}
