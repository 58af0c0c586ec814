use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use todo_api::configuration::get_configuration;
use todo_api::error::ConfigError;
use todo_api::startup::run;
use todo_api::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    // The signing secret is a boot precondition, never a per-request error
    if configuration.jwt.secret.trim().is_empty() {
        tracing::error!("{}", ConfigError::MissingSecret);
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "JWT secret key is missing",
        ));
    }

    let connection_string = configuration.database.connection_string();
    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&connection_string)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    tracing::info!("Database connection pool created successfully");

    let address = format!("127.0.0.1:{}", configuration.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, pool, configuration.jwt.clone())?;

    server.await
}
