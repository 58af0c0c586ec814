pub mod auth;
pub mod configuration;
pub mod error;
pub mod logger;
pub mod models;
pub mod rate_limit;
pub mod router;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod validators;
