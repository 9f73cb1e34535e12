pub mod auth;
pub mod configuration;
pub mod email;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod routes;
pub mod secrets;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod validators;
