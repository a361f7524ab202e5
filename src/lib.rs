// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Domain
pub mod negotiation;
pub mod notification;

// Application layer
pub mod api;
pub mod server;

// Background work
pub mod tasks;
