pub mod actors;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod event_sourcing;
pub mod invoice;
pub mod messaging;
pub mod metrics;
pub mod utils;
