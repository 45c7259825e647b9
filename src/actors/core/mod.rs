// Health vocabulary shared by the infrastructure actors and the HTTP health endpoint.

pub mod health;

pub use health::*;
