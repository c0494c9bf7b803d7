pub mod api;
pub mod bootstrap;
pub mod config;
pub mod content;
pub mod database;
pub mod error;
pub mod media;
pub mod social;
pub mod telemetry;
pub mod users;
pub mod utils;
