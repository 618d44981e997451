pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::http::MealieClient;
pub use crate::config::{CliConfig, MigrationConfig};
pub use crate::core::engine::MigrationEngine;
pub use crate::domain::model::{MigrationOutcome, MigrationReport};
pub use crate::utils::error::{MigrateError, Result};
