// Adapters layer: concrete implementations for external systems.
// The core only sees the traits in domain::ports.

pub mod http;

pub use http::MealieClient;
