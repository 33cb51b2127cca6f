// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analysis;
pub mod api;
pub mod cache;
pub mod config;
pub mod elements;
pub mod error;
pub mod interpolate;
pub mod layer;
pub mod memo;
pub mod metrics;
pub mod news;
pub mod normalize;
pub mod providers;
pub mod retry;
pub mod translate;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::error::{DataError, Result};
pub use crate::layer::DataLayer;
