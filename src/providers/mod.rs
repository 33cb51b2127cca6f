// src/providers/mod.rs
//! Upstream data clients (FMP, World Bank) over a shared JSON transport.

pub mod fmp;
pub mod transport;
pub mod worldbank;

pub use fmp::FmpClient;
pub use transport::{HttpTransport, JsonTransport};
pub use worldbank::WorldBankClient;
