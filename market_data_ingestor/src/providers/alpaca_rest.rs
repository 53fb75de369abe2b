//! Alpaca Market Data v2 REST provider for US equities.

pub mod params;
pub mod provider;
mod response;

pub use provider::AlpacaProvider;
