//! Port Interfaces
//!
//! Contracts that infrastructure adapters implement, following the
//! Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `MarketDataPort`: live price, consensus and news from a provider

mod market_data_port;

#[cfg(test)]
pub use market_data_port::MockMarketDataPort;
pub use market_data_port::{MarketDataPort, ProviderError};
