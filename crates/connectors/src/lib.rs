//! External system connectors.
//!
//! - [`Connector`]: the capability every external system exposes to the
//!   sync runner (handshake, paged fetch, batched push).
//! - [`RestConnector`]: JSON-over-HTTP implementation built on [`reqwest`].
//! - [`ConnectorFactory`]: builds a connector for an integration row.
//! - [`ConnectorCache`]: per-integration cache with TTL, handshake on miss
//!   and explicit invalidation.

pub mod cache;
pub mod connector;
pub mod error;
pub mod factory;
pub mod rest;
pub mod retry;
pub mod settings;

pub use cache::ConnectorCache;
pub use connector::{Connector, FetchPage, PushOutcome, RejectedRecord};
pub use error::{ConnectorError, ConnectorResult};
pub use factory::{ConnectorFactory, RestConnectorFactory};
pub use rest::RestConnector;
pub use settings::ConnectionSettings;
