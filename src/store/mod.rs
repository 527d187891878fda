//! Pluggable session stores.
//!
//! A [`StoreConnector`] validates [`StoreConnectionOptions`] up front and, when the
//! server starts, creates a cache client, registers the lifecycle callbacks on
//! it, connects it and wraps it in a [`CacheSessionStore`].

mod connector;
mod options;
mod session_store;

pub use connector::{SessionCapability, StoreConnector};
pub use options::StoreConnectionOptions;
pub use session_store::CacheSessionStore;
