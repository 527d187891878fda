//! Trait definitions for extensible components
//!
//! Cache backends implement [`Cache`](cache::Cache). Backends that can serve as a
//! session store additionally implement [`CacheClient`](client::CacheClient).

pub mod cache;
pub mod client;
