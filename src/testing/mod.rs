//! Testing utilities for quayside servers
//!
//! Fluent request scenarios that run a [`Router`](axum::Router) in-process.
//!
//! ```rust,ignore
//! let app = server.router().await?;
//!
//! testing::get(app, "/missing")
//!     .execute()
//!     .await
//!     .assert_not_found()
//!     .assert_body_json(json!({}))
//!     .await;
//! ```

mod scenario;

pub use scenario::{Scenario, ScenarioAssert, get, post, preflight};
