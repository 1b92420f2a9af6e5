//! # console
//!
//! Client-side core of the continual-learning platform console: everything the
//! dashboard views need between the user and the backend REST API.
//!
//! - [`net`]: the single request-dispatch boundary and typed endpoint calls.
//! - [`state`]: persisted session, view routing, and image previews.
//! - [`poll`]: fixed-interval task-status polling with teardown cancellation.
//! - [`train`]: training form mapping to the backend job request.
//! - [`config`]: environment-driven settings.

pub mod config;
pub mod net;
pub mod poll;
pub mod state;
pub mod train;

pub use config::ConsoleConfig;
pub use net::api::ApiClient;
pub use net::dispatch::{ApiError, Dispatcher};
pub use state::route::{Navigator, Route};
pub use state::session::{FileSessionStore, MemorySessionStore, Session, SessionError, SessionStore};
