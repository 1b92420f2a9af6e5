//! Backend access.
//!
//! DESIGN
//! ======
//! [`dispatch::Dispatcher`] is the only code that talks HTTP. It attaches the
//! bearer token, maps status codes to [`dispatch::ApiError`], and owns the
//! unauthorized-session policy (clear session, route to login) so no endpoint
//! call repeats it. [`api::ApiClient`] layers one typed method per backend
//! endpoint on top.

pub mod api;
pub mod dispatch;

#[cfg(test)]
pub(crate) mod fake_backend;
