//! Client-side state shared across views.
//!
//! Only the session survives a restart; routing and previews are rebuilt per
//! run and every entity is refetched per view.

pub mod preview;
pub mod route;
pub mod session;
