//! Application state for a critique session.
//!
//! DESIGN
//! ======
//! `app` holds the plain observable snapshot; `store` owns it behind a watch
//! channel and implements the guarded actions that talk to the request
//! client.

pub mod app;
pub mod store;

pub use app::AppState;
pub use store::AppStore;
