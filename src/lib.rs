//! # idea-critic
//!
//! Client for a remote idea-critique service. Submits a free-text idea,
//! renders the returned critique with originality / scalability /
//! feasibility scores, and drives the follow-up "defend" and "improve"
//! actions.
//!
//! The crate is split the way a UI consumes it: `net` talks to the service,
//! `format` turns model prose into display markup, and `state` holds the
//! observable application state that a front end renders from.

pub mod config;
pub mod format;
pub mod net;
pub mod state;
