//! # Discovery Service
//!
//! The [`Browser`] front end and the result collector behind its fan-out.

pub mod browser;
pub mod collector;

pub use browser::Browser;
pub use collector::{Collector, ServerInfoSet, ServerInfoSink};
