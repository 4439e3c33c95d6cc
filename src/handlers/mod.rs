//! HTTP handlers bridging axum and the dispatcher.

pub mod dispatch;

pub use dispatch::*;
