//! HTTP server for the operator surface

pub mod http;

pub use http::{run, AppState};
