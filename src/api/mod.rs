//! HTTP surface: router, shared state, handlers and wire types.
pub mod handlers;
pub mod routes;
pub mod types;
