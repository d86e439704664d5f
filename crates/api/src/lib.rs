//! HTTP surface of the pipeline: the push queue consumer endpoint, health, and a
//! server-sent stream of realtime notifications.

pub mod app;
pub mod middleware;
pub mod server;
