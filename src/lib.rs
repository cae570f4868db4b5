// Library entrypoint for the server binary and integration tests.
mod api;
mod core;
pub mod ops;
pub mod services;
pub mod storage;

pub use api::build_router;
pub use api::views;
pub use crate::core::{config, host, shutdown, state};
