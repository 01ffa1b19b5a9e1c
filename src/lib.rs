/// Contest backend
///
/// Admin sessions over revocable JWT pairs, plus carousel, gallery and
/// contestant media stored in an object store.
pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod media;
pub mod metrics;
pub mod probe;
pub mod rate_limit;
pub mod server;
pub mod storage;
pub mod token;
pub mod transcode;
pub mod validation;

pub use context::AppContext;
pub use error::{ApiError, ApiResult};
