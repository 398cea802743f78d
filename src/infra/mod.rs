//! Infrastructure adapters and runtime bootstrap.

pub mod blobs;
pub mod contents;
pub mod credentials;
pub mod error;
pub mod http;
pub mod submissions;
pub mod telemetry;
