//! Bulletin: publish PDFs received through form submissions to a git-backed static site.
//!
//! The crate is layered the same way throughout:
//! - `domain`: submission, blob and identifier types with their invariants.
//! - `application`: the publish pipeline and the ports it consumes.
//! - `infra`: GitHub contents client, filesystem stores, credentials, HTTP trigger, telemetry.
//! - `config`: layered settings (file → environment → CLI).

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
