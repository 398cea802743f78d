//! Application services orchestrating the publish flow.

pub mod cleanup;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod ports;
pub mod redirect;
#[cfg(test)]
pub(crate) mod testing;
pub mod trigger;
