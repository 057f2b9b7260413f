//! Library crate for score-relay, exposing modules for binaries and tests.

pub mod config;
pub mod dao;
mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
#[cfg(test)]
mod test_support;
