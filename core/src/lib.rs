//! Merchant risk scoring for card-payment transaction logs.
//!
//! Pipeline: `transaction` → `benchmark` → `aggregate` → `rules` → `scorer`,
//! with `export` and `generator` around the edges.

pub mod aggregate;
pub mod benchmark;
pub mod config;
pub mod error;
pub mod export;
pub mod generator;
pub mod rng;
pub mod rules;
pub mod scorer;
pub mod transaction;
pub mod types;
