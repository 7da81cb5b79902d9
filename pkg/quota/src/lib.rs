//! Per-namespace quota evaluation.
//!
//! An [`evaluator::Evaluator`] computes how much of a resource a namespace
//! currently uses by listing objects through a [`lister::Lister`]. Listers
//! either query the authoritative store directly or read an
//! [`informer::Informer`] cache. [`factory`] wires one evaluator per supported
//! kind into a [`registry::EvaluatorRegistry`], which the
//! [`admission::QuotaAdmission`] check consults for every create/update.

pub mod admission;
pub mod client;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod factory;
pub mod informer;
pub mod informer_factory;
pub mod lister;
pub mod metrics;
pub mod registry;
pub mod selector;
pub mod subsystem;

#[cfg(test)]
pub(crate) mod testing;

pub use error::QuotaError;
