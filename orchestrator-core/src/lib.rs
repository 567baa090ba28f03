//! Orchestration Intelligence Core.
//!
//! Implements the Enhanced Decision Engine and its supporting subsystems:
//! episode memory and retrieval, hybrid pattern analysis fusing episode and
//! Chronicle evidence, and a circuit-broken façade over downstream services.
//! Concrete storage backends live in `orchestrator-storage-redb` and
//! `orchestrator-storage-turso`; this crate depends only on the traits in
//! [`store`].

pub mod action_executor;
pub mod chronicle_analyzer;
pub mod circuit_breaker;
pub mod clients;
pub mod confidence_gate;
pub mod config;
pub mod decision_auditor;
pub mod decision_engine;
pub mod decision_modifier;
pub mod embeddings;
pub mod episode_logger;
pub mod error;
pub mod events;
mod math;
pub mod memory_bridge;
pub mod pattern_combiner;
pub mod retrieval;
pub mod retry;
pub mod rule_decision;
pub mod store;
pub mod strategy_evolver;
pub mod types;

pub use error::{Error, Result};
