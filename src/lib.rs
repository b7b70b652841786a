//! Tariffwork - alteration resolution and history replay for tariff plans
//!
//! A tariff plan is a bundle of independently negotiable facets (a tiered
//! limit, an auto-extension policy, an access cutoff, a demo window) plus
//! activity dates. Callers ask to alter a plan; the engine decides whether
//! the alteration is available, available only with a reason, or forbidden,
//! and commits or rejects it.
//!
//! # Architecture
//!
//! - [`core`] - Domain types, the ranked availability ratchet, tier
//!   catalogs and catalog configuration
//! - [`engine`] - Plan families, facets, alteration requests, the plan
//!   pipeline, history replay and the variant registry
//!
//! # Correctness Invariants
//!
//! 1. Availability merges only move toward a higher rank
//! 2. Rejections are data, never errors; errors are reserved for invalid
//!    input and unknown variants
//! 3. Only an applied alteration mutates a plan
//! 4. Replaying the same history, in any order, yields the same snapshot
//!
//! # Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.

pub mod core;
pub mod engine;
