//! core
//!
//! Core domain types and configuration for tariffwork.
//!
//! # Modules
//!
//! - [`types`] - Strong types: PlanVariantId, FacetKey, timestamps
//! - [`availability`] - Ranked availability status and its ratchet merge
//! - [`catalog`] - Ordered tier catalogs with free-tier flags
//! - [`config`] - Catalog configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at construction time
//! - Schemas are strict and self-describing
//! - Business-rule outcomes are values, not errors

pub mod availability;
pub mod catalog;
pub mod config;
pub mod types;
