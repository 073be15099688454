//! Core domain engine for a multi-tenant glass-processing back office.
//!
//! Three pillars, leaves first:
//!
//! - [`pricing`] — pure tiered price resolution and document totals.
//! - [`sync`] — reconciliation of desired snapshots against tenant-scoped
//!   remote collections, with optimistic apply and rollback-by-reload.
//! - [`services`] — the quote and work-order lifecycles on top of both,
//!   including conversion, archive cascades, and the compensating
//!   inventory-ledger entries.
//!
//! The remote store, the active-tenant provider, and event observers are
//! consumed through traits ([`db::RemoteCollection`],
//! [`tenant::TenantContext`], [`events::EventHandler`]); UI, routing, and
//! document rendering live entirely outside this crate.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod pricing;
pub mod services;
pub mod sync;
pub mod tenant;

pub use bootstrap::{Collections, CoreServices};
pub use config::AppConfig;
pub use errors::{CoreError, WriteFailureKind};
