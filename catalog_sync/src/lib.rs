//! Catalog synchronization and variant resolution against a local SQLite mirror.
//!
//! The crate pulls products, categories, stock and attribute options from a remote
//! commerce backend (through [`feed::CatalogSource`]) and keeps a local store in step:
//!
//! - [`sync::ProductSynchronizer`]: locked per-SKU upserts, display records, deferred
//!   composites.
//! - [`sync::CategorySynchronizer`]: tree reconciliation, edge tombstones, orphans.
//! - [`stock::StockLedger`]: stock writes with transition events.
//! - [`variant::VariantResolver`]: attribute selection -> child SKU.
//!
//! Workers in separate processes coordinate through [`lock::LockManager`].

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod feed;
pub mod lock;
pub mod models;
pub mod product_type;
pub mod schema;
pub mod stock;
pub mod store;
pub mod sync;
pub mod tz;
pub mod variant;

pub use error::{CatalogError, Result};
pub use product_type::ProductType;
