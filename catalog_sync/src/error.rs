//! Error taxonomy for catalog synchronization.
//!
//! Per-record errors never abort a batch: the synchronizers map them onto a
//! [`crate::sync::SyncResult`] bucket (`ignored` for [`CatalogError::Unsupported`],
//! deferred retry for [`CatalogError::MissingChildren`], `failed` for the rest).

use thiserror::Error;

/// Errors raised by the catalog engine.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A feed record is malformed (missing SKU, configurable without options, ...).
    #[error("invalid record {key}: {reason}")]
    Validation {
        /// Natural key of the record, or its batch position when the key is missing.
        key: String,
        /// Human-readable reason recorded in the sync result.
        reason: String,
    },

    /// A feed record has a product type this engine does not mirror.
    #[error("unsupported product type '{product_type}' for {sku}")]
    Unsupported {
        /// SKU of the record.
        sku: String,
        /// Raw type tag from the feed.
        product_type: String,
    },

    /// A composite product references children that are not stored yet.
    #[error("{sku} is waiting on missing children: {}", missing.join(", "))]
    MissingChildren {
        /// SKU of the composite product.
        sku: String,
        /// Child SKUs not present in the store for the record's language.
        missing: Vec<String>,
    },

    /// A referenced entity does not exist.
    #[error("{what} not found")]
    NotFound {
        /// Description of the missing entity, e.g. `stock target SKU "A-1"`.
        what: String,
    },

    /// The persistence layer rejected a query.
    #[error("storage error: {0}")]
    Storage(#[from] diesel::result::Error),

    /// A JSON column in the store could not be decoded or encoded.
    #[error("stored JSON could not be processed: {0}")]
    Decode(#[from] serde_json::Error),

    /// A named lock stayed held by another worker for the whole retry budget.
    #[error("timed out acquiring lock {key} after {attempts} attempts")]
    LockTimeout {
        /// Lock name, e.g. `sku:A-1`.
        key: String,
        /// Number of acquisition attempts made.
        attempts: u32,
    },

    /// The product type cannot be put into a cart line directly.
    #[error("{sku} ({product_type}) is not directly purchasable")]
    NotPurchasable {
        /// SKU of the product.
        sku: String,
        /// Product type tag.
        product_type: &'static str,
    },
}

impl CatalogError {
    pub(crate) fn validation(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
