//! Catalog synchronization: products, the category tree, and attribute options.
//!
//! ## What this does
//! - [`ProductSynchronizer`] upserts a batch of feed products per SKU under the SKU's
//!   named lock, maintains display records, and keeps variant indexes fresh.
//! - [`CategorySynchronizer`] mirrors a remote category tree node by node, tombstones
//!   hierarchy edges that disappeared, and reports orphans for explicit deletion.
//! - [`sync_attribute_options`] refreshes the option label dictionary.
//!
//! ## Per-record isolation
//! A record's error never aborts the run. Every key ends up in exactly one bucket of
//! the returned [`SyncResult`] with a reason string.
//!
//! ## Transactions
//! Each record is written inside its own `BEGIN IMMEDIATE` transaction while its
//! named lock is held. Events fire only after the transaction commits.

mod attributes;
mod category;
mod product;

pub use attributes::{sync_attribute_options, sync_attribute_options_from};
pub use category::{CategorySynchronizer, ConfirmedDeletion, OrphanCategories};
pub use product::{ProductSyncOptions, ProductSynchronizer};

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::store::WriteOutcome;

/// Bucket a key lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// New entity (or new translation).
    Created,
    /// Existing entity changed.
    Updated,
    /// Existing entity already matched the feed.
    Unchanged,
    /// Skipped on purpose (unsupported type).
    Ignored,
    /// Rejected or errored.
    Failed,
    /// Removed.
    Deleted,
}

impl From<WriteOutcome> for Outcome {
    fn from(w: WriteOutcome) -> Self {
        match w {
            WriteOutcome::Created => Outcome::Created,
            WriteOutcome::Updated => Outcome::Updated,
            WriteOutcome::Unchanged => Outcome::Unchanged,
        }
    }
}

/// Per-bucket counters of a [`SyncResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub ignored: usize,
    pub failed: usize,
    pub deleted: usize,
}

/// Outcome of one synchronization run: natural key -> reason, per bucket, in
/// processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub created: IndexMap<String, String>,
    pub updated: IndexMap<String, String>,
    pub unchanged: IndexMap<String, String>,
    pub ignored: IndexMap<String, String>,
    pub failed: IndexMap<String, String>,
    pub deleted: IndexMap<String, String>,
}

impl SyncResult {
    fn bucket_mut(&mut self, outcome: Outcome) -> &mut IndexMap<String, String> {
        match outcome {
            Outcome::Created => &mut self.created,
            Outcome::Updated => &mut self.updated,
            Outcome::Unchanged => &mut self.unchanged,
            Outcome::Ignored => &mut self.ignored,
            Outcome::Failed => &mut self.failed,
            Outcome::Deleted => &mut self.deleted,
        }
    }

    /// File `key` under `outcome`, removing it from any other bucket.
    pub fn record(&mut self, key: impl Into<String>, outcome: Outcome, reason: impl Into<String>) {
        let key = key.into();
        for other in [
            Outcome::Created,
            Outcome::Updated,
            Outcome::Unchanged,
            Outcome::Ignored,
            Outcome::Failed,
            Outcome::Deleted,
        ] {
            if other != outcome {
                self.bucket_mut(other).shift_remove(&key);
            }
        }
        self.bucket_mut(outcome).insert(key, reason.into());
    }

    /// Bucket holding `key`, if any.
    pub fn outcome_of(&self, key: &str) -> Option<Outcome> {
        [
            (Outcome::Created, &self.created),
            (Outcome::Updated, &self.updated),
            (Outcome::Unchanged, &self.unchanged),
            (Outcome::Ignored, &self.ignored),
            (Outcome::Failed, &self.failed),
            (Outcome::Deleted, &self.deleted),
        ]
        .into_iter()
        .find(|(_, bucket)| bucket.contains_key(key))
        .map(|(o, _)| o)
    }

    /// Bucket sizes.
    pub fn counts(&self) -> SyncCounts {
        SyncCounts {
            created: self.created.len(),
            updated: self.updated.len(),
            unchanged: self.unchanged.len(),
            ignored: self.ignored.len(),
            failed: self.failed.len(),
            deleted: self.deleted.len(),
        }
    }

    /// Keys the run saw in the remote feed and stored: created, updated or unchanged.
    pub fn touched(&self) -> impl Iterator<Item = &str> {
        self.created
            .keys()
            .chain(self.updated.keys())
            .chain(self.unchanged.keys())
            .map(String::as_str)
    }

    /// Keys the run saw in the remote feed, including those whose write failed.
    pub fn visited(&self) -> impl Iterator<Item = &str> {
        self.touched().chain(self.failed.keys().map(String::as_str))
    }

    /// Keys whose stored state changed: created, updated or deleted.
    pub fn affected(&self) -> Vec<String> {
        self.created
            .keys()
            .chain(self.updated.keys())
            .chain(self.deleted.keys())
            .cloned()
            .collect()
    }

    /// True if nothing was created, updated or deleted.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote_any = false;
        let sections = [
            ("Created", '+', &self.created),
            ("Updated", '~', &self.updated),
            ("Deleted", '-', &self.deleted),
            ("Ignored", '?', &self.ignored),
            ("Failed", '!', &self.failed),
        ];
        for (title, mark, bucket) in sections {
            if bucket.is_empty() {
                continue;
            }
            if wrote_any {
                writeln!(f)?;
            }
            let header = format!("{title} ({})", bucket.len());
            writeln!(f, "{header}")?;
            writeln!(f, "{}", "-".repeat(header.len()))?;
            for (key, reason) in bucket {
                writeln!(f, "{mark} {key}  {reason}")?;
            }
            wrote_any = true;
        }

        if !self.unchanged.is_empty() {
            if wrote_any {
                writeln!(f)?;
            }
            write!(f, "{} unchanged", self.unchanged.len())?;
            wrote_any = true;
        }
        if !wrote_any {
            write!(f, "No changes")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_moves_key_between_buckets() {
        let mut r = SyncResult::default();
        r.record("TEE", Outcome::Failed, "waiting on children");
        r.record("TEE", Outcome::Created, "created");
        assert!(r.failed.is_empty());
        assert_eq!(r.outcome_of("TEE"), Some(Outcome::Created));
        assert_eq!(r.outcome_of("CAP"), None);
    }

    #[test]
    fn counts_serialize_flat() {
        let mut r = SyncResult::default();
        r.record("A", Outcome::Created, "created");
        r.record("B", Outcome::Unchanged, "unchanged");
        r.record("C", Outcome::Ignored, "unsupported product type 'bundle'");
        insta::assert_json_snapshot!(r.counts(), @r#"
        {
          "created": 1,
          "updated": 0,
          "unchanged": 1,
          "ignored": 1,
          "failed": 0,
          "deleted": 0
        }
        "#);
        assert_eq!(r.touched().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(r.affected(), vec!["A"]);
    }

    #[test]
    fn display_sections() {
        assert_eq!(SyncResult::default().to_string(), "No changes");

        let mut r = SyncResult::default();
        r.record("A", Outcome::Created, "created");
        r.record("X", Outcome::Failed, "missing sku");
        r.record("B", Outcome::Unchanged, "unchanged");
        let expected = "\
Created (1)
-----------
+ A  created

Failed (1)
----------
! X  missing sku

1 unchanged";
        assert_eq!(r.to_string(), expected);
    }
}
