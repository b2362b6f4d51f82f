//! Persistent, cross-process named locks.
//!
//! A lock is a row in the `sync_lock` table: inserting the row acquires it, deleting it
//! releases it. Every worker process opens its own [`LockManager`] against the shared
//! database file, so the lock holds across processes and threads alike.
//!
//! Acquisition blocks: on contention the caller sleeps for `retry_interval` and tries
//! again, up to `max_attempts` times (`None` waits forever) before returning
//! [`CatalogError::LockTimeout`]. Release is tied to [`LockGuard`]'s lifetime.
//!
//! Every row carries a lease. A row past `expires_at` was left by a holder that died
//! or failed to release, and the next acquirer deletes it before inserting its own.
//! Holders must finish their critical section within the lease.
//!
//! Locks are not reentrant. Callers must not acquire a key they already hold.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use diesel::prelude::*;
use tracing::{debug, warn};

use crate::db::connection::connect_sqlite;
use crate::error::{CatalogError, Result};
use crate::schema::sync_lock::dsl as sl;
use crate::tz;

/// Logical entity a lock protects. One key per entity covers all of its translations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    /// A catalog item (and its stock record), by SKU.
    Sku(String),
    /// A category node, by remote id.
    Category(i64),
}

impl LockKey {
    /// Lock key for a SKU.
    pub fn sku(sku: &str) -> Self {
        Self::Sku(sku.to_string())
    }

    /// Lock key for a remote category id.
    pub fn category(id: i64) -> Self {
        Self::Category(id)
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Sku(sku) => write!(f, "sku:{sku}"),
            LockKey::Category(id) => write!(f, "category:{id}"),
        }
    }
}

/// Retry policy for blocking acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// Sleep between attempts.
    pub retry_interval: Duration,
    /// Give up after this many attempts; `None` blocks until the lock frees up.
    pub max_attempts: Option<u32>,
    /// How long a taken lock stays valid without being released.
    pub lease: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(500),
            max_attempts: Some(120),
            lease: Duration::from_secs(300),
        }
    }
}

/// Current holder of a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    /// Owner token of the holding [`LockManager`].
    pub owner: String,
    /// When the lock was taken.
    pub acquired_at: DateTime<Utc>,
    /// When the lease runs out and the lock may be taken over.
    pub expires_at: DateTime<Utc>,
}

/// Lock service bound to one database file.
///
/// Holds a dedicated connection so lock traffic never interleaves with a caller's
/// open transaction. Safe to share between threads.
pub struct LockManager {
    conn: Mutex<SqliteConnection>,
    owner: String,
    policy: LockPolicy,
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("owner", &self.owner)
            .field("policy", &self.policy)
            .finish()
    }
}

impl LockManager {
    /// Open a lock manager on the database at `database_url` with a fresh owner token.
    pub fn open(database_url: &str, policy: LockPolicy) -> anyhow::Result<Self> {
        let conn = connect_sqlite(database_url)?;
        let owner = format!("{}-{}", std::process::id(), uuid::Uuid::new_v4());
        Ok(Self {
            conn: Mutex::new(conn),
            owner,
            policy,
        })
    }

    /// Owner token written into every lock row this manager takes.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Retry policy in effect.
    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Block until `key` is acquired or the retry budget runs out.
    pub fn acquire(&self, key: &LockKey) -> Result<LockGuard<'_>> {
        let name = key.to_string();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if self.try_insert(&name)? {
                debug!(lock = %name, attempts, "lock acquired");
                return Ok(LockGuard {
                    manager: self,
                    name,
                    released: false,
                });
            }
            if self.policy.max_attempts.is_some_and(|max| attempts >= max) {
                warn!(lock = %name, attempts, "giving up on contended lock");
                return Err(CatalogError::LockTimeout {
                    key: name,
                    attempts,
                });
            }
            thread::sleep(self.policy.retry_interval);
        }
    }

    /// Single non-blocking attempt.
    pub fn try_acquire(&self, key: &LockKey) -> Result<Option<LockGuard<'_>>> {
        let name = key.to_string();
        if self.try_insert(&name)? {
            Ok(Some(LockGuard {
                manager: self,
                name,
                released: false,
            }))
        } else {
            Ok(None)
        }
    }

    /// Who holds `key` right now, if anyone.
    pub fn holder(&self, key: &LockKey) -> Result<Option<LockHolder>> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let row: Option<(String, String, String)> = sl::sync_lock
            .filter(sl::name.eq(key.to_string()))
            .select((sl::owner, sl::acquired_at, sl::expires_at))
            .first(&mut *conn)
            .optional()?;
        Ok(row.map(|(owner, at, until)| LockHolder {
            owner,
            acquired_at: tz::parse_ts_to_utc(&at).unwrap_or_default(),
            expires_at: tz::parse_ts_to_utc(&until).unwrap_or_default(),
        }))
    }

    fn try_insert(&self, name: &str) -> Result<bool> {
        let now = Utc::now();
        let lease = TimeDelta::from_std(self.policy.lease).unwrap_or(TimeDelta::MAX);
        let expires_at = now.checked_add_signed(lease).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let now = tz::to_rfc3339_millis(now);

        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        // Timestamps share one fixed-width UTC format, so text order is time order.
        let reclaimed = diesel::delete(
            sl::sync_lock.filter(sl::name.eq(name).and(sl::expires_at.lt(&now))),
        )
        .execute(&mut *conn)?;
        if reclaimed > 0 {
            warn!(lock = %name, "took over lock with an expired lease");
        }
        let inserted = diesel::insert_into(sl::sync_lock)
            .values((
                sl::name.eq(name),
                sl::owner.eq(&self.owner),
                sl::acquired_at.eq(&now),
                sl::expires_at.eq(tz::to_rfc3339_millis(expires_at)),
            ))
            .on_conflict(sl::name)
            .do_nothing()
            .execute(&mut *conn)?;
        Ok(inserted == 1)
    }

    fn delete_row(&self, name: &str) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let n = diesel::delete(
            sl::sync_lock.filter(sl::name.eq(name).and(sl::owner.eq(&self.owner))),
        )
        .execute(&mut *conn)?;
        Ok(n)
    }
}

/// Proof of holding a named lock. Dropping the guard releases the lock.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    name: String,
    released: bool,
}

impl LockGuard<'_> {
    /// Lock name, e.g. `sku:A-1`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release now and surface a storage error instead of logging it.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.manager.delete_row(&self.name).map(|_| ())
    }
}

impl fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("name", &self.name).finish()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.manager.delete_row(&self.name) {
            Ok(0) => warn!(lock = %self.name, "lock row vanished before release"),
            Ok(_) => debug!(lock = %self.name, "lock released"),
            Err(e) => warn!(lock = %self.name, error = %e, "failed to release lock"),
        }
    }
}
