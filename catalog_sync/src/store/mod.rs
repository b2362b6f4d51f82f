//! Catalog store: natural-key queries and writes over the SQLite schema.
//!
//! Every function takes the caller's connection so writes can be grouped into the
//! caller's transaction. Natural keys are not UNIQUE in the schema; lookups take the
//! lowest row id and log a warning when a key is duplicated.
//!
//! Translation-aware entry points: [`items::has_translation`],
//! [`items::get_translation`], [`items::translations`], and [`items::upsert_item`]
//! (which adds a translation when the language is new).

pub mod categories;
pub mod display;
pub mod items;
pub mod options;
pub mod stock;

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// No row existed; one was inserted.
    Created,
    /// A row existed and at least one column changed.
    Updated,
    /// A row existed with identical content; nothing was written.
    Unchanged,
}
