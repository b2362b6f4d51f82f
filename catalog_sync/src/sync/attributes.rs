//! Attribute option dictionary synchronization.

use diesel::SqliteConnection;
use tracing::{info, warn};

use super::{Outcome, SyncResult};
use crate::events::{CatalogEvent, EventSink, SyncScope};
use crate::feed::{CatalogSource, RawAttributeOption, StoreContext, normalize_code};
use crate::models::AttributeOption;
use crate::store::options;
use crate::variant::VariantResolver;

/// Fetch the dictionaries of `codes` from `source` and store them for `ctx`.
pub fn sync_attribute_options_from(
    conn: &mut SqliteConnection,
    source: &dyn CatalogSource,
    codes: &[String],
    ctx: &StoreContext,
    resolver: &VariantResolver,
    events: &dyn EventSink,
) -> anyhow::Result<SyncResult> {
    let mut records = Vec::new();
    for code in codes {
        records.extend(source.fetch_attribute_options(code)?);
    }
    Ok(sync_attribute_options(conn, records, ctx, resolver, events))
}

/// Store option labels and weights for the `ctx` language.
///
/// Keys in the result are `code:option_id`. Any change clears the variant cache, since
/// option labels and weights feed every cached index.
pub fn sync_attribute_options(
    conn: &mut SqliteConnection,
    records: Vec<RawAttributeOption>,
    ctx: &StoreContext,
    resolver: &VariantResolver,
    events: &dyn EventSink,
) -> SyncResult {
    let mut result = SyncResult::default();
    for raw in records {
        let code = normalize_code(&raw.attribute_code);
        let option_id = raw.value.trim().to_string();
        let key = format!("{code}:{option_id}");
        if code.is_empty() || option_id.is_empty() {
            result.record(key, Outcome::Failed, "missing attribute code or option id");
            continue;
        }
        let option = AttributeOption {
            attribute_code: code,
            option_id,
            language: ctx.language.clone(),
            label: raw.label,
            weight: raw.sort_order,
        };
        let written = conn.immediate_transaction(|conn| options::upsert_option(conn, &option));
        match written {
            Ok(outcome) => {
                let outcome = Outcome::from(outcome);
                result.record(key, outcome, format!("{outcome:?}").to_lowercase());
            }
            Err(e) => {
                warn!(%key, error = %e, "attribute option sync failed");
                result.record(key, Outcome::Failed, e.to_string());
            }
        }
    }

    if !result.is_noop() {
        resolver.cache().clear();
    }
    let counts = result.counts();
    info!(
        language = %ctx.language,
        created = counts.created,
        updated = counts.updated,
        unchanged = counts.unchanged,
        failed = counts.failed,
        "attribute option sync finished"
    );
    events.emit(CatalogEvent::SyncCompleted {
        scope: SyncScope::AttributeOptions,
        counts,
        affected: result.affected(),
    });
    result
}
