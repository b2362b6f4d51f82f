//! Attribute option dictionary queries.

use diesel::prelude::*;

use super::WriteOutcome;
use crate::error::Result;
use crate::models::AttributeOption;
use crate::schema::attribute_option::dsl as ao;

/// Insert or replace one dictionary entry.
pub fn upsert_option(conn: &mut SqliteConnection, option: &AttributeOption) -> Result<WriteOutcome> {
    let existing: Option<AttributeOption> = ao::attribute_option
        .find((&option.attribute_code, &option.option_id, &option.language))
        .select(AttributeOption::as_select())
        .first(conn)
        .optional()?;
    let outcome = match existing {
        None => WriteOutcome::Created,
        Some(row) if row == *option => return Ok(WriteOutcome::Unchanged),
        Some(_) => WriteOutcome::Updated,
    };
    diesel::insert_into(ao::attribute_option)
        .values(option)
        .on_conflict((ao::attribute_code, ao::option_id, ao::language))
        .do_update()
        .set((ao::label.eq(&option.label), ao::weight.eq(option.weight)))
        .execute(conn)?;
    Ok(outcome)
}

/// Every entry for the given attribute codes in one language.
pub fn load_options(
    conn: &mut SqliteConnection,
    codes: &[String],
    language: &str,
) -> Result<Vec<AttributeOption>> {
    if codes.is_empty() {
        return Ok(Vec::new());
    }
    let rows = ao::attribute_option
        .filter(ao::attribute_code.eq_any(codes).and(ao::language.eq(language)))
        .order((ao::attribute_code.asc(), ao::weight.asc(), ao::option_id.asc()))
        .select(AttributeOption::as_select())
        .load(conn)?;
    Ok(rows)
}
