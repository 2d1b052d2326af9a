//! Repository layer: one module per table, SQL stays behind these walls.

use uuid::Uuid;

pub mod appointment;
pub mod doctor;
pub mod patient;
pub mod specialty;

/// Read a TEXT column as a [`Uuid`]. A row that fails to parse is corrupt
/// data, surfaced as a conversion failure rather than papered over.
pub(crate) fn uuid_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
