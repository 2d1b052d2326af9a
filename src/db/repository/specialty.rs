use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::Specialty;

/// Creates a specialty. Name is unique; a duplicate is a Conflict.
pub fn create(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
) -> Result<Specialty, SchedulingError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SchedulingError::Validation("specialty name is required".into()));
    }

    let specialty = Specialty {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: description.map(|d| d.to_string()),
        active: true,
    };

    conn.execute(
        "INSERT INTO especialidades (id, nombre, descripcion, activo)
         VALUES (?1, ?2, ?3, 1)",
        params![specialty.id.to_string(), specialty.name, specialty.description],
    )
    .map_err(|e| duplicate_name_to_conflict(e, name))?;

    info!(specialty_id = %specialty.id, name, "specialty created");
    Ok(specialty)
}

fn duplicate_name_to_conflict(err: rusqlite::Error, name: &str) -> SchedulingError {
    if let rusqlite::Error::SqliteFailure(e, _) = &err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            return SchedulingError::Conflict(format!("specialty '{name}' already exists"));
        }
    }
    err.into()
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Specialty>, SchedulingError> {
    let row = conn
        .query_row(
            "SELECT id, nombre, descripcion, activo FROM especialidades WHERE id = ?1",
            params![id.to_string()],
            map_row,
        )
        .optional()
        .map_err(crate::db::DatabaseError::from)?;
    Ok(row)
}

pub fn list_active(conn: &Connection) -> Result<Vec<Specialty>, SchedulingError> {
    let mut stmt = conn.prepare(
        "SELECT id, nombre, descripcion, activo FROM especialidades
         WHERE activo = 1 ORDER BY nombre ASC",
    )?;
    let rows = stmt.query_map([], map_row)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(SchedulingError::from)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Specialty> {
    Ok(Specialty {
        id: super::uuid_at(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        active: row.get(3)?,
    })
}
