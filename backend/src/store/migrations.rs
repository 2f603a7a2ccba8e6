use log::info;
use rusqlite::{Connection, Transaction};

use crate::error::StoreError;

const CURRENT_SCHEMA_VERSION: i32 = 1;

pub fn run_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let mut version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    while version < CURRENT_SCHEMA_VERSION {
        version += 1;
        apply_migration(&tx, version)?;
        info!("Applied database schema v{}", version);
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<(), StoreError> {
    match version {
        1 => tx.execute_batch(include_str!("schemas/schema_v1.sql"))?,
        _ => unreachable!("no migration for schema v{version}"),
    }
    Ok(())
}
