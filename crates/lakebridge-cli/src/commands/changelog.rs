//! `lakebridge changelog`: map `schema.table` arguments to their changelog table names.

use lakebridge_core::SourceTable;
use lakebridge_core::naming::changelog_table_name;

pub fn changelog(tables: &[String]) -> anyhow::Result<()> {
    for raw in tables {
        let table: SourceTable = raw.parse()?;
        println!("{table} → {}", changelog_table_name(&table));
    }
    Ok(())
}
