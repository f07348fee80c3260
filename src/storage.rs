use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use crate::constants::CURATED_COLUMNS;
use crate::error::{PipelineError, Result};
use crate::types::CuratedRecord;

/// Append-only SQLite table of curated records.
///
/// The table has exactly the five curated columns, all TEXT, no key and no
/// uniqueness constraint. It is created on first open and its columns are
/// checked on every open after that.
pub struct FeedStore {
    conn: Connection,
    table: String,
}

impl FeedStore {
    pub fn open<P: AsRef<Path>>(db_path: P, table: &str) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn, table)
    }

    /// Wrap an already open connection (tests use an in-memory database).
    pub fn with_connection(conn: Connection, table: &str) -> Result<Self> {
        if !is_sql_identifier(table) {
            return Err(PipelineError::Persistence(format!(
                "table name '{}' is not a plain SQL identifier",
                table
            )));
        }
        let columns = CURATED_COLUMNS
            .iter()
            .map(|c| format!("\"{c}\" TEXT"))
            .collect::<Vec<_>>()
            .join(", ");
        conn.execute_batch(&format!("CREATE TABLE IF NOT EXISTS \"{table}\" ({columns});"))?;

        let store = Self {
            conn,
            table: table.to_string(),
        };
        store.validate_schema()?;
        Ok(store)
    }

    fn validate_schema(&self) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT name FROM pragma_table_info('{}')", self.table))?;
        let found = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<BTreeSet<String>, _>>()?;
        let expected: BTreeSet<String> = CURATED_COLUMNS.iter().map(|c| c.to_string()).collect();
        if found != expected {
            return Err(PipelineError::Persistence(format!(
                "table '{}' has columns {:?}, expected {:?}",
                self.table, found, expected
            )));
        }
        Ok(())
    }

    /// Append every record in one transaction. An empty batch touches nothing.
    pub fn append(&mut self, records: &[CuratedRecord]) -> Result<usize> {
        if records.is_empty() {
            debug!(table = %self.table, "nothing to append");
            return Ok(0);
        }
        let sql = format!(
            "INSERT INTO \"{}\" (\"title\", \"description\", \"link\", \"pubDate\", \"guid\") VALUES (?1, ?2, ?3, ?4, ?5)",
            self.table
        );
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                let [title, description, link, pub_date, guid] = record.values();
                stmt.execute(params![title, description, link, pub_date, guid])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", self.table), [], |row| {
                row.get(0)
            })?;
        Ok(n as usize)
    }

    /// The last `limit` rows (all rows when `None`), oldest first.
    pub fn rows(&self, limit: Option<usize>) -> Result<Vec<CuratedRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT \"title\", \"description\", \"link\", \"pubDate\", \"guid\" FROM \
             (SELECT rowid AS rid, * FROM \"{}\" ORDER BY rowid DESC LIMIT ?1) ORDER BY rid",
            self.table
        ))?;
        // SQLite treats a negative LIMIT as no limit
        let limit = limit.map(|n| n.min(i64::MAX as usize) as i64).unwrap_or(-1);
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(CuratedRecord {
                    title: row.get(0)?,
                    description: row.get(1)?,
                    link: row.get(2)?,
                    pub_date: row.get(3)?,
                    guid: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, safe to splice into SQL as a table name.
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
