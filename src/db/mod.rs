pub mod models;

use chrono::Utc;
use models::{Bank, PolicyDocument, PolicyWithBank};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::embedding::{bytes_to_embedding, embedding_to_bytes};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Bank not found: {0}")]
    BankNotFound(i64),
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

/// CRUD contract over banks and their policy documents.
///
/// The chat and admin controllers only see this trait, never the backing
/// store technology.
pub trait PolicyStore: Send + Sync {
    fn list_banks(&self) -> Result<Vec<Bank>, StoreError>;
    fn create_bank(&self, name: &str) -> Result<Bank, StoreError>;
    fn rename_bank(&self, id: i64, name: &str) -> Result<Bank, StoreError>;
    /// Removes the bank and, through the foreign key cascade, its policy.
    fn delete_bank(&self, id: i64) -> Result<(), StoreError>;
    /// `Ok(None)` when the bank has no policy yet.
    fn get_policy_for_bank(&self, bank_id: i64) -> Result<Option<PolicyDocument>, StoreError>;
    fn upsert_policy(
        &self,
        bank_id: i64,
        policy_text: &str,
        embedding: &[f32],
    ) -> Result<PolicyDocument, StoreError>;
    /// Every stored policy with its bank name. Unranked.
    fn list_all_policies_with_bank_name(&self) -> Result<Vec<PolicyWithBank>, StoreError>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS banks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0)
            );

            CREATE TABLE IF NOT EXISTS policies_text (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bank_id INTEGER NOT NULL UNIQUE,
                policy_text TEXT NOT NULL,
                embedding BLOB,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (bank_id) REFERENCES banks(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ── Settings ──

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn bank_from_row(row: &Row<'_>) -> rusqlite::Result<Bank> {
    Ok(Bank {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn policy_from_row(row: &Row<'_>) -> rusqlite::Result<PolicyDocument> {
    let embedding: Option<Vec<u8>> = row.get(3)?;
    Ok(PolicyDocument {
        id: row.get(0)?,
        bank_id: row.get(1)?,
        policy_text: row.get(2)?,
        embedding: embedding.map(|bytes| bytes_to_embedding(&bytes)),
        updated_at: row.get(4)?,
    })
}

const POLICY_COLUMNS: &str = "id, bank_id, policy_text, embedding, updated_at";

impl PolicyStore for Database {
    fn list_banks(&self) -> Result<Vec<Bank>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM banks ORDER BY name ASC")?;
        let rows = stmt.query_map([], bank_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn create_bank(&self, name: &str) -> Result<Bank, StoreError> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO banks (name) VALUES (?1)", params![name])?;
        let id = conn.last_insert_rowid();
        let bank = conn.query_row(
            "SELECT id, name FROM banks WHERE id = ?1",
            params![id],
            bank_from_row,
        )?;
        Ok(bank)
    }

    fn rename_bank(&self, id: i64, name: &str) -> Result<Bank, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE banks SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
        if changed == 0 {
            return Err(StoreError::BankNotFound(id));
        }
        Ok(Bank {
            id,
            name: name.to_string(),
        })
    }

    fn delete_bank(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM banks WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn get_policy_for_bank(&self, bank_id: i64) -> Result<Option<PolicyDocument>, StoreError> {
        let conn = self.conn()?;
        let policy = conn
            .query_row(
                &format!("SELECT {POLICY_COLUMNS} FROM policies_text WHERE bank_id = ?1"),
                params![bank_id],
                policy_from_row,
            )
            .optional()?;
        Ok(policy)
    }

    fn upsert_policy(
        &self,
        bank_id: i64,
        policy_text: &str,
        embedding: &[f32],
    ) -> Result<PolicyDocument, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let bytes = embedding_to_bytes(embedding);
        let now = Utc::now();

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM policies_text WHERE bank_id = ?1",
                params![bank_id],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE policies_text SET policy_text = ?1, embedding = ?2, updated_at = ?3 WHERE id = ?4",
                    params![policy_text, bytes, now, id],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO policies_text (bank_id, policy_text, embedding, updated_at) VALUES (?1, ?2, ?3, ?4)",
                    params![bank_id, policy_text, bytes, now],
                )?;
            }
        }

        let policy = tx.query_row(
            &format!("SELECT {POLICY_COLUMNS} FROM policies_text WHERE bank_id = ?1"),
            params![bank_id],
            policy_from_row,
        )?;
        tx.commit()?;
        Ok(policy)
    }

    fn list_all_policies_with_bank_name(&self) -> Result<Vec<PolicyWithBank>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.id, p.bank_id, p.policy_text, p.embedding, p.updated_at, b.name
             FROM policies_text p
             INNER JOIN banks b ON b.id = p.bank_id
             ORDER BY p.id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PolicyWithBank {
                policy: policy_from_row(row)?,
                name: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn banks_are_listed_by_name() {
        let db = db();
        db.create_bank("Qudos").unwrap();
        db.create_bank("Bankwest").unwrap();
        db.create_bank("CBA").unwrap();

        let names: Vec<String> = db.list_banks().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["Bankwest", "CBA", "Qudos"]);
    }

    #[test]
    fn create_bank_assigns_distinct_ids() {
        let db = db();
        let a = db.create_bank("La Trobe").unwrap();
        let b = db.create_bank("Qudos").unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.name, "La Trobe");
    }

    #[test]
    fn create_bank_rejects_constraint_violations() {
        let db = db();
        db.create_bank("CBA").unwrap();
        assert!(matches!(db.create_bank("CBA"), Err(StoreError::Sqlite(_))));
        assert!(matches!(db.create_bank("   "), Err(StoreError::Sqlite(_))));
        assert_eq!(db.list_banks().unwrap().len(), 1);
    }

    #[test]
    fn rename_bank_updates_name() {
        let db = db();
        let bank = db.create_bank("Bankwst").unwrap();
        let renamed = db.rename_bank(bank.id, "Bankwest").unwrap();
        assert_eq!(renamed.name, "Bankwest");
        assert_eq!(db.list_banks().unwrap()[0].name, "Bankwest");
    }

    #[test]
    fn rename_missing_bank_is_not_found() {
        let db = db();
        assert!(matches!(
            db.rename_bank(42, "Nobody"),
            Err(StoreError::BankNotFound(42))
        ));
    }

    #[test]
    fn missing_policy_is_none_not_error() {
        let db = db();
        let bank = db.create_bank("CBA").unwrap();
        assert!(db.get_policy_for_bank(bank.id).unwrap().is_none());
        assert!(db.get_policy_for_bank(999).unwrap().is_none());
    }

    #[test]
    fn upsert_twice_keeps_one_row_with_latest_values() {
        let db = db();
        let bank = db.create_bank("Qudos").unwrap();

        let first = db.upsert_policy(bank.id, "LMI waived at 80%", &[0.1, 0.2]).unwrap();
        let second = db.upsert_policy(bank.id, "LMI waived at 85%", &[0.3, -0.4]).unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.updated_at >= first.updated_at);

        let stored = db.get_policy_for_bank(bank.id).unwrap().unwrap();
        assert_eq!(stored.policy_text, "LMI waived at 85%");
        assert_eq!(stored.embedding, Some(vec![0.3, -0.4]));
        assert_eq!(stored.updated_at, second.updated_at);

        let count: i64 = db
            .conn()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM policies_text WHERE bank_id = ?1",
                params![bank.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn upsert_for_unknown_bank_fails() {
        let db = db();
        assert!(db.upsert_policy(7, "orphan", &[1.0]).is_err());
    }

    #[test]
    fn deleting_bank_cascades_to_policy() {
        let db = db();
        let bank = db.create_bank("La Trobe").unwrap();
        db.upsert_policy(bank.id, "Bad credit considered", &[0.5]).unwrap();

        db.delete_bank(bank.id).unwrap();

        assert!(db.list_banks().unwrap().is_empty());
        assert!(db.get_policy_for_bank(bank.id).unwrap().is_none());
        assert!(db.list_all_policies_with_bank_name().unwrap().is_empty());
    }

    #[test]
    fn policies_join_bank_names() {
        let db = db();
        let cba = db.create_bank("CBA").unwrap();
        let qudos = db.create_bank("Qudos").unwrap();
        db.upsert_policy(cba.id, "CBA text", &[1.0]).unwrap();
        db.upsert_policy(qudos.id, "Qudos text", &[2.0]).unwrap();

        let all = db.list_all_policies_with_bank_name().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "CBA");
        assert_eq!(all[0].policy.policy_text, "CBA text");
        assert_eq!(all[1].name, "Qudos");
    }

    #[test]
    fn settings_roundtrip_and_delete() {
        let db = db();
        assert_eq!(db.get_setting("chat_model").unwrap(), None);
        db.set_setting("chat_model", "gpt-4o-mini").unwrap();
        db.set_setting("chat_model", "gpt-4o").unwrap();
        assert_eq!(db.get_setting("chat_model").unwrap().as_deref(), Some("gpt-4o"));
        db.delete_setting("chat_model").unwrap();
        assert_eq!(db.get_setting("chat_model").unwrap(), None);
    }

    #[test]
    fn on_disk_database_persists_banks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mortgage-advisor.db");
        {
            let db = Database::open(&path).unwrap();
            db.create_bank("Bankwest").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_banks().unwrap().len(), 1);
    }
}
