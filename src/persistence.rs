//! Database persistence layer for TokenChain
//!
//! Only the active window is stored: the bedrock summary plus the encoded
//! blocks still retained above it. Older history is gone once pruned.

use crate::blockchain::SummaryBlock;
use crate::error::ChainError;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

/// Bedrock and the encoded retained blocks, ordered by height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub bedrock: SummaryBlock,
    pub blocks: Vec<Vec<u8>>,
}

/// Abstraction for persistence backends. Implementations must replace the
/// stored snapshot atomically.
pub trait Persistence: Send + Sync {
    fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), ChainError>;
    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, ChainError>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, ChainError> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS bedrock (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                block_number INTEGER NOT NULL,
                hash BLOB NOT NULL,
                ownership TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create bedrock table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                seq INTEGER PRIMARY KEY,
                data BLOB NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create blocks table: {}", e)))?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Atomically replaces bedrock and the retained blocks.
    pub fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), ChainError> {
        let ownership_json = serde_json::to_string(&snapshot.bedrock.ownership).map_err(|e| {
            ChainError::DatabaseError(format!("Failed to serialize ownership: {}", e))
        })?;

        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction().map_err(|e| {
            ChainError::DatabaseError(format!("Failed to start transaction: {}", e))
        })?;

        tx.execute(
            "INSERT OR REPLACE INTO bedrock (id, block_number, hash, ownership) VALUES (0, ?1, ?2, ?3)",
            params![
                snapshot.bedrock.block_number as i64,
                snapshot.bedrock.hash,
                ownership_json,
            ],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to save bedrock: {}", e)))?;

        tx.execute("DELETE FROM blocks", [])
            .map_err(|e| ChainError::DatabaseError(format!("Failed to clear blocks: {}", e)))?;

        for (seq, data) in snapshot.blocks.iter().enumerate() {
            tx.execute(
                "INSERT INTO blocks (seq, data) VALUES (?1, ?2)",
                params![seq as i64, data],
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to save block: {}", e)))?;
        }

        tx.commit().map_err(|e| {
            ChainError::DatabaseError(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }

    pub fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, ChainError> {
        let conn = self.conn.lock();

        let bedrock_row = conn
            .query_row(
                "SELECT block_number, hash, ownership FROM bedrock WHERE id = 0",
                [],
                |row| {
                    let block_number: i64 = row.get(0)?;
                    let hash: Vec<u8> = row.get(1)?;
                    let ownership: String = row.get(2)?;
                    Ok((block_number, hash, ownership))
                },
            )
            .optional()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to load bedrock: {}", e)))?;

        let Some((block_number, hash, ownership_json)) = bedrock_row else {
            return Ok(None);
        };
        let ownership = serde_json::from_str(&ownership_json).map_err(|e| {
            ChainError::DatabaseError(format!("Failed to deserialize ownership: {}", e))
        })?;

        let mut stmt = conn
            .prepare("SELECT data FROM blocks ORDER BY seq ASC")
            .map_err(|e| ChainError::DatabaseError(format!("Failed to prepare query: {}", e)))?;
        let blocks = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))
            .map_err(|e| ChainError::DatabaseError(format!("Failed to query blocks: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to load block: {}", e)))?;

        Ok(Some(LedgerSnapshot {
            bedrock: SummaryBlock {
                block_number: block_number as u64,
                hash,
                ownership,
            },
            blocks,
        }))
    }
}

impl Persistence for Database {
    fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), ChainError> {
        Database::save_snapshot(self, snapshot)
    }

    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, ChainError> {
        Database::load_snapshot(self)
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryPersistence {
    snapshot: Mutex<Option<LedgerSnapshot>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), ChainError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, ChainError> {
        Ok(self.snapshot.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::token::Token;

    fn sample_snapshot() -> LedgerSnapshot {
        let mut bedrock = SummaryBlock::genesis(vec![4u8; 32]);
        bedrock.block_number = 12;
        bedrock.ownership.insert(Token::new("sword"), KeyPair::generate().identity());
        bedrock.ownership.insert(Token::new("shield"), KeyPair::generate().identity());
        LedgerSnapshot {
            bedrock,
            blocks: vec![vec![1, 2, 3], vec![4, 5]],
        }
    }

    #[test]
    fn test_empty_database_has_no_snapshot() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.load_snapshot().unwrap().is_none());
    }

    #[test]
    fn test_database_snapshot_round_trip() {
        let db = Database::open(":memory:").unwrap();
        let snapshot = sample_snapshot();
        db.save_snapshot(&snapshot).unwrap();

        assert_eq!(db.load_snapshot().unwrap(), Some(snapshot));
    }

    #[test]
    fn test_save_replaces_previous_blocks() {
        let db = Database::open(":memory:").unwrap();
        db.save_snapshot(&sample_snapshot()).unwrap();

        let mut newer = sample_snapshot();
        newer.bedrock.block_number = 13;
        newer.blocks = vec![vec![9]];
        db.save_snapshot(&newer).unwrap();

        let loaded = db.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded.bedrock.block_number, 13);
        assert_eq!(loaded.blocks, vec![vec![9]]);
    }

    #[test]
    fn test_in_memory_round_trip() {
        let store = InMemoryPersistence::new();
        assert!(store.load_snapshot().unwrap().is_none());

        let snapshot = sample_snapshot();
        store.save_snapshot(&snapshot).unwrap();
        assert_eq!(store.load_snapshot().unwrap(), Some(snapshot));
    }
}
