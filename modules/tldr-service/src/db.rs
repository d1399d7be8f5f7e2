//! SQLite-backed document storage for the memory and config trees.
//!
//! Each document is a JSON object addressed by key paths such as
//! `["tldr", conv_id]`. Writes land in the in-process tree and only reach
//! SQLite on an explicit `save()`.

use rusqlite::Result as SqliteResult;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

pub const MEMORY_DOCUMENT: &str = "memory";
pub const CONFIG_DOCUMENT: &str = "config";

/// Path-addressed key-value store with an explicit flush.
pub trait Memory: Send + Sync {
    fn exists(&self, path: &[&str]) -> bool;
    fn get(&self, path: &[&str]) -> Option<Value>;
    /// Store `value` at `path`. The parent of `path` must already exist.
    fn set(&self, path: &[&str], value: Value) -> Result<(), String>;
    /// Flush everything written so far to durable storage.
    fn save(&self) -> Result<(), String>;
}

pub struct Db {
    conn: Mutex<rusqlite::Connection>,
}

impl Db {
    pub fn open(path: &str) -> SqliteResult<Self> {
        let conn = if path == ":memory:" {
            rusqlite::Connection::open_in_memory()?
        } else {
            rusqlite::Connection::open(path)?
        };
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                name TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;
        Ok(())
    }

    pub fn load_document(&self, name: &str) -> Result<Option<Value>, String> {
        let conn = self.conn.lock().unwrap();
        let body: Option<String> = match conn.query_row(
            "SELECT body FROM documents WHERE name = ?1",
            rusqlite::params![name],
            |row| row.get(0),
        ) {
            Ok(body) => Some(body),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(format!("Failed to load document '{}': {}", name, e)),
        };

        body.map(|b| {
            serde_json::from_str::<Value>(&b)
                .map_err(|e| format!("Corrupt document '{}': {}", name, e))
        })
        .transpose()
    }

    pub fn store_document(&self, name: &str, body: &Value) -> Result<(), String> {
        let body = serde_json::to_string(body)
            .map_err(|e| format!("Failed to serialize document '{}': {}", name, e))?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO documents (name, body, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(name) DO UPDATE SET
                body = excluded.body,
                updated_at = datetime('now')",
            rusqlite::params![name, body],
        )
        .map_err(|e| format!("Failed to save document '{}': {}", name, e))?;
        Ok(())
    }
}

/// One named JSON document, loaded once and flushed on `save()`.
pub struct JsonStore {
    name: String,
    db: Arc<Db>,
    tree: Mutex<Value>,
}

impl JsonStore {
    pub fn open(db: Arc<Db>, name: &str) -> Result<Self, String> {
        let tree = match db.load_document(name)? {
            Some(Value::Object(map)) => Value::Object(map),
            Some(other) => {
                log::warn!(
                    "Document '{}' is not an object ({}), starting empty",
                    name,
                    other
                );
                Value::Object(Map::new())
            }
            None => Value::Object(Map::new()),
        };
        Ok(Self {
            name: name.to_string(),
            db,
            tree: Mutex::new(tree),
        })
    }
}

impl Memory for JsonStore {
    fn exists(&self, path: &[&str]) -> bool {
        let tree = self.tree.lock().unwrap();
        lookup(&tree, path).is_some()
    }

    fn get(&self, path: &[&str]) -> Option<Value> {
        let tree = self.tree.lock().unwrap();
        lookup(&tree, path).cloned()
    }

    fn set(&self, path: &[&str], value: Value) -> Result<(), String> {
        let mut tree = self.tree.lock().unwrap();
        let Some((last, parents)) = path.split_last() else {
            *tree = value;
            return Ok(());
        };
        let parent = lookup_mut(&mut tree, parents)
            .ok_or_else(|| format!("Path not found: {}", parents.join(".")))?;
        let obj = parent
            .as_object_mut()
            .ok_or_else(|| format!("Not an object at: {}", parents.join(".")))?;
        obj.insert(last.to_string(), value);
        Ok(())
    }

    fn save(&self) -> Result<(), String> {
        // Tree stays locked until the write lands so saves reach SQLite in order.
        let tree = self.tree.lock().unwrap();
        self.db.store_document(&self.name, &tree)
    }
}

fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |node, key| node.as_object()?.get(*key))
}

fn lookup_mut<'a>(root: &'a mut Value, path: &[&str]) -> Option<&'a mut Value> {
    let mut node = root;
    for key in path {
        node = node.as_object_mut()?.get_mut(*key)?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_store() -> JsonStore {
        let db = Arc::new(Db::open(":memory:").expect("in-memory db"));
        JsonStore::open(db, MEMORY_DOCUMENT).expect("open store")
    }

    #[test]
    fn test_set_and_get_nested() {
        let store = memory_store();
        store.set(&["tldr"], json!({})).unwrap();
        store.set(&["tldr", "conv-1"], json!({"1.5": "hello"})).unwrap();

        assert!(store.exists(&["tldr", "conv-1"]));
        assert_eq!(store.get(&["tldr", "conv-1", "1.5"]), Some(json!("hello")));
        assert!(!store.exists(&["tldr", "conv-2"]));
        assert_eq!(store.get(&["conversations"]), None);
    }

    #[test]
    fn test_set_requires_parent() {
        let store = memory_store();
        let err = store
            .set(&["conversations", "c", "tldr_echo"], json!("PM"))
            .unwrap_err();
        assert!(err.contains("Path not found"));
    }

    #[test]
    fn test_set_through_non_object_fails() {
        let store = memory_store();
        store.set(&["tldr"], json!("scalar")).unwrap();
        let err = store.set(&["tldr", "c"], json!({})).unwrap_err();
        assert!(err.contains("Not an object"));
    }

    #[test]
    fn test_null_value_still_exists() {
        let store = memory_store();
        store.set(&["key"], Value::Null).unwrap();
        assert!(store.exists(&["key"]));
        assert_eq!(store.get(&["key"]), Some(Value::Null));
    }

    #[test]
    fn test_save_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tldr.db");
        let path = path.to_str().unwrap();

        {
            let db = Arc::new(Db::open(path).unwrap());
            let store = JsonStore::open(db, MEMORY_DOCUMENT).unwrap();
            store.set(&["saved"], json!(1)).unwrap();
            store.save().unwrap();
            store.set(&["unsaved"], json!(2)).unwrap();
        }

        let db = Arc::new(Db::open(path).unwrap());
        let store = JsonStore::open(db, MEMORY_DOCUMENT).unwrap();
        assert_eq!(store.get(&["saved"]), Some(json!(1)));
        assert!(!store.exists(&["unsaved"]));
    }

    #[test]
    fn test_concurrent_saves_keep_latest_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tldr.db");
        let path = path.to_str().unwrap();

        let db = Arc::new(Db::open(path).unwrap());
        let store = Arc::new(JsonStore::open(db, MEMORY_DOCUMENT).unwrap());
        store.set(&["tldr"], json!({})).unwrap();

        std::thread::scope(|scope| {
            for conv in 0..8 {
                let store = store.clone();
                scope.spawn(move || {
                    let conv_id = format!("c{}", conv);
                    for i in 0..50 {
                        store.set(&["tldr", conv_id.as_str()], json!(i)).unwrap();
                        store.save().unwrap();
                    }
                });
            }
        });
        drop(store);

        let db = Arc::new(Db::open(path).unwrap());
        let reopened = JsonStore::open(db, MEMORY_DOCUMENT).unwrap();
        for conv in 0..8 {
            let conv_id = format!("c{}", conv);
            assert_eq!(
                reopened.get(&["tldr", conv_id.as_str()]),
                Some(json!(49)),
                "conversation {}",
                conv_id
            );
        }
    }

    #[test]
    fn test_documents_are_independent() {
        let db = Arc::new(Db::open(":memory:").unwrap());
        let memory = JsonStore::open(db.clone(), MEMORY_DOCUMENT).unwrap();
        let config = JsonStore::open(db.clone(), CONFIG_DOCUMENT).unwrap();

        memory.set(&["tldr_echo"], json!("PM")).unwrap();
        memory.save().unwrap();
        config.save().unwrap();

        let reloaded = JsonStore::open(db, CONFIG_DOCUMENT).unwrap();
        assert!(!reloaded.exists(&["tldr_echo"]));
    }
}
