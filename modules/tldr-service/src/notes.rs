//! Per-conversation note collections.
//!
//! Notes live in memory at `tldr[conv_id][timestamp] = text`. Positions are a
//! projection computed on every read: entries sorted ascending by numeric
//! timestamp, numbered from 1. Nothing here caches that ordering, so a
//! position is only meaningful inside the call that produced it.

use crate::clock::Clock;
use crate::db::Memory;
use serde_json::{Map, Value};
use std::sync::Arc;
use tldr_types::BackupEntry;

pub const TLDR_ROOT: &str = "tldr";

/// Gap used to keep timestamps strictly increasing when the clock stalls.
const TIMESTAMP_STEP: f64 = 0.000_001;

const MINUTE: f64 = 60.0;
const HOUR: f64 = 60.0 * 60.0;
const DAY: f64 = 60.0 * 60.0 * 24.0;

#[derive(Debug, Clone)]
pub struct Note {
    /// Storage key exactly as persisted
    pub key: String,
    pub timestamp: f64,
    pub text: String,
}

/// Sorted view of one conversation's notes.
#[derive(Debug, Clone)]
pub struct NoteCollection {
    conv_id: String,
    notes: Vec<Note>,
    /// Entries whose key is not a number. Carried through writes untouched.
    foreign: Map<String, Value>,
}

impl NoteCollection {
    fn from_value(conv_id: &str, value: &Value) -> Self {
        let mut notes = Vec::new();
        let mut foreign = Map::new();

        if let Some(map) = value.as_object() {
            for (key, text) in map {
                let timestamp = match key.parse::<f64>() {
                    Ok(ts) if ts.is_finite() => ts,
                    _ => {
                        log::warn!(
                            "TL;DR: Ignoring entry with non-numeric key '{}' in conversation {}",
                            key,
                            conv_id
                        );
                        foreign.insert(key.clone(), text.clone());
                        continue;
                    }
                };
                let text = match text {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                notes.push(Note {
                    key: key.clone(),
                    timestamp,
                    text,
                });
            }
        }

        notes.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        Self {
            conv_id: conv_id.to_string(),
            notes,
            foreign,
        }
    }

    fn to_value(&self) -> Value {
        let mut map = self.foreign.clone();
        for note in &self.notes {
            map.insert(note.key.clone(), Value::String(note.text.clone()));
        }
        Value::Object(map)
    }

    pub fn conv_id(&self) -> &str {
        &self.conv_id
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Note at a 1-based position.
    #[cfg(test)]
    pub fn get(&self, position: usize) -> Option<&Note> {
        self.index_of(position).map(|i| &self.notes[i])
    }

    fn index_of(&self, position: usize) -> Option<usize> {
        position.checked_sub(1).filter(|i| *i < self.notes.len())
    }

    fn contains_key(&self, key: &str) -> bool {
        self.foreign.contains_key(key) || self.notes.iter().any(|n| n.key == key)
    }
}

/// Which notes a listing should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    All,
    /// 1-based
    Position(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListedNote {
    pub position: usize,
    pub timestamp: f64,
    pub text: String,
    pub age: String,
}

pub struct NoteStore {
    memory: Arc<dyn Memory>,
    clock: Arc<dyn Clock>,
}

impl NoteStore {
    pub fn new(memory: Arc<dyn Memory>, clock: Arc<dyn Clock>) -> Self {
        Self { memory, clock }
    }

    /// Read a conversation's notes, creating the empty collection on first access.
    pub fn load(&self, conv_id: &str) -> Result<NoteCollection, String> {
        if !self.memory.exists(&[TLDR_ROOT]) {
            self.memory.set(&[TLDR_ROOT], Value::Object(Map::new()))?;
        }
        if !self.memory.exists(&[TLDR_ROOT, conv_id]) {
            self.memory.set(&[TLDR_ROOT, conv_id], Value::Object(Map::new()))?;
        }

        let value = self
            .memory
            .get(&[TLDR_ROOT, conv_id])
            .unwrap_or_else(|| Value::Object(Map::new()));
        Ok(NoteCollection::from_value(conv_id, &value))
    }

    fn store(&self, collection: &NoteCollection) -> Result<(), String> {
        self.memory
            .set(&[TLDR_ROOT, collection.conv_id.as_str()], collection.to_value())?;
        self.memory.save()
    }

    /// Flush pending writes without changing anything.
    pub fn save(&self) -> Result<(), String> {
        self.memory.save()
    }

    /// Append a note stamped with the current time. Returns the new count.
    pub fn add(&self, conv_id: &str, text: &str) -> Result<usize, String> {
        let mut collection = self.load(conv_id)?;
        let (timestamp, key) = self.next_timestamp(&collection);

        collection.notes.push(Note {
            key,
            timestamp,
            text: text.to_string(),
        });
        self.store(&collection)?;

        log::info!(
            "TL;DR: Added note to conversation {} (count: {})",
            conv_id,
            collection.len()
        );
        Ok(collection.len())
    }

    /// Current time, bumped past the newest note so keys never repeat and
    /// insertion order always matches position order.
    fn next_timestamp(&self, collection: &NoteCollection) -> (f64, String) {
        let mut timestamp = self.clock.now();
        if let Some(last) = collection.notes.last() {
            if timestamp <= last.timestamp {
                timestamp = step_after(last.timestamp);
            }
        }

        let mut key = timestamp.to_string();
        while collection.contains_key(&key) {
            timestamp = step_after(timestamp);
            key = timestamp.to_string();
        }
        (timestamp, key)
    }

    /// Notes matching `selector`, in ascending timestamp order with ages
    /// measured against the current time. An out-of-range position yields
    /// an empty list.
    pub fn list(&self, conv_id: &str, selector: Selector) -> Result<Vec<ListedNote>, String> {
        let collection = self.load(conv_id)?;
        let now = self.clock.now();

        Ok(collection
            .notes
            .iter()
            .enumerate()
            .map(|(i, note)| (i + 1, note))
            .filter(|(position, _)| match selector {
                Selector::All => true,
                Selector::Position(p) => *position == p,
            })
            .map(|(position, note)| ListedNote {
                position,
                timestamp: note.timestamp,
                text: note.text.clone(),
                age: age_of(note.timestamp, now),
            })
            .collect())
    }

    /// Replace the text at a position, keeping its timestamp. Returns the
    /// previous text, or `None` when the position is out of range.
    pub fn edit(
        &self,
        conv_id: &str,
        position: usize,
        new_text: &str,
    ) -> Result<Option<String>, String> {
        let mut collection = self.load(conv_id)?;
        let Some(index) = collection.index_of(position) else {
            return Ok(None);
        };

        let previous = std::mem::replace(&mut collection.notes[index].text, new_text.to_string());
        self.store(&collection)?;

        log::info!("TL;DR: Edited note #{} in conversation {}", position, conv_id);
        Ok(Some(previous))
    }

    /// Delete the note at a position. Returns its text, or `None` when the
    /// position is out of range.
    pub fn remove(&self, conv_id: &str, position: usize) -> Result<Option<String>, String> {
        let mut collection = self.load(conv_id)?;
        let Some(index) = collection.index_of(position) else {
            return Ok(None);
        };

        let removed = collection.notes.remove(index);
        self.store(&collection)?;

        log::info!(
            "TL;DR: Removed note #{} from conversation {} ({} left)",
            position,
            conv_id,
            collection.len()
        );
        Ok(Some(removed.text))
    }

    /// Empty the conversation's collection. The collection entry itself stays.
    pub fn clear(&self, conv_id: &str) -> Result<(), String> {
        if !self.memory.exists(&[TLDR_ROOT]) {
            self.memory.set(&[TLDR_ROOT], Value::Object(Map::new()))?;
        }
        self.memory
            .set(&[TLDR_ROOT, conv_id], Value::Object(Map::new()))?;
        self.memory.save()?;

        log::info!("TL;DR: Cleared all notes in conversation {}", conv_id);
        Ok(())
    }

    /// Every stored collection, including empty ones.
    pub fn collections(&self) -> Vec<NoteCollection> {
        let Some(Value::Object(root)) = self.memory.get(&[TLDR_ROOT]) else {
            return Vec::new();
        };
        root.iter()
            .map(|(conv_id, value)| NoteCollection::from_value(conv_id, value))
            .collect()
    }

    /// Drop every collection and rebuild from backup entries.
    pub fn replace_all(&self, entries: &[BackupEntry]) -> Result<usize, String> {
        let mut root = Map::new();
        for entry in entries {
            let conv = root
                .entry(entry.conv_id.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(notes) = conv {
                notes.insert(entry.timestamp.clone(), Value::String(entry.text.clone()));
            }
        }

        self.memory.set(&[TLDR_ROOT], Value::Object(root))?;
        self.memory.save()?;

        log::info!("TL;DR: Restored {} notes from backup", entries.len());
        Ok(entries.len())
    }
}

/// Smallest usable timestamp above `timestamp`: one step later, or the next
/// representable value where a step is lost to rounding.
fn step_after(timestamp: f64) -> f64 {
    let stepped = timestamp + TIMESTAMP_STEP;
    if stepped > timestamp {
        return stepped;
    }
    // Only reached for magnitudes far above 1, so the sign bit is stable.
    let bits = timestamp.to_bits();
    if timestamp > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Coarse age of `timestamp` relative to `now` in the largest unit that fits,
/// truncated toward zero. A timestamp in the future gives a negative value.
pub fn age_of(timestamp: f64, now: f64) -> String {
    let elapsed = now - timestamp;
    if elapsed < MINUTE {
        format!("{}s", elapsed as i64)
    } else if elapsed < HOUR {
        format!("{}m", (elapsed / MINUTE) as i64)
    } else if elapsed < DAY {
        format!("{}h", (elapsed / HOUR) as i64)
    } else {
        format!("{}d", (elapsed / DAY) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::ManualClock;
    use crate::db::{Db, JsonStore, MEMORY_DOCUMENT};
    use serde_json::json;

    const T0: f64 = 1_700_000_000.0;

    fn setup() -> (NoteStore, Arc<ManualClock>, Arc<JsonStore>) {
        let db = Arc::new(Db::open(":memory:").expect("in-memory db"));
        let memory = Arc::new(JsonStore::open(db, MEMORY_DOCUMENT).unwrap());
        let clock = Arc::new(ManualClock::new(T0));
        let store = NoteStore::new(memory.clone(), clock.clone());
        (store, clock, memory)
    }

    fn texts(store: &NoteStore, conv: &str) -> Vec<String> {
        store
            .list(conv, Selector::All)
            .unwrap()
            .into_iter()
            .map(|n| n.text)
            .collect()
    }

    #[test]
    fn test_age_of_units() {
        assert_eq!(age_of(T0 - 5.0, T0), "5s");
        assert_eq!(age_of(T0 - 90.0, T0), "1m");
        assert_eq!(age_of(T0 - 7200.0, T0), "2h");
        assert_eq!(age_of(T0 - 172_800.0, T0), "2d");
    }

    #[test]
    fn test_age_of_truncates() {
        assert_eq!(age_of(T0 - 59.9, T0), "59s");
        assert_eq!(age_of(T0 - 3599.0, T0), "59m");
        assert_eq!(age_of(T0 - 86_399.0, T0), "23h");
        assert_eq!(age_of(T0 - 0.4, T0), "0s");
    }

    #[test]
    fn test_age_of_future_timestamp_is_negative() {
        assert_eq!(age_of(T0 + 5.5, T0), "-5s");
    }

    #[test]
    fn test_load_creates_collection_lazily() {
        let (store, _, memory) = setup();
        assert!(!memory.exists(&[TLDR_ROOT]));

        let collection = store.load("conv").unwrap();
        assert!(collection.is_empty());
        assert_eq!(memory.get(&[TLDR_ROOT, "conv"]), Some(json!({})));
    }

    #[test]
    fn test_add_lists_in_creation_order() {
        let (store, clock, _) = setup();
        for (i, text) in ["first", "second", "third"].iter().enumerate() {
            assert_eq!(store.add("c", text).unwrap(), i + 1);
            clock.advance(1.0);
        }

        let listed = store.list("c", Selector::All).unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(
            listed.iter().map(|n| n.position).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(texts(&store, "c"), vec!["first", "second", "third"]);
        assert_eq!(listed[0].age, "3s");
        assert_eq!(listed[2].age, "1s");
    }

    #[test]
    fn test_ordering_is_numeric_not_lexicographic() {
        let (store, _, memory) = setup();
        memory.set(&[TLDR_ROOT], json!({})).unwrap();
        memory
            .set(&[TLDR_ROOT, "c"], json!({"10.0": "later", "9.5": "earlier"}))
            .unwrap();
        assert_eq!(texts(&store, "c"), vec!["earlier", "later"]);
    }

    #[test]
    fn test_same_instant_adds_get_distinct_increasing_keys() {
        let (store, _, memory) = setup();
        store.add("c", "a").unwrap();
        store.add("c", "b").unwrap();
        store.add("c", "c").unwrap();

        let stored = memory.get(&[TLDR_ROOT, "c"]).unwrap();
        assert_eq!(stored.as_object().unwrap().len(), 3);
        assert_eq!(texts(&store, "c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_clock_going_backwards_keeps_insertion_order() {
        let (store, clock, _) = setup();
        store.add("c", "a").unwrap();
        clock.set(T0 - 100.0);
        store.add("c", "b").unwrap();
        assert_eq!(texts(&store, "c"), vec!["a", "b"]);
    }

    #[test]
    fn test_list_single_position() {
        let (store, clock, _) = setup();
        store.add("c", "a").unwrap();
        clock.advance(1.0);
        store.add("c", "b").unwrap();

        let listed = store.list("c", Selector::Position(2)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].text, "b");
        assert_eq!(listed[0].position, 2);

        assert!(store.list("c", Selector::Position(0)).unwrap().is_empty());
        assert!(store.list("c", Selector::Position(3)).unwrap().is_empty());
    }

    #[test]
    fn test_edit_keeps_timestamp_and_count() {
        let (store, clock, _) = setup();
        store.add("c", "a").unwrap();
        clock.advance(1.0);
        store.add("c", "b").unwrap();
        let before = store.load("c").unwrap();

        clock.advance(120.0);
        assert_eq!(store.edit("c", 1, "z").unwrap(), Some("a".to_string()));

        let after = store.load("c").unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after.get(1).unwrap().key, before.get(1).unwrap().key);
        assert_eq!(after.get(1).unwrap().text, "z");
        assert_eq!(after.get(2).unwrap().text, "b");

        let listed = store.list("c", Selector::Position(1)).unwrap();
        assert_eq!(listed[0].age, "2m");
    }

    #[test]
    fn test_edit_out_of_range() {
        let (store, _, _) = setup();
        store.add("c", "a").unwrap();
        assert_eq!(store.edit("c", 0, "x").unwrap(), None);
        assert_eq!(store.edit("c", 2, "x").unwrap(), None);
        assert_eq!(texts(&store, "c"), vec!["a"]);
    }

    #[test]
    fn test_edit_accepts_empty_text() {
        let (store, _, _) = setup();
        store.add("c", "a").unwrap();
        assert_eq!(store.edit("c", 1, "").unwrap(), Some("a".to_string()));
        assert_eq!(texts(&store, "c"), vec![""]);
    }

    #[test]
    fn test_step_after_survives_coarse_precision() {
        assert_eq!(step_after(T0), T0 + TIMESTAMP_STEP);

        let far = 20_000_000_000.0_f64;
        assert_eq!(far + TIMESTAMP_STEP, far);
        let next = step_after(far);
        assert!(next > far);
        assert_ne!(next.to_string(), far.to_string());
    }

    #[test]
    fn test_add_after_far_future_key_terminates() {
        let (store, _, _) = setup();
        let far = 20_000_000_000.0_f64;
        store
            .replace_all(&[BackupEntry {
                conv_id: "c".into(),
                timestamp: far.to_string(),
                text: "restored".into(),
            }])
            .unwrap();

        assert_eq!(store.add("c", "new").unwrap(), 2);
        let collection = store.load("c").unwrap();
        assert_eq!(collection.get(1).unwrap().text, "restored");
        assert_eq!(collection.get(2).unwrap().text, "new");
        assert!(collection.get(2).unwrap().timestamp > far);
    }

    #[test]
    fn test_remove_shifts_later_positions() {
        let (store, clock, _) = setup();
        for text in ["a", "b", "c"] {
            store.add("c", text).unwrap();
            clock.advance(1.0);
        }

        assert_eq!(store.remove("c", 2).unwrap(), Some("b".to_string()));
        assert_eq!(texts(&store, "c"), vec!["a", "c"]);
        assert_eq!(
            store.list("c", Selector::Position(2)).unwrap()[0].text,
            "c"
        );
        assert_eq!(store.remove("c", 3).unwrap(), None);
    }

    #[test]
    fn test_clear_is_idempotent_and_keeps_entry() {
        let (store, _, memory) = setup();
        store.add("c", "a").unwrap();
        store.clear("c").unwrap();
        assert!(store.load("c").unwrap().is_empty());
        store.clear("c").unwrap();
        assert!(store.load("c").unwrap().is_empty());
        assert!(memory.exists(&[TLDR_ROOT, "c"]));
    }

    #[test]
    fn test_conversations_are_isolated() {
        let (store, _, _) = setup();
        store.add("one", "a").unwrap();
        store.add("two", "b").unwrap();
        store.clear("one").unwrap();
        assert!(texts(&store, "one").is_empty());
        assert_eq!(texts(&store, "two"), vec!["b"]);
    }

    #[test]
    fn test_non_numeric_keys_are_skipped_but_preserved() {
        let (store, _, memory) = setup();
        memory.set(&[TLDR_ROOT], json!({})).unwrap();
        memory
            .set(&[TLDR_ROOT, "c"], json!({"junk": "x", "5.0": "real"}))
            .unwrap();

        assert_eq!(texts(&store, "c"), vec!["real"]);
        store.add("c", "new").unwrap();

        let stored = memory.get(&[TLDR_ROOT, "c"]).unwrap();
        assert_eq!(stored["junk"], "x");
        assert_eq!(store.load("c").unwrap().len(), 2);
    }

    #[test]
    fn test_replace_all_and_collections() {
        let (store, _, _) = setup();
        store.add("old", "gone").unwrap();

        let restored = store
            .replace_all(&[
                BackupEntry {
                    conv_id: "c1".into(),
                    timestamp: "2.0".into(),
                    text: "second".into(),
                },
                BackupEntry {
                    conv_id: "c1".into(),
                    timestamp: "1.0".into(),
                    text: "first".into(),
                },
                BackupEntry {
                    conv_id: "c2".into(),
                    timestamp: "3.0".into(),
                    text: "other".into(),
                },
            ])
            .unwrap();
        assert_eq!(restored, 3);

        let mut convs: Vec<String> = store
            .collections()
            .iter()
            .map(|c| c.conv_id().to_string())
            .collect();
        convs.sort();
        assert_eq!(convs, vec!["c1", "c2"]);
        assert_eq!(texts(&store, "c1"), vec!["first", "second"]);
    }
}
