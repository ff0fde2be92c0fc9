//! Conversation persistence for mixtape.
//!
//! Each conversation is stored as a JSON file under
//! `~/.local/share/mixtape/conversations/`. An `index.json` file in the
//! same directory maintains metadata for all conversations. The whole
//! history is rewritten after every turn; histories are short enough
//! that this stays cheap and keeps the file valid JSON at all times.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::entry::Entry;

/// Metadata for a single conversation, stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub id: String,
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub entry_count: usize,
}

/// Index of all conversations, persisted as `index.json`.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ConversationIndex {
    pub conversations: Vec<ConversationMeta>,
}

/// File-backed store of conversation histories.
pub struct ConversationStore {
    root: PathBuf,
}

impl ConversationStore {
    /// Opens the store at the default data directory, creating it if
    /// needed.
    pub fn open_default() -> Result<Self> {
        Self::at(Config::data_dir()?.join("conversations"))
    }

    /// Opens a store rooted at an explicit directory.
    pub fn at(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).context("Failed to create conversations directory")?;
        Ok(Self { root })
    }

    /// Returns a fresh conversation identifier.
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Loads a conversation's history. A missing file is an error;
    /// callers decide whether to start fresh instead.
    pub fn load(&self, id: &str) -> Result<Vec<Entry>> {
        let path = self.conversation_path(id);
        let short = &id[..8.min(id.len())];
        anyhow::ensure!(path.exists(), "Conversation {} not found", short);

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read conversation file {:?}", path))?;
        let entries: Vec<Entry> = serde_json::from_str(&contents)
            .with_context(|| "Failed to parse conversation file")?;
        Ok(entries)
    }

    /// Saves a conversation's full history and updates the index.
    pub fn save(&self, id: &str, entries: &[Entry]) -> Result<()> {
        let path = self.conversation_path(id);
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write conversation file {:?}", path))?;
        self.update_index(id, entries)
    }

    /// Deletes a conversation's file and removes it from the index.
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.conversation_path(id);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to delete conversation file {:?}", path))?;
        }

        let mut index = self.load_index()?;
        index.conversations.retain(|c| c.id != id);
        self.write_index(&index)
    }

    /// Returns metadata for all conversations, most recently updated
    /// first.
    pub fn list(&self) -> Result<Vec<ConversationMeta>> {
        let mut conversations = self.load_index()?.conversations;
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    /// Updates (or creates) a conversation's entry in the index file.
    fn update_index(&self, id: &str, entries: &[Entry]) -> Result<()> {
        let mut index = self.load_index()?;
        let now = Utc::now().to_rfc3339();
        let title = Self::title(entries);

        if let Some(meta) = index.conversations.iter_mut().find(|c| c.id == id) {
            meta.title = title;
            meta.updated_at = now;
            meta.entry_count = entries.len();
        } else {
            index.conversations.push(ConversationMeta {
                id: id.to_string(),
                title,
                created_at: now.clone(),
                updated_at: now,
                entry_count: entries.len(),
            });
        }

        self.write_index(&index)
    }

    /// Derives a title from the first user entry, truncated to 50
    /// characters.
    fn title(entries: &[Entry]) -> Option<String> {
        entries.iter().find_map(|e| match e {
            Entry::User { text } => {
                if text.chars().count() > 50 {
                    let truncated: String = text.chars().take(50).collect();
                    Some(format!("{}...", truncated))
                } else {
                    Some(text.clone())
                }
            }
            _ => None,
        })
    }

    fn load_index(&self) -> Result<ConversationIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(ConversationIndex::default());
        }
        let contents =
            fs::read_to_string(&path).with_context(|| "Failed to read conversation index")?;
        serde_json::from_str(&contents).with_context(|| "Failed to parse conversation index")
    }

    fn write_index(&self, index: &ConversationIndex) -> Result<()> {
        let json = serde_json::to_string_pretty(index)?;
        fs::write(self.index_path(), json).with_context(|| "Failed to write conversation index")
    }

    fn conversation_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_history() -> Vec<Entry> {
        vec![
            Entry::user("Show my playlists"),
            Entry::tool_call("call_1", "get_my_playlists", "{}"),
            Entry::tool_result("call_1", r#"[{"name":"My Favs"}]"#),
            Entry::assistant("Here are your playlists."),
        ]
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::at(dir.path().to_path_buf()).unwrap();
        let id = ConversationStore::new_id();
        let history = sample_history();

        store.save(&id, &history).unwrap();
        let loaded = store.load(&id).unwrap();
        assert_eq!(loaded, history);
    }

    #[test]
    fn save_updates_index_metadata() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::at(dir.path().to_path_buf()).unwrap();
        let id = ConversationStore::new_id();

        store.save(&id, &sample_history()).unwrap();
        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
        assert_eq!(list[0].entry_count, 4);
        assert_eq!(list[0].title.as_deref(), Some("Show my playlists"));
    }

    #[test]
    fn resave_overwrites_instead_of_duplicating() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::at(dir.path().to_path_buf()).unwrap();
        let id = ConversationStore::new_id();

        let mut history = sample_history();
        store.save(&id, &history).unwrap();
        history.push(Entry::user("And my liked songs?"));
        store.save(&id, &history).unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].entry_count, 5);
        assert_eq!(store.load(&id).unwrap().len(), 5);
    }

    #[test]
    fn long_titles_are_truncated() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::at(dir.path().to_path_buf()).unwrap();
        let id = ConversationStore::new_id();
        let long = "a".repeat(80);

        store.save(&id, &[Entry::user(&long)]).unwrap();
        let title = store.list().unwrap()[0].title.clone().unwrap();
        assert_eq!(title.chars().count(), 53);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn delete_removes_file_and_index_entry() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::at(dir.path().to_path_buf()).unwrap();
        let id = ConversationStore::new_id();

        store.save(&id, &sample_history()).unwrap();
        store.delete(&id).unwrap();

        assert!(store.load(&id).is_err());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn loading_a_missing_conversation_is_an_error() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::at(dir.path().to_path_buf()).unwrap();
        assert!(store.load("nope").is_err());
    }

    #[test]
    fn list_orders_by_most_recent_update() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::at(dir.path().to_path_buf()).unwrap();
        let first = ConversationStore::new_id();
        let second = ConversationStore::new_id();

        store.save(&first, &[Entry::user("older")]).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save(&second, &[Entry::user("newer")]).unwrap();

        let list = store.list().unwrap();
        assert_eq!(list[0].id, second);
        assert_eq!(list[1].id, first);
    }
}
