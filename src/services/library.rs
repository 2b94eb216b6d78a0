use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::io::Storage;
use crate::core::state::StoryDraft;
use crate::core::story::Story;
use crate::services::seed;
use crate::services::validation::{check_email, StoryError, ValidationError};

/// A story a user has shared with their parents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedRecord {
    pub story_id: String,
    pub title: String,
    pub parent_emails: Vec<String>,
    #[serde(default)]
    pub parent_names: Vec<String>,
    pub shared_at: DateTime<Utc>,
}

/// Per-user story collection, autosave draft and shared records.
///
/// Reads never fail: a missing or unreadable key reads as empty. Writes are
/// fire-and-forget, a failed write is logged and dropped.
#[derive(Clone)]
pub struct Library {
    storage: Arc<dyn Storage>,
}

pub fn stories_key(user_id: &str) -> String {
    format!("stories_{}", user_id)
}

pub fn draft_key(user_id: &str) -> String {
    format!("story_draft_{}", user_id)
}

pub fn shared_key(user_id: &str) -> String {
    format!("shared_stories_{}", user_id)
}

fn record_id(record: &serde_json::Value) -> Option<&str> {
    record.get("id").and_then(serde_json::Value::as_str)
}

impl Library {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.storage.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Failed to read {}: {:#}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring malformed JSON in {}: {}", key, e);
                None
            }
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let content = match serde_json::to_string(value) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Failed to serialize {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.storage.set(key, &content).await {
            log::warn!("Failed to write {}: {:#}", key, e);
        }
    }

    /// The raw records of a user's collection, as stored.
    async fn read_records(&self, user_id: &str) -> Vec<serde_json::Value> {
        self.read_json(&stories_key(user_id)).await.unwrap_or_default()
    }

    /// The user's stories in insertion order. Records that no longer parse
    /// are skipped here but stay in storage untouched.
    pub async fn list_stories(&self, user_id: &str) -> Vec<Story> {
        self.read_records(user_id)
            .await
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<Story>(record) {
                Ok(story) => Some(story),
                Err(e) => {
                    log::warn!("Skipping unreadable story for {}: {}", user_id, e);
                    None
                }
            })
            .collect()
    }

    /// Example stories followed by the user's own.
    pub async fn shelf(&self, user_id: &str) -> Vec<Story> {
        let mut stories = seed::example_stories();
        stories.extend(self.list_stories(user_id).await);
        stories
    }

    /// Looks in the user's collection, then the examples.
    pub async fn get_story(&self, user_id: &str, story_id: &str) -> Option<Story> {
        let mut found = self
            .list_stories(user_id)
            .await
            .into_iter()
            .find(|s| s.id.as_deref() == Some(story_id));
        if found.is_none() {
            found = seed::example_stories()
                .into_iter()
                .find(|s| s.id.as_deref() == Some(story_id));
        }
        found
    }

    /// Upserts by id: an existing record is replaced where it sits, a new one
    /// is appended. A story without an id gets one here.
    pub async fn save_story(&self, user_id: &str, story: &mut Story) {
        if story.is_example || story.id.as_deref().is_some_and(seed::is_example_id) {
            log::warn!("Refusing to store example story {:?}", story.id);
            return;
        }
        let id = story.ensure_id().to_string();
        let value = match serde_json::to_value(&*story) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Failed to serialize story {}: {}", id, e);
                return;
            }
        };

        let mut records = self.read_records(user_id).await;
        match records.iter_mut().find(|r| record_id(r) == Some(id.as_str())) {
            Some(slot) => *slot = value,
            None => records.push(value),
        }
        log::debug!("Saved story {} ({} in collection)", id, records.len());
        self.write_json(&stories_key(user_id), &records).await;
    }

    /// Removes the record if present. Does not check for example stories;
    /// use [`Library::remove_story`] from user-facing code.
    pub async fn delete_story(&self, user_id: &str, story_id: &str) {
        let mut records = self.read_records(user_id).await;
        let before = records.len();
        records.retain(|r| record_id(r) != Some(story_id));
        if records.len() != before {
            self.write_json(&stories_key(user_id), &records).await;
        }
    }

    pub async fn remove_story(&self, user_id: &str, story_id: &str) -> Result<(), StoryError> {
        if seed::is_example_id(story_id) {
            return Err(StoryError::ExampleImmutable);
        }
        let stories = self.list_stories(user_id).await;
        if stories
            .iter()
            .any(|s| s.id.as_deref() == Some(story_id) && s.is_example)
        {
            return Err(StoryError::ExampleImmutable);
        }
        self.delete_story(user_id, story_id).await;
        log::info!("Deleted story {}", story_id);
        Ok(())
    }

    pub async fn save_draft(&self, user_id: &str, draft: &StoryDraft) {
        self.write_json(&draft_key(user_id), draft).await;
    }

    pub async fn load_draft(&self, user_id: &str) -> Option<StoryDraft> {
        self.read_json(&draft_key(user_id)).await
    }

    pub async fn clear_draft(&self, user_id: &str) {
        if let Err(e) = self.storage.remove(&draft_key(user_id)).await {
            log::warn!("Failed to clear draft for {}: {:#}", user_id, e);
        }
    }

    pub async fn list_shared(&self, user_id: &str) -> Vec<SharedRecord> {
        self.read_json(&shared_key(user_id)).await.unwrap_or_default()
    }

    /// Shares a stored story with the given parents. Every email must be
    /// valid; nothing is written otherwise.
    pub async fn share_story(
        &self,
        user_id: &str,
        story_id: &str,
        parent_emails: &[String],
        parent_names: &[String],
    ) -> Result<Story, StoryError> {
        if parent_emails.is_empty() {
            return Err(ValidationError::NoRecipients.into());
        }
        for email in parent_emails {
            check_email(email)?;
        }
        if seed::is_example_id(story_id) {
            return Err(StoryError::ExampleImmutable);
        }

        let mut story = self
            .list_stories(user_id)
            .await
            .into_iter()
            .find(|s| s.id.as_deref() == Some(story_id))
            .ok_or_else(|| StoryError::NotFound(story_id.to_string()))?;

        let emails: Vec<String> = parent_emails.iter().map(|e| e.trim().to_string()).collect();
        story.shared_with = Some(crate::core::story::SharedWith {
            parent_emails: emails.clone(),
            parent_names: parent_names.to_vec(),
        });
        story.is_shared = true;
        story.updated_at = Utc::now();
        self.save_story(user_id, &mut story).await;

        let record = SharedRecord {
            story_id: story_id.to_string(),
            title: story.title.clone(),
            parent_emails: emails,
            parent_names: parent_names.to_vec(),
            shared_at: story.updated_at,
        };
        let mut shared = self.list_shared(user_id).await;
        match shared.iter_mut().find(|r| r.story_id == story_id) {
            Some(slot) => *slot = record,
            None => shared.push(record),
        }
        self.write_json(&shared_key(user_id), &shared).await;
        log::info!("Shared story {} with {} parent(s)", story_id, parent_emails.len());

        Ok(story)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::{DetachedStorage, MemoryStorage, NativeStorage};
    use crate::core::state::WizardStep;
    use crate::core::story::{Chapter, StoryStatus};
    use anyhow::Result;

    fn titled(title: &str) -> Story {
        let mut story = Story::new();
        story.title = title.to_string();
        story
    }

    fn memory_library() -> (Library, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (Library::new(storage.clone()), storage)
    }

    #[tokio::test]
    async fn test_save_story_upserts_in_place() {
        let (library, _) = memory_library();
        let mut a = titled("A");
        let mut b = titled("B");
        library.save_story("u1", &mut a).await;
        library.save_story("u1", &mut b).await;

        a.title = "A, revised".to_string();
        library.save_story("u1", &mut a).await;
        library.save_story("u1", &mut a).await;

        let stories = library.list_stories("u1").await;
        assert_eq!(stories.len(), 2);
        assert_eq!(stories[0], a);
        assert_eq!(stories[1].title, "B");
    }

    #[tokio::test]
    async fn test_save_story_assigns_stable_id() {
        let (library, _) = memory_library();
        let mut story = titled("Luna");
        assert!(story.id.is_none());
        library.save_story("u1", &mut story).await;
        let id = story.id.clone();
        assert!(id.is_some());
        library.save_story("u1", &mut story).await;
        assert_eq!(story.id, id);
        assert_eq!(library.list_stories("u1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_collections_are_per_user() {
        let (library, _) = memory_library();
        library.save_story("u1", &mut titled("Mine")).await;
        assert!(library.list_stories("u2").await.is_empty());
        assert_eq!(library.list_stories("u1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let (library, _) = memory_library();
        let mut story = titled("Keep");
        library.save_story("u1", &mut story).await;
        library.delete_story("u1", "nope").await;
        assert_eq!(library.list_stories("u1").await.len(), 1);

        let id = story.id.clone().unwrap_or_default();
        library.remove_story("u1", &id).await.unwrap();
        assert!(library.list_stories("u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_example_stories_cannot_be_removed_or_overwritten() {
        let (library, _) = memory_library();
        let example = seed::example_stories().remove(0);
        let id = example.id.clone().unwrap_or_default();

        let err = library.remove_story("u1", &id).await.unwrap_err();
        assert!(matches!(err, StoryError::ExampleImmutable));

        let mut tampered = example.clone();
        tampered.title = "Changed".to_string();
        library.save_story("u1", &mut tampered).await;
        assert!(library.list_stories("u1").await.is_empty());

        let shelf = library.shelf("u1").await;
        assert_eq!(shelf[0], example);
        assert_eq!(library.get_story("u1", &id).await, Some(example));
    }

    #[tokio::test]
    async fn test_corrupt_collection_reads_empty() -> Result<()> {
        let (library, storage) = memory_library();
        storage.set(&stories_key("u1"), "{not json").await?;
        assert!(library.list_stories("u1").await.is_empty());

        storage.set(&draft_key("u1"), "garbage").await?;
        assert!(library.load_draft("u1").await.is_none());
        Ok(())
    }

    async fn raw_ids(storage: &MemoryStorage, user_id: &str) -> Result<Vec<String>> {
        let raw = storage.get(&stories_key(user_id)).await?.unwrap_or_default();
        let records: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
        Ok(records
            .iter()
            .map(|r| record_id(r).unwrap_or("").to_string())
            .collect())
    }

    #[tokio::test]
    async fn test_null_fields_do_not_hide_a_story() -> Result<()> {
        let (library, storage) = memory_library();
        storage
            .set(
                &stories_key("u1"),
                r#"[{"id": "old", "title": "Old", "description": null, "genre": null}]"#,
            )
            .await?;
        let stories = library.list_stories("u1").await;
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].description, "");

        library.save_story("u1", &mut titled("New")).await;
        let titles: Vec<String> = library
            .list_stories("u1")
            .await
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Old".to_string(), "New".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_records_survive_writes() -> Result<()> {
        let (library, storage) = memory_library();
        storage
            .set(
                &stories_key("u1"),
                r#"[{"id": "broken", "title": 5}, {"id": "ok", "title": "Fine"}, "junk"]"#,
            )
            .await?;
        let stories = library.list_stories("u1").await;
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].title, "Fine");

        let mut fresh = titled("Fresh");
        library.save_story("u1", &mut fresh).await;
        let fresh_id = fresh.id.clone().unwrap_or_default();
        assert_eq!(raw_ids(&storage, "u1").await?, vec!["broken", "ok", "", fresh_id.as_str()]);

        let mut fine = stories[0].clone();
        fine.title = "Finer".to_string();
        library.save_story("u1", &mut fine).await;
        assert_eq!(raw_ids(&storage, "u1").await?, vec!["broken", "ok", "", fresh_id.as_str()]);

        library.delete_story("u1", &fresh_id).await;
        library.delete_story("u1", "ok").await;
        assert_eq!(raw_ids(&storage, "u1").await?, vec!["broken", ""]);

        let raw = storage.get(&stories_key("u1")).await?.unwrap_or_default();
        assert!(raw.contains(r#""title":5"#));
        assert!(raw.contains("junk"));
        Ok(())
    }

    #[tokio::test]
    async fn test_legacy_chapter_array_keeps_good_chapters() -> Result<()> {
        let (library, storage) = memory_library();
        storage
            .set(
                &stories_key("u1"),
                r#"[{"id": "s1", "title": "Legacy", "chapters": [
                    {"id": "a", "title": "One", "content": "x"},
                    {"id": "b", "title": "Two", "content": null},
                    {"id": "c", "title": ["not", "a", "title"]}
                ]}]"#,
            )
            .await?;
        let mut story = library.list_stories("u1").await.remove(0);
        assert_eq!(story.page_count(), 2);

        story.description = "touched".to_string();
        library.save_story("u1", &mut story).await;
        let stored = library.get_story("u1", "s1").await.unwrap();
        let ids: Vec<&str> = stored.chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_draft_envelope_lifecycle() {
        let (library, _) = memory_library();
        assert!(library.load_draft("u1").await.is_none());

        let draft = StoryDraft::new(titled("Draft"), WizardStep::Genre);
        library.save_draft("u1", &draft).await;
        library.save_story("u1", &mut titled("Other")).await;
        assert_eq!(library.load_draft("u1").await, Some(draft));

        library.clear_draft("u1").await;
        assert!(library.load_draft("u1").await.is_none());
        assert_eq!(library.list_stories("u1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_detached_storage_degrades_to_noops() -> Result<()> {
        let library = Library::new(Arc::new(DetachedStorage));
        let mut story = titled("Nowhere");
        library.save_story("u1", &mut story).await;
        library.save_draft("u1", &StoryDraft::new(story.clone(), WizardStep::Title)).await;
        assert!(library.list_stories("u1").await.is_empty());
        assert!(library.load_draft("u1").await.is_none());
        library.clear_draft("u1").await;
        let id = story.id.clone().unwrap_or_default();
        library.remove_story("u1", &id).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_stored_story_roundtrips_through_disk() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let library = Library::new(Arc::new(NativeStorage::new(temp_dir.path())));

        let mut story = titled("Disk");
        story.status = StoryStatus::Published;
        story.published_at = Some(Utc::now());
        story.author = "Mia".to_string();
        story.add_chapter(Chapter::new("One", "First page"));
        library.save_story("u1", &mut story).await;

        let stories = library.list_stories("u1").await;
        assert_eq!(stories, vec![story.clone()]);
        assert_eq!(stories[0].created_at, story.created_at);
        assert_eq!(stories[0].published_at, story.published_at);
        Ok(())
    }

    #[tokio::test]
    async fn test_share_story() {
        let (library, _) = memory_library();
        let mut story = titled("Shared");
        library.save_story("u1", &mut story).await;
        let id = story.id.clone().unwrap_or_default();

        let bad = library
            .share_story("u1", &id, &["mom@example.com".to_string(), "dad".to_string()], &[])
            .await;
        assert!(matches!(
            bad,
            Err(StoryError::Validation(ValidationError::InvalidEmail(_)))
        ));
        assert!(!library.list_stories("u1").await[0].is_shared);
        assert!(library.list_shared("u1").await.is_empty());

        let none = library.share_story("u1", &id, &[], &[]).await;
        assert!(matches!(none, Err(StoryError::Validation(ValidationError::NoRecipients))));

        let missing = library
            .share_story("u1", "missing", &["mom@example.com".to_string()], &[])
            .await;
        assert!(matches!(missing, Err(StoryError::NotFound(_))));

        let shared = library
            .share_story("u1", &id, &["mom@example.com".to_string()], &["Mom".to_string()])
            .await
            .unwrap();
        assert!(shared.is_shared);
        let stored = &library.list_stories("u1").await[0];
        assert!(stored.is_shared);
        assert_eq!(
            stored.shared_with.as_ref().map(|s| s.parent_names.clone()),
            Some(vec!["Mom".to_string()])
        );

        library
            .share_story("u1", &id, &["gran@example.com".to_string()], &[])
            .await
            .unwrap();
        let records = library.list_shared("u1").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].parent_emails, vec!["gran@example.com".to_string()]);
    }
}
