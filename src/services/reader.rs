use chrono::Utc;

use crate::core::config::LimitsConfig;
use crate::core::story::Story;
use crate::services::library::Library;
use crate::services::pagination::{paginate_story, Page, CONTENTS_PAGE};
use crate::services::validation::{check_chapter, StoryError};

/// Pending changes to the page on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEdit {
    pub chapter_id: String,
    pub title: String,
    pub content: String,
}

/// Page-by-page reading over a story's page list.
///
/// Pages are numbered from 1. Navigation clamps at both ends and is locked
/// while a page edit is open.
pub struct Reader {
    story: Story,
    pages: Vec<Page>,
    current: usize,
    edit: Option<PageEdit>,
}

impl Reader {
    pub fn new(story: Story) -> Self {
        let pages = paginate_story(&story);
        Self {
            story,
            pages,
            current: CONTENTS_PAGE,
            edit: None,
        }
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// False for a story without chapters; the reader shows an empty state.
    pub fn has_content(&self) -> bool {
        !self.story.chapters.is_empty()
    }

    pub fn current_page_number(&self) -> usize {
        self.current
    }

    pub fn current_page(&self) -> &Page {
        &self.pages[self.current - 1]
    }

    pub fn is_editing(&self) -> bool {
        self.edit.is_some()
    }

    pub fn edit(&self) -> Option<&PageEdit> {
        self.edit.as_ref()
    }

    fn ensure_unlocked(&self) -> Result<(), StoryError> {
        if self.edit.is_some() {
            return Err(StoryError::EditInProgress);
        }
        Ok(())
    }

    pub fn next(&mut self) -> Result<usize, StoryError> {
        self.go_to(self.current.saturating_add(1))
    }

    pub fn previous(&mut self) -> Result<usize, StoryError> {
        self.go_to(self.current.saturating_sub(1))
    }

    /// Jumps to `page`, clamped into `1..=page_count()`.
    pub fn go_to(&mut self, page: usize) -> Result<usize, StoryError> {
        self.ensure_unlocked()?;
        self.current = page.clamp(CONTENTS_PAGE, self.pages.len());
        Ok(self.current)
    }

    pub fn begin_edit(&mut self) -> Result<&PageEdit, StoryError> {
        self.ensure_unlocked()?;
        if self.story.is_example {
            return Err(StoryError::ExampleImmutable);
        }
        let chapter = self
            .current_page()
            .as_chapter()
            .ok_or(StoryError::NotEditable)?;
        let edit = PageEdit {
            chapter_id: chapter.id.clone(),
            title: chapter.title.clone(),
            content: chapter.content.clone(),
        };
        let edit = self.edit.insert(edit);
        Ok(&*edit)
    }

    pub fn set_edit_title(&mut self, title: impl Into<String>) -> Result<(), StoryError> {
        let edit = self.edit.as_mut().ok_or(StoryError::NoEdit)?;
        edit.title = title.into();
        Ok(())
    }

    pub fn set_edit_content(&mut self, content: impl Into<String>) -> Result<(), StoryError> {
        let edit = self.edit.as_mut().ok_or(StoryError::NoEdit)?;
        edit.content = content.into();
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.edit = None;
    }

    /// Writes the edited page back into the story and stores the whole story.
    /// An invalid edit stays open and nothing is written.
    pub async fn save_edit(
        &mut self,
        library: &Library,
        user_id: &str,
        limits: &LimitsConfig,
    ) -> Result<&Story, StoryError> {
        let edit = self.edit.as_ref().ok_or(StoryError::NoEdit)?;
        let mut chapter = self
            .story
            .chapter(&edit.chapter_id)
            .cloned()
            .ok_or_else(|| StoryError::NotFound(edit.chapter_id.clone()))?;
        chapter.title = edit.title.clone();
        chapter.content = edit.content.clone();
        check_chapter(&chapter, limits)?;

        if let Some(slot) = self.story.chapter_mut(&chapter.id) {
            *slot = chapter;
        }
        self.story.updated_at = Utc::now();
        library.save_story(user_id, &mut self.story).await;

        self.edit = None;
        self.pages = paginate_story(&self.story);
        self.current = self.current.min(self.pages.len());
        Ok(&self.story)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::MemoryStorage;
    use crate::core::story::Chapter;
    use crate::services::seed;
    use crate::services::validation::ValidationError;
    use std::sync::Arc;

    fn story_with(n: usize) -> Story {
        let mut story = Story::new();
        story.title = "Reader".to_string();
        for i in 0..n {
            story.add_chapter(Chapter::new(format!("C{}", i + 1), format!("text {}", i + 1)));
        }
        story
    }

    #[test]
    fn test_navigation_clamps() {
        let mut reader = Reader::new(story_with(2));
        assert_eq!(reader.page_count(), 3);
        assert_eq!(reader.current_page_number(), 1);
        assert_eq!(reader.previous().unwrap(), 1);
        assert_eq!(reader.next().unwrap(), 2);
        assert_eq!(reader.next().unwrap(), 3);
        assert_eq!(reader.next().unwrap(), 3);
        assert_eq!(reader.go_to(0).unwrap(), 1);
        assert_eq!(reader.go_to(99).unwrap(), 3);
        assert_eq!(reader.current_page().title(), "C2");
    }

    #[test]
    fn test_empty_story_reads_as_no_content() {
        let mut reader = Reader::new(story_with(0));
        assert!(!reader.has_content());
        assert_eq!(reader.page_count(), 1);
        assert_eq!(reader.next().unwrap(), 1);
        assert!(matches!(reader.begin_edit(), Err(StoryError::NotEditable)));
    }

    #[test]
    fn test_edit_freezes_navigation_until_cancelled() {
        let mut reader = Reader::new(story_with(2));
        reader.go_to(2).unwrap();
        reader.begin_edit().unwrap();
        assert!(matches!(reader.next(), Err(StoryError::EditInProgress)));
        assert!(matches!(reader.go_to(1), Err(StoryError::EditInProgress)));
        assert!(matches!(reader.begin_edit(), Err(StoryError::EditInProgress)));
        reader.set_edit_content("changed").unwrap();
        reader.cancel_edit();
        assert_eq!(reader.next().unwrap(), 3);
        assert_eq!(reader.story().chapters[0].content, "text 1");
        assert!(matches!(reader.set_edit_content("x"), Err(StoryError::NoEdit)));
    }

    #[test]
    fn test_examples_are_read_only() {
        let mut reader = Reader::new(seed::example_stories().remove(0));
        reader.go_to(2).unwrap();
        assert!(matches!(reader.begin_edit(), Err(StoryError::ExampleImmutable)));
    }

    #[tokio::test]
    async fn test_save_edit_replaces_page_and_persists_story() {
        let library = Library::new(Arc::new(MemoryStorage::new()));
        let mut story = story_with(3);
        library.save_story("u1", &mut story).await;

        let mut reader = Reader::new(story);
        reader.go_to(3).unwrap();
        reader.begin_edit().unwrap();
        reader.set_edit_title("Second, better").unwrap();
        reader.set_edit_content("new words").unwrap();
        let limits = LimitsConfig::default();
        reader.save_edit(&library, "u1", &limits).await.unwrap();

        assert!(!reader.is_editing());
        assert_eq!(reader.current_page_number(), 3);
        assert_eq!(reader.current_page().title(), "Second, better");

        let stored = &library.list_stories("u1").await[0];
        assert_eq!(stored.chapters.len(), 3);
        assert_eq!(stored.chapters[1].content, "new words");
        assert_eq!(stored.chapters[1].chapter_number, 2);
        assert_eq!(stored.chapters[0].content, "text 1");
    }

    #[tokio::test]
    async fn test_invalid_edit_stays_open() {
        let library = Library::new(Arc::new(MemoryStorage::new()));
        let mut reader = Reader::new(story_with(1));
        reader.go_to(2).unwrap();
        reader.begin_edit().unwrap();
        reader.set_edit_content("x".repeat(20)).unwrap();
        let limits = LimitsConfig {
            max_chapter_chars: 10,
            ..LimitsConfig::default()
        };
        let err = reader.save_edit(&library, "u1", &limits).await.unwrap_err();
        assert!(matches!(err, StoryError::Validation(ValidationError::TooLong { .. })));
        assert!(reader.is_editing());
        assert!(library.list_stories("u1").await.is_empty());
    }
}
