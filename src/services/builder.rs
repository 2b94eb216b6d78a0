use chrono::Utc;
use std::collections::HashSet;

use crate::core::config::Config;
use crate::core::state::{StoryDraft, WizardStep};
use crate::core::story::{new_id, AgeRange, AuthorField, Chapter, Character, Story, StoryStatus};
use crate::services::library::Library;
use crate::services::seed;
use crate::services::validation::{check_story, StoryError, ValidationError};

/// A partial update from one wizard step. `Some` fields overwrite the
/// story's, `None` fields leave it alone.
#[derive(Debug, Clone, Default)]
pub struct StoryPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub age_range: Option<AgeRange>,
    pub cover_image: Option<String>,
    pub cover_image_back: Option<String>,
    pub characters: Option<Vec<Character>>,
    pub chapters: Option<Vec<Chapter>>,
    pub author: Option<AuthorField>,
}

impl StoryPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn genre(genre: impl Into<String>) -> Self {
        Self {
            genre: Some(genre.into()),
            ..Default::default()
        }
    }

    pub fn chapters(chapters: Vec<Chapter>) -> Self {
        Self {
            chapters: Some(chapters),
            ..Default::default()
        }
    }

    pub fn characters(characters: Vec<Character>) -> Self {
        Self {
            characters: Some(characters),
            ..Default::default()
        }
    }

    fn apply_to(self, story: &mut Story) {
        if let Some(title) = self.title {
            story.title = title;
        }
        if let Some(description) = self.description {
            story.description = description;
        }
        if let Some(genre) = self.genre {
            story.genre = Some(genre);
        }
        if let Some(age_range) = self.age_range {
            story.age_range = age_range;
        }
        if let Some(image) = self.cover_image {
            story.cover_image = Some(image);
        }
        if let Some(image) = self.cover_image_back {
            story.cover_image_back = Some(image);
        }
        if let Some(mut characters) = self.characters {
            assign_ids(characters.iter_mut().map(|c| &mut c.id));
            story.characters = characters;
        }
        if let Some(mut chapters) = self.chapters {
            assign_ids(chapters.iter_mut().map(|c| &mut c.id));
            story.chapters = chapters;
            story.renumber_chapters();
        }
        if let Some(author) = self.author {
            story.author = author.normalize(&story.author);
        }
    }
}

/// Empty or repeated ids get a fresh one, so every entry can be addressed.
fn assign_ids<'a>(ids: impl Iterator<Item = &'a mut String>) {
    let mut seen = HashSet::new();
    for id in ids {
        if id.is_empty() || !seen.insert(id.clone()) {
            *id = new_id();
            seen.insert(id.clone());
        }
    }
}

/// Owns the story being built and is the only way to change it.
///
/// Every accepted change overwrites the user's draft envelope and, once the
/// story has a title, upserts it into the library so it shows up there
/// before it is published.
pub struct StoryBuilder {
    library: Library,
    config: Config,
    user_id: String,
    story: Story,
    step: WizardStep,
    published: bool,
}

impl StoryBuilder {
    pub fn new(library: Library, config: Config, user_id: impl Into<String>) -> Self {
        Self {
            library,
            config,
            user_id: user_id.into(),
            story: Story::new(),
            step: WizardStep::Title,
            published: false,
        }
    }

    /// Picks up the user's autosaved draft where it was left.
    pub async fn resume(library: Library, config: Config, user_id: impl Into<String>) -> Option<Self> {
        let user_id = user_id.into();
        let draft = library.load_draft(&user_id).await?;
        log::info!("Resuming draft at step {:?}", draft.last_step);
        Some(Self {
            library,
            config,
            user_id,
            story: draft.data,
            step: draft.last_step,
            published: false,
        })
    }

    /// Edits an existing story. Always starts over at the first step.
    pub fn edit(
        library: Library,
        config: Config,
        user_id: impl Into<String>,
        story: Story,
    ) -> Result<Self, StoryError> {
        if story.is_example || story.id.as_deref().is_some_and(seed::is_example_id) {
            return Err(StoryError::ExampleImmutable);
        }
        Ok(Self {
            library,
            config,
            user_id: user_id.into(),
            story,
            step: WizardStep::Title,
            published: false,
        })
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn next(&mut self) -> bool {
        match self.step.next() {
            Some(step) => {
                self.step = step;
                self.persist_envelope().await;
                true
            }
            None => false,
        }
    }

    pub async fn previous(&mut self) -> bool {
        match self.step.previous() {
            Some(step) => {
                self.step = step;
                self.persist_envelope().await;
                true
            }
            None => false,
        }
    }

    /// Merges a step's update. A rejected update leaves the story as it was.
    pub async fn apply_step_update(&mut self, patch: StoryPatch) -> Result<(), StoryError> {
        self.mutate(|story| patch.apply_to(story)).await
    }

    pub async fn add_chapter(&mut self, chapter: Chapter) -> Result<(), StoryError> {
        self.mutate(|story| story.add_chapter(chapter)).await
    }

    pub async fn insert_chapter(&mut self, index: usize, chapter: Chapter) -> Result<(), StoryError> {
        self.mutate(|story| story.insert_chapter(index, chapter)).await
    }

    pub async fn update_chapter(&mut self, chapter: Chapter) -> Result<bool, StoryError> {
        self.mutate(|story| match story.chapter_mut(&chapter.id) {
            Some(slot) => {
                let number = slot.chapter_number;
                *slot = chapter;
                slot.chapter_number = number;
                true
            }
            None => false,
        })
        .await
    }

    pub async fn remove_chapter(&mut self, chapter_id: &str) -> Result<Option<Chapter>, StoryError> {
        self.mutate(|story| story.remove_chapter(chapter_id)).await
    }

    pub async fn move_chapter(&mut self, from: usize, to: usize) -> Result<bool, StoryError> {
        self.mutate(|story| story.move_chapter(from, to)).await
    }

    pub async fn add_character(&mut self, character: Character) -> Result<String, StoryError> {
        self.mutate(|story| story.add_character(character)).await
    }

    pub async fn update_character(&mut self, character: Character) -> Result<bool, StoryError> {
        self.mutate(|story| story.update_character(character)).await
    }

    pub async fn remove_character(&mut self, character_id: &str) -> Result<Option<Character>, StoryError> {
        self.mutate(|story| story.remove_character(character_id)).await
    }

    async fn mutate<R>(&mut self, change: impl FnOnce(&mut Story) -> R) -> Result<R, StoryError> {
        let mut candidate = self.story.clone();
        let out = change(&mut candidate);
        check_story(&candidate, &self.config.limits)?;
        self.story = candidate;
        self.autosave().await;
        Ok(out)
    }

    async fn persist_envelope(&self) {
        let draft = StoryDraft::new(self.story.clone(), self.step);
        self.library.save_draft(&self.user_id, &draft).await;
    }

    async fn autosave(&mut self) {
        self.story.updated_at = Utc::now();
        self.persist_envelope().await;

        if !self.story.has_title() {
            return;
        }
        self.story.ensure_id();
        let mut record = self.story.clone();
        if !record.is_published() {
            record.status = StoryStatus::Draft;
        }
        self.library.save_story(&self.user_id, &mut record).await;
        log::debug!("Autosaved {:?} at step {:?}", record.id, self.step);
    }

    fn finalize_common(&mut self) -> Result<(), StoryError> {
        if !self.story.has_title() {
            return Err(ValidationError::MissingTitle.into());
        }
        check_story(&self.story, &self.config.limits)?;
        if self.story.author.trim().is_empty() {
            self.story.author = self.config.author_name.clone();
        }
        self.story.ensure_id();
        self.story.updated_at = Utc::now();
        Ok(())
    }

    /// Stores the story without publishing it. The draft envelope stays.
    pub async fn save_as_draft(&mut self) -> Result<Story, StoryError> {
        self.finalize_common()?;
        let mut record = self.story.clone();
        self.library.save_story(&self.user_id, &mut record).await;
        self.persist_envelope().await;
        Ok(record)
    }

    /// Publishes the story and clears the draft envelope. Without a title
    /// nothing is written.
    pub async fn publish(&mut self) -> Result<Story, StoryError> {
        self.finalize_common()?;

        let now = Utc::now();
        self.story.status = StoryStatus::Published;
        self.story.published_at.get_or_insert(now);
        let chapters = u32::try_from(self.story.page_count()).unwrap_or(u32::MAX);
        let minutes = self.config.reading.minutes_per_chapter;
        self.story.reading_time = Some(chapters.saturating_mul(minutes));

        let mut record = self.story.clone();
        self.library.save_story(&self.user_id, &mut record).await;
        self.library.clear_draft(&self.user_id).await;
        self.published = true;
        log::info!("Published {:?} ({} pages)", record.id, record.page_count());
        Ok(record)
    }

    /// Leaves the builder. Unpublished work is kept in the draft envelope.
    pub async fn close(self) {
        if !self.published {
            self.persist_envelope().await;
        }
    }
}
