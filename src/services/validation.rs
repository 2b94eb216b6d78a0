use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::core::config::LimitsConfig;
use crate::core::story::{Chapter, Character, Story};

/// Input problems shown next to the offending field. The operation that hit
/// one is refused and nothing is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("A story needs a title before it can be saved")]
    MissingTitle,
    #[error("{field} is too long ({actual} of {max} characters)")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
    #[error("Image is too large ({actual} bytes, limit {max})")]
    ImageTooLarge { max: usize, actual: usize },
    #[error("Images of type {0} are not supported")]
    ImageType(String),
    #[error("Image is not a valid base64 data URL")]
    MalformedImage,
    #[error("{0} is not a valid email address")]
    InvalidEmail(String),
    #[error("At least one parent email is required to share")]
    NoRecipients,
}

#[derive(Debug, Error)]
pub enum StoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Example stories cannot be changed or deleted")]
    ExampleImmutable,
    #[error("Story not found: {0}")]
    NotFound(String),
    #[error("Finish or cancel the page edit first")]
    EditInProgress,
    #[error("No page is being edited")]
    NoEdit,
    #[error("The contents page cannot be edited")]
    NotEditable,
}

pub fn check_length(field: &'static str, text: &str, max: usize) -> Result<(), ValidationError> {
    let actual = text.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong { field, max, actual });
    }
    Ok(())
}

/// Checks a `data:image/<type>;base64,<payload>` URL and returns the decoded size.
pub fn check_image(data_url: &str, limits: &LimitsConfig) -> Result<usize, ValidationError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or(ValidationError::MalformedImage)?;
    let (meta, payload) = rest.split_once(',').ok_or(ValidationError::MalformedImage)?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or(ValidationError::MalformedImage)?;

    let subtype = mime
        .strip_prefix("image/")
        .ok_or_else(|| ValidationError::ImageType(mime.to_string()))?;
    let subtype = if subtype == "jpg" { "jpeg" } else { subtype };
    if !limits.image_types.iter().any(|t| t.eq_ignore_ascii_case(subtype)) {
        return Err(ValidationError::ImageType(mime.to_string()));
    }

    // Reject before decoding anything absurdly large.
    let estimated = payload.len() / 4 * 3;
    if estimated > limits.max_image_bytes + 3 {
        return Err(ValidationError::ImageTooLarge {
            max: limits.max_image_bytes,
            actual: estimated,
        });
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| ValidationError::MalformedImage)?;
    if bytes.len() > limits.max_image_bytes {
        return Err(ValidationError::ImageTooLarge {
            max: limits.max_image_bytes,
            actual: bytes.len(),
        });
    }
    Ok(bytes.len())
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

pub fn check_email(email: &str) -> Result<(), ValidationError> {
    if email_pattern().is_match(email.trim()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

pub fn check_character(character: &Character, limits: &LimitsConfig) -> Result<(), ValidationError> {
    check_length("Character name", &character.name, limits.max_title_chars)?;
    check_length("Character description", &character.description, limits.max_description_chars)?;
    Ok(())
}

pub fn check_chapter(chapter: &Chapter, limits: &LimitsConfig) -> Result<(), ValidationError> {
    check_length("Chapter title", &chapter.title, limits.max_title_chars)?;
    check_length("Chapter text", &chapter.content, limits.max_chapter_chars)?;
    if let Some(image) = &chapter.image {
        check_image(image, limits)?;
    }
    Ok(())
}

/// Every field-level rule. Title presence is not checked here; only
/// saving into the library requires it.
pub fn check_story(story: &Story, limits: &LimitsConfig) -> Result<(), ValidationError> {
    check_length("Title", &story.title, limits.max_title_chars)?;
    check_length("Description", &story.description, limits.max_description_chars)?;
    for image in [&story.cover_image, &story.cover_image_back].into_iter().flatten() {
        check_image(image, limits)?;
    }
    for character in &story.characters {
        check_character(character, limits)?;
    }
    for chapter in &story.chapters {
        check_chapter(chapter, limits)?;
    }
    Ok(())
}
