use chrono::{TimeZone, Utc};

use crate::core::story::{
    AgeRange, Chapter, ChapterSettings, Character, CharacterRole, Layout, Personality, Story,
    StoryStatus,
};

pub const EXAMPLE_AUTHOR: &str = "Storybook Team";

/// Built-in stories shipped with the app. They are never stored in a user's
/// collection and can be neither edited nor deleted.
pub fn example_stories() -> Vec<Story> {
    vec![moon_garden()]
}

pub fn is_example_id(id: &str) -> bool {
    example_stories().iter().any(|s| s.id.as_deref() == Some(id))
}

fn moon_garden() -> Story {
    let published = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);

    let mut story = Story::new();
    story.id = Some("example-moon-garden".to_string());
    story.title = "The Moon Garden".to_string();
    story.description = "Pip the rabbit finds a garden that only blooms at night.".to_string();
    story.genre = Some("fantasy".to_string());
    story.age_range = AgeRange { min: 3, max: 7 };
    story.author = EXAMPLE_AUTHOR.to_string();
    story.status = StoryStatus::Published;
    story.created_at = published;
    story.updated_at = published;
    story.published_at = Some(published);
    story.is_example = true;

    let pip = story.add_character(Character {
        id: "example-pip".to_string(),
        name: "Pip".to_string(),
        description: "A small rabbit who is scared of the dark.".to_string(),
        personality: Personality {
            traits: vec!["curious".to_string(), "shy".to_string()],
            likes: vec!["carrots".to_string()],
            dislikes: vec!["thunder".to_string()],
        },
        appearance: "Grey fur and one floppy ear".to_string(),
        role: CharacterRole::Protagonist,
        species: Some("rabbit".to_string()),
        ..Default::default()
    });
    let owl = story.add_character(Character {
        id: "example-owl".to_string(),
        name: "Old Owl".to_string(),
        description: "Keeps watch over the garden.".to_string(),
        role: CharacterRole::Supporting,
        species: Some("owl".to_string()),
        ..Default::default()
    });

    story.add_chapter(Chapter {
        id: "example-moon-garden-1".to_string(),
        title: "A Light in the Hedge".to_string(),
        content: "Pip could not sleep. Past the hedge, something glowed silver.".to_string(),
        characters: vec![pip.clone()],
        settings: ChapterSettings {
            location: Some("the burrow".to_string()),
            time_of_day: Some("night".to_string()),
            weather: Some("clear".to_string()),
        },
        ..Default::default()
    });
    story.add_chapter(Chapter {
        id: "example-moon-garden-2".to_string(),
        title: "The Night Flowers".to_string(),
        content: "Old Owl showed Pip the flowers that open for the moon.".to_string(),
        layout: Layout::TextImage,
        characters: vec![pip.clone(), owl],
        settings: ChapterSettings {
            location: Some("the moon garden".to_string()),
            time_of_day: Some("midnight".to_string()),
            weather: None,
        },
        ..Default::default()
    });
    story.add_chapter(Chapter {
        id: "example-moon-garden-3".to_string(),
        title: "Home Before Sunrise".to_string(),
        content: "Pip hopped home, not scared of the dark anymore.".to_string(),
        characters: vec![pip],
        ..Default::default()
    });
    story.reading_time = Some(6);
    story
}
