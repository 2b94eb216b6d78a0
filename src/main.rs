#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use anyhow::{Context, Result};
    use inquire::{Confirm, CustomType, Select, Text};
    use std::path::Path;
    use std::sync::Arc;

    use storybook::core::config::Config;
    use storybook::core::io::NativeStorage;
    use storybook::core::state::WizardStep;
    use storybook::core::story::{AgeRange, Chapter, Character, CharacterRole, Story, GENRES};
    use storybook::services::builder::{StoryBuilder, StoryPatch};
    use storybook::services::library::Library;
    use storybook::services::pagination::{paginate_story, spreads, Page};
    use storybook::services::print::render_html;
    use storybook::services::reader::Reader;

    const MENU: &[&str] = &[
        "Create a story",
        "Continue draft",
        "Edit a story",
        "Read a story",
        "Print a story",
        "Share with parents",
        "Delete a story",
        "Quit",
    ];

    pub async fn run() -> Result<()> {
        let config = Config::load()?;
        config.ensure_directories()?;

        let storage = Arc::new(NativeStorage::new(&config.data_folder));
        let library = Library::new(storage);
        let user = config.user_id.clone();

        loop {
            let choice = Select::new("What would you like to do?", MENU.to_vec()).prompt()?;
            match choice {
                "Create a story" => {
                    let builder = StoryBuilder::new(library.clone(), config.clone(), &user);
                    run_builder(builder).await?;
                }
                "Continue draft" => {
                    match StoryBuilder::resume(library.clone(), config.clone(), &user).await {
                        Some(builder) => run_builder(builder).await?,
                        None => println!("No draft to continue."),
                    }
                }
                "Edit a story" => {
                    let stories = library.list_stories(&user).await;
                    if let Some(story) = pick_story(&stories)? {
                        match StoryBuilder::edit(library.clone(), config.clone(), &user, story) {
                            Ok(builder) => run_builder(builder).await?,
                            Err(e) => println!("{}", e),
                        }
                    }
                }
                "Read a story" => {
                    let shelf = library.shelf(&user).await;
                    if let Some(story) = pick_story(&shelf)? {
                        read_story(&library, &config, &user, story).await?;
                    }
                }
                "Print a story" => {
                    let shelf = library.shelf(&user).await;
                    if let Some(story) = pick_story(&shelf)? {
                        print_story(&config, &story)?;
                    }
                }
                "Share with parents" => {
                    let stories = library.list_stories(&user).await;
                    if let Some(story) = pick_story(&stories)? {
                        let emails = Text::new("Parent emails (comma separated):").prompt()?;
                        let names = Text::new("Parent names (comma separated):").prompt()?;
                        let id = story.id.clone().unwrap_or_default();
                        match library
                            .share_story(&user, &id, &split_list(&emails), &split_list(&names))
                            .await
                        {
                            Ok(_) => println!("Shared \"{}\".", story.title),
                            Err(e) => println!("{}", e),
                        }
                    }
                }
                "Delete a story" => {
                    let shelf = library.shelf(&user).await;
                    if let Some(story) = pick_story(&shelf)? {
                        let id = story.id.clone().unwrap_or_default();
                        let sure = Confirm::new(&format!("Delete \"{}\"?", story.title))
                            .with_default(false)
                            .prompt()?;
                        if sure {
                            match library.remove_story(&user, &id).await {
                                Ok(()) => println!("Deleted."),
                                Err(e) => println!("{}", e),
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn split_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn pick_story(stories: &[Story]) -> Result<Option<Story>> {
        if stories.is_empty() {
            println!("No stories yet.");
            return Ok(None);
        }
        let labels: Vec<String> = stories
            .iter()
            .map(|s| {
                let tag = if s.is_example { "example" } else { status_label(s) };
                format!("{} [{}]", s.title, tag)
            })
            .collect();
        let picked = Select::new("Choose a story:", labels).raw_prompt()?;
        Ok(stories.get(picked.index).cloned())
    }

    fn status_label(story: &Story) -> &'static str {
        if story.is_published() {
            "published"
        } else {
            "draft"
        }
    }

    async fn run_builder(mut builder: StoryBuilder) -> Result<()> {
        loop {
            println!("\n== {} ==", builder.step().label());
            let outcome = match builder.step() {
                WizardStep::Title => title_step(&mut builder).await,
                WizardStep::Genre => genre_step(&mut builder).await,
                WizardStep::Character => character_step(&mut builder).await,
                WizardStep::Story => chapter_step(&mut builder).await,
                WizardStep::Preview => {
                    preview(builder.story());
                    let choice = Select::new(
                        "Ready?",
                        vec!["Publish", "Save as draft", "Back", "Leave"],
                    )
                    .prompt()?;
                    match choice {
                        "Publish" => match builder.publish().await {
                            Ok(story) => {
                                println!("Published \"{}\" ({} pages).", story.title, story.page_count());
                                break;
                            }
                            Err(e) => println!("{}", e),
                        },
                        "Save as draft" => match builder.save_as_draft().await {
                            Ok(_) => println!("Saved."),
                            Err(e) => println!("{}", e),
                        },
                        "Back" => {
                            builder.previous().await;
                        }
                        _ => break,
                    }
                    continue;
                }
            };
            if let Err(e) = outcome {
                println!("{:#}", e);
                continue;
            }
            let nav = Select::new("Continue?", vec!["Next", "Back", "Leave"]).prompt()?;
            match nav {
                "Next" => {
                    builder.next().await;
                }
                "Back" => {
                    builder.previous().await;
                }
                _ => break,
            }
        }
        builder.close().await;
        Ok(())
    }

    async fn title_step(builder: &mut StoryBuilder) -> Result<()> {
        let story = builder.story();
        let title = Text::new("Story title:").with_default(&story.title).prompt()?;
        let description = Text::new("What is it about?")
            .with_default(&story.description)
            .prompt()?;
        builder
            .apply_step_update(StoryPatch {
                title: Some(title),
                description: Some(description),
                ..Default::default()
            })
            .await
            .context("Title not accepted")?;
        Ok(())
    }

    async fn genre_step(builder: &mut StoryBuilder) -> Result<()> {
        let genre = Select::new("Genre:", GENRES.to_vec()).prompt()?;
        let current = builder.story().age_range;
        let min = CustomType::<u8>::new("Youngest reader age:")
            .with_default(current.min)
            .prompt()?;
        let max = CustomType::<u8>::new("Oldest reader age:")
            .with_default(current.max.max(min))
            .prompt()?;
        builder
            .apply_step_update(StoryPatch {
                genre: Some(genre.to_string()),
                age_range: Some(AgeRange { min, max: max.max(min) }),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    async fn character_step(builder: &mut StoryBuilder) -> Result<()> {
        for character in &builder.story().characters {
            println!("- {} ({:?})", character.name, character.role);
        }
        while Confirm::new("Add a character?").with_default(false).prompt()? {
            let name = Text::new("Name:").prompt()?;
            let role = match Select::new(
                "Role:",
                vec!["protagonist", "antagonist", "supporting", "narrator"],
            )
            .prompt()?
            {
                "protagonist" => CharacterRole::Protagonist,
                "antagonist" => CharacterRole::Antagonist,
                "narrator" => CharacterRole::Narrator,
                _ => CharacterRole::Supporting,
            };
            let description = Text::new("Describe them:").prompt()?;
            let mut character = Character::new(name, role);
            character.description = description;
            if let Err(e) = builder.add_character(character).await {
                println!("{}", e);
            }
        }
        Ok(())
    }

    async fn chapter_step(builder: &mut StoryBuilder) -> Result<()> {
        for chapter in &builder.story().chapters {
            println!("{}. {}", chapter.chapter_number, chapter.title);
        }
        while Confirm::new("Add a chapter?").with_default(false).prompt()? {
            let title = Text::new("Chapter title:").prompt()?;
            let content = Text::new("Chapter text:").prompt()?;
            if let Err(e) = builder.add_chapter(Chapter::new(title, content)).await {
                println!("{}", e);
            }
        }
        Ok(())
    }

    fn preview(story: &Story) {
        println!("Title:   {}", story.title);
        println!("Genre:   {}", story.genre.as_deref().unwrap_or("-"));
        println!("Ages:    {}-{}", story.age_range.min, story.age_range.max);
        println!("Cast:    {}", story.characters.len());
        println!("Pages:   {}", story.page_count());
    }

    fn show_page(page: &Page) {
        match page {
            Page::Contents(toc) => {
                println!("\n-- Contents --");
                for entry in &toc.entries {
                    println!("{}. {} .... {}", entry.chapter_number, entry.title, entry.page_number);
                }
            }
            Page::Chapter(chapter) => {
                println!("\n-- Chapter {}: {} --", chapter.chapter_number, chapter.title);
                println!("{}", chapter.content);
                println!("[page {}]", chapter.page_number);
            }
        }
    }

    async fn read_story(library: &Library, config: &Config, user: &str, story: Story) -> Result<()> {
        let mut reader = Reader::new(story);
        if !reader.has_content() {
            println!("This story has no pages yet.");
            return Ok(());
        }
        loop {
            show_page(reader.current_page());
            let choice = Select::new(
                "Page:",
                vec!["Next", "Previous", "Go to page", "Edit page", "Close"],
            )
            .prompt()?;
            match choice {
                "Next" => {
                    reader.next()?;
                }
                "Previous" => {
                    reader.previous()?;
                }
                "Go to page" => {
                    let target = CustomType::<usize>::new("Page number:").prompt()?;
                    reader.go_to(target)?;
                }
                "Edit page" => {
                    let current = match reader.begin_edit() {
                        Ok(edit) => edit.content.clone(),
                        Err(e) => {
                            println!("{}", e);
                            continue;
                        }
                    };
                    let content = Text::new("New text:").with_default(&current).prompt()?;
                    if Confirm::new("Save changes?").with_default(true).prompt()? {
                        reader.set_edit_content(content)?;
                        if let Err(e) = reader.save_edit(library, user, &config.limits).await {
                            println!("{}", e);
                            reader.cancel_edit();
                        }
                    } else {
                        reader.cancel_edit();
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn print_story(config: &Config, story: &Story) -> Result<()> {
        let html = render_html(story, &spreads(&paginate_story(story)));
        let name = story.id.clone().unwrap_or_else(|| "story".to_string());
        let path = Path::new(&config.output_folder).join(format!("{}.html", name));
        std::fs::write(&path, html).with_context(|| format!("Failed to write {:?}", path))?;
        println!("Print layout written to {:?}", path);
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    cli::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
