use leptos::*;
use std::future::Future;
use std::sync::Arc;

use crate::core::config::Config;
use crate::core::io::{DetachedStorage, Storage, WebStorage};
use crate::core::state::WizardStep;
use crate::core::story::{Chapter, Character, CharacterRole, Story, GENRES};
use crate::services::builder::{StoryBuilder, StoryPatch};
use crate::services::library::Library;
use crate::services::pagination::Page;
use crate::services::reader::Reader;

fn open_library() -> Library {
    let storage: Arc<dyn Storage> = match WebStorage::new() {
        Some(s) => Arc::new(s),
        None => {
            log::warn!("localStorage unavailable, stories will not be kept");
            Arc::new(DetachedStorage)
        }
    };
    Library::new(storage)
}

#[component]
pub fn App() -> impl IntoView {
    let library = open_library();
    let config = Config::default();
    let user_id = config.user_id.clone();

    let (stories, set_stories) = create_signal(Vec::<Story>::new());
    let (reading, set_reading) = create_signal(None::<Story>);
    // `Some(resume)` while the builder is open.
    let (building, set_building) = create_signal(None::<bool>);
    let (message, set_message) = create_signal(None::<String>);

    let refresh = {
        let library = library.clone();
        let user_id = user_id.clone();
        move || {
            let library = library.clone();
            let user_id = user_id.clone();
            spawn_local(async move {
                set_stories.set(library.shelf(&user_id).await);
            });
        }
    };
    refresh();

    let on_read = Callback::new(move |story: Story| set_reading.set(Some(story)));
    let on_delete = {
        let library = library.clone();
        let user_id = user_id.clone();
        let refresh = refresh.clone();
        Callback::new(move |story: Story| {
            let library = library.clone();
            let user_id = user_id.clone();
            let refresh = refresh.clone();
            spawn_local(async move {
                let id = story.id.clone().unwrap_or_default();
                match library.remove_story(&user_id, &id).await {
                    Ok(()) => set_message.set(None),
                    Err(e) => set_message.set(Some(e.to_string())),
                }
                refresh();
            });
        })
    };
    let on_close = {
        let refresh = refresh.clone();
        Callback::new(move |_: ()| {
            set_reading.set(None);
            refresh();
        })
    };
    let on_built = Callback::new(move |_: ()| {
        set_building.set(None);
        refresh();
    });

    view! {
        <div class="app-container">
            <h1>"Storybook"</h1>
            {move || message.get().map(|m| view! { <p class="error">{m}</p> })}
            {move || match (building.get(), reading.get()) {
                (Some(resume), _) => view! {
                    <BuilderView
                        library=library.clone()
                        config=config.clone()
                        user_id=user_id.clone()
                        resume=resume
                        on_done=on_built
                    />
                }.into_view(),
                (None, Some(story)) => view! {
                    <ReaderView
                        story=story
                        library=library.clone()
                        user_id=user_id.clone()
                        limits=config.limits.clone()
                        on_close=on_close
                    />
                }.into_view(),
                (None, None) => view! {
                    <nav>
                        <button on:click=move |_| set_building.set(Some(false))>"New story"</button>
                        <button on:click=move |_| set_building.set(Some(true))>"Continue draft"</button>
                    </nav>
                    <Shelf stories=stories on_read=on_read on_delete=on_delete/>
                }.into_view(),
            }}
        </div>
    }
}

#[component]
pub fn Shelf(
    stories: ReadSignal<Vec<Story>>,
    on_read: Callback<Story>,
    on_delete: Callback<Story>,
) -> impl IntoView {
    view! {
        <ul class="shelf">
            <For
                each=move || stories.get()
                key=|s| s.id.clone().unwrap_or_default()
                children=move |story: Story| {
                    let read = story.clone();
                    let delete = story.clone();
                    let label = if story.is_example {
                        "example"
                    } else if story.is_published() {
                        "published"
                    } else {
                        "draft"
                    };
                    view! {
                        <li>
                            <span class="title">{story.title.clone()}</span>
                            <span class="status">{label}</span>
                            <button on:click=move |_| on_read.call(read.clone())>"Read"</button>
                            <button
                                disabled=story.is_example
                                on:click=move |_| on_delete.call(delete.clone())
                            >
                                "Delete"
                            </button>
                        </li>
                    }
                }
            />
        </ul>
    }
}

fn render_page(page: &Page) -> View {
    match page {
        Page::Contents(toc) => view! {
            <section class="page contents">
                <h2>"Contents"</h2>
                <ol>
                    {toc.entries.iter().map(|e| view! {
                        <li>{e.title.clone()}" .... "{e.page_number}</li>
                    }).collect_view()}
                </ol>
            </section>
        }
        .into_view(),
        Page::Chapter(c) => view! {
            <section class="page chapter">
                <h2>{format!("Chapter {}: {}", c.chapter_number, c.title)}</h2>
                {c.image.clone().map(|src| view! { <img src=src alt=""/> })}
                <p>{c.content.clone()}</p>
                <footer>{c.page_number}</footer>
            </section>
        }
        .into_view(),
    }
}

#[component]
pub fn ReaderView(
    story: Story,
    library: Library,
    user_id: String,
    limits: crate::core::config::LimitsConfig,
    on_close: Callback<()>,
) -> impl IntoView {
    // Empty while a save is in flight.
    let reader = create_rw_signal(Some(Reader::new(story)));
    let (error, set_error) = create_signal(None::<String>);
    let (draft, set_draft) = create_signal(String::new());

    let editing = move || reader.with(|r| r.as_ref().is_some_and(|r| r.is_editing()));

    let step = move |forward: bool| {
        let result = reader.try_update(|r| {
            r.as_mut()
                .map(|r| if forward { r.next() } else { r.previous() })
        });
        if let Some(Some(Err(e))) = result {
            set_error.set(Some(e.to_string()));
        }
    };

    let begin = move |_| {
        let result = reader.try_update(|r| {
            r.as_mut()
                .map(|r| r.begin_edit().map(|edit| edit.content.clone()))
        });
        match result {
            Some(Some(Ok(content))) => {
                set_draft.set(content);
                set_error.set(None);
            }
            Some(Some(Err(e))) => set_error.set(Some(e.to_string())),
            _ => {}
        }
    };

    let cancel = move |_| reader.update(|r| {
        if let Some(r) = r.as_mut() {
            r.cancel_edit();
        }
    });

    let save = move |_| {
        let Some(mut taken) = reader.try_update(|r| r.take()).flatten() else {
            return;
        };
        let library = library.clone();
        let user_id = user_id.clone();
        let limits = limits.clone();
        let content = draft.get_untracked();
        spawn_local(async move {
            let outcome = match taken.set_edit_content(content) {
                Ok(()) => taken
                    .save_edit(&library, &user_id, &limits)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            set_error.set(outcome.err());
            reader.set(Some(taken));
        });
    };

    view! {
        <div class="reader">
            {move || reader.with(|r| match r {
                None => view! { <p>"Saving..."</p> }.into_view(),
                Some(r) if !r.has_content() => view! {
                    <p class="empty">"This story has no pages yet."</p>
                }.into_view(),
                Some(r) => render_page(r.current_page()),
            })}
            {move || error.get().map(|e| view! { <p class="error">{e}</p> })}
            {move || if editing() {
                view! {
                    <div class="edit">
                        <textarea
                            prop:value=move || draft.get()
                            on:input=move |ev| set_draft.set(event_target_value(&ev))
                        ></textarea>
                        <button on:click=save.clone()>"Save"</button>
                        <button on:click=cancel>"Cancel"</button>
                    </div>
                }.into_view()
            } else {
                view! {
                    <nav>
                        <button on:click=move |_| step(false)>"Previous"</button>
                        <span>{move || reader.with(|r| r.as_ref().map(|r| format!("{} / {}", r.current_page_number(), r.page_count())))}</span>
                        <button on:click=move |_| step(true)>"Next"</button>
                        <button on:click=begin>"Edit page"</button>
                        <button on:click=move |_| on_close.call(())>"Close"</button>
                    </nav>
                }.into_view()
            }}
        </div>
    }
}

/// Takes the builder out of its slot for an async operation and puts it
/// back afterwards. The slot is empty while the operation runs.
fn with_builder<F, Fut>(
    slot: RwSignal<Option<StoryBuilder>>,
    set_error: WriteSignal<Option<String>>,
    op: F,
) where
    F: FnOnce(StoryBuilder) -> Fut + 'static,
    Fut: Future<Output = (StoryBuilder, Result<(), String>)> + 'static,
{
    let Some(builder) = slot.try_update(|b| b.take()).flatten() else {
        return;
    };
    spawn_local(async move {
        let (builder, result) = op(builder).await;
        let _ = set_error.try_set(result.err());
        let _ = slot.try_set(Some(builder));
    });
}

#[component]
pub fn BuilderView(
    library: Library,
    config: Config,
    user_id: String,
    resume: bool,
    on_done: Callback<()>,
) -> impl IntoView {
    let slot = create_rw_signal(None::<StoryBuilder>);
    let (error, set_error) = create_signal(None::<String>);
    let (title, set_title) = create_signal(String::new());
    let (character_name, set_character_name) = create_signal(String::new());
    let (chapter_title, set_chapter_title) = create_signal(String::new());
    let (chapter_text, set_chapter_text) = create_signal(String::new());

    spawn_local(async move {
        let resumed = if resume {
            StoryBuilder::resume(library.clone(), config.clone(), user_id.clone()).await
        } else {
            None
        };
        let builder = resumed.unwrap_or_else(|| StoryBuilder::new(library, config, user_id));
        set_title.set(builder.story().title.clone());
        let _ = slot.try_set(Some(builder));
    });

    let step = move || slot.with(|b| b.as_ref().map(|b| b.step()));

    let save_title = move |_| {
        let title = title.get_untracked();
        with_builder(slot, set_error, move |mut b| async move {
            let result = b.apply_step_update(StoryPatch::title(title)).await;
            (b, result.map_err(|e| e.to_string()))
        });
    };

    let pick_genre = move |event: ev::Event| {
        let genre = event_target_value(&event);
        if genre.is_empty() {
            return;
        }
        with_builder(slot, set_error, move |mut b| async move {
            let result = b.apply_step_update(StoryPatch::genre(genre)).await;
            (b, result.map_err(|e| e.to_string()))
        });
    };

    let add_character = move |_| {
        let name = character_name.get_untracked();
        if name.trim().is_empty() {
            return;
        }
        set_character_name.set(String::new());
        with_builder(slot, set_error, move |mut b| async move {
            let result = b
                .add_character(Character::new(name, CharacterRole::Supporting))
                .await
                .map(|_| ());
            (b, result.map_err(|e| e.to_string()))
        });
    };

    let add_chapter = move |_| {
        let chapter = Chapter::new(chapter_title.get_untracked(), chapter_text.get_untracked());
        with_builder(slot, set_error, move |mut b| async move {
            let result = b.add_chapter(chapter).await;
            if result.is_ok() {
                set_chapter_title.set(String::new());
                set_chapter_text.set(String::new());
            }
            (b, result.map_err(|e| e.to_string()))
        });
    };

    let go = move |forward: bool| {
        with_builder(slot, set_error, move |mut b| async move {
            if forward {
                b.next().await;
            } else {
                b.previous().await;
            }
            (b, Ok(()))
        });
    };

    let save_draft = move |_| {
        with_builder(slot, set_error, |mut b| async move {
            let result = b.save_as_draft().await.map(|_| ());
            (b, result.map_err(|e| e.to_string()))
        });
    };

    let publish = move |_| {
        with_builder(slot, set_error, move |mut b| async move {
            let result = b.publish().await.map(|_| ());
            if result.is_ok() {
                on_done.call(());
            }
            (b, result.map_err(|e| e.to_string()))
        });
    };

    let leave = move |_| {
        let Some(builder) = slot.try_update(|b| b.take()).flatten() else {
            return;
        };
        spawn_local(async move {
            builder.close().await;
            on_done.call(());
        });
    };

    let body = move || match step() {
        None => view! { <p>"Working..."</p> }.into_view(),
        Some(WizardStep::Title) => view! {
            <label>
                "Title "
                <input
                    prop:value=move || title.get()
                    on:input=move |ev| set_title.set(event_target_value(&ev))
                />
            </label>
            <button on:click=save_title>"Save title"</button>
        }
        .into_view(),
        Some(WizardStep::Genre) => view! {
            <select on:change=pick_genre>
                <option value="">"Choose a genre"</option>
                {GENRES.iter().map(|g| view! { <option value=*g>{*g}</option> }).collect_view()}
            </select>
        }
        .into_view(),
        Some(WizardStep::Character) => view! {
            <ul>
                {move || slot.with(|b| b.as_ref().map(|b| {
                    b.story().characters.iter().map(|c| view! { <li>{c.name.clone()}</li> }).collect_view()
                }))}
            </ul>
            <input
                prop:value=move || character_name.get()
                on:input=move |ev| set_character_name.set(event_target_value(&ev))
            />
            <button on:click=add_character>"Add character"</button>
        }
        .into_view(),
        Some(WizardStep::Story) => view! {
            <ol>
                {move || slot.with(|b| b.as_ref().map(|b| {
                    b.story().chapters.iter().map(|c| view! { <li>{c.title.clone()}</li> }).collect_view()
                }))}
            </ol>
            <input
                prop:value=move || chapter_title.get()
                on:input=move |ev| set_chapter_title.set(event_target_value(&ev))
            />
            <textarea
                prop:value=move || chapter_text.get()
                on:input=move |ev| set_chapter_text.set(event_target_value(&ev))
            ></textarea>
            <button on:click=add_chapter>"Add chapter"</button>
        }
        .into_view(),
        Some(WizardStep::Preview) => view! {
            <p>
                {move || slot.with(|b| b.as_ref().map(|b| {
                    let s = b.story();
                    format!("{}: {} pages", s.title, s.page_count())
                }))}
            </p>
            <button on:click=publish>"Publish"</button>
            <button on:click=save_draft>"Save as draft"</button>
        }
        .into_view(),
    };

    view! {
        <div class="builder">
            <h2>{move || step().map(|s| s.label())}</h2>
            {body}
            {move || error.get().map(|e| view! { <p class="error">{e}</p> })}
            <nav>
                <button on:click=move |_| go(false)>"Back"</button>
                <button on:click=move |_| go(true)>"Next"</button>
                <button on:click=leave>"Leave"</button>
            </nav>
        </div>
    }
}
