//! Turns a chapter list into numbered pages.
//!
//! Page 1 is always a generated table of contents; chapter `k` lands on page
//! `k + 1`. The same list drives the interactive reader and the print layout.

use serde::Serialize;

use crate::core::story::{Chapter, ChapterSettings, Layout, Story};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    pub chapter_number: usize,
    pub title: String,
    pub page_number: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentsPage {
    pub page_number: usize,
    pub entries: Vec<TocEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterPage {
    pub id: String,
    pub page_number: usize,
    pub chapter_number: usize,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub layout: Layout,
    pub settings: ChapterSettings,
    pub characters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Page {
    Contents(ContentsPage),
    Chapter(ChapterPage),
}

impl Page {
    pub fn page_number(&self) -> usize {
        match self {
            Page::Contents(p) => p.page_number,
            Page::Chapter(p) => p.page_number,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Contents(_) => "Contents",
            Page::Chapter(p) => &p.title,
        }
    }

    /// Full-width pages get a printed sheet to themselves.
    pub fn is_full_width(&self) -> bool {
        matches!(self, Page::Contents(_))
    }

    pub fn as_chapter(&self) -> Option<&ChapterPage> {
        match self {
            Page::Chapter(p) => Some(p),
            Page::Contents(_) => None,
        }
    }
}

pub const CONTENTS_PAGE: usize = 1;

pub fn paginate(chapters: &[Chapter]) -> Vec<Page> {
    let entries = chapters
        .iter()
        .enumerate()
        .map(|(i, chapter)| TocEntry {
            chapter_number: i + 1,
            title: chapter.title.clone(),
            page_number: i + 2,
        })
        .collect();

    let mut pages = Vec::with_capacity(chapters.len() + 1);
    pages.push(Page::Contents(ContentsPage {
        page_number: CONTENTS_PAGE,
        entries,
    }));
    pages.extend(chapters.iter().enumerate().map(|(i, chapter)| {
        Page::Chapter(ChapterPage {
            id: chapter.id.clone(),
            page_number: i + 2,
            chapter_number: i + 1,
            title: chapter.title.clone(),
            content: chapter.content.clone(),
            image: chapter.image.clone(),
            layout: chapter.layout,
            settings: chapter.settings.clone(),
            characters: chapter.characters.clone(),
        })
    }));
    pages
}

pub fn paginate_story(story: &Story) -> Vec<Page> {
    paginate(&story.chapters)
}

/// One physical printed sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Sheet {
    Single(Page),
    /// Two facing pages; `right` is blank for an odd final page.
    Spread { left: Page, right: Option<Page> },
}

/// Groups pages for two-page printing. Full-width pages stand alone,
/// the rest pair up in reading order.
pub fn spreads(pages: &[Page]) -> Vec<Sheet> {
    let mut sheets = Vec::new();
    let mut pending: Option<Page> = None;

    for page in pages {
        if page.is_full_width() {
            if let Some(left) = pending.take() {
                sheets.push(Sheet::Spread { left, right: None });
            }
            sheets.push(Sheet::Single(page.clone()));
            continue;
        }
        match pending.take() {
            Some(left) => sheets.push(Sheet::Spread {
                left,
                right: Some(page.clone()),
            }),
            None => pending = Some(page.clone()),
        }
    }
    if let Some(left) = pending {
        sheets.push(Sheet::Spread { left, right: None });
    }
    sheets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapters(n: usize) -> Vec<Chapter> {
        let mut story = Story::new();
        for i in 0..n {
            story.add_chapter(Chapter::new(format!("Chapter {}", i + 1), "..."));
        }
        story.chapters
    }

    #[test]
    fn test_empty_story_has_only_contents() {
        let pages = paginate(&[]);
        assert_eq!(pages.len(), 1);
        match &pages[0] {
            Page::Contents(toc) => {
                assert_eq!(toc.page_number, 1);
                assert!(toc.entries.is_empty());
            }
            other => panic!("expected contents page, got {:?}", other),
        }
    }

    #[test]
    fn test_chapter_k_is_page_k_plus_one() {
        let list = chapters(4);
        let pages = paginate(&list);
        assert_eq!(pages.len(), 5);
        for (k, page) in pages.iter().enumerate().skip(1) {
            let chapter = page.as_chapter().expect("chapter page");
            assert_eq!(chapter.chapter_number, k);
            assert_eq!(chapter.page_number, k + 1);
            assert_eq!(chapter.id, list[k - 1].id);
        }
        let Page::Contents(toc) = &pages[0] else {
            panic!("first page must be contents");
        };
        let numbers: Vec<usize> = toc.entries.iter().map(|e| e.page_number).collect();
        assert_eq!(numbers, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_repagination_is_stable() {
        let list = chapters(3);
        assert_eq!(paginate(&list), paginate(&list));
    }

    #[test]
    fn test_legacy_story_paginates_from_pages_array() {
        let json = r#"{"title":"Old","chapters":12,"pages":[{"title":"Only","content":"x"}]}"#;
        let story: Story = serde_json::from_str(json).unwrap();
        let pages = paginate_story(&story);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].title(), "Only");
        assert_eq!(pages[1].page_number(), 2);
    }

    #[test]
    fn test_spreads_pair_chapters_and_isolate_contents() {
        let sheets = spreads(&paginate(&chapters(3)));
        assert_eq!(sheets.len(), 3);
        assert!(matches!(&sheets[0], Sheet::Single(Page::Contents(_))));
        match &sheets[1] {
            Sheet::Spread { left, right: Some(right) } => {
                assert_eq!(left.page_number(), 2);
                assert_eq!(right.page_number(), 3);
            }
            other => panic!("expected full spread, got {:?}", other),
        }
        match &sheets[2] {
            Sheet::Spread { left, right: None } => assert_eq!(left.page_number(), 4),
            other => panic!("expected half spread, got {:?}", other),
        }

        let even = spreads(&paginate(&chapters(2)));
        assert_eq!(even.len(), 2);
        assert_eq!(spreads(&paginate(&[])).len(), 1);
    }
}
