use std::fmt::Write;

use crate::core::story::{Layout, Story};
use crate::services::pagination::{ChapterPage, ContentsPage, Page, Sheet};

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_contents(out: &mut String, toc: &ContentsPage) {
    out.push_str("<section class=\"page contents\"><h2>Contents</h2>");
    if toc.entries.is_empty() {
        out.push_str("<p class=\"empty\">No chapters yet.</p>");
    } else {
        out.push_str("<ol>");
        for entry in &toc.entries {
            let _ = write!(
                out,
                "<li><span class=\"chapter\">{}. {}</span><span class=\"page-no\">{}</span></li>",
                entry.chapter_number,
                escape(&entry.title),
                entry.page_number
            );
        }
        out.push_str("</ol>");
    }
    out.push_str("</section>");
}

fn render_chapter(out: &mut String, page: &ChapterPage) {
    let layout = match page.layout {
        Layout::ImageText => "image-text",
        Layout::TextImage => "text-image",
    };
    let image = page
        .image
        .as_deref()
        .map(|src| format!("<img src=\"{}\" alt=\"\">", escape(src)))
        .unwrap_or_default();
    let paragraphs: String = page
        .content
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("<p>{}</p>", escape(p.trim())))
        .collect();
    let text = format!("<div class=\"text\">{}</div>", paragraphs);

    let _ = write!(
        out,
        "<section class=\"page chapter {}\"><h2>Chapter {}: {}</h2>",
        layout,
        page.chapter_number,
        escape(&page.title)
    );
    let settings: Vec<&str> = [
        page.settings.location.as_deref(),
        page.settings.time_of_day.as_deref(),
        page.settings.weather.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !settings.is_empty() {
        let _ = write!(out, "<p class=\"settings\">{}</p>", escape(&settings.join(" · ")));
    }
    match page.layout {
        Layout::ImageText => {
            out.push_str(&image);
            out.push_str(&text);
        }
        Layout::TextImage => {
            out.push_str(&text);
            out.push_str(&image);
        }
    }
    let _ = write!(out, "<footer>{}</footer></section>", page.page_number);
}

fn render_page(out: &mut String, page: &Page) {
    match page {
        Page::Contents(toc) => render_contents(out, toc),
        Page::Chapter(chapter) => render_chapter(out, chapter),
    }
}

const STYLE: &str = "@page{size:landscape;margin:1cm}\
body{font-family:Georgia,serif}\
.sheet{display:flex;page-break-after:always}\
.sheet.single .page{flex:1}\
.sheet.spread .page,.sheet.spread .blank{flex:1;padding:1em}\
.page img{max-width:100%}\
footer{text-align:center;color:#888}";

/// Standalone printable document: a cover sheet, then one block per sheet.
pub fn render_html(story: &Story, sheets: &[Sheet]) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title><style>{}</style></head><body>",
        escape(&story.title),
        STYLE
    );

    out.push_str("<div class=\"sheet single cover\"><section class=\"page\">");
    if let Some(cover) = &story.cover_image {
        let _ = write!(out, "<img src=\"{}\" alt=\"\">", escape(cover));
    }
    let _ = write!(out, "<h1>{}</h1>", escape(&story.title));
    if !story.author.is_empty() {
        let _ = write!(out, "<p class=\"author\">by {}</p>", escape(&story.author));
    }
    out.push_str("</section></div>");

    for sheet in sheets {
        match sheet {
            Sheet::Single(page) => {
                out.push_str("<div class=\"sheet single\">");
                render_page(&mut out, page);
            }
            Sheet::Spread { left, right } => {
                out.push_str("<div class=\"sheet spread\">");
                render_page(&mut out, left);
                match right {
                    Some(page) => render_page(&mut out, page),
                    None => out.push_str("<section class=\"blank\"></section>"),
                }
            }
        }
        out.push_str("</div>");
    }

    if let Some(back) = &story.cover_image_back {
        let _ = write!(
            out,
            "<div class=\"sheet single back-cover\"><img src=\"{}\" alt=\"\"></div>",
            escape(back)
        );
    }
    out.push_str("</body></html>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::story::Chapter;
    use crate::services::pagination::{paginate_story, spreads};

    #[test]
    fn test_render_escapes_and_marks_blank_page() {
        let mut story = Story::new();
        story.title = "Cats & <Dogs>".to_string();
        story.author = "Mia".to_string();
        story.add_chapter(Chapter::new("One", "First.\n\nSecond."));
        let html = render_html(&story, &spreads(&paginate_story(&story)));

        assert!(html.contains("<title>Cats &amp; &lt;Dogs&gt;</title>"));
        assert!(html.contains("by Mia"));
        assert!(html.contains("<li><span class=\"chapter\">1. One</span><span class=\"page-no\">2</span></li>"));
        assert!(html.contains("<p>First.</p><p>Second.</p>"));
        assert!(html.contains("<section class=\"blank\"></section>"));
        assert_eq!(html.matches("class=\"sheet ").count(), 3);
    }

    #[test]
    fn test_render_empty_story() {
        let story = Story::new();
        let html = render_html(&story, &spreads(&paginate_story(&story)));
        assert!(html.contains("No chapters yet."));
    }
}
