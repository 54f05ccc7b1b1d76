//! Interactive preview: merged [`PageData`] → layout markup.
//!
//! Each kind has one fixed, hand-built layout. Every text value is
//! HTML-escaped; image fields become `<img>` elements only when set.

use super::merge::{value_text, PageData};
use super::TemplateKind;
use serde_json::{Map, Value};
use std::fmt::Write as _;

/// Render the preview markup of a template.
pub fn render_preview(data: &PageData) -> String {
    let mut html = String::with_capacity(1024);
    let _ = write!(html, r#"<section class="template template-{}">"#, data.kind);
    match data.kind {
        TemplateKind::Cover => cover(&mut html, data),
        TemplateKind::TableOfContents => toc(&mut html, data),
        TemplateKind::About => about(&mut html, data),
        TemplateKind::Staff => staff(&mut html, data),
        TemplateKind::Content => content(&mut html, data),
        TemplateKind::Projects => projects(&mut html, data),
    }
    html.push_str("</section>");
    html
}

fn cover(html: &mut String, data: &PageData) {
    let background = data.text("background");
    if !background.is_empty() {
        let _ = write!(
            html,
            r#"<div class="cover-background" style="background-image:url('{}')"></div>"#,
            escape_html(&background)
        );
    }
    image(html, "cover-logo", &data.text("logo"));
    tag(html, "h1", "cover-title", &data.text("title"));
    tag(html, "h2", "cover-subtitle", &data.text("subtitle"));
    tag(html, "p", "cover-date", &data.text("date"));
}

fn toc(html: &mut String, data: &PageData) {
    tag(html, "h1", "heading", &data.text("heading"));
    html.push_str(r#"<ol class="toc-entries">"#);
    for entry in data.list("entries") {
        let entry = entry.as_object();
        let _ = write!(
            html,
            r#"<li><span class="toc-title">{}</span><span class="toc-page">{}</span></li>"#,
            escape_html(&field(entry, "title")),
            escape_html(&field(entry, "page")),
        );
    }
    html.push_str("</ol>");
}

fn about(html: &mut String, data: &PageData) {
    tag(html, "h1", "heading", &data.text("heading"));
    paragraphs(html, &data.text("body"));
    image(html, "about-image", &data.text("image"));
    html.push_str(r#"<ul class="highlights">"#);
    for item in data.list("highlights") {
        let _ = write!(html, "<li>{}</li>", escape_html(&value_text(Some(item))));
    }
    html.push_str("</ul>");
    let vision = data.object("vision");
    html.push_str(r#"<div class="vision">"#);
    tag(html, "h2", "vision-title", &field(vision, "title"));
    paragraphs(html, &field(vision, "text"));
    html.push_str("</div>");
}

fn staff(html: &mut String, data: &PageData) {
    tag(html, "h1", "heading", &data.text("heading"));
    paragraphs(html, &data.text("intro"));
    person(html, "leader", data.object("leader"));
    html.push_str(r#"<div class="members">"#);
    for member in data.list("members") {
        person(html, "member", member.as_object());
    }
    html.push_str("</div>");
}

fn person(html: &mut String, class: &str, person: Option<&Map<String, Value>>) {
    let _ = write!(html, r#"<figure class="{class}">"#);
    image(html, "photo", &field(person, "photo"));
    let _ = write!(
        html,
        r#"<figcaption><strong>{}</strong><span>{}</span></figcaption></figure>"#,
        escape_html(&field(person, "name")),
        escape_html(&field(person, "role")),
    );
}

fn content(html: &mut String, data: &PageData) {
    tag(html, "h1", "heading", &data.text("heading"));
    image(html, "content-image", &data.text("image"));
    paragraphs(html, &data.text("body"));
}

fn projects(html: &mut String, data: &PageData) {
    tag(html, "h1", "heading", &data.text("heading"));
    paragraphs(html, &data.text("intro"));
    for project in data.list("projects") {
        let project = project.as_object();
        html.push_str(r#"<article class="project">"#);
        tag(html, "h2", "project-name", &field(project, "name"));
        let _ = write!(
            html,
            r#"<p class="project-meta">{} · {}</p>"#,
            escape_html(&field(project, "location")),
            escape_html(&field(project, "year")),
        );
        paragraphs(html, &field(project, "description"));
        html.push_str(r#"<div class="gallery">"#);
        let images = project
            .and_then(|p| p.get("images"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        for src in images {
            image(html, "gallery-image", &value_text(Some(src)));
        }
        html.push_str("</div></article>");
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn field(object: Option<&Map<String, Value>>, key: &str) -> String {
    value_text(object.and_then(|o| o.get(key)))
}

fn tag(html: &mut String, name: &str, class: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    let _ = write!(html, r#"<{name} class="{class}">{}</{name}>"#, escape_html(text));
}

fn image(html: &mut String, class: &str, src: &str) {
    if src.is_empty() {
        return;
    }
    let _ = write!(html, r#"<img class="{class}" src="{}" alt="">"#, escape_html(src));
}

/// Long text: blank lines separate paragraphs, single newlines become `<br>`.
fn paragraphs(html: &mut String, text: &str) {
    for block in text.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
        let lines: Vec<String> = block.lines().map(escape_html).collect();
        let _ = write!(html, "<p>{}</p>", lines.join("<br>"));
    }
}

pub(crate) fn escape_html(text: &str) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::resolve_template;
    use serde_json::json;

    #[test]
    fn every_kind_renders_its_wrapper() {
        for kind in TemplateKind::ALL {
            let data = resolve_template(kind.as_str(), &Value::Null).unwrap();
            let html = render_preview(&data);
            assert!(html.starts_with(&format!(r#"<section class="template template-{kind}">"#)));
            assert!(html.ends_with("</section>"));
        }
    }

    #[test]
    fn staff_preview_uses_merged_values() {
        let data = resolve_template(
            "staff",
            &json!({"leader": {"name": "Omar <CEO>"}, "members": [{"name": "Sara", "photo": "s.png"}]}),
        )
        .unwrap();
        let html = render_preview(&data);
        assert!(html.contains("<strong>Omar &lt;CEO&gt;</strong><span>Management</span>"));
        assert!(html.contains(r#"<img class="photo" src="s.png" alt="">"#));
        assert!(!html.contains("Project Manager"), "default members must be replaced wholesale");
    }

    #[test]
    fn long_text_becomes_paragraphs() {
        let data = resolve_template("content", &json!({"body": "one\ntwo\n\nthree"})).unwrap();
        let html = render_preview(&data);
        assert!(html.contains("<p>one<br>two</p><p>three</p>"));
    }

    #[test]
    fn empty_images_are_omitted() {
        let data = resolve_template("cover", &json!({})).unwrap();
        let html = render_preview(&data);
        assert!(!html.contains("<img"));
        assert!(!html.contains("cover-background"));
        assert!(html.contains("Company Profile"));
    }

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }
}
