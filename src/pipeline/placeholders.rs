//! Placeholder substitution in header, footer and cover markup.
//!
//! Template authors write plain markup with a few magic words instead of a
//! templating language. Two substitutions exist:
//!
//! * **Page title**: every token of [`TITLE_TOKENS`] is replaced by the
//!   page title, case-insensitively, in one left-to-right pass. Longer tokens
//!   are tried first where two could match at the same position. The
//!   inserted title is never re-scanned, so replacing one token cannot
//!   create another.
//! * **Page number**: [`PAGE_NUMBER_SENTINEL`] is replaced by
//!   `"current of total"` / `"current من total"`. The sentinel is consumed,
//!   so applying the substitution twice changes nothing.

use crate::config::Locale;
use crate::model::{Document, Page};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

/// The comment template authors place in footer markup for the page number.
pub const PAGE_NUMBER_SENTINEL: &str = "<!--PAGE_NUMBER-->";

/// Literal phrases replaced with the page title.
///
/// | Token | Language |
/// |-------|----------|
/// | `our project` | English |
/// | `page title` | English |
/// | `{{page_title}}` | both |
/// | `مشروعنا` ("our project") | Arabic |
/// | `عنوان الصفحة` ("page title") | Arabic |
pub const TITLE_TOKENS: [&str; 5] = [
    "our project",
    "page title",
    "{{page_title}}",
    "مشروعنا",
    "عنوان الصفحة",
];

static RE_TITLE_TOKENS: Lazy<Regex> = Lazy::new(|| {
    let mut tokens: Vec<&str> = TITLE_TOKENS.to_vec();
    tokens.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));
    let alternation = tokens
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)(?:{alternation})")).unwrap()
});

static RE_PAGE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--\s*PAGE_NUMBER\s*-->").unwrap());

/// Replace every title token in `markup` with `title`.
pub fn substitute_page_title(markup: &str, title: &str) -> String {
    RE_TITLE_TOKENS.replace_all(markup, NoExpand(title)).into_owned()
}

/// Replace the page-number sentinel with the localised `current/total` text.
pub fn substitute_page_number(markup: &str, current: usize, total: usize, locale: Locale) -> String {
    let phrase = locale.page_number_phrase(current, total);
    RE_PAGE_NUMBER.replace_all(markup, NoExpand(&phrase)).into_owned()
}

/// Header, footer and cover markup for one logical page.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PageChrome {
    pub header: Option<String>,
    pub footer: Option<String>,
}

/// Apply the substitutions to the document fragments for one page.
///
/// `has_header` / `has_footer` gate the fragments entirely: a page without
/// a header never receives one, substituted or not. `current` is 1-based.
pub fn page_chrome(document: &Document, page: &Page, current: usize, total: usize, locale: Locale) -> PageChrome {
    let header = document
        .header
        .as_deref()
        .filter(|h| page.has_header && !h.trim().is_empty())
        .map(|h| substitute_page_title(h, &page.title));
    let footer = document
        .footer
        .as_deref()
        .filter(|f| page.has_footer && !f.trim().is_empty())
        // Number first so a sentinel inside the title is never numbered.
        .map(|f| substitute_page_title(&substitute_page_number(f, current, total, locale), &page.title));
    PageChrome { header, footer }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_tokens_are_case_insensitive() {
        let markup = "<h1>OUR PROJECT</h1><h2>our project</h2><h3>مشروعنا</h3><p>Our Project</p>";
        assert_eq!(
            substitute_page_title(markup, "Acme"),
            "<h1>Acme</h1><h2>Acme</h2><h3>Acme</h3><p>Acme</p>"
        );
    }

    #[test]
    fn every_token_is_replaced() {
        for token in TITLE_TOKENS {
            assert_eq!(substitute_page_title(&format!("[{token}]"), "T"), "[T]", "{token}");
        }
    }

    #[test]
    fn replacement_is_literal_and_not_rescanned() {
        // The title itself contains a token and regex replacement syntax.
        let out = substitute_page_title("page title / our project", "$1 page title");
        assert_eq!(out, "$1 page title / $1 page title");
    }

    #[test]
    fn substitution_is_order_independent() {
        let a = substitute_page_title("our project page title", "X");
        let b = substitute_page_title("page title our project", "X");
        assert_eq!(a, "X X");
        assert_eq!(b, "X X");
    }

    #[test]
    fn markup_without_tokens_is_untouched() {
        let markup = "<div class=\"projects\">Projects</div>";
        assert_eq!(substitute_page_title(markup, "X"), markup);
    }

    #[test]
    fn page_number_english_and_arabic() {
        let footer = "<span><!--PAGE_NUMBER--></span>";
        assert_eq!(substitute_page_number(footer, 1, 2, Locale::En), "<span>1 of 2</span>");
        assert_eq!(substitute_page_number(footer, 1, 2, Locale::Ar), "<span>1 من 2</span>");
    }

    #[test]
    fn page_number_tolerates_spaces_in_the_comment() {
        assert_eq!(substitute_page_number("<!-- PAGE_NUMBER -->", 3, 9, Locale::En), "3 of 9");
    }

    #[test]
    fn page_number_is_idempotent() {
        let footer = "p. <!--PAGE_NUMBER-->";
        let once = substitute_page_number(footer, 4, 7, Locale::Ar);
        let twice = substitute_page_number(&once, 4, 7, Locale::Ar);
        assert_eq!(once, twice);
    }

    fn doc(header: &str, footer: &str) -> Document {
        Document {
            header: Some(header.into()),
            footer: Some(footer.into()),
            ..Default::default()
        }
    }

    fn page(title: &str, has_header: bool, has_footer: bool) -> Page {
        Page {
            title: title.into(),
            has_header,
            has_footer,
            ..Default::default()
        }
    }

    #[test]
    fn chrome_respects_flags() {
        let d = doc("<h1>page title</h1>", "<p><!--PAGE_NUMBER--></p>");
        let chrome = page_chrome(&d, &page("Intro", false, true), 1, 2, Locale::En);
        assert_eq!(chrome.header, None);
        assert_eq!(chrome.footer.as_deref(), Some("<p>1 of 2</p>"));

        let chrome = page_chrome(&d, &page("Intro", true, false), 1, 2, Locale::En);
        assert_eq!(chrome.header.as_deref(), Some("<h1>Intro</h1>"));
        assert_eq!(chrome.footer, None);
    }

    #[test]
    fn chrome_substitutes_title_in_footer_too() {
        let d = doc("<h1>page title</h1>", "<p>our project - <!--PAGE_NUMBER--></p>");
        let chrome = page_chrome(&d, &page("Summary", true, true), 2, 2, Locale::Ar);
        assert_eq!(chrome.header.as_deref(), Some("<h1>Summary</h1>"));
        assert_eq!(chrome.footer.as_deref(), Some("<p>Summary - 2 من 2</p>"));
    }

    #[test]
    fn sentinel_inside_a_title_stays_literal() {
        let d = doc("", "<p>our project | <!--PAGE_NUMBER--></p>");
        let chrome = page_chrome(&d, &page("Notes <!--PAGE_NUMBER-->", false, true), 1, 3, Locale::En);
        assert_eq!(chrome.footer.as_deref(), Some("<p>Notes <!--PAGE_NUMBER--> | 1 of 3</p>"));
    }

    #[test]
    fn blank_fragments_are_dropped() {
        let d = doc("  ", "");
        assert_eq!(page_chrome(&d, &page("X", true, true), 1, 1, Locale::En), PageChrome::default());
    }
}
