//! Pattern-in-markup strategy.
//!
//! Looks, in order, at:
//! 1. date-carrying attributes (`<time datetime>`, `data-published`, ...)
//! 2. visible text following a "Published" / "Updated" / "Posted" label
//! 3. the text of `<time>` elements

use super::{Page, first_valid};
use crate::grammar::{self, DATE_SUBSTRING};
use crate::models::{RawDateHit, Strategy};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

/// Attribute names checked on every element, most specific first.
const DATE_ATTRIBUTES: &[&str] = &[
    "datetime",
    "data-published",
    "data-published-at",
    "data-publish-date",
    "data-pubdate",
    "data-timestamp",
    "data-date",
    "data-time",
];

/// How far after a label a date may start, in characters.
const LABEL_WINDOW: usize = 100;

static DATE_ATTRIBUTE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    let group = DATE_ATTRIBUTES
        .iter()
        .map(|name| format!("[{name}]"))
        .collect::<Vec<_>>()
        .join(", ");
    Selector::parse(&group).expect("date attribute selector")
});
static TIME_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("time").expect("time selector"));
static LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:first published|last updated|published|updated|posted)\b(?:\s+(?:on|at))?\s*:?\s*")
        .expect("label regex")
});

pub fn extract(page: &Page<'_>) -> Option<RawDateHit> {
    let found = attribute_date(page.document)
        .or_else(|| labelled_date(&visible_text(page.document)))
        .or_else(|| time_text_date(page.document))?;
    first_valid([found], Strategy::MarkupPattern, page)
}

fn attribute_date(document: &Html) -> Option<String> {
    document.select(&DATE_ATTRIBUTE_SELECTOR).find_map(|element| {
        DATE_ATTRIBUTES
            .iter()
            .filter_map(|name| element.value().attr(name))
            .map(str::trim)
            .find(|value| grammar::parse(value).is_some())
            .map(str::to_string)
    })
}

/// Find a date that starts shortly after a publication label.
///
/// Only the start of the date must fall inside the window; the match itself
/// may run past it.
pub fn labelled_date(text: &str) -> Option<String> {
    LABEL.find_iter(text).find_map(|label| {
        let rest = &text[label.end()..];
        let end = rest
            .char_indices()
            .nth(LABEL_WINDOW)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        DATE_SUBSTRING
            .find_iter(rest)
            .take_while(|m| m.start() < end)
            .map(|m| m.as_str())
            .find(|candidate| grammar::parse(candidate).is_some())
            .map(str::to_string)
    })
}

fn time_text_date(document: &Html) -> Option<String> {
    document.select(&TIME_SELECTOR).find_map(|element| {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if grammar::parse(&text).is_some() {
            return Some(text);
        }
        DATE_SUBSTRING
            .find_iter(&text)
            .map(|m| m.as_str())
            .find(|candidate| grammar::parse(candidate).is_some())
            .map(str::to_string)
    })
}

/// Text a reader would see, with script and style contents left out.
pub fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript" | "template"));
        let text = text.trim();
        if hidden || text.is_empty() {
            continue;
        }
        out.push_str(text);
        out.push(' ');
    }
    out
}
