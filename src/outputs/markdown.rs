//! Markdown rendering of a ranked feed.

use crate::models::RankedFeed;

/// Render `feed` as a `Stock | Published | News Link` table in feed order.
pub fn feed_to_markdown(feed: &RankedFeed) -> String {
    let mut md = String::from("# Stock News\n\n");
    if feed.is_empty() {
        md.push_str("_No articles found._\n");
        return md;
    }

    md.push_str("| Stock | Published | News Link |\n");
    md.push_str("|-------|-----------|-----------|\n");
    for article in feed.iter() {
        let url = escape_cell(&article.candidate.url);
        md.push_str(&format!(
            "| {} | {} | [{url}]({url}) |\n",
            escape_cell(&article.candidate.source_query),
            article.date_label(),
        ));
    }
    md.push_str(&format!(
        "\n{} of {} articles dated.\n",
        feed.dated_count(),
        feed.len()
    ));
    md
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}
