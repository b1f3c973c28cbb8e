//! Ordering resolved articles for display.

use crate::models::{RankedFeed, ResolvedArticle};
use itertools::Itertools;

/// Order articles newest first, with undated articles at the end.
///
/// Input order is the discovery order. Dated articles are sorted by
/// timestamp, descending, with a stable sort so equal timestamps keep their
/// discovery order; undated articles follow in discovery order untouched.
pub fn rank<I>(articles: I) -> RankedFeed
where
    I: IntoIterator<Item = ResolvedArticle>,
{
    let (dated, undated): (Vec<_>, Vec<_>) = articles.into_iter().partition(|a| a.is_dated);

    let mut ordered = dated
        .into_iter()
        .sorted_by(|a, b| b.timestamp.cmp(&a.timestamp))
        .collect::<Vec<_>>();
    ordered.extend(undated);

    RankedFeed { articles: ordered }
}
