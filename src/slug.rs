// meeting-features/src/slug.rs

use regex::Regex;
use serde::Serialize;
use std::{collections::BTreeMap, sync::LazyLock};

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_-]").expect("static regex"));

/// Map a feature title to a path component.
///
/// Lower-cases, then replaces every character outside `[a-z0-9_-]` with `_`.
/// Not injective: `"API!"` and `"API?"` both become `api_`, and the second
/// detail file written under that slug silently replaces the first.
pub fn slugify(title: &str) -> String {
    UNSAFE_CHARS.replace_all(&title.to_lowercase(), "_").into_owned()
}

/// Folder name for a meeting: spaces become underscores, nothing else changes.
pub fn meeting_folder_name(meeting_name: &str) -> String {
    meeting_name.replace(' ', "_")
}

/// Distinct titles that normalize to the same slug, and so to the same file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlugCollision {
    pub slug: String,
    pub titles: Vec<String>,
}

/// Report slugs shared by more than one distinct title. Titles repeated verbatim
/// address the same file on purpose and are not reported.
pub fn find_collisions<'a>(titles: impl IntoIterator<Item = &'a str>) -> Vec<SlugCollision> {
    let mut by_slug = BTreeMap::<String, Vec<String>>::new();
    for t in titles {
        let entry = by_slug.entry(slugify(t)).or_default();
        if !entry.iter().any(|seen| seen == t) {
            entry.push(t.to_string());
        }
    }
    by_slug
        .into_iter()
        .filter(|(_, titles)| titles.len() > 1)
        .map(|(slug, titles)| SlugCollision { slug, titles })
        .collect()
}
