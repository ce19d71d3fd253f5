// meeting-features/src/outline.rs

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::warn;

use crate::slug::{SlugCollision, find_collisions};

static MAIN_FEATURE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\)").expect("static regex"));

/// `N) Title`, the line that opens a main feature.
pub fn is_main_feature_line(line: &str) -> bool {
    MAIN_FEATURE.is_match(line.trim())
}

/// Characters that open a bullet line. Repeated (`--`, `---`) they mark nesting.
pub const BULLET_GLYPHS: [char; 3] = ['-', '–', '•'];

pub fn is_bullet_glyph(c: char) -> bool {
    BULLET_GLYPHS.contains(&c)
}

/// One indented bullet line under a main feature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RawOutlineLine {
    /// Leading space count of the untrimmed line. Tabs are not expanded.
    pub indent_level: usize,
    /// The run of bullet glyphs the line opened with.
    pub marker: String,
    /// Line content with marker and the spaces after it removed.
    pub text: String,
    source: String,
}

impl RawOutlineLine {
    fn from_raw(raw: &str) -> Option<Self> {
        let stripped = raw.trim();
        if !stripped.starts_with(is_bullet_glyph) {
            return None;
        }
        let indent_level = raw.len() - raw.trim_start_matches(' ').len();
        let rest = stripped.trim_start_matches(is_bullet_glyph);
        let marker = stripped[..stripped.len() - rest.len()].to_string();
        Some(Self {
            indent_level,
            marker,
            text: rest.trim_start_matches(' ').to_string(),
            source: stripped.to_string(),
        })
    }

    /// Build a line directly, as if `" " * indent_level + marker + " " + text` had been parsed.
    pub fn new(indent_level: usize, marker: impl Into<String>, text: impl Into<String>) -> Self {
        let marker = marker.into();
        let text = text.into();
        let source = if text.is_empty() { marker.clone() } else { format!("{marker} {text}") };
        Self { indent_level, marker, text, source }
    }

    /// A single glyph (`-`, `–`, `•`) rather than a nesting run like `--`.
    pub fn has_single_marker(&self) -> bool {
        self.marker.chars().count() == 1
    }

    /// The line as it appeared in the outline, minus trailing whitespace.
    pub fn render(&self) -> String {
        format!("{}{}", " ".repeat(self.indent_level), self.source)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MainFeatureNode {
    /// The `N` of `N)`. Numbers too large for `u64` saturate.
    pub index: u64,
    pub title: String,
    pub children: Vec<RawOutlineLine>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FeatureOutline {
    /// In order of appearance; duplicate or out-of-order numbering is kept as-is.
    pub features: Vec<MainFeatureNode>,
    /// Bullet lines seen before any `N)` line. They are dropped, not attached.
    pub orphaned_lines: usize,
}

impl FeatureOutline {
    pub fn is_empty(&self) -> bool { self.features.is_empty() }
    pub fn len(&self) -> usize { self.features.len() }
    pub fn iter(&self) -> std::slice::Iter<'_, MainFeatureNode> { self.features.iter() }

    pub fn contains_title(&self, title: &str) -> bool {
        self.features.iter().any(|f| f.title == title)
    }

    /// Main features whose titles map to the same folder.
    pub fn slug_collisions(&self) -> Vec<SlugCollision> {
        find_collisions(self.features.iter().map(|f| f.title.as_str()))
    }
}

enum LineKind {
    MainFeature { index: u64, title: String },
    Bullet(RawOutlineLine),
    Other,
}

fn classify(raw: &str) -> LineKind {
    let stripped = raw.trim();
    if stripped.is_empty() {
        return LineKind::Other;
    }
    if let Some(caps) = MAIN_FEATURE.captures(stripped) {
        let index = caps[1].parse::<u64>().unwrap_or(u64::MAX);
        let title = stripped.split_once(')').map(|(_, t)| t.trim()).unwrap_or_default();
        return LineKind::MainFeature { index, title: title.to_string() };
    }
    match RawOutlineLine::from_raw(raw) {
        Some(line) => LineKind::Bullet(line),
        None => LineKind::Other,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseState { AwaitingMainFeature, AccumulatingChildren }

/// Parse a `sub_features.txt` outline into main features and their indented lines.
///
/// Lines that are neither `N) Title` nor bullets (headers, blanks, prose) are ignored.
pub fn parse(text: &str) -> FeatureOutline {
    let mut outline = FeatureOutline::default();
    let mut state = ParseState::AwaitingMainFeature;

    for (n, raw) in text.lines().enumerate() {
        match (classify(raw), state) {
            (LineKind::MainFeature { index, title }, _) => {
                outline.features.push(MainFeatureNode { index, title, children: Vec::new() });
                state = ParseState::AccumulatingChildren;
            }
            (LineKind::Bullet(line), ParseState::AccumulatingChildren) => {
                if let Some(node) = outline.features.last_mut() {
                    node.children.push(line);
                }
            }
            (LineKind::Bullet(line), ParseState::AwaitingMainFeature) => {
                warn!(line = n + 1, text = %line.text, "bullet before any main feature; dropped");
                outline.orphaned_lines += 1;
            }
            (LineKind::Other, _) => {}
        }
    }
    outline
}

/// Read the titles out of `main_features.txt`: every line starting with `- `.
pub fn parse_main_features(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| line.starts_with("- "))
        .map(|line| line.trim_matches(|c: char| c == '-' || c == ' ').trim().to_string())
        .filter(|title| !title.is_empty())
        .collect()
}

/// Render `main_features.txt` from a list of titles.
pub fn render_main_features(titles: &[String]) -> String {
    let mut out = String::from("Extracted Main Features:\n\n");
    for t in titles {
        out.push_str(&format!("- {t}\n"));
    }
    out
}
