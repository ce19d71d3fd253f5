// meeting-features/src/block.rs

use serde::Serialize;

use crate::{
    outline::{RawOutlineLine, is_bullet_glyph},
    slug::{SlugCollision, find_collisions},
};

/// Deepest indent a line may have and still open a block.
pub const DEFAULT_TOP_LEVEL_MAX_INDENT: usize = 3;

/// A first-level bullet plus every line nested under it. The unit of resumable detail work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeatureBlock {
    pub title: String,
    /// Lines joined with `\n`, each re-indented by its original space count.
    pub body: String,
    pub line_count: usize,
}

impl FeatureBlock {
    fn from_lines(lines: &[RawOutlineLine]) -> Self {
        let title = lines
            .first()
            .map(|l| block_title(&l.text))
            .unwrap_or_default();
        let body = lines.iter().map(RawOutlineLine::render).collect::<Vec<_>>().join("\n");
        Self { title, body, line_count: lines.len() }
    }
}

/// Strip any remaining bullet glyphs and spaces (`- - foo` gives `foo`).
fn block_title(text: &str) -> String {
    text.trim_start_matches(|c: char| is_bullet_glyph(c) || c == ' ').trim().to_string()
}

fn opens_block(line: &RawOutlineLine, max_indent: usize) -> bool {
    line.indent_level <= max_indent && line.has_single_marker()
}

/// Group a main feature's children into blocks.
///
/// A line opens a new block when its indent is at most `max_indent` and it carries a
/// single bullet glyph; anything else joins the block in progress. Every input line
/// lands in exactly one block, in order.
pub fn segment(children: &[RawOutlineLine], max_indent: usize) -> Vec<FeatureBlock> {
    let mut blocks = Vec::new();
    let mut start = 0;
    for (i, line) in children.iter().enumerate() {
        if i > start && opens_block(line, max_indent) {
            blocks.push(FeatureBlock::from_lines(&children[start..i]));
            start = i;
        }
    }
    if start < children.len() {
        blocks.push(FeatureBlock::from_lines(&children[start..]));
    }
    blocks
}

/// Blocks under one main feature whose titles would share a detail file.
pub fn block_collisions(blocks: &[FeatureBlock]) -> Vec<SlugCollision> {
    find_collisions(blocks.iter().map(|b| b.title.as_str()))
}
