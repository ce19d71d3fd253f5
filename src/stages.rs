// meeting-features/src/stages.rs

use anyhow::{Context, Result, bail};
use std::{fs, io::Write, path::Path};
use tracing::{debug, error, info, warn};

use crate::{
    block::{block_collisions, segment},
    config::ModelRole,
    detail::{OutcomeCounts, process_blocks},
    error::MissingInput,
    fsutil::write_atomic,
    inference::{FeatureDetails, HierarchicalFeatures, MainFeatures, Summary, infer_structured},
    outline::{self, parse_main_features, render_main_features},
    pipeline::{PipelineContext, StageReport},
    prompts,
    slug::{find_collisions, slugify},
    store::{TranscriptStore, Upsert},
};

const SUB_FEATURES_HEADER: &str = "Extracted Hierarchical Features:\n\n";

fn underline(header: &str, pad: usize, title: &str, body: &str) -> String {
    format!("{header}\n{}\n\n{body}", "=".repeat(pad + title.chars().count()))
}

pub fn render_summary(meeting_name: &str, summary: &str) -> String {
    underline(&format!("Meeting: {meeting_name}"), 9, meeting_name, summary)
}

pub fn render_main_detail(feature: &str, details: &str) -> String {
    underline(&format!("Main Feature: {feature}"), 15, feature, details)
}

/// Transcript text for the context's file path.
fn transcript_for(ctx: &PipelineContext) -> Result<String> {
    let store = TranscriptStore::load(&ctx.store_path())?;
    let record = store
        .find_by_file_path(&ctx.file_path)
        .ok_or_else(|| MissingInput::TranscriptByPath(ctx.file_path.clone()))?;
    if record.text.trim().is_empty() {
        bail!(MissingInput::EmptyTranscript(ctx.file_path.clone()));
    }
    Ok(record.text.clone())
}

fn main_titles(ctx: &PipelineContext) -> Result<Vec<String>> {
    let path = ctx.main_features_path();
    if !path.exists() {
        bail!(MissingInput::File(path));
    }
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    Ok(parse_main_features(&text))
}

pub async fn save(ctx: &PipelineContext) -> Result<StageReport> {
    let text = fs::read_to_string(&ctx.file_path).with_context(|| format!("read transcript {}", ctx.file_path))?;
    let path = ctx.store_path();
    let mut store = TranscriptStore::load_or_reset(&path)?;
    let op = store.upsert(&ctx.meeting_name, &ctx.file_path, text);
    store.save(&path)?;
    let verb = match op { Upsert::Created => "saved", Upsert::Updated => "updated" };
    Ok(StageReport::completed(format!("Transcript '{}' {verb} in {}", ctx.meeting_name, path.display())))
}

pub async fn summarize(ctx: &PipelineContext) -> Result<StageReport> {
    let out = ctx.summary_path();
    if out.exists() {
        return Ok(StageReport::skipped(format!("{} already exists", out.display())));
    }
    let store_path = ctx.store_path();
    let mut store = TranscriptStore::load(&store_path)?;
    let record = store
        .find_by_title(&ctx.meeting_name)
        .ok_or_else(|| MissingInput::TranscriptByTitle(ctx.meeting_name.clone()))?;
    if record.text.trim().is_empty() {
        bail!(MissingInput::EmptyTranscript(ctx.meeting_name.clone()));
    }

    let Summary { summary } = infer_structured(
        ctx.inference.as_ref(),
        ModelRole::Summary,
        prompts::SUMMARY,
        prompts::summary_request(&ctx.meeting_name, &record.text),
    )
    .await?;

    store.set_summary(&ctx.meeting_name, summary.clone());
    store.save(&store_path)?;
    write_atomic(&out, &render_summary(&ctx.meeting_name, &summary))?;
    Ok(StageReport::completed(format!("Summary for '{}' saved in {}", ctx.meeting_name, out.display())))
}

pub async fn extract_main(ctx: &PipelineContext) -> Result<StageReport> {
    let out = ctx.main_features_path();
    if out.exists() {
        return Ok(StageReport::skipped(format!("{} already exists", out.display())));
    }
    let transcript = transcript_for(ctx)?;
    let MainFeatures { features } =
        infer_structured(ctx.inference.as_ref(), ModelRole::ExtractMain, prompts::EXTRACT_MAIN, transcript).await?;

    // one title per line in main_features.txt
    let features: Vec<String> = features
        .iter()
        .map(|f| f.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|f| !f.is_empty())
        .collect();
    if features.is_empty() {
        bail!("no main features found in transcript");
    }
    debug!(?features, "extracted main features");
    write_atomic(&out, &render_main_features(&features))?;
    Ok(StageReport::completed(format!("Main features extracted: {}; saved in {}", features.len(), out.display())))
}

pub async fn detail_main(ctx: &PipelineContext) -> Result<StageReport> {
    let titles = main_titles(ctx)?;
    let transcript = transcript_for(ctx)?;
    for c in find_collisions(titles.iter().map(String::as_str)) {
        warn!(slug = %c.slug, titles = ?c.titles, "main features share a folder");
    }

    let mut counts = OutcomeCounts::default();
    for title in &titles {
        let path = ctx.main_detail_path(title);
        if path.exists() {
            debug!(feature = %title, "main detail exists; skipping");
            counts.skipped += 1;
            continue;
        }
        match write_main_detail(ctx, title, &transcript, &path).await {
            Ok(()) => {
                info!(feature = %title, path = %path.display(), "saved main feature details");
                counts.written += 1;
            }
            Err(e) => {
                error!(feature = %title, error = %format!("{e:#}"), "main feature failed");
                counts.failed += 1;
            }
        }
    }
    Ok(StageReport::from_counts(
        counts,
        format!(
            "Main feature details: {} written, {} skipped, {} failed under {}",
            counts.written, counts.skipped, counts.failed, ctx.meeting_dir.display()
        ),
    ))
}

async fn write_main_detail(ctx: &PipelineContext, title: &str, transcript: &str, path: &Path) -> Result<()> {
    let FeatureDetails { details } = infer_structured(
        ctx.inference.as_ref(),
        ModelRole::DetailMain,
        prompts::DETAIL_MAIN,
        prompts::main_detail_request(transcript, title),
    )
    .await?;
    write_atomic(path, &render_main_detail(title, &details))?;
    Ok(())
}

/// Append one main feature's outline chunk, opening the file with its header when new.
fn append_sub_features(path: &Path, chunk: &str) -> Result<()> {
    if let Some(dir) = path.parent() { fs::create_dir_all(dir)?; }
    let mut f = fs::OpenOptions::new().create(true).append(true).open(path)
        .with_context(|| format!("open {}", path.display()))?;
    if f.metadata()?.len() == 0 {
        f.write_all(SUB_FEATURES_HEADER.as_bytes())?;
    }
    f.write_all(chunk.as_bytes())?;
    f.flush()?;
    Ok(())
}

/// Outline text for one main feature. The heading is always `N) title` for the
/// requested feature; headings in the model output are dropped so the next run
/// and DetailSub find the feature under its own slug.
fn sub_features_chunk(index: usize, title: &str, lines: &[String]) -> String {
    let mut chunk = format!("{index}) {title}\n");
    for line in lines {
        if line.trim().is_empty() || outline::is_main_feature_line(line) {
            continue;
        }
        chunk.push_str(line.trim_end());
        chunk.push('\n');
    }
    chunk.push('\n');
    chunk
}

pub async fn extract_sub(ctx: &PipelineContext) -> Result<StageReport> {
    let titles = main_titles(ctx)?;
    let out = ctx.sub_features_path();
    let existing = if out.exists() {
        fs::read_to_string(&out).with_context(|| format!("read {}", out.display()))?
    } else {
        String::new()
    };
    let done = outline::parse(&existing);
    let done_slugs: Vec<String> = done.iter().map(|f| slugify(&f.title)).collect();
    info!(features = titles.len(), already_done = done.len(), "extracting sub-features");

    let mut counts = OutcomeCounts::default();
    let mut missing = 0usize;
    for (i, title) in titles.iter().enumerate() {
        let index = i + 1;
        if done_slugs.contains(&slugify(title)) {
            debug!(feature = %title, "sub-features already extracted; skipping");
            counts.skipped += 1;
            continue;
        }
        let detail = ctx.main_detail_path(title);
        if !detail.exists() {
            warn!(feature = %title, path = %detail.display(), "no main feature details; skipping");
            missing += 1;
            continue;
        }
        let result: Result<()> = async {
            let feature_text = fs::read_to_string(&detail).with_context(|| format!("read {}", detail.display()))?;
            let HierarchicalFeatures { features } = infer_structured(
                ctx.inference.as_ref(),
                ModelRole::ExtractSub,
                prompts::EXTRACT_SUB,
                prompts::sub_features_request(&feature_text, index, title),
            )
            .await?;
            append_sub_features(&out, &sub_features_chunk(index, title, &features))
        }
        .await;
        match result {
            Ok(()) => {
                info!(feature = %title, path = %out.display(), "appended sub-features");
                counts.written += 1;
            }
            Err(e) => {
                error!(feature = %title, error = %format!("{e:#}"), "sub-feature extraction failed");
                counts.failed += 1;
            }
        }
    }
    Ok(StageReport::from_counts(
        counts,
        format!(
            "Sub-features: {} extracted, {} already present, {} without details, {} failed; saved in {}",
            counts.written, counts.skipped, missing, counts.failed, out.display()
        ),
    )
    .with_missing(missing))
}

pub async fn detail_sub(ctx: &PipelineContext) -> Result<StageReport> {
    let path = ctx.sub_features_path();
    if !path.exists() {
        bail!(MissingInput::File(path));
    }
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let outline = outline::parse(&text);
    if outline.orphaned_lines > 0 {
        warn!(count = outline.orphaned_lines, "outline lines before any main feature were dropped");
    }
    for c in outline.slug_collisions() {
        warn!(slug = %c.slug, titles = ?c.titles, "main features share a folder");
    }

    let max_indent = ctx.config.top_level_max_indent();
    let mut counts = OutcomeCounts::default();
    let mut missing = 0usize;
    for node in outline.iter() {
        let detail = ctx.main_detail_path(&node.title);
        if !detail.exists() {
            warn!(feature = %node.title, "no main feature details; skipping");
            missing += 1;
            continue;
        }
        if node.children.is_empty() {
            debug!(feature = %node.title, "no sub-features");
            continue;
        }
        let context = match fs::read_to_string(&detail) {
            Ok(t) => t,
            Err(e) => {
                warn!(feature = %node.title, error = %e, "cannot read main feature details; skipping");
                missing += 1;
                continue;
            }
        };
        let blocks = segment(&node.children, max_indent);
        for c in block_collisions(&blocks) {
            warn!(feature = %node.title, slug = %c.slug, titles = ?c.titles, "blocks share a detail file");
        }
        let outcomes = process_blocks(&node.title, &context, &blocks, &ctx.main_folder(&node.title), ctx.inference.as_ref()).await;
        counts.add(OutcomeCounts::tally(&outcomes));
    }
    Ok(StageReport::from_counts(
        counts,
        format!(
            "Sub-feature details: {} written, {} skipped, {} failed, {} features without details; under {}",
            counts.written, counts.skipped, counts.failed, missing, ctx.meeting_dir.display()
        ),
    )
    .with_missing(missing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_underlined_by_title_length() {
        assert_eq!(render_summary("Demo", "ok"), format!("Meeting: Demo\n{}\n\nok", "=".repeat(13)));
        assert_eq!(render_main_detail("Login", "x"), format!("Main Feature: Login\n{}\n\nx", "=".repeat(20)));
    }

    #[test]
    fn chunk_keeps_model_outline() {
        let lines = vec!["1) Login".to_string(), "   - Email".to_string()];
        assert_eq!(sub_features_chunk(1, "Login", &lines), "1) Login\n   - Email\n\n");
    }

    #[test]
    fn chunk_replaces_reworded_headings() {
        let lines = vec!["1) Login".to_string(), "   - Email".to_string(), "2) Sessions".to_string(), "   - Expiry".to_string()];
        let chunk = sub_features_chunk(1, "User Login", &lines);
        assert_eq!(chunk, "1) User Login\n   - Email\n   - Expiry\n\n");
        let parsed = outline::parse(&chunk);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.features[0].title, "User Login");
    }

    #[test]
    fn chunk_adds_missing_header_line() {
        assert_eq!(sub_features_chunk(2, "Billing", &[]), "2) Billing\n\n");
        let lines = vec!["- Invoices".to_string()];
        assert_eq!(sub_features_chunk(2, "Billing", &lines), "2) Billing\n- Invoices\n\n");
    }
}
