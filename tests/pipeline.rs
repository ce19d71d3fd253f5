mod common;

use std::fs;
use tempfile::TempDir;

use common::{ScriptedInference, context, product_meeting};
use meeting_features::{
    config::ModelRole,
    error::InferenceError,
    pipeline::{Stage, StageStatus, run_pipeline, run_stage},
    store::TranscriptStore,
};

const TRANSCRIPT: &str = "Alice: we need login.\nBob: and billing with invoices.\n";

#[tokio::test]
async fn full_run_writes_every_artifact() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedInference::new(product_meeting);
    let ctx = context(dir.path(), "Weekly Sync", TRANSCRIPT, model.clone());

    let results = run_pipeline(&ctx, &Stage::ALL).await;
    assert_eq!(results.len(), 6);
    for r in &results {
        assert_eq!(r.status, StageStatus::Completed, "{r}");
    }
    assert_eq!(results.iter().map(|r| r.stage).collect::<Vec<_>>(), Stage::ALL.to_vec());

    let meeting = dir.path().join("out").join("Weekly_Sync");
    let store = TranscriptStore::load(&meeting.join("database.json")).unwrap();
    let rec = store.find_by_title("Weekly Sync").unwrap();
    assert_eq!(rec.text, TRANSCRIPT);
    assert_eq!(rec.summary.as_deref(), Some("We planned login and billing."));

    let summary = fs::read_to_string(meeting.join("Weekly_Sync_summary.txt")).unwrap();
    assert!(summary.starts_with("Meeting: Weekly Sync\n====================\n\n"));

    let main = fs::read_to_string(meeting.join("main_features.txt")).unwrap();
    assert_eq!(main, "Extracted Main Features:\n\n- User Login\n- Billing\n");

    let login = fs::read_to_string(meeting.join("user_login").join("user_login.txt")).unwrap();
    assert!(login.starts_with("Main Feature: User Login\n"));

    let subs = fs::read_to_string(meeting.join("sub_features.txt")).unwrap();
    assert!(subs.starts_with("Extracted Hierarchical Features:\n\n1) User Login\n"));
    assert!(subs.contains("2) Billing\n   - Invoices\n"));

    let email = fs::read_to_string(meeting.join("user_login").join("email_login.txt")).unwrap();
    assert!(email.contains("Feature Block:\n   - Email login\n      -- password hashing\n"));
    assert!(meeting.join("user_login").join("oauth.txt").exists());
    assert!(meeting.join("billing").join("invoices.txt").exists());
    assert!(!meeting.join("user_login").join("password_hashing.txt").exists());

    // summary + main + 2 details + 2 outlines + 3 blocks
    assert_eq!(model.call_count(), 9);
}

#[tokio::test]
async fn second_run_skips_without_calling_the_model() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedInference::new(product_meeting);
    let ctx = context(dir.path(), "Weekly Sync", TRANSCRIPT, model.clone());

    run_pipeline(&ctx, &Stage::ALL).await;
    let calls = model.call_count();
    let again = run_pipeline(&ctx, &Stage::ALL).await;

    assert_eq!(model.call_count(), calls);
    assert_eq!(again[0].status, StageStatus::Completed);
    for r in &again[1..] {
        assert_eq!(r.status, StageStatus::Skipped, "{r}");
    }
    let subs = fs::read_to_string(ctx.sub_features_path()).unwrap();
    assert_eq!(subs.matches("1) User Login").count(), 1);
}

#[tokio::test]
async fn missing_inputs_fail_each_stage_without_stopping() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedInference::new(product_meeting);
    let ctx = context(dir.path(), "Empty", TRANSCRIPT, model.clone());

    let stages = [Stage::Summarize, Stage::ExtractMain, Stage::DetailMain, Stage::ExtractSub, Stage::DetailSub];
    let results = run_pipeline(&ctx, &stages).await;
    assert_eq!(results.len(), stages.len());
    for r in &results {
        assert_eq!(r.status, StageStatus::Failed, "{r}");
    }
    assert!(results[1].message.contains("no transcript recorded"));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn unreadable_transcript_fails_save() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedInference::new(product_meeting);
    let mut ctx = context(dir.path(), "Weekly Sync", TRANSCRIPT, model);
    ctx.file_path = dir.path().join("nope.txt").to_string_lossy().into_owned();
    let r = run_stage(&ctx, Stage::Save).await;
    assert_eq!(r.status, StageStatus::Failed);
    assert!(r.message.contains("read transcript"));
}

#[tokio::test]
async fn one_failing_feature_leaves_the_others_done() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedInference::new(|req| {
        if req.role == ModelRole::DetailMain && req.prompt.ends_with("User Login") {
            return Err(InferenceError::Other("quota exceeded".into()));
        }
        product_meeting(req)
    });
    let ctx = context(dir.path(), "Weekly Sync", TRANSCRIPT, model);

    let results = run_pipeline(&ctx, &Stage::ALL).await;
    assert_eq!(results[3].stage, Stage::DetailMain);
    assert_eq!(results[3].status, StageStatus::Partial);
    assert!(!ctx.main_detail_path("User Login").exists());
    assert!(ctx.main_detail_path("Billing").exists());

    // only Billing has details to expand
    let subs = fs::read_to_string(ctx.sub_features_path()).unwrap();
    assert!(!subs.contains("User Login"));
    assert!(subs.contains("2) Billing"));
    assert!(ctx.main_folder("Billing").join("invoices.txt").exists());
}

#[tokio::test]
async fn extract_sub_appends_only_missing_features() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedInference::new(product_meeting);
    let ctx = context(dir.path(), "Weekly Sync", TRANSCRIPT, model.clone());
    run_pipeline(&ctx, &[Stage::Save, Stage::ExtractMain, Stage::DetailMain]).await;

    let partial = "Extracted Hierarchical Features:\n\n1) User Login\n   - Email login\n\n";
    fs::write(ctx.sub_features_path(), partial).unwrap();
    let before = model.call_count();

    let r = run_stage(&ctx, Stage::ExtractSub).await;
    assert_eq!(r.status, StageStatus::Completed, "{r}");
    assert_eq!(model.call_count(), before + 1);
    assert_eq!(model.roles().last(), Some(&ModelRole::ExtractSub));

    let subs = fs::read_to_string(ctx.sub_features_path()).unwrap();
    assert_eq!(subs, format!("{partial}2) Billing\n   - Invoices\n\n"));
}

#[tokio::test]
async fn detail_sub_resumes_after_a_crash() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedInference::new(product_meeting);
    let ctx = context(dir.path(), "Weekly Sync", TRANSCRIPT, model.clone());
    run_pipeline(&ctx, &Stage::ALL).await;

    let oauth = ctx.main_folder("User Login").join("oauth.txt");
    fs::remove_file(&oauth).unwrap();
    let before = model.call_count();

    let r = run_stage(&ctx, Stage::DetailSub).await;
    assert_eq!(r.status, StageStatus::Completed);
    assert_eq!(model.call_count(), before + 1);
    assert!(oauth.exists());
}

#[tokio::test]
async fn reworded_outline_heading_is_filed_under_the_requested_feature() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedInference::new(|req| {
        if req.role == ModelRole::ExtractSub && req.prompt.contains("1) User Login") {
            return Ok(serde_json::json!({ "features": ["1) Login", "   - Email login"] }));
        }
        product_meeting(req)
    });
    let ctx = context(dir.path(), "Weekly Sync", TRANSCRIPT, model.clone());

    let results = run_pipeline(&ctx, &Stage::ALL).await;
    for r in &results {
        assert_eq!(r.status, StageStatus::Completed, "{r}");
    }
    let subs = fs::read_to_string(ctx.sub_features_path()).unwrap();
    assert!(subs.contains("1) User Login\n   - Email login\n"));
    assert!(!subs.contains("1) Login"));
    assert!(ctx.main_folder("User Login").join("email_login.txt").exists());
    assert!(!dir.path().join("out").join("Weekly_Sync").join("login").exists());

    let calls = model.call_count();
    assert_eq!(run_stage(&ctx, Stage::ExtractSub).await.status, StageStatus::Skipped);
    assert_eq!(run_stage(&ctx, Stage::DetailSub).await.status, StageStatus::Skipped);
    assert_eq!(model.call_count(), calls);
    assert_eq!(fs::read_to_string(ctx.sub_features_path()).unwrap(), subs);
}

#[tokio::test]
async fn missing_main_details_make_detail_sub_partial() {
    let dir = TempDir::new().unwrap();
    let model = ScriptedInference::new(product_meeting);
    let ctx = context(dir.path(), "Weekly Sync", TRANSCRIPT, model.clone());
    run_pipeline(&ctx, &Stage::ALL).await;

    fs::remove_file(ctx.main_detail_path("Billing")).unwrap();
    let calls = model.call_count();

    let r = run_stage(&ctx, Stage::DetailSub).await;
    assert_eq!(r.status, StageStatus::Partial, "{r}");
    assert!(r.message.contains("1 features without details"));
    assert_eq!(model.call_count(), calls);
}
