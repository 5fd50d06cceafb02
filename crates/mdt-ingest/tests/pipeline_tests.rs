//! End-to-end orchestrator runs against mocked services and the memory store

mod common;

use common::*;
use mdt_common::SampleType;
use mdt_ingest::config::LabKeyConfig;
use mdt_ingest::demographics::LabKeyClient;
use mdt_ingest::orchestrator::RunOptions;
use mdt_ingest::store::{schema, KeyValue, MemoryStore};
use mdt_ingest::summary::CaseState;
use mdt_ingest::ErrorCategory;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn raredisease() -> RunOptions {
    RunOptions::new(SampleType::RareDisease)
}

async fn single_case_server() -> MockServer {
    let server = start_services().await;
    mount_listing(
        &server,
        vec![listing_item("1001-1", "raredisease", "report_generated", "P1001")],
    )
    .await;
    mount_case(&server, "1001", "1", raredisease_case()).await;
    server
}

#[tokio::test]
async fn test_new_case_is_added() {
    let server = single_case_server().await;
    let store = MemoryStore::new();

    let summary = orchestrator(&config(&server), &store)
        .run(&raredisease())
        .await
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.listed, 1);
    assert_eq!(summary.added, 1);
    assert_eq!(summary.failed, 0, "{:?}", summary.failures);
    assert_eq!(summary.reports_added.get("1001-1"), Some(&1));

    assert_eq!(store.count(&schema::GEL_INTERPRETATION_REPORT).await, 1);
    assert_eq!(store.count(&schema::PROBAND_VARIANT).await, 2);
    assert_eq!(store.count(&schema::TRANSCRIPT).await, 2);
    assert_eq!(store.count(&schema::GENE).await, 2);
    assert_eq!(store.count(&schema::REPORT_EVENT).await, 2);
    assert_eq!(store.count(&schema::PV_FLAG).await, 2);

    let runs = store.runs().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].added, 1);
}

#[tokio::test]
async fn test_unchanged_case_is_skipped_on_rerun() {
    let server = single_case_server().await;
    let store = MemoryStore::new();
    let orchestrator = orchestrator(&config(&server), &store);

    orchestrator.run(&raredisease()).await.unwrap();
    let before = store.snapshot().await;

    let summary = orchestrator.run(&raredisease()).await.unwrap();

    assert_eq!(summary.added, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(store.snapshot().await, before);
    assert_eq!(store.runs().await.len(), 2);
}

#[tokio::test]
async fn test_changed_case_appends_report_version() {
    let server = single_case_server().await;
    let store = MemoryStore::new();
    let config = config(&server);

    orchestrator(&config, &store).run(&raredisease()).await.unwrap();

    let mut changed = raredisease_case();
    changed["status"]
        .as_array_mut()
        .unwrap()
        .push(json!({"status": "report_sent", "created_at": "2018-03-01T10:00:00Z", "user": "gel"}));
    server.reset().await;
    mount_token(&server).await;
    mount_cellbase(&server).await;
    mount_panelapp(&server).await;
    mount_listing(
        &server,
        vec![listing_item("1001-1", "raredisease", "report_sent", "P1001")],
    )
    .await;
    mount_case(&server, "1001", "1", changed).await;

    let summary = orchestrator(&config, &store).run(&raredisease()).await.unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.reports_updated.get("1001-1"), Some(&2));
    assert_eq!(store.count(&schema::GEL_INTERPRETATION_REPORT).await, 2);
    assert_eq!(store.count(&schema::VARIANT).await, 2);
    assert_eq!(store.count(&schema::FAMILY).await, 1);
}

#[tokio::test]
async fn test_failed_cases_do_not_abort_batch() {
    let server = start_services().await;
    mount_listing(
        &server,
        vec![
            listing_item("1001-1", "raredisease", "report_generated", "P1001"),
            listing_item("1002-1", "raredisease", "report_generated", "P1002"),
            listing_item("1003-1", "raredisease", "report_generated", "P1003"),
        ],
    )
    .await;
    mount_case(&server, "1001", "1", raredisease_case()).await;

    let mut broken = raredisease_case();
    broken["interpretation_request_id"] = json!("1002");
    broken.as_object_mut().unwrap().remove("interpretation_request_data");
    mount_case(&server, "1002", "1", broken).await;
    // 1003 is not mounted: the source answers 404

    let store = MemoryStore::new();
    let summary = orchestrator(&config(&server), &store)
        .run(&raredisease())
        .await
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.added, 1);
    assert_eq!(summary.failed, 2);

    let broken = &summary.failures["1002-1"];
    assert_eq!(broken.category, ErrorCategory::DataIntegrity);
    assert_eq!(broken.state, CaseState::Hashed);

    let missing = &summary.failures["1003-1"];
    assert_eq!(missing.category, ErrorCategory::TransientFetch);
    assert_eq!(missing.state, CaseState::Fetched);
}

#[tokio::test]
async fn test_annotation_failure_fails_only_that_build() {
    let server = start_services().await;
    Mock::given(method("POST"))
        .and(path(CELLBASE_PATH))
        .and(query_param("assembly", "GRCh38"))
        .respond_with(ResponseTemplate::new(503))
        .with_priority(1)
        .mount(&server)
        .await;

    let mut grch38 = raredisease_case();
    grch38["interpretation_request_id"] = json!("1004");
    grch38["interpretation_request_data"]["json_request"]["genomeAssemblyVersion"] = json!("GRCh38");
    grch38["interpretation_request_data"]["json_request"]["pedigree"]["familyId"] = json!("FAM1004");

    mount_listing(
        &server,
        vec![
            listing_item("1001-1", "raredisease", "report_generated", "P1001"),
            listing_item("1004-1", "raredisease", "report_generated", "P1004"),
        ],
    )
    .await;
    mount_case(&server, "1001", "1", raredisease_case()).await;
    mount_case(&server, "1004", "1", grch38).await;

    let store = MemoryStore::new();
    let summary = orchestrator(&config(&server), &store)
        .run(&raredisease())
        .await
        .unwrap();

    assert_eq!(summary.added, 1);
    assert_eq!(summary.reports_added.keys().collect::<Vec<_>>(), vec!["1001-1"]);
    let failure = &summary.failures["1004-1"];
    assert_eq!(failure.category, ErrorCategory::TransientFetch);
    assert_eq!(failure.state, CaseState::Annotating);
    assert_eq!(store.count(&schema::GEL_INTERPRETATION_REPORT).await, 1);
}

#[tokio::test]
async fn test_authentication_failure_is_fatal() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/get-token/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let err = orchestrator(&config(&server), &store)
        .run(&raredisease())
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Fatal);
    let runs = store.runs().await;
    assert_eq!(runs.len(), 1);
    assert!(!runs[0].success);
    assert!(runs[0].error.is_some());
    assert_eq!(runs[0].processed(), 0);
}

#[tokio::test]
async fn test_case_still_unauthorized_after_refresh_aborts_run() {
    let server = start_services().await;
    mount_listing(
        &server,
        vec![listing_item("1001-1", "raredisease", "report_generated", "P1001")],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/interpretation-request/1001/1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let err = orchestrator(&config(&server), &store)
        .run(&raredisease())
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Fatal);
    let runs = store.runs().await;
    assert_eq!(runs.len(), 1);
    assert!(!runs[0].success);
    assert!(runs[0].error.as_deref().unwrap().contains("unauthorized"));
    assert_eq!(store.count(&schema::GEL_INTERPRETATION_REPORT).await, 0);
}

#[tokio::test]
async fn test_listing_failure_is_fatal() {
    init_tracing();
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/interpretation-request"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let err = orchestrator(&config(&server), &store)
        .run(&raredisease())
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(!store.runs().await[0].success);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let server = single_case_server().await;
    let store = MemoryStore::new();
    let mut options = raredisease();
    options.dry_run = true;

    let summary = orchestrator(&config(&server), &store)
        .run(&options)
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.added, 1);
    assert_eq!(store.count(&schema::FAMILY).await, 0);
    assert!(store.runs().await.is_empty());
}

#[tokio::test]
async fn test_committed_case_is_archived() {
    let server = single_case_server().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&server);
    config.pipeline.archive_dir = Some(dir.path().to_path_buf());

    let store = MemoryStore::new();
    orchestrator(&config, &store).run(&raredisease()).await.unwrap();

    let text = std::fs::read_to_string(dir.path().join("1001-1-1.json")).unwrap();
    let archived: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(archived, raredisease_case());
}

#[tokio::test]
async fn test_single_sample_targeting() {
    let server = start_services().await;
    mount_listing(
        &server,
        vec![
            listing_item("1001-1", "raredisease", "report_generated", "P1001"),
            listing_item("1002-1", "raredisease", "report_generated", "P1002"),
        ],
    )
    .await;
    mount_case(&server, "1001", "1", raredisease_case()).await;

    let store = MemoryStore::new();
    let mut options = raredisease();
    options.sample = Some("P1001".to_string());

    let summary = orchestrator(&config(&server), &store)
        .run(&options)
        .await
        .unwrap();

    assert_eq!(summary.listed, 1);
    assert_eq!(summary.added, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_pull_t3_includes_tier_three_variants() {
    let server = single_case_server().await;
    let store = MemoryStore::new();
    let mut options = raredisease();
    options.pull_t3 = true;

    orchestrator(&config(&server), &store)
        .run(&options)
        .await
        .unwrap();

    assert_eq!(store.count(&schema::PROBAND_VARIANT).await, 3);
}

#[tokio::test]
async fn test_cancer_case_is_ingested() {
    let server = start_services().await;
    mount_listing(
        &server,
        vec![listing_item("2002-1", "cancer", "interpretation_generated", "C2002")],
    )
    .await;
    mount_case(&server, "2002", "1", cancer_case()).await;

    let store = MemoryStore::new();
    let summary = orchestrator(&config(&server), &store)
        .run(&RunOptions::new(SampleType::Cancer))
        .await
        .unwrap();

    assert_eq!(summary.added, 1, "{:?}", summary.failures);
    assert_eq!(store.count(&schema::PANEL).await, 0);
    assert_eq!(store.count(&schema::RELATIVE).await, 0);

    let variants = store.rows(&schema::PROBAND_VARIANT).await;
    assert_eq!(variants.len(), 1);
    let somatic = schema::PROBAND_VARIANT.column_index("somatic").unwrap();
    assert_eq!(variants[0].1.values[somatic], mdt_ingest::store::Value::Bool(Some(true)));
}

#[tokio::test]
async fn test_demographics_enrich_proband() {
    let server = single_case_server().await;
    Mock::given(method("GET"))
        .and(path("/labkey/main/query-selectRows.api"))
        .and(query_param("query.queryName", "participant_identifier"))
        .and(query_param("query.participant_id~in", "P1001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": [{
            "forenames": "Alex",
            "surname": "Smith",
            "date_of_birth": "2009/03/14 00:00:00"
        }]})))
        .with_priority(1)
        .mount(&server)
        .await;
    // Every other lookup fails and falls back to placeholders
    Mock::given(method("GET"))
        .and(path("/labkey/main/query-selectRows.api"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = config(&server);
    let labkey = LabKeyConfig {
        base_url: format!("{}/labkey", server.uri()),
        containers: vec!["main".to_string()],
    };
    let store = MemoryStore::new();
    let orchestrator = orchestrator(&config, &store)
        .with_demographics(Arc::new(LabKeyClient::new(&labkey, &config.http).unwrap()));

    let summary = orchestrator.run(&raredisease()).await.unwrap();
    assert_eq!(summary.added, 1, "{:?}", summary.failures);

    let probands = store.rows(&schema::PROBAND).await;
    let row = &probands[0].1;
    let surname = schema::PROBAND.column_index("surname").unwrap();
    let dob = schema::PROBAND.column_index("date_of_birth").unwrap();
    assert_eq!(row.values[surname].as_text(), Some("Smith"));
    assert_eq!(row.values[dob].as_text(), Some("2009-03-14"));

    let clinicians = store.rows(&schema::CLINICIAN).await;
    assert_eq!(clinicians[0].1.key[0], KeyValue::Text("unknown".to_string()));
}

#[tokio::test]
async fn test_cases_in_one_batch_share_genes() {
    let server = start_services().await;
    let sibling: serde_json::Value =
        serde_json::from_str(&raredisease_case().to_string().replace("1001", "1005")).unwrap();
    mount_listing(
        &server,
        vec![
            listing_item("1001-1", "raredisease", "report_generated", "P1001"),
            listing_item("1005-1", "raredisease", "report_generated", "P1005"),
        ],
    )
    .await;
    mount_case(&server, "1001", "1", raredisease_case()).await;
    mount_case(&server, "1005", "1", sibling).await;

    let store = MemoryStore::new();
    let summary = orchestrator(&config(&server), &store)
        .run(&raredisease())
        .await
        .unwrap();

    assert_eq!(summary.added, 2, "{:?}", summary.failures);
    assert_eq!(store.count(&schema::FAMILY).await, 2);
    assert_eq!(store.count(&schema::GENE).await, 2);
    assert_eq!(store.count(&schema::TRANSCRIPT).await, 2);
    assert_eq!(store.count(&schema::VARIANT).await, 2);
    assert_eq!(store.count(&schema::TRANSCRIPT_VARIANT).await, 2);
    assert_eq!(store.count(&schema::PROBAND_VARIANT).await, 4);
}
