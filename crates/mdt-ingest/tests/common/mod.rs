//! Shared helpers for mdt-ingest integration tests
//!
//! Every external service (CIP API, CellBase, PanelApp) is served by one
//! wiremock server; the store is a [`MemoryStore`].

#![allow(dead_code)]

use mdt_ingest::annotation::CellBaseClient;
use mdt_ingest::config::IngestConfig;
use mdt_ingest::orchestrator::BatchOrchestrator;
use mdt_ingest::panels::PanelAppClient;
use mdt_ingest::source::CipClient;
use mdt_ingest::store::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "test-token";
pub const CELLBASE_PATH: &str = "/webservices/rest/v4/hsapiens/genomic/variant/annotation";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mdt_ingest=debug")
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn raredisease_case() -> Value {
    serde_json::from_str(include_str!("../fixtures/raredisease_case.json")).unwrap()
}

pub fn cancer_case() -> Value {
    serde_json::from_str(include_str!("../fixtures/cancer_case.json")).unwrap()
}

pub fn listing_item(request_id: &str, sample_type: &str, status: &str, proband: &str) -> Value {
    json!({
        "interpretation_request_id": request_id,
        "sample_type": sample_type,
        "last_status": status,
        "proband": proband,
        "sites": []
    })
}

fn consequence(gene: &str, symbol: &str, transcript: &str, effect: &str) -> Value {
    json!({
        "geneName": symbol,
        "ensemblGeneId": gene,
        "ensemblTranscriptId": transcript,
        "strand": "-",
        "transcriptAnnotationFlags": ["basic", "canonical"],
        "sequenceOntologyTerms": [{"accession": "SO:0001583", "name": effect}],
        "proteinVariantAnnotation": {
            "proteinId": transcript.replace("ENST", "ENSP"),
            "substitutionScores": [
                {"score": 0.01, "source": "sift", "description": "deleterious"},
                {"score": 0.99, "source": "polyphen", "description": "probably damaging"}
            ]
        }
    })
}

/// Annotation results for every variant the fixtures can produce
pub fn cellbase_response() -> Value {
    json!({"response": [
        {
            "id": "2:166848646:G:A",
            "result": [{
                "consequenceTypes": [
                    consequence("ENSG00000144285", "SCN1A", "ENST00000303395", "missense_variant"),
                    {"geneName": "SCN1A", "sequenceOntologyTerms": []}
                ],
                "hgvs": ["ENST00000303395(SCN1A):c.5347G>A"],
                "populationFrequencies": [{"altAlleleFreq": 0.0001}]
            }]
        },
        {
            "id": "X:153296777:C:T",
            "result": [{
                "consequenceTypes": [
                    consequence("ENSG00000169057", "MECP2", "ENST00000303391", "stop_gained")
                ],
                "hgvs": ["ENST00000303391(MECP2):c.502C>T"]
            }]
        },
        {
            "id": "17:7674220:C:T",
            "result": [{
                "consequenceTypes": [
                    consequence("ENSG00000141510", "TP53", "ENST00000269305", "missense_variant")
                ]
            }]
        }
    ]})
}

pub fn panel_response() -> Value {
    json!({"result": {
        "version": "1.2",
        "SpecificDiseaseName": "Epileptic encephalopathy",
        "DiseaseGroup": "Neurology and neurodevelopmental disorders",
        "DiseaseSubGroup": "Epilepsy",
        "Genes": [
            {"GeneSymbol": "SCN1A", "EnsembleGeneIds": ["ENSG00000144285"], "LevelOfConfidence": "HighEvidence"},
            {"GeneSymbol": "MECP2", "EnsembleGeneIds": "E", "LevelOfConfidence": "HighEvidence"}
        ]
    }})
}

// ============================================================================
// Mock services
// ============================================================================

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/get-token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": TOKEN})))
        .mount(server)
        .await;
}

pub async fn mount_listing(server: &MockServer, items: Vec<Value>) {
    let count = items.len();
    Mock::given(method("GET"))
        .and(path("/interpretation-request"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": count,
            "next": null,
            "results": items
        })))
        .mount(server)
        .await;
}

pub async fn mount_case(server: &MockServer, ir_id: &str, version: &str, document: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/interpretation-request/{}/{}", ir_id, version)))
        .respond_with(ResponseTemplate::new(200).set_body_json(document))
        .mount(server)
        .await;
}

pub async fn mount_cellbase(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(CELLBASE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(cellbase_response()))
        .mount(server)
        .await;
}

pub async fn mount_panelapp(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/get_panel/245/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(panel_response()))
        .mount(server)
        .await;
}

/// Token, CellBase and PanelApp; listings and cases are mounted per test
pub async fn start_services() -> MockServer {
    init_tracing();
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_cellbase(&server).await;
    mount_panelapp(&server).await;
    server
}

pub fn config(server: &MockServer) -> IngestConfig {
    IngestConfig::builder()
        .cip(server.uri(), "mdt", "secret")
        .cellbase_url(server.uri())
        .panelapp_url(server.uri())
        .max_retries(2)
        .retry_base_delay_ms(1)
        .timeout_secs(5)
        .build()
}

pub fn orchestrator(config: &IngestConfig, store: &MemoryStore) -> BatchOrchestrator {
    BatchOrchestrator::new(
        Arc::new(CipClient::new(&config.cip, &config.http).unwrap()),
        Arc::new(store.clone()),
        Arc::new(CellBaseClient::new(&config.cellbase, &config.http).unwrap()),
        Arc::new(PanelAppClient::new(&config.panelapp, &config.http).unwrap()),
        config.pipeline.clone(),
    )
}
