//! Case persistence
//!
//! A case is written as a graph of entities, each resolved by natural key in
//! dependency order inside the caller's transaction. Reference data (genes,
//! panels, variants, transcripts) is shared across cases and never
//! duplicated; each ingest appends a new report version under the family.

mod engine;
mod entities;
mod resolvers;

pub use engine::{Entity, Resolved, UpsertEngine};
pub use entities::*;
pub use resolvers::{
    resolvers, CaseInput, CasePanel, ResolveContext, Resolver, ResolverStats, GENOME_BUILD_TOOL,
};

use crate::error::Result;
use crate::store::StoreTx;
use tracing::{debug, info};

/// Gene natural key: the Ensembl id when known, else the HGNC symbol
pub fn gene_key(ensembl_id: Option<&str>, symbol: &str) -> String {
    match ensembl_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => format!("HGNC:{}", symbol.trim()),
    }
}

/// Run every resolver for one case. Nothing is committed here; the caller
/// owns the transaction.
pub async fn upsert_case(tx: &mut dyn StoreTx, input: &CaseInput<'_>) -> Result<ResolveContext> {
    let case_id = input.case.request_id.as_str();
    let mut ctx = ResolveContext::new(case_id);

    for resolver in resolvers() {
        debug!(case_id, kind = resolver.kind(), "Resolving");
        resolver.resolve(&mut *tx, input, &mut ctx).await?;
    }

    let created: u64 = ctx.stats.iter().map(|s| s.created).sum();
    let reused: u64 = ctx.stats.iter().map(|s| s.reused).sum();
    info!(
        case_id,
        archived_version = ctx.archived_version,
        created,
        reused,
        skipped = ctx.skipped.len(),
        "Case upserted"
    );
    Ok(ctx)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::annotation::{
        AnnotationJoin, AnnotationOutcome, AnnotationService, TaggedVariant, TranscriptAnnotation,
        VariantAnnotation, VariantKey,
    };
    use crate::case::{CaseDocument, ParseOptions};
    use crate::demographics::CaseDemographics;
    use crate::panels::{PanelGene, PanelInfo};
    use crate::store::{schema, MemoryStore, Store};
    use async_trait::async_trait;
    use mdt_common::GenomeBuild;
    use std::collections::HashMap;
    use std::sync::Arc;

    const RARE_DISEASE_CASE: &str = include_str!("../../tests/fixtures/raredisease_case.json");

    /// One canonical transcript per variant, all on one gene, without genomic HGVS
    struct OneTranscript {
        gene_ensembl_id: &'static str,
        gene_name: &'static str,
    }

    const SCN1A: OneTranscript = OneTranscript {
        gene_ensembl_id: "ENSG00000144285",
        gene_name: "SCN1A",
    };

    #[async_trait]
    impl AnnotationService for OneTranscript {
        async fn annotate(
            &self,
            _build: GenomeBuild,
            keys: &[VariantKey],
        ) -> Result<HashMap<VariantKey, VariantAnnotation>> {
            Ok(keys
                .iter()
                .map(|k| {
                    let transcript = TranscriptAnnotation {
                        gene_ensembl_id: self.gene_ensembl_id.into(),
                        gene_name: self.gene_name.into(),
                        transcript: "ENST00000303395".into(),
                        strand: "-".into(),
                        canonical: true,
                        protein: Some("ENSP00000303540".into()),
                        effect: "missense_variant".into(),
                        sift: Some("deleterious(0.01)".into()),
                        polyphen: None,
                        hgvs_c: None,
                        hgvs_p: None,
                        hgvs_g: None,
                        af_max: Some(0.0),
                    };
                    (
                        k.clone(),
                        VariantAnnotation {
                            transcripts: vec![transcript],
                            dropped: 0,
                        },
                    )
                })
                .collect())
        }
    }

    fn case() -> CaseDocument {
        let raw = serde_json::from_str(RARE_DISEASE_CASE).unwrap();
        CaseDocument::parse(raw, &ParseOptions::default()).unwrap()
    }

    fn panels(case: &CaseDocument) -> Vec<CasePanel> {
        let info = PanelInfo {
            panel_id: "245".into(),
            version: "1.2".into(),
            name: Some("Epileptic encephalopathy".into()),
            disease_group: Some("Neurology".into()),
            disease_subgroup: None,
            genes: vec![
                PanelGene {
                    symbol: "SCN1A".into(),
                    ensembl_id: Some("ENSG00000144285".into()),
                    level_of_confidence: Some("HighEvidence".into()),
                },
                PanelGene {
                    symbol: "MECP2".into(),
                    ensembl_id: None,
                    level_of_confidence: Some("HighEvidence".into()),
                },
            ],
        };
        vec![CasePanel {
            reference: case.panels[0].clone(),
            info: Arc::new(info),
        }]
    }

    async fn annotations(case: &CaseDocument) -> AnnotationOutcome {
        annotations_from(case, &SCN1A).await
    }

    async fn annotations_from(case: &CaseDocument, service: &OneTranscript) -> AnnotationOutcome {
        let tagged: Vec<TaggedVariant> = case
            .variants
            .iter()
            .map(|v| TaggedVariant {
                case_id: case.request_id.clone(),
                build: case.genome_build,
                identity: v.identity.clone(),
            })
            .collect();
        AnnotationJoin::new(service).annotate(&tagged).await
    }

    async fn ingest(store: &MemoryStore, case: &CaseDocument, outcome: &AnnotationOutcome) -> ResolveContext {
        let demographics = CaseDemographics::default();
        let panels = panels(case);
        let input = CaseInput {
            case,
            demographics: &demographics,
            panels: &panels,
            annotations: outcome,
        };
        let mut tx = store.begin().await.unwrap();
        let ctx = upsert_case(tx.as_mut(), &input).await.unwrap();
        tx.commit().await.unwrap();
        ctx
    }

    #[test]
    fn test_gene_key() {
        assert_eq!(gene_key(Some("ENSG01"), "BRCA1"), "ENSG01");
        assert_eq!(gene_key(Some(" "), "BRCA1"), "HGNC:BRCA1");
        assert_eq!(gene_key(None, "BRCA1"), "HGNC:BRCA1");
    }

    #[tokio::test]
    async fn test_upsert_writes_case_graph() {
        let store = MemoryStore::new();
        let case = case();
        let outcome = annotations(&case).await;

        let ctx = ingest(&store, &case, &outcome).await;

        assert_eq!(ctx.archived_version, Some(1));
        assert_eq!(store.count(&schema::FAMILY).await, 1);
        assert_eq!(store.count(&schema::PHENOTYPE).await, 2);
        assert_eq!(store.count(&schema::RELATIVE).await, 2);
        assert_eq!(store.count(&schema::GENE).await, 2);
        assert_eq!(store.count(&schema::PANEL_VERSION_GENE).await, 2);
        assert_eq!(store.count(&schema::TRANSCRIPT).await, 1);
        assert_eq!(store.count(&schema::VARIANT).await, 2);
        assert_eq!(store.count(&schema::TRANSCRIPT_VARIANT).await, 2);
        assert_eq!(store.count(&schema::GEL_INTERPRETATION_REPORT).await, 1);
        assert_eq!(store.count(&schema::PROBAND_VARIANT).await, 2);
        assert_eq!(store.count(&schema::PV_FLAG).await, 2);
        assert_eq!(store.count(&schema::PROBAND_TRANSCRIPT_VARIANT).await, 2);
        assert_eq!(store.count(&schema::REPORT_EVENT).await, 2);
        assert!(ctx.skipped.is_empty(), "{:?}", ctx.skipped);
    }

    #[tokio::test]
    async fn test_missing_genomic_hgvs_uses_reported_alleles() {
        let store = MemoryStore::new();
        let case = case();
        let outcome = annotations(&case).await;
        ingest(&store, &case, &outcome).await;

        let column = schema::TRANSCRIPT_VARIANT.column_index("hgvs_g").unwrap();
        let mut stored: Vec<String> = store
            .rows(&schema::TRANSCRIPT_VARIANT)
            .await
            .iter()
            .filter_map(|(_, row)| row.values[column].as_text().map(String::from))
            .collect();
        stored.sort();
        let mut expected: Vec<String> = case.variants.iter().map(|v| v.identity.genomic_hgvs()).collect();
        expected.sort();
        assert_eq!(stored, expected);
    }

    #[tokio::test]
    async fn test_report_events_link_panel_and_gene() {
        let store = MemoryStore::new();
        let case = case();
        let outcome = annotations(&case).await;
        let ctx = ingest(&store, &case, &outcome).await;

        let events = store.rows(&schema::REPORT_EVENT).await;
        let panel_column = schema::REPORT_EVENT.column_index("panel_version_id").unwrap();
        let gene_column = schema::REPORT_EVENT.column_index("gene_id").unwrap();
        for (_, row) in &events {
            assert_ne!(row.values[panel_column], crate::store::Value::Int(None));
            assert_ne!(row.values[gene_column], crate::store::Value::Int(None));
        }
        assert!(ctx.genes.contains_key("HGNC:MECP2"));
    }

    #[tokio::test]
    async fn test_symbol_only_panel_gene_joins_annotated_gene() {
        let store = MemoryStore::new();
        let case = case();
        let mecp2 = OneTranscript {
            gene_ensembl_id: "ENSG00000169057",
            gene_name: "MECP2",
        };
        let outcome = annotations_from(&case, &mecp2).await;

        let ctx = ingest(&store, &case, &outcome).await;

        // SCN1A from the panel, MECP2 once under its Ensembl id
        assert_eq!(store.count(&schema::GENE).await, 2);
        assert_eq!(store.count(&schema::PANEL_VERSION_GENE).await, 2);
        assert_eq!(ctx.genes.get("HGNC:MECP2"), ctx.genes.get("ENSG00000169057"));
        assert!(ctx.skipped.is_empty(), "{:?}", ctx.skipped);

        let name = schema::GENE.column_index("hgnc_name").unwrap();
        let mecp2_rows = store
            .rows(&schema::GENE)
            .await
            .into_iter()
            .filter(|(_, row)| row.values[name].as_text() == Some("MECP2"))
            .count();
        assert_eq!(mecp2_rows, 1);
    }

    #[tokio::test]
    async fn test_reingest_appends_report_version() {
        let store = MemoryStore::new();
        let case = case();
        let outcome = annotations(&case).await;

        ingest(&store, &case, &outcome).await;
        let second = ingest(&store, &case, &outcome).await;

        assert_eq!(second.archived_version, Some(2));
        assert_eq!(store.count(&schema::GEL_INTERPRETATION_REPORT).await, 2);
        assert_eq!(store.count(&schema::PROBAND_VARIANT).await, 4);
        // reference data is shared between versions
        assert_eq!(store.count(&schema::VARIANT).await, 2);
        assert_eq!(store.count(&schema::GENE).await, 2);
        assert_eq!(store.count(&schema::FAMILY).await, 1);
        assert_eq!(store.count(&schema::PROBAND).await, 1);
    }

    #[tokio::test]
    async fn test_missing_annotation_still_persists_variants() {
        let store = MemoryStore::new();
        let case = case();
        let outcome = AnnotationOutcome::default();

        let ctx = ingest(&store, &case, &outcome).await;

        assert_eq!(ctx.archived_version, Some(1));
        assert_eq!(store.count(&schema::TRANSCRIPT).await, 0);
        assert_eq!(store.count(&schema::PROBAND_VARIANT).await, 2);
    }

    #[tokio::test]
    async fn test_rolled_back_case_leaves_store_untouched() {
        let store = MemoryStore::new();
        let case = case();
        let outcome = annotations(&case).await;
        let demographics = CaseDemographics::default();
        let panels = panels(&case);
        let input = CaseInput {
            case: &case,
            demographics: &demographics,
            panels: &panels,
            annotations: &outcome,
        };

        let mut tx = store.begin().await.unwrap();
        upsert_case(tx.as_mut(), &input).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.count(&schema::FAMILY).await, 0);
        assert_eq!(store.count(&schema::VARIANT).await, 0);
    }
}
