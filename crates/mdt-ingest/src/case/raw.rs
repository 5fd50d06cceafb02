//! Wire shapes of a CIP interpretation request
//!
//! These mirror the upstream JSON closely and stay crate-private; the
//! validated [`CaseDocument`](super::CaseDocument) is built from them.

use crate::serde_helpers::{flexible_i64, null_default, optional_string_or_number, string_or_number};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub(crate) struct RawCase {
    #[serde(deserialize_with = "string_or_number")]
    pub interpretation_request_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,
    pub sample_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub status: Vec<RawStatus>,
    pub interpretation_request_data: RawRequestData,
    #[serde(default, deserialize_with = "null_default")]
    pub interpreted_genome: Vec<RawInterpretedGenome>,
    #[serde(default, deserialize_with = "null_default")]
    pub clinical_report: Vec<RawClinicalReport>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub case_priority: Option<String>,
    #[serde(default)]
    pub cip: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub family_id: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub proband: Option<String>,
    #[serde(default)]
    pub assembly: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub sites: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStatus {
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRequestData {
    pub json_request: Value,
}

// ============================================================================
// Rare disease request
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawRareDiseaseRequest {
    pub pedigree: RawPedigree,
    #[serde(rename = "TieredVariants", default, deserialize_with = "null_default")]
    pub tiered_variants: Vec<Value>,
    pub genome_assembly_version: String,
    /// `{panelName: {gene|"SUMMARY": {"{sample}_avg": x, "{sample}_gte15x": y}}}`
    #[serde(default)]
    pub gene_panels_coverage: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPedigree {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub family_id: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub participants: Vec<RawParticipant>,
    #[serde(default, deserialize_with = "null_default")]
    pub analysis_panels: Vec<RawPanel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawParticipant {
    #[serde(deserialize_with = "string_or_number")]
    pub gel_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub is_proband: bool,
    /// Sample ids as strings, or objects carrying `sampleId`
    #[serde(default, deserialize_with = "null_default")]
    pub samples: Vec<Value>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub affection_status: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub additional_information: HashMap<String, Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub hpo_term_list: Vec<RawHpoTerm>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawHpoTerm {
    pub term: String,
    #[serde(default)]
    pub term_presence: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPanel {
    pub panel_name: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub panel_version: Option<String>,
}

// ============================================================================
// Cancer request
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawCancerRequest {
    pub cancer_participant: RawCancerParticipant,
    #[serde(default, deserialize_with = "null_default")]
    pub tiered_variants: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawCancerParticipant {
    #[serde(deserialize_with = "string_or_number")]
    pub gel_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub matched_samples: Vec<RawMatchedSample>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub primary_diagnosis_disease: Value,
    #[serde(default)]
    pub primary_diagnosis_sub_disease: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawMatchedSample {
    #[serde(default)]
    pub tumour_sample_id: Option<String>,
}

// ============================================================================
// Variants
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawVariant {
    #[serde(deserialize_with = "string_or_number")]
    pub chromosome: String,
    #[serde(deserialize_with = "flexible_i64")]
    pub position: i64,
    pub reference: String,
    pub alternate: String,
    #[serde(rename = "dbSNPid", default)]
    pub db_snp_id: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub called_genotypes: Vec<RawGenotype>,
    #[serde(default, deserialize_with = "null_default")]
    pub report_events: Vec<RawReportEvent>,
    #[serde(default, deserialize_with = "null_default")]
    pub allele_origins: Vec<String>,
}

impl RawVariant {
    /// Cancer variants are wrapped in `reportedVariantCancer`, with allele
    /// origins sometimes left on the wrapper
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        let core = value.get("reportedVariantCancer").unwrap_or(value);
        let mut variant: RawVariant = serde_json::from_value(core.clone())?;

        if variant.allele_origins.is_empty() {
            if let Some(origins) = value.get("alleleOrigins") {
                variant.allele_origins = serde_json::from_value(origins.clone()).unwrap_or_default();
            }
        }
        Ok(variant)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawGenotype {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub gel_id: Option<String>,
    #[serde(default)]
    pub genotype: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawReportEvent {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub report_event_id: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub mode_of_inheritance: Option<String>,
    #[serde(default)]
    pub penetrance: Option<String>,
    #[serde(default)]
    pub panel_name: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub panel_version: Option<String>,
    #[serde(default)]
    pub genomic_feature: Option<RawGenomicFeature>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawGenomicFeature {
    #[serde(rename = "ensemblId", default)]
    pub ensembl_id: Option<String>,
    #[serde(rename = "HGNC", default)]
    pub hgnc: Option<String>,
}

// ============================================================================
// Flagged variant sources
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawInterpretedGenome {
    #[serde(default)]
    pub interpreted_genome_data: RawInterpretedGenomeData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawInterpretedGenomeData {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub reported_variants: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawClinicalReport {
    #[serde(default)]
    pub clinical_report_data: RawClinicalReportData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawClinicalReportData {
    #[serde(default, deserialize_with = "null_default")]
    pub candidate_variants: Vec<Value>,
}
