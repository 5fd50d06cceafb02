//! Annotation service responses and per-transcript extraction

use super::key::VariantKey;
use crate::error::{IngestError, Result};
use crate::serde_helpers::value_as_f64;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

const REQUIRED_FIELDS: [&str; 5] = [
    "ensemblGeneId",
    "geneName",
    "ensemblTranscriptId",
    "strand",
    "sequenceOntologyTerms",
];

/// Batch response: `{"response": [...]}` or the bare list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AnnotationResponse {
    Wrapped { response: Vec<QueryResult> },
    Bare(Vec<QueryResult>),
}

impl AnnotationResponse {
    pub fn into_results(self) -> Vec<QueryResult> {
        match self {
            AnnotationResponse::Wrapped { response } => response,
            AnnotationResponse::Bare(results) => results,
        }
    }
}

/// Results for one submitted variant key
#[derive(Debug, Deserialize)]
pub(crate) struct QueryResult {
    pub id: String,
    #[serde(default)]
    pub result: Vec<VariantResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VariantResult {
    #[serde(default)]
    pub consequence_types: Vec<Value>,
    #[serde(default)]
    pub hgvs: Vec<String>,
    #[serde(default)]
    pub population_frequencies: Vec<Value>,
}

/// One transcript-level consequence of a variant
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptAnnotation {
    pub gene_ensembl_id: String,
    pub gene_name: String,
    pub transcript: String,
    pub strand: String,
    pub canonical: bool,
    pub protein: Option<String>,
    pub effect: String,
    pub sift: Option<String>,
    pub polyphen: Option<String>,
    pub hgvs_c: Option<String>,
    pub hgvs_p: Option<String>,
    /// Genomic HGVS as reported by the service; absent when it gave none
    pub hgvs_g: Option<String>,
    pub af_max: Option<f64>,
}

/// Every usable consequence of one variant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantAnnotation {
    pub transcripts: Vec<TranscriptAnnotation>,
    /// Consequences missing a required field
    pub dropped: usize,
}

/// Turns raw consequence objects into [`TranscriptAnnotation`]s
#[derive(Debug, Clone)]
pub struct ConsequenceExtractor {
    gene_symbol: Regex,
}

impl ConsequenceExtractor {
    pub fn new() -> Result<Self> {
        let gene_symbol = Regex::new(r"\([^)]*\)")
            .map_err(|e| IngestError::Config(format!("gene symbol pattern: {}", e)))?;
        Ok(Self { gene_symbol })
    }

    pub(crate) fn extract(&self, key: &VariantKey, results: &[VariantResult]) -> VariantAnnotation {
        let mut annotation = VariantAnnotation::default();

        for result in results {
            let af_max = result
                .population_frequencies
                .iter()
                .filter_map(|f| f.get("altAlleleFreq").and_then(value_as_f64))
                .reduce(f64::max);
            let hgvs_g = result
                .hgvs
                .iter()
                .find(|h| h.contains(":g."))
                .map(String::as_str);

            for consequence in &result.consequence_types {
                match self.transcript(consequence, &result.hgvs, hgvs_g, af_max) {
                    Some(transcript) => annotation.transcripts.push(transcript),
                    None => {
                        trace!(variant = %key, "Dropped consequence missing required fields");
                        annotation.dropped += 1;
                    },
                }
            }
        }

        if !annotation.transcripts.is_empty() && !annotation.transcripts.iter().any(|t| t.canonical) {
            annotation.transcripts[0].canonical = true;
        }
        annotation
    }

    fn transcript(
        &self,
        consequence: &Value,
        hgvs: &[String],
        hgvs_g: Option<&str>,
        af_max: Option<f64>,
    ) -> Option<TranscriptAnnotation> {
        if REQUIRED_FIELDS.iter().any(|f| consequence.get(f).is_none()) {
            return None;
        }

        let text = |field: &str| consequence.get(field).and_then(Value::as_str).map(String::from);
        let effect = consequence
            .get("sequenceOntologyTerms")?
            .as_array()?
            .first()?
            .get("name")?
            .as_str()?
            .to_string();
        let transcript = text("ensemblTranscriptId")?;

        let protein_annotation = consequence.get("proteinVariantAnnotation");
        let protein = protein_annotation
            .and_then(|p| p.get("proteinId"))
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| text("ensemblProteinId"));

        let score = |source: &str| {
            protein_annotation?
                .get("substitutionScores")?
                .as_array()?
                .iter()
                .find(|s| s.get("source").and_then(Value::as_str) == Some(source))
                .map(|s| {
                    let description = s.get("description").and_then(Value::as_str).unwrap_or("");
                    let value = s.get("score").and_then(value_as_f64).unwrap_or_default();
                    format!("{}({})", description, value)
                })
        };

        let hgvs_c = hgvs
            .iter()
            .find(|h| h.starts_with(&transcript))
            .map(|h| self.gene_symbol.replace_all(h, "").into_owned());
        let hgvs_p = protein
            .as_deref()
            .and_then(|p| hgvs.iter().find(|h| h.starts_with(p)).cloned());

        let canonical = consequence
            .get("transcriptAnnotationFlags")
            .and_then(Value::as_array)
            .is_some_and(|flags| flags.iter().any(|f| f.as_str() == Some("canonical")));

        Some(TranscriptAnnotation {
            gene_ensembl_id: text("ensemblGeneId")?,
            gene_name: text("geneName")?,
            strand: text("strand")?,
            canonical,
            protein,
            effect,
            sift: score("sift"),
            polyphen: score("polyphen"),
            hgvs_c,
            hgvs_p,
            hgvs_g: hgvs_g.map(String::from),
            af_max,
            transcript,
        })
    }
}
