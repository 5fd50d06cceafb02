//! Variants reported on a case

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position/allele identity of a variant within one genome build
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantIdentity {
    pub chromosome: String,
    pub position: i64,
    pub reference: String,
    pub alternate: String,
}

impl VariantIdentity {
    pub fn new(
        chromosome: impl Into<String>,
        position: i64,
        reference: impl Into<String>,
        alternate: impl Into<String>,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
            reference: reference.into(),
            alternate: alternate.into(),
        }
    }

    /// Genomic HGVS built from the alleles as reported, used when the
    /// annotation service supplies none
    pub fn genomic_hgvs(&self) -> String {
        format!(
            "{}:g.{}{}>{}",
            self.chromosome, self.position, self.reference, self.alternate
        )
    }
}

impl fmt::Display for VariantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chromosome, self.position, self.reference, self.alternate
        )
    }
}

/// How a proband variant relates to the parents' genotypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inheritance {
    DeNovo,
    Inherited,
    Unknown,
}

impl Inheritance {
    /// Both parents reference homozygous means de novo; a parent carrying the
    /// alternate allele means inherited
    pub fn from_parents(maternal: &str, paternal: &str) -> Self {
        let carries = |genotype: &str| {
            genotype.contains("heterozygous") || genotype.contains("alternate")
        };

        if maternal == "reference_homozygous" && paternal == "reference_homozygous" {
            Inheritance::DeNovo
        } else if carries(maternal) || carries(paternal) {
            Inheritance::Inherited
        } else {
            Inheritance::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Inheritance::DeNovo => "de_novo",
            Inheritance::Inherited => "inherited",
            Inheritance::Unknown => "unknown",
        }
    }
}

pub const UNKNOWN_ZYGOSITY: &str = "unknown";

/// One report event on a variant: a (panel, tier, mode of inheritance)
/// justification from the interpretation pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEventData {
    pub re_id: Option<String>,
    pub tier: Option<u8>,
    pub mode_of_inheritance: Option<String>,
    pub penetrance: Option<String>,
    pub panel_name: Option<String>,
    pub panel_version: Option<String>,
    pub gene_ensembl_id: Option<String>,
    pub gene_hgnc: Option<String>,
    pub score: Option<f64>,
}

/// A variant that survived tier filtering, with its case-specific context
#[derive(Debug, Clone, PartialEq)]
pub struct CaseVariant {
    pub identity: VariantIdentity,
    pub db_snp_id: Option<String>,
    /// Lowest tier over the tiered report events; `None` for flag-only variants
    pub min_tier: Option<u8>,
    pub zygosity: String,
    pub maternal_zygosity: String,
    pub paternal_zygosity: String,
    pub inheritance: Inheritance,
    pub somatic: bool,
    pub report_events: Vec<ReportEventData>,
    /// Who flagged the variant outside tiering (CIP name, "Clinical Report")
    pub flags: Vec<String>,
}

/// Tier number from labels like `"TIER1"`; anything without a trailing digit
/// has no tier
pub fn parse_tier(label: &str) -> Option<u8> {
    label
        .trim()
        .chars()
        .last()
        .and_then(|c| c.to_digit(10))
        .and_then(|d| u8::try_from(d).ok())
}

/// Lowest tier over a set of events
pub fn min_tier<'a>(events: impl IntoIterator<Item = &'a ReportEventData>) -> Option<u8> {
    events.into_iter().filter_map(|e| e.tier).min()
}
