//! Validated case document
//!
//! [`CaseDocument::parse`] turns one raw interpretation request into a typed
//! snapshot. Required fields are checked up front so that a malformed case
//! fails here with a data-integrity error, not halfway through persistence.

use super::raw::{
    RawCancerRequest, RawCase, RawParticipant, RawRareDiseaseRequest, RawReportEvent, RawVariant,
};
use super::variant::{
    min_tier, parse_tier, CaseVariant, Inheritance, ReportEventData, VariantIdentity,
    UNKNOWN_ZYGOSITY,
};
use crate::config::{DEFAULT_EXOMISER_SCORE, DEFAULT_TIER_THRESHOLD};
use crate::error::{IngestError, Result};
use crate::serde_helpers::value_as_f64;
use chrono::{DateTime, NaiveDateTime, Utc};
use mdt_common::checksum::content_hash;
use mdt_common::{GenomeBuild, SampleType};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

pub const CLINICAL_REPORT_FLAG: &str = "Clinical Report";
const EXOMISER: &str = "Exomiser";
const COVERAGE_PASS_FRACTION: f64 = 0.95;

/// Knobs that change which variants a document keeps
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Keep tiered variants regardless of tier
    pub pull_t3: bool,
    pub tier_threshold: u8,
    pub exomiser_score: f64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            pull_t3: false,
            tier_threshold: DEFAULT_TIER_THRESHOLD,
            exomiser_score: DEFAULT_EXOMISER_SCORE,
        }
    }
}

impl ParseOptions {
    fn keeps(&self, tier: Option<u8>) -> bool {
        self.pull_t3 || tier.is_some_and(|t| t < self.tier_threshold)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseStatus {
    pub status: String,
    pub updated: Option<DateTime<Utc>>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub gel_id: String,
    pub sex: Option<String>,
    pub sample_id: Option<String>,
    pub affection_status: Option<String>,
    pub recruiting_disease: Option<String>,
    pub disease_subtype: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FamilyMember {
    pub gel_id: String,
    pub relation: String,
    pub affection_status: Option<String>,
    pub sex: Option<String>,
    pub sequenced: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelCoverage {
    pub average: Option<f64>,
    pub proportion_above_15x: Option<f64>,
    /// Genes below 95% of bases at 15x, sorted
    pub genes_failing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelRef {
    /// PanelApp panel id as named in the pedigree
    pub name: String,
    pub version: Option<String>,
    pub coverage: Option<PanelCoverage>,
}

/// Immutable snapshot of one interpretation request version
#[derive(Debug, Clone)]
pub struct CaseDocument {
    /// `"{ir_id}-{version}"`
    pub request_id: String,
    pub ir_id: String,
    pub version: String,
    pub sample_type: SampleType,
    /// SHA-512 over the canonical JSON of the full document
    pub content_hash: String,
    pub status: CaseStatus,
    pub priority: Option<String>,
    pub cip: Option<String>,
    pub family_id: String,
    pub sites: Vec<String>,
    /// Assembly label as reported, e.g. "GRCh37"
    pub assembly: String,
    pub genome_build: GenomeBuild,
    pub proband: Participant,
    pub relatives: Vec<FamilyMember>,
    pub phenotypes: Vec<String>,
    pub panels: Vec<PanelRef>,
    pub variants: Vec<CaseVariant>,
    /// Tiered variants dropped by the tier filter
    pub excluded_variants: usize,
    pub trio_sequenced: bool,
    pub has_de_novo: bool,
    raw: Value,
}

/// Sample type specific pieces pulled from `json_request`
struct RequestParts {
    proband: Participant,
    relatives: Vec<FamilyMember>,
    phenotypes: Vec<String>,
    panels: Vec<PanelRef>,
    assembly: String,
    family_id: Option<String>,
    tiered: Vec<Value>,
}

impl CaseDocument {
    pub fn parse(raw: Value, options: &ParseOptions) -> Result<Self> {
        let content_hash = content_hash(&raw)?;
        let case: RawCase = serde_json::from_value(raw.clone()).map_err(|e| {
            IngestError::data_integrity(request_id_hint(&raw), e.to_string())
        })?;

        let request_id = format!("{}-{}", case.interpretation_request_id, case.version);
        let integrity = |message: String| IngestError::data_integrity(&request_id, message);

        let sample_type: SampleType = case
            .sample_type
            .parse()
            .map_err(|e: mdt_common::MdtError| integrity(e.to_string()))?;

        let status = case
            .status
            .last()
            .map(|s| CaseStatus {
                status: s.status.clone(),
                updated: s.created_at.as_deref().and_then(parse_timestamp),
                user: s.user.clone(),
            })
            .ok_or_else(|| integrity("status list is empty".to_string()))?;

        let json_request = &case.interpretation_request_data.json_request;
        let parts = match sample_type {
            SampleType::RareDisease => {
                let request: RawRareDiseaseRequest = serde_json::from_value(json_request.clone())
                    .map_err(|e| integrity(format!("json_request: {}", e)))?;
                rare_disease_parts(request, &request_id)?
            },
            SampleType::Cancer => {
                let request: RawCancerRequest = serde_json::from_value(json_request.clone())
                    .map_err(|e| integrity(format!("json_request: {}", e)))?;
                let assembly = case
                    .assembly
                    .clone()
                    .ok_or_else(|| integrity("cancer case has no assembly".to_string()))?;
                cancer_parts(request, assembly, &request_id)?
            },
        };

        let genome_build: GenomeBuild = parts
            .assembly
            .parse()
            .map_err(|e: mdt_common::MdtError| integrity(e.to_string()))?;

        let family_id = case
            .family_id
            .clone()
            .or(parts.family_id)
            .or_else(|| {
                (sample_type == SampleType::Cancer).then(|| parts.proband.gel_id.clone())
            })
            .ok_or_else(|| integrity("no family id".to_string()))?;

        let relatives = parts.relatives;
        let mother = relatives.iter().find(|r| r.relation == "Mother");
        let father = relatives.iter().find(|r| r.relation == "Father");
        let trio_sequenced = mother.is_some_and(|m| m.sequenced) && father.is_some_and(|f| f.sequenced);

        let mut collector = VariantCollector {
            request_id: &request_id,
            options,
            proband_id: &parts.proband.gel_id,
            mother_id: mother.map(|m| m.gel_id.as_str()),
            father_id: father.map(|f| f.gel_id.as_str()),
            variants: Vec::new(),
            index: HashMap::new(),
            excluded: HashMap::new(),
        };

        for (i, value) in parts.tiered.iter().enumerate() {
            collector.add_tiered(i, value)?;
        }
        for genome in &case.interpreted_genome {
            let data = &genome.interpreted_genome_data;
            let company = data.company_name.as_deref().unwrap_or("CIP");
            for value in &data.reported_variants {
                collector.add_flagged(value, company)?;
            }
        }
        for report in &case.clinical_report {
            for value in &report.clinical_report_data.candidate_variants {
                collector.add_flagged(value, CLINICAL_REPORT_FLAG)?;
            }
        }

        let excluded_variants = collector.excluded.len();
        let variants = collector.variants;
        let has_de_novo =
            trio_sequenced && variants.iter().any(|v| v.inheritance == Inheritance::DeNovo);

        debug!(
            request_id = %request_id,
            variants = variants.len(),
            excluded = excluded_variants,
            "Parsed case document"
        );

        Ok(Self {
            ir_id: case.interpretation_request_id,
            version: case.version,
            sample_type,
            content_hash,
            status,
            priority: case.case_priority,
            cip: case.cip,
            family_id,
            sites: case.sites,
            assembly: parts.assembly,
            genome_build,
            proband: parts.proband,
            relatives,
            phenotypes: parts.phenotypes,
            panels: parts.panels,
            variants,
            excluded_variants,
            trio_sequenced,
            has_de_novo,
            raw,
            request_id,
        })
    }

    /// The document exactly as fetched
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Highest priority (lowest number) tier among the kept variants
    pub fn max_tier(&self) -> Option<u8> {
        self.variants.iter().filter_map(|v| v.min_tier).min()
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }
}

fn request_id_hint(raw: &Value) -> String {
    let part = |key: &str| match raw.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "?".to_string(),
    };
    format!("{}-{}", part("interpretation_request_id"), part("version"))
}

/// CIP timestamps come with or without an offset
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn sample_id(sample: &Value) -> Option<String> {
    match sample {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("sampleId").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().filter_map(text_of).collect();
            (!joined.is_empty()).then(|| joined.join(", "))
        },
        _ => None,
    }
}

fn term_present(presence: &Value) -> bool {
    match presence {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.to_lowercase().as_str(), "yes" | "true"),
        _ => false,
    }
}

fn rare_disease_parts(request: RawRareDiseaseRequest, request_id: &str) -> Result<RequestParts> {
    let pedigree = request.pedigree;
    let (probands, others): (Vec<RawParticipant>, Vec<RawParticipant>) =
        pedigree.participants.into_iter().partition(|p| p.is_proband);

    let proband_raw = probands
        .into_iter()
        .next()
        .ok_or_else(|| IngestError::data_integrity(request_id, "no participant is flagged as proband"))?;

    let sample = proband_raw.samples.first().and_then(sample_id);
    if sample.is_none() {
        return Err(IngestError::data_integrity(request_id, "proband has no samples"));
    }

    let phenotypes = proband_raw
        .hpo_term_list
        .iter()
        .filter(|t| term_present(&t.term_presence))
        .map(|t| t.term.clone())
        .collect();

    let relatives = others
        .into_iter()
        .filter_map(|p| {
            let relation = p.additional_information.get("relation_to_proband").and_then(text_of)?;
            Some(FamilyMember {
                gel_id: p.gel_id,
                relation,
                affection_status: p.affection_status,
                sex: p.sex,
                sequenced: !p.samples.is_empty(),
            })
        })
        .collect();

    let panels = pedigree
        .analysis_panels
        .into_iter()
        .map(|panel| {
            let coverage = sample
                .as_deref()
                .and_then(|s| panel_coverage(&request.gene_panels_coverage, &panel.panel_name, s));
            PanelRef {
                name: panel.panel_name,
                version: panel.panel_version,
                coverage,
            }
        })
        .collect();

    Ok(RequestParts {
        proband: Participant {
            gel_id: proband_raw.gel_id,
            sex: proband_raw.sex,
            sample_id: sample,
            affection_status: proband_raw.affection_status,
            recruiting_disease: None,
            disease_subtype: None,
        },
        relatives,
        phenotypes,
        panels,
        assembly: request.genome_assembly_version,
        family_id: pedigree.family_id,
        tiered: request.tiered_variants,
    })
}

fn cancer_parts(request: RawCancerRequest, assembly: String, request_id: &str) -> Result<RequestParts> {
    let participant = request.cancer_participant;
    let sample = participant
        .matched_samples
        .first()
        .and_then(|s| s.tumour_sample_id.clone())
        .ok_or_else(|| IngestError::data_integrity(request_id, "cancer participant has no tumour sample"))?;

    Ok(RequestParts {
        proband: Participant {
            gel_id: participant.gel_id,
            sex: participant.sex,
            sample_id: Some(sample),
            affection_status: None,
            recruiting_disease: text_of(&participant.primary_diagnosis_disease),
            disease_subtype: text_of(&participant.primary_diagnosis_sub_disease),
        },
        relatives: Vec::new(),
        phenotypes: Vec::new(),
        panels: Vec::new(),
        assembly,
        family_id: None,
        tiered: request.tiered_variants,
    })
}

fn panel_coverage(coverage: &Value, panel: &str, sample: &str) -> Option<PanelCoverage> {
    let per_panel = coverage.get(panel)?.as_object()?;
    let avg_key = format!("{}_avg", sample);
    let gte15_key = format!("{}_gte15x", sample);

    let summary = per_panel.get("SUMMARY");
    let mut genes_failing: Vec<String> = per_panel
        .iter()
        .filter(|(gene, _)| gene.as_str() != "SUMMARY")
        .filter(|(_, stats)| {
            stats
                .get(&gte15_key)
                .and_then(value_as_f64)
                .is_some_and(|fraction| fraction < COVERAGE_PASS_FRACTION)
        })
        .map(|(gene, _)| gene.clone())
        .collect();
    genes_failing.sort();
    genes_failing.dedup();

    Some(PanelCoverage {
        average: summary.and_then(|s| s.get(&avg_key)).and_then(value_as_f64),
        proportion_above_15x: summary.and_then(|s| s.get(&gte15_key)).and_then(value_as_f64),
        genes_failing,
    })
}

fn report_event(raw: &RawReportEvent) -> ReportEventData {
    let feature = raw.genomic_feature.as_ref();
    ReportEventData {
        re_id: raw.report_event_id.clone(),
        tier: raw.tier.as_deref().and_then(parse_tier),
        mode_of_inheritance: raw.mode_of_inheritance.clone(),
        penetrance: raw.penetrance.clone(),
        panel_name: raw.panel_name.clone(),
        panel_version: raw.panel_version.clone(),
        gene_ensembl_id: feature.and_then(|f| f.ensembl_id.clone()),
        gene_hgnc: feature.and_then(|f| f.hgnc.clone()),
        score: raw.score,
    }
}

/// Accumulates kept variants, merging repeated identities
struct VariantCollector<'a> {
    request_id: &'a str,
    options: &'a ParseOptions,
    proband_id: &'a str,
    mother_id: Option<&'a str>,
    father_id: Option<&'a str>,
    variants: Vec<CaseVariant>,
    index: HashMap<VariantIdentity, usize>,
    /// Tiered identities that failed the tier filter so far, with their
    /// events. A later occurrence that passes admits them; flags never do.
    excluded: HashMap<VariantIdentity, Vec<ReportEventData>>,
}

impl VariantCollector<'_> {
    fn decode(&self, value: &Value, what: &str) -> Result<RawVariant> {
        RawVariant::from_value(value)
            .map_err(|e| IngestError::data_integrity(self.request_id, format!("{}: {}", what, e)))
    }

    fn add_tiered(&mut self, position: usize, value: &Value) -> Result<()> {
        let raw = self.decode(value, &format!("tiered variant {}", position))?;
        let events: Vec<ReportEventData> = raw.report_events.iter().map(report_event).collect();
        let identity = identity_of(&raw);

        if let Some(&i) = self.index.get(&identity) {
            let existing = &mut self.variants[i];
            existing.report_events.extend(events);
            existing.min_tier = min_tier(&existing.report_events);
            return Ok(());
        }

        let events = match self.excluded.remove(&identity) {
            Some(mut earlier) => {
                earlier.extend(events);
                earlier
            },
            None => events,
        };
        let tier = min_tier(&events);
        if !self.options.keeps(tier) {
            self.excluded.insert(identity, events);
            return Ok(());
        }

        let mut variant = self.case_variant(&raw, identity);
        variant.min_tier = tier;
        variant.report_events = events;
        self.push(variant);
        Ok(())
    }

    fn add_flagged(&mut self, value: &Value, flag: &str) -> Result<()> {
        let raw = self.decode(value, &format!("{} variant", flag))?;

        if flag.eq_ignore_ascii_case(EXOMISER) {
            let threshold = self.options.exomiser_score;
            let strong = raw
                .report_events
                .iter()
                .any(|e| e.score.is_some_and(|s| s >= threshold));
            if !strong {
                return Ok(());
            }
        }

        let identity = identity_of(&raw);
        if self.excluded.contains_key(&identity) {
            return Ok(());
        }

        match self.index.get(&identity) {
            Some(&i) => {
                let flags = &mut self.variants[i].flags;
                if !flags.iter().any(|f| f == flag) {
                    flags.push(flag.to_string());
                }
            },
            None => {
                let mut variant = self.case_variant(&raw, identity);
                variant.flags.push(flag.to_string());
                self.push(variant);
            },
        }
        Ok(())
    }

    fn push(&mut self, variant: CaseVariant) {
        self.index.insert(variant.identity.clone(), self.variants.len());
        self.variants.push(variant);
    }

    fn case_variant(&self, raw: &RawVariant, identity: VariantIdentity) -> CaseVariant {
        let genotype_of = |gel_id: Option<&str>| {
            gel_id
                .and_then(|id| {
                    raw.called_genotypes
                        .iter()
                        .find(|g| g.gel_id.as_deref() == Some(id))
                        .and_then(|g| g.genotype.clone())
                })
                .unwrap_or_else(|| UNKNOWN_ZYGOSITY.to_string())
        };

        let zygosity = genotype_of(Some(self.proband_id));
        let maternal_zygosity = genotype_of(self.mother_id);
        let paternal_zygosity = genotype_of(self.father_id);
        let inheritance = Inheritance::from_parents(&maternal_zygosity, &paternal_zygosity);

        CaseVariant {
            identity,
            db_snp_id: raw.db_snp_id.clone().filter(|id| !id.is_empty()),
            min_tier: None,
            zygosity,
            maternal_zygosity,
            paternal_zygosity,
            inheritance,
            somatic: raw
                .allele_origins
                .first()
                .is_some_and(|o| o == "somatic_variant"),
            report_events: Vec::new(),
            flags: Vec::new(),
        }
    }
}

fn identity_of(raw: &RawVariant) -> VariantIdentity {
    VariantIdentity::new(
        raw.chromosome.trim_start_matches("chr"),
        raw.position,
        raw.reference.clone(),
        raw.alternate.clone(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tiered(pos: i64, tier: &str, proband: &str, mother: &str, father: &str) -> Value {
        json!({
            "chromosome": "chr1",
            "position": pos,
            "reference": "A",
            "alternate": "G",
            "dbSNPid": "",
            "calledGenotypes": [
                {"gelId": "P1", "genotype": proband},
                {"gelId": "M1", "genotype": mother},
                {"gelId": "F1", "genotype": father}
            ],
            "reportEvents": [{
                "reportEventId": format!("RE{}", pos),
                "tier": tier,
                "modeOfInheritance": "monoallelic",
                "penetrance": "complete",
                "panelName": "245",
                "panelVersion": "1.2",
                "genomicFeature": {"ensemblId": "ENSG0001", "HGNC": "BRCA1"}
            }]
        })
    }

    fn rare_disease_case() -> Value {
        json!({
            "interpretation_request_id": "1234",
            "version": 2,
            "sample_type": "raredisease",
            "case_priority": "routine",
            "cip": "omicia",
            "sites": ["RGT"],
            "status": [
                {"status": "sent_to_gmcs", "created_at": "2018-01-01T10:00:00Z", "user": "a"},
                {"status": "report_generated", "created_at": "2018-02-01T10:00:00.123", "user": "b"}
            ],
            "interpretation_request_data": {"json_request": {
                "genomeAssemblyVersion": "GRCh37",
                "pedigree": {
                    "familyId": "F100",
                    "analysisPanels": [{"panelName": "245", "panelVersion": "1.2"}],
                    "participants": [
                        {
                            "gelId": "P1", "isProband": true, "sex": "male",
                            "samples": ["LP001"],
                            "affectionStatus": "AFFECTED",
                            "hpoTermList": [
                                {"term": "HP:0001", "termPresence": "yes"},
                                {"term": "HP:0002", "termPresence": "no"},
                                {"term": "HP:0003", "termPresence": true}
                            ]
                        },
                        {
                            "gelId": "M1", "isProband": false, "sex": "female",
                            "samples": [{"sampleId": "LP002"}],
                            "additionalInformation": {"relation_to_proband": "Mother"}
                        },
                        {
                            "gelId": "F1", "isProband": false, "sex": "male",
                            "samples": ["LP003"],
                            "additionalInformation": {"relation_to_proband": "Father"}
                        },
                        {"gelId": "X1", "isProband": false, "samples": []}
                    ]
                },
                "genePanelsCoverage": {"245": {
                    "SUMMARY": {"LP001_avg": 52.1, "LP001_gte15x": 0.97},
                    "BRCA2": {"LP001_gte15x": 0.90},
                    "BRCA1": {"LP001_gte15x": "0.5"},
                    "TP53": {"LP001_gte15x": 0.99}
                }},
                "TieredVariants": [
                    tiered(100, "TIER1", "heterozygous", "reference_homozygous", "reference_homozygous"),
                    tiered(200, "TIER1", "heterozygous", "heterozygous", "reference_homozygous"),
                    tiered(300, "TIER3", "heterozygous", "heterozygous", "reference_homozygous")
                ]
            }},
            "interpreted_genome": [
                {"interpreted_genome_data": {
                    "companyName": "Exomiser",
                    "reportedVariants": [
                        {
                            "chromosome": "2", "position": 500, "reference": "C", "alternate": "T",
                            "reportEvents": [{"score": 0.97}]
                        },
                        {
                            "chromosome": "2", "position": 600, "reference": "C", "alternate": "T",
                            "reportEvents": [{"score": 0.2}]
                        }
                    ]
                }},
                {"interpreted_genome_data": {
                    "companyName": "omicia",
                    "reportedVariants": [
                        {"chromosome": "1", "position": 100, "reference": "A", "alternate": "G"},
                        {"chromosome": "1", "position": 300, "reference": "A", "alternate": "G"}
                    ]
                }}
            ],
            "clinical_report": [
                {"clinical_report_data": {"candidateVariants": [
                    {"chromosome": "1", "position": 200, "reference": "A", "alternate": "G"}
                ]}}
            ]
        })
    }

    fn cancer_case() -> Value {
        json!({
            "interpretation_request_id": 77,
            "version": "1",
            "sample_type": "cancer",
            "assembly": "GRCh38",
            "status": [{"status": "interpretation_generated"}],
            "interpretation_request_data": {"json_request": {
                "cancerParticipant": {
                    "gelId": "C1",
                    "sex": "female",
                    "matchedSamples": [{"tumourSampleId": "T1"}],
                    "primaryDiagnosisDisease": ["breast"],
                    "primaryDiagnosisSubDisease": "ductal"
                },
                "tieredVariants": [{
                    "reportedVariantCancer": {
                        "chromosome": "17", "position": 7577120, "reference": "C", "alternate": "T",
                        "reportEvents": [{"reportEventId": "RE1", "tier": "TIER1"}]
                    },
                    "alleleOrigins": ["somatic_variant"]
                }]
            }}
        })
    }

    #[test]
    fn test_parse_rare_disease_case() {
        let doc = CaseDocument::parse(rare_disease_case(), &ParseOptions::default()).unwrap();

        assert_eq!(doc.request_id, "1234-2");
        assert_eq!(doc.sample_type, SampleType::RareDisease);
        assert_eq!(doc.genome_build, GenomeBuild::GRCh37);
        assert_eq!(doc.family_id, "F100");
        assert_eq!(doc.status.status, "report_generated");
        assert!(doc.status.updated.is_some());
        assert_eq!(doc.proband.gel_id, "P1");
        assert_eq!(doc.proband.sample_id.as_deref(), Some("LP001"));
        assert_eq!(doc.phenotypes, vec!["HP:0001", "HP:0003"]);
        assert_eq!(doc.relatives.len(), 2);
        assert!(doc.trio_sequenced);
        assert_eq!(doc.content_hash.len(), 128);
    }

    #[test]
    fn test_tier_filter_excludes_tier_three() {
        let doc = CaseDocument::parse(rare_disease_case(), &ParseOptions::default()).unwrap();

        let tiered: Vec<_> = doc.variants.iter().filter(|v| v.min_tier.is_some()).collect();
        assert_eq!(tiered.len(), 2);
        assert!(tiered.iter().all(|v| v.min_tier == Some(1)));
        assert_eq!(doc.excluded_variants, 1);
        assert!(!doc.variants.iter().any(|v| v.identity.position == 300));
    }

    #[test]
    fn test_repeated_identity_keeps_events_in_any_order() {
        let occurrence = |tier: &str| {
            let mut variant = tiered(300, tier, "heterozygous", "heterozygous", "reference_homozygous");
            variant["reportEvents"][0]["reportEventId"] = json!(format!("RE-{}", tier));
            variant
        };
        let parse_with = |tiers: [&str; 2]| {
            let mut raw = rare_disease_case();
            raw["interpretation_request_data"]["json_request"]["TieredVariants"] =
                json!([occurrence(tiers[0]), occurrence(tiers[1])]);
            let doc = CaseDocument::parse(raw, &ParseOptions::default()).unwrap();
            let variant = doc.variants.iter().find(|v| v.identity.position == 300).unwrap();
            let mut ids: Vec<_> = variant.report_events.iter().map(|e| e.re_id.clone()).collect();
            ids.sort();
            (variant.min_tier, ids, doc.excluded_variants)
        };

        let tier1_first = parse_with(["TIER1", "TIER3"]);
        let tier3_first = parse_with(["TIER3", "TIER1"]);

        assert_eq!(tier1_first, tier3_first);
        assert_eq!(tier1_first.0, Some(1));
        assert_eq!(
            tier1_first.1,
            vec![Some("RE-TIER1".to_string()), Some("RE-TIER3".to_string())]
        );
        assert_eq!(tier1_first.2, 0);
    }

    #[test]
    fn test_pull_t3_keeps_tier_three() {
        let options = ParseOptions {
            pull_t3: true,
            ..ParseOptions::default()
        };
        let doc = CaseDocument::parse(rare_disease_case(), &options).unwrap();

        let t3 = doc.variants.iter().find(|v| v.identity.position == 300).unwrap();
        assert_eq!(t3.min_tier, Some(3));
        assert_eq!(t3.flags, vec!["omicia"]);
        assert_eq!(doc.excluded_variants, 0);
    }

    #[test]
    fn test_flags_merge_onto_tiered_variants() {
        let doc = CaseDocument::parse(rare_disease_case(), &ParseOptions::default()).unwrap();

        let first = doc.variants.iter().find(|v| v.identity.position == 100).unwrap();
        assert_eq!(first.flags, vec!["omicia"]);
        let second = doc.variants.iter().find(|v| v.identity.position == 200).unwrap();
        assert_eq!(second.flags, vec![CLINICAL_REPORT_FLAG]);
    }

    #[test]
    fn test_exomiser_score_threshold() {
        let doc = CaseDocument::parse(rare_disease_case(), &ParseOptions::default()).unwrap();

        let exomiser: Vec<_> = doc
            .variants
            .iter()
            .filter(|v| v.flags.iter().any(|f| f == "Exomiser"))
            .collect();
        assert_eq!(exomiser.len(), 1);
        assert_eq!(exomiser[0].identity.position, 500);
        assert_eq!(exomiser[0].min_tier, None);
    }

    #[test]
    fn test_zygosity_and_inheritance() {
        let doc = CaseDocument::parse(rare_disease_case(), &ParseOptions::default()).unwrap();

        let de_novo = doc.variants.iter().find(|v| v.identity.position == 100).unwrap();
        assert_eq!(de_novo.zygosity, "heterozygous");
        assert_eq!(de_novo.inheritance, Inheritance::DeNovo);
        assert_eq!(de_novo.db_snp_id, None);

        let inherited = doc.variants.iter().find(|v| v.identity.position == 200).unwrap();
        assert_eq!(inherited.maternal_zygosity, "heterozygous");
        assert_eq!(inherited.inheritance, Inheritance::Inherited);

        let flagged = doc.variants.iter().find(|v| v.identity.position == 500).unwrap();
        assert_eq!(flagged.zygosity, UNKNOWN_ZYGOSITY);

        assert!(doc.has_de_novo);
    }

    #[test]
    fn test_panel_coverage() {
        let doc = CaseDocument::parse(rare_disease_case(), &ParseOptions::default()).unwrap();

        assert_eq!(doc.panels.len(), 1);
        let coverage = doc.panels[0].coverage.as_ref().unwrap();
        assert_eq!(coverage.average, Some(52.1));
        assert_eq!(coverage.proportion_above_15x, Some(0.97));
        assert_eq!(coverage.genes_failing, vec!["BRCA1", "BRCA2"]);
    }

    #[test]
    fn test_parse_cancer_case() {
        let doc = CaseDocument::parse(cancer_case(), &ParseOptions::default()).unwrap();

        assert_eq!(doc.request_id, "77-1");
        assert_eq!(doc.genome_build, GenomeBuild::GRCh38);
        assert_eq!(doc.family_id, "C1");
        assert_eq!(doc.proband.sample_id.as_deref(), Some("T1"));
        assert_eq!(doc.proband.recruiting_disease.as_deref(), Some("breast"));
        assert!(doc.panels.is_empty());
        assert!(doc.relatives.is_empty());
        assert_eq!(doc.variants.len(), 1);
        assert!(doc.variants[0].somatic);
    }

    #[test]
    fn test_missing_proband_is_data_integrity() {
        let mut raw = rare_disease_case();
        raw["interpretation_request_data"]["json_request"]["pedigree"]["participants"][0]
            ["isProband"] = json!(false);

        let err = CaseDocument::parse(raw, &ParseOptions::default()).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::DataIntegrity);
    }

    #[test]
    fn test_empty_status_is_data_integrity() {
        let mut raw = rare_disease_case();
        raw["status"] = json!([]);

        let err = CaseDocument::parse(raw, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::DataIntegrity { ref case_id, .. } if case_id == "1234-2"));
    }

    #[test]
    fn test_unknown_assembly_is_data_integrity() {
        let mut raw = rare_disease_case();
        raw["interpretation_request_data"]["json_request"]["genomeAssemblyVersion"] =
            json!("NCBI36");

        let err = CaseDocument::parse(raw, &ParseOptions::default()).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::DataIntegrity);
    }

    #[test]
    fn test_hash_changes_with_content() {
        let first = CaseDocument::parse(rare_disease_case(), &ParseOptions::default()).unwrap();
        let mut raw = rare_disease_case();
        raw["case_priority"] = json!("urgent");
        let second = CaseDocument::parse(raw, &ParseOptions::default()).unwrap();

        assert_ne!(first.content_hash, second.content_hash);
    }
}
