//! One resolver per entity kind
//!
//! Each resolver builds candidates from the case input plus the refs earlier
//! resolvers left in the [`ResolveContext`], then hands them to the
//! [`UpsertEngine`]. Candidates whose optional upstream ref is missing are
//! skipped and recorded; a missing required ref fails the case.

use super::engine::{Entity, Resolved, UpsertEngine};
use super::entities::*;
use crate::annotation::{AnnotationOutcome, TranscriptAnnotation};
use crate::case::{CaseDocument, CaseVariant, PanelRef, ReportEventData, VariantIdentity};
use crate::demographics::CaseDemographics;
use crate::error::{IngestError, Result};
use crate::panels::PanelInfo;
use crate::store::{RecordId, StoreTx};
use crate::summary::SkippedEntity;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Tool name under which genome assemblies are stored
pub const GENOME_BUILD_TOOL: &str = "genome_build";

/// A case panel together with its PanelApp metadata
#[derive(Debug, Clone)]
pub struct CasePanel {
    pub reference: PanelRef,
    pub info: Arc<PanelInfo>,
}

/// Everything gathered for one case before persistence
pub struct CaseInput<'a> {
    pub case: &'a CaseDocument,
    pub demographics: &'a CaseDemographics,
    pub panels: &'a [CasePanel],
    pub annotations: &'a AnnotationOutcome,
}

impl CaseInput<'_> {
    fn transcripts(&self, variant: &CaseVariant) -> &[TranscriptAnnotation] {
        self.annotations
            .get(&self.case.request_id, &variant.identity)
            .map(|a| a.transcripts.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
struct PanelVersionRef {
    panelapp_id: String,
    name: Option<String>,
    version: String,
    id: RecordId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverStats {
    pub kind: &'static str,
    pub created: u64,
    pub reused: u64,
}

/// Refs resolved so far for one case
#[derive(Debug, Default)]
pub struct ResolveContext {
    pub case_id: String,
    pub clinician: Option<RecordId>,
    pub family: Option<RecordId>,
    pub phenotypes: HashMap<String, RecordId>,
    pub assembly: Option<RecordId>,
    /// By PanelApp id
    pub panels: HashMap<String, RecordId>,
    panel_versions: Vec<PanelVersionRef>,
    /// By gene key
    pub genes: HashMap<String, RecordId>,
    genes_by_symbol: HashMap<String, RecordId>,
    /// By transcript name, within the case's build
    pub transcripts: HashMap<String, RecordId>,
    pub variants: HashMap<VariantIdentity, RecordId>,
    pub proband: Option<RecordId>,
    pub ir_family: Option<RecordId>,
    pub report: Option<RecordId>,
    pub archived_version: Option<i64>,
    pub proband_variants: HashMap<VariantIdentity, RecordId>,
    pub skipped: Vec<SkippedEntity>,
    pub stats: Vec<ResolverStats>,
}

impl ResolveContext {
    pub fn new(case_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            ..Default::default()
        }
    }

    fn skip(&mut self, kind: &str, key: impl Into<String>, reason: &str) {
        let key = key.into();
        debug!(case_id = %self.case_id, kind, key = %key, reason, "Skipped entity");
        self.skipped.push(SkippedEntity {
            case_id: self.case_id.clone(),
            kind: kind.to_string(),
            key,
            reason: reason.to_string(),
        });
    }

    fn record<K>(&mut self, kind: &'static str, resolved: &Resolved<K>) {
        self.stats.push(ResolverStats {
            kind,
            created: resolved.created,
            reused: resolved.reused,
        });
    }

    fn require(&self, value: Option<RecordId>, kind: &str, what: &str) -> Result<RecordId> {
        value.ok_or_else(|| {
            IngestError::DependencyUnresolved(format!(
                "{}: {} needs {} which did not resolve",
                self.case_id, kind, what
            ))
        })
    }

    fn panel_version_for(&self, event: &ReportEventData) -> Option<RecordId> {
        let name = event.panel_name.as_deref()?;
        self.panel_versions
            .iter()
            .filter(|p| p.panelapp_id == name || p.name.as_deref() == Some(name))
            .find(|p| event.panel_version.as_deref().is_none_or(|v| v == p.version))
            .map(|p| p.id)
    }

    fn gene_for(&self, event: &ReportEventData) -> Option<RecordId> {
        event
            .gene_ensembl_id
            .as_deref()
            .and_then(|id| self.genes.get(id))
            .or_else(|| {
                event
                    .gene_hgnc
                    .as_deref()
                    .and_then(|symbol| self.genes_by_symbol.get(symbol))
            })
            .copied()
    }
}

#[async_trait]
pub trait Resolver: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()>;
}

/// Every resolver, in dependency order
pub fn resolvers() -> Vec<Box<dyn Resolver>> {
    vec![
        Box::new(ClinicianResolver),
        Box::new(FamilyResolver),
        Box::new(PhenotypeResolver),
        Box::new(FamilyPhenotypeResolver),
        Box::new(AssemblyResolver),
        Box::new(PanelResolver),
        Box::new(PanelVersionResolver),
        Box::new(GeneResolver),
        Box::new(PanelVersionGeneResolver),
        Box::new(TranscriptResolver),
        Box::new(VariantResolver),
        Box::new(TranscriptVariantResolver),
        Box::new(ProbandResolver),
        Box::new(RelativeResolver),
        Box::new(ReportFamilyResolver),
        Box::new(ReportFamilyPanelResolver),
        Box::new(ReportResolver),
        Box::new(ProbandVariantResolver),
        Box::new(PvFlagResolver),
        Box::new(ProbandTranscriptVariantResolver),
        Box::new(ReportEventResolver),
    ]
}

// ============================================================================
// Family
// ============================================================================

struct ClinicianResolver;

#[async_trait]
impl Resolver for ClinicianResolver {
    fn kind(&self) -> &'static str {
        "Clinician"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let clinician = &input.demographics.clinician;
        let candidate = Clinician {
            name: clinician.name.clone(),
            hospital: clinician.hospital.clone(),
            email: clinician.email.clone(),
        };
        let key = candidate.key();
        let resolved = UpsertEngine::resolve(tx, vec![candidate]).await?;
        ctx.clinician = resolved.get(&key);
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

struct FamilyResolver;

#[async_trait]
impl Resolver for FamilyResolver {
    fn kind(&self) -> &'static str {
        "Family"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let case = input.case;
        let clinician = ctx.require(ctx.clinician, self.kind(), "Clinician")?;
        let candidate = Family {
            gel_family_id: case.family_id.clone(),
            clinician,
            trio_sequenced: case.trio_sequenced,
            has_de_novo: case.has_de_novo,
        };
        let resolved = UpsertEngine::resolve(tx, vec![candidate]).await?;
        ctx.family = resolved.get(&case.family_id);
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

struct PhenotypeResolver;

#[async_trait]
impl Resolver for PhenotypeResolver {
    fn kind(&self) -> &'static str {
        "Phenotype"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let candidates = input
            .case
            .phenotypes
            .iter()
            .map(|term| Phenotype {
                hpo_term: term.clone(),
            })
            .collect();
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        ctx.record(self.kind(), &resolved);
        ctx.phenotypes = resolved.refs;
        Ok(())
    }
}

struct FamilyPhenotypeResolver;

#[async_trait]
impl Resolver for FamilyPhenotypeResolver {
    fn kind(&self) -> &'static str {
        "FamilyPhenotype"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let family = ctx.require(ctx.family, self.kind(), "Family")?;
        let mut candidates = Vec::new();
        for term in &input.case.phenotypes {
            match ctx.phenotypes.get(term) {
                Some(&phenotype) => candidates.push(FamilyPhenotype { family, phenotype }),
                None => ctx.skip(self.kind(), term.clone(), "phenotype not resolved"),
            }
        }
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

struct AssemblyResolver;

#[async_trait]
impl Resolver for AssemblyResolver {
    fn kind(&self) -> &'static str {
        "ToolOrAssemblyVersion"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let key = (
            GENOME_BUILD_TOOL.to_string(),
            input.case.genome_build.as_str().to_string(),
        );
        let candidate = ToolOrAssemblyVersion {
            tool_name: key.0.clone(),
            version_number: key.1.clone(),
        };
        let resolved = UpsertEngine::resolve(tx, vec![candidate]).await?;
        ctx.assembly = resolved.get(&key);
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

// ============================================================================
// Panels and genes
// ============================================================================

struct PanelResolver;

#[async_trait]
impl Resolver for PanelResolver {
    fn kind(&self) -> &'static str {
        "Panel"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let candidates = input
            .panels
            .iter()
            .map(|p| Panel {
                panelapp_id: p.info.panel_id.clone(),
                panel_name: p.info.name.clone(),
                disease_group: p.info.disease_group.clone(),
                disease_subgroup: p.info.disease_subgroup.clone(),
            })
            .collect();
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        ctx.record(self.kind(), &resolved);
        ctx.panels = resolved.refs;
        Ok(())
    }
}

struct PanelVersionResolver;

#[async_trait]
impl Resolver for PanelVersionResolver {
    fn kind(&self) -> &'static str {
        "PanelVersion"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let mut candidates = Vec::new();
        for p in input.panels {
            match ctx.panels.get(&p.info.panel_id) {
                Some(&panel) => candidates.push(PanelVersion {
                    panel,
                    version_number: p.info.version.clone(),
                }),
                None => ctx.skip(self.kind(), p.info.panel_id.clone(), "panel not resolved"),
            }
        }
        let resolved = UpsertEngine::resolve(tx, candidates).await?;

        for p in input.panels {
            let Some(&panel) = ctx.panels.get(&p.info.panel_id) else {
                continue;
            };
            if let Some(id) = resolved.get(&(panel, p.info.version.clone())) {
                ctx.panel_versions.push(PanelVersionRef {
                    panelapp_id: p.info.panel_id.clone(),
                    name: p.info.name.clone(),
                    version: p.info.version.clone(),
                    id,
                });
            }
        }
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

struct GeneResolver;

#[async_trait]
impl Resolver for GeneResolver {
    fn kind(&self) -> &'static str {
        "Gene"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        // Annotation knows the Ensembl id of genes PanelApp lists by symbol only
        let mut ensembl_by_symbol: HashMap<&str, &str> = HashMap::new();
        for variant in &input.case.variants {
            for t in input.transcripts(variant) {
                ensembl_by_symbol
                    .entry(t.gene_name.as_str())
                    .or_insert(t.gene_ensembl_id.as_str());
            }
        }

        let mut candidates = Vec::new();
        let mut aliases = Vec::new();
        for g in input.panels.iter().flat_map(|p| p.info.genes.iter()) {
            let key = g.gene_key();
            let known = ensembl_by_symbol.get(g.symbol.trim()).copied();
            let candidate = match known {
                Some(ensembl_id) if key.starts_with("HGNC:") => {
                    aliases.push((key, ensembl_id.to_string()));
                    Gene {
                        gene_key: ensembl_id.to_string(),
                        ensembl_id: Some(ensembl_id.to_string()),
                        hgnc_name: Some(g.symbol.clone()),
                    }
                },
                _ => Gene {
                    gene_key: key,
                    ensembl_id: g.ensembl_id.clone(),
                    hgnc_name: Some(g.symbol.clone()),
                },
            };
            candidates.push(candidate);
        }

        for variant in &input.case.variants {
            for t in input.transcripts(variant) {
                candidates.push(Gene {
                    gene_key: t.gene_ensembl_id.clone(),
                    ensembl_id: Some(t.gene_ensembl_id.clone()),
                    hgnc_name: Some(t.gene_name.clone()),
                });
            }
        }

        let symbols: Vec<(String, String)> = candidates
            .iter()
            .filter_map(|g| g.hgnc_name.clone().map(|s| (s, g.gene_key.clone())))
            .collect();

        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        for (symbol, key) in symbols {
            if let Some(id) = resolved.get(&key) {
                ctx.genes_by_symbol.entry(symbol).or_insert(id);
            }
        }
        ctx.record(self.kind(), &resolved);
        ctx.genes = resolved.refs;
        for (alias, key) in aliases {
            if let Some(&id) = ctx.genes.get(&key) {
                ctx.genes.insert(alias, id);
            }
        }
        Ok(())
    }
}

struct PanelVersionGeneResolver;

#[async_trait]
impl Resolver for PanelVersionGeneResolver {
    fn kind(&self) -> &'static str {
        "PanelVersionGene"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let mut candidates = Vec::new();
        for p in input.panels {
            let version = ctx
                .panel_versions
                .iter()
                .find(|v| v.panelapp_id == p.info.panel_id && v.version == p.info.version)
                .map(|v| v.id);
            let Some(panel_version) = version else {
                ctx.skip(self.kind(), p.info.panel_id.clone(), "panel version not resolved");
                continue;
            };

            for gene in &p.info.genes {
                let key = gene.gene_key();
                match ctx.genes.get(&key) {
                    Some(&gene_id) => candidates.push(PanelVersionGene {
                        panel_version,
                        gene: gene_id,
                        level_of_confidence: gene.level_of_confidence.clone(),
                    }),
                    None => ctx.skip(self.kind(), key, "gene not resolved"),
                }
            }
        }
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

// ============================================================================
// Variants and transcripts
// ============================================================================

struct TranscriptResolver;

#[async_trait]
impl Resolver for TranscriptResolver {
    fn kind(&self) -> &'static str {
        "Transcript"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let assembly = ctx.require(ctx.assembly, self.kind(), "genome assembly")?;
        let mut candidates = Vec::new();
        for variant in &input.case.variants {
            for t in input.transcripts(variant) {
                match ctx.genes.get(&t.gene_ensembl_id) {
                    Some(&gene) => candidates.push(Transcript {
                        name: t.transcript.clone(),
                        genome_assembly: assembly,
                        gene,
                        canonical: t.canonical,
                        protein: t.protein.clone(),
                        strand: t.strand.clone(),
                    }),
                    None => ctx.skip(self.kind(), t.transcript.clone(), "gene not resolved"),
                }
            }
        }
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        ctx.record(self.kind(), &resolved);
        ctx.transcripts = resolved
            .refs
            .into_iter()
            .map(|((name, _), id)| (name, id))
            .collect();
        Ok(())
    }
}

struct VariantResolver;

#[async_trait]
impl Resolver for VariantResolver {
    fn kind(&self) -> &'static str {
        "Variant"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let assembly = ctx.require(ctx.assembly, self.kind(), "genome assembly")?;
        let candidates = input
            .case
            .variants
            .iter()
            .map(|v| Variant {
                identity: v.identity.clone(),
                genome_assembly: assembly,
                db_snp_id: v.db_snp_id.clone(),
            })
            .collect();
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        ctx.record(self.kind(), &resolved);
        ctx.variants = resolved
            .refs
            .into_iter()
            .map(|((identity, _), id)| (identity, id))
            .collect();
        Ok(())
    }
}

struct TranscriptVariantResolver;

#[async_trait]
impl Resolver for TranscriptVariantResolver {
    fn kind(&self) -> &'static str {
        "TranscriptVariant"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let mut candidates = Vec::new();
        for variant in &input.case.variants {
            let Some(&variant_id) = ctx.variants.get(&variant.identity) else {
                ctx.skip(self.kind(), variant.identity.to_string(), "variant not resolved");
                continue;
            };
            for t in input.transcripts(variant) {
                match ctx.transcripts.get(&t.transcript) {
                    Some(&transcript) => candidates.push(TranscriptVariant {
                        transcript,
                        variant: variant_id,
                        effect: t.effect.clone(),
                        hgvs_c: t.hgvs_c.clone(),
                        hgvs_p: t.hgvs_p.clone(),
                        hgvs_g: t
                            .hgvs_g
                            .clone()
                            .unwrap_or_else(|| variant.identity.genomic_hgvs()),
                        sift: t.sift.clone(),
                        polyphen: t.polyphen.clone(),
                        af_max: t.af_max,
                    }),
                    None => ctx.skip(
                        self.kind(),
                        format!("{}/{}", t.transcript, variant.identity),
                        "transcript not resolved",
                    ),
                }
            }
        }
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

// ============================================================================
// Participants
// ============================================================================

struct ProbandResolver;

#[async_trait]
impl Resolver for ProbandResolver {
    fn kind(&self) -> &'static str {
        "Proband"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let family = ctx.require(ctx.family, self.kind(), "Family")?;
        let case = input.case;
        let demographics = &input.demographics.proband;
        let diagnosis = &input.demographics.diagnosis;

        let candidate = Proband {
            gel_id: case.proband.gel_id.clone(),
            family,
            forename: demographics.forename.clone(),
            surname: demographics.surname.clone(),
            date_of_birth: demographics.date_of_birth,
            sex: case.proband.sex.clone(),
            nhs_number: demographics.nhs_number.clone(),
            gmc: input.demographics.clinician.hospital.clone(),
            recruiting_disease: case
                .proband
                .recruiting_disease
                .clone()
                .or_else(|| diagnosis.recruiting_disease.clone()),
            disease_group: diagnosis.disease_group.clone(),
            disease_subtype: case
                .proband
                .disease_subtype
                .clone()
                .or_else(|| diagnosis.disease_subtype.clone()),
        };
        let resolved = UpsertEngine::resolve(tx, vec![candidate]).await?;
        ctx.proband = resolved.get(&case.proband.gel_id);
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

struct RelativeResolver;

#[async_trait]
impl Resolver for RelativeResolver {
    fn kind(&self) -> &'static str {
        "Relative"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let proband = ctx.require(ctx.proband, self.kind(), "Proband")?;
        let candidates = input
            .case
            .relatives
            .iter()
            .map(|r| {
                let demographics = input
                    .demographics
                    .relatives
                    .get(&r.gel_id)
                    .cloned()
                    .unwrap_or_default();
                Relative {
                    gel_id: r.gel_id.clone(),
                    proband,
                    relation_to_proband: r.relation.clone(),
                    affection_status: r.affection_status.clone(),
                    sex: r.sex.clone(),
                    sequenced: r.sequenced,
                    forename: demographics.forename,
                    surname: demographics.surname,
                    date_of_birth: demographics.date_of_birth,
                }
            })
            .collect();
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

// ============================================================================
// Reports
// ============================================================================

struct ReportFamilyResolver;

#[async_trait]
impl Resolver for ReportFamilyResolver {
    fn kind(&self) -> &'static str {
        "InterpretationReportFamily"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let family = ctx.require(ctx.family, self.kind(), "Family")?;
        let case = input.case;
        let candidate = InterpretationReportFamily {
            ir_family_id: case.request_id.clone(),
            family,
            sample_type: case.sample_type.as_str().to_string(),
            priority: case.priority.clone(),
            cip: case.cip.clone(),
        };
        let resolved = UpsertEngine::resolve(tx, vec![candidate]).await?;
        ctx.ir_family = resolved.get(&case.request_id);
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

struct ReportFamilyPanelResolver;

#[async_trait]
impl Resolver for ReportFamilyPanelResolver {
    fn kind(&self) -> &'static str {
        "InterpretationReportFamilyPanel"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let ir_family = ctx.require(ctx.ir_family, self.kind(), "InterpretationReportFamily")?;
        let mut candidates = Vec::new();
        for p in input.panels {
            let version = ctx
                .panel_versions
                .iter()
                .find(|v| v.panelapp_id == p.info.panel_id && v.version == p.info.version)
                .map(|v| v.id);
            let Some(panel_version) = version else {
                ctx.skip(self.kind(), p.info.panel_id.clone(), "panel version not resolved");
                continue;
            };
            let coverage = p.reference.coverage.as_ref();
            candidates.push(InterpretationReportFamilyPanel {
                ir_family,
                panel_version,
                average_coverage: coverage.and_then(|c| c.average),
                proportion_above_15x: coverage.and_then(|c| c.proportion_above_15x),
                genes_failing_coverage: coverage.map(|c| c.genes_failing.join(",")),
            });
        }
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

/// Reports are append-only: each ingest of a family writes the next version
struct ReportResolver;

#[async_trait]
impl Resolver for ReportResolver {
    fn kind(&self) -> &'static str {
        "GELInterpretationReport"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let ir_family = ctx.require(ctx.ir_family, self.kind(), "InterpretationReportFamily")?;
        let assembly = ctx.require(ctx.assembly, self.kind(), "genome assembly")?;
        let case = input.case;

        let archived_version = tx.latest_report_version(ir_family).await?.unwrap_or(0) + 1;
        let candidate = GelInterpretationReport {
            ir_family,
            archived_version,
            content_hash: case.content_hash.clone(),
            status: case.status.status.clone(),
            updated: case.status.updated,
            user: case.status.user.clone(),
            sample_id: case.proband.sample_id.clone(),
            max_tier: case.max_tier(),
            assembly,
            sites: (!case.sites.is_empty()).then(|| case.sites.join(",")),
        };
        let resolved = UpsertEngine::resolve(tx, vec![candidate]).await?;
        if resolved.created != 1 {
            return Err(IngestError::Store(format!(
                "{}: report version {} already exists",
                case.request_id, archived_version
            )));
        }
        ctx.report = resolved.get(&(ir_family, archived_version));
        ctx.archived_version = Some(archived_version);
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

struct ProbandVariantResolver;

#[async_trait]
impl Resolver for ProbandVariantResolver {
    fn kind(&self) -> &'static str {
        "ProbandVariant"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let report = ctx.require(ctx.report, self.kind(), "GELInterpretationReport")?;
        let mut candidates = Vec::new();
        let mut identities = Vec::new();
        for v in &input.case.variants {
            let Some(&variant) = ctx.variants.get(&v.identity) else {
                ctx.skip(self.kind(), v.identity.to_string(), "variant not resolved");
                continue;
            };
            identities.push((v.identity.clone(), variant));
            candidates.push(ProbandVariant {
                variant,
                interpretation_report: report,
                max_tier: v.min_tier,
                zygosity: v.zygosity.clone(),
                maternal_zygosity: v.maternal_zygosity.clone(),
                paternal_zygosity: v.paternal_zygosity.clone(),
                inheritance: v.inheritance.as_str().to_string(),
                somatic: v.somatic,
            });
        }
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        for (identity, variant) in identities {
            if let Some(id) = resolved.get(&(variant, report)) {
                ctx.proband_variants.insert(identity, id);
            }
        }
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

struct PvFlagResolver;

#[async_trait]
impl Resolver for PvFlagResolver {
    fn kind(&self) -> &'static str {
        "PVFlag"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let mut candidates = Vec::new();
        for v in &input.case.variants {
            if v.flags.is_empty() {
                continue;
            }
            let Some(&proband_variant) = ctx.proband_variants.get(&v.identity) else {
                ctx.skip(self.kind(), v.identity.to_string(), "proband variant not resolved");
                continue;
            };
            candidates.extend(v.flags.iter().map(|flag| PvFlag {
                proband_variant,
                flag_name: flag.clone(),
            }));
        }
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

struct ProbandTranscriptVariantResolver;

#[async_trait]
impl Resolver for ProbandTranscriptVariantResolver {
    fn kind(&self) -> &'static str {
        "ProbandTranscriptVariant"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let mut candidates = Vec::new();
        for v in &input.case.variants {
            let Some(&proband_variant) = ctx.proband_variants.get(&v.identity) else {
                continue;
            };
            for t in input.transcripts(v) {
                match ctx.transcripts.get(&t.transcript) {
                    Some(&transcript) => candidates.push(ProbandTranscriptVariant {
                        transcript,
                        proband_variant,
                        selected: t.canonical,
                        effect: t.effect.clone(),
                    }),
                    None => ctx.skip(
                        self.kind(),
                        format!("{}/{}", t.transcript, v.identity),
                        "transcript not resolved",
                    ),
                }
            }
        }
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}

struct ReportEventResolver;

#[async_trait]
impl Resolver for ReportEventResolver {
    fn kind(&self) -> &'static str {
        "ReportEvent"
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        input: &CaseInput<'_>,
        ctx: &mut ResolveContext,
    ) -> Result<()> {
        let mut candidates = Vec::new();
        for v in &input.case.variants {
            if v.report_events.is_empty() {
                continue;
            }
            let Some(&proband_variant) = ctx.proband_variants.get(&v.identity) else {
                ctx.skip(self.kind(), v.identity.to_string(), "proband variant not resolved");
                continue;
            };
            for event in &v.report_events {
                let Some(re_id) = event.re_id.clone() else {
                    ctx.skip(self.kind(), v.identity.to_string(), "report event has no id");
                    continue;
                };
                candidates.push(ReportEvent {
                    re_id,
                    proband_variant,
                    tier: event.tier,
                    mode_of_inheritance: event.mode_of_inheritance.clone(),
                    penetrance: event.penetrance.clone(),
                    panel_version: ctx.panel_version_for(event),
                    gene: ctx.gene_for(event),
                    score: event.score,
                });
            }
        }
        let resolved = UpsertEngine::resolve(tx, candidates).await?;
        ctx.record(self.kind(), &resolved);
        Ok(())
    }
}
