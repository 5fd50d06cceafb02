//! Batch ingestion orchestrator
//!
//! Drives one run end to end: authenticate, list and select the worklist,
//! then per batch fetch, classify, resolve, annotate and upsert each case.
//! A case that fails at any step is recorded in the [`RunSummary`] and the
//! rest of the batch carries on. Only authentication and listing failures
//! abort the run.

use crate::annotation::{AnnotationJoin, AnnotationOutcome, AnnotationService, TaggedVariant};
use crate::case::{CaseDocument, ParseOptions};
use crate::change::{ChangeDetector, Classification};
use crate::config::PipelineConfig;
use crate::demographics::{lookup_case, CaseDemographics, DemographicsSource};
use crate::error::{IngestError, Result};
use crate::panels::{PanelCache, PanelSource};
use crate::resolve::{upsert_case, CaseInput, CasePanel, ResolveContext};
use crate::source::{CaseSource, CaseSummary};
use crate::store::Store;
use crate::summary::{CaseState, RunSummary};
use futures::stream::{self, StreamExt};
use mdt_common::SampleType;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Case documents fetched at once within a batch
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub sample_type: SampleType,
    /// Only ingest cases whose proband has this gel id
    pub sample: Option<String>,
    pub case_count: Option<usize>,
    pub skip_demographics: bool,
    pub pull_t3: bool,
    /// Overrides the configured batch size
    pub batch_size: Option<usize>,
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new(sample_type: SampleType) -> Self {
        Self {
            sample_type,
            sample: None,
            case_count: None,
            skip_demographics: false,
            pull_t3: false,
            batch_size: None,
            dry_run: false,
        }
    }
}

/// Narrow a listing down to the cases this run should ingest, newest first
pub fn select_worklist(
    listing: Vec<CaseSummary>,
    options: &RunOptions,
    excluded_sites: &[String],
) -> Vec<CaseSummary> {
    let statuses = options.sample_type.polled_statuses();

    let mut selected: Vec<CaseSummary> = listing
        .into_iter()
        .filter(|c| {
            c.sample_type
                .parse::<SampleType>()
                .is_ok_and(|t| t == options.sample_type)
        })
        .filter(|c| statuses.contains(&c.last_status.as_str()))
        .filter(|c| {
            !c.sites
                .iter()
                .any(|site| excluded_sites.iter().any(|x| x.eq_ignore_ascii_case(site)))
        })
        .filter(|c| {
            options
                .sample
                .as_deref()
                .is_none_or(|gel_id| c.proband.as_deref() == Some(gel_id))
        })
        .collect();

    selected.reverse();
    if let Some(cap) = options.case_count {
        selected.truncate(cap);
    }
    selected
}

/// A case that failed at `state`
struct CaseError {
    case_id: String,
    state: CaseState,
    error: IngestError,
}

impl CaseError {
    fn at(case_id: &str, state: CaseState) -> impl FnOnce(IngestError) -> CaseError + '_ {
        move |error| CaseError {
            case_id: case_id.to_string(),
            state,
            error,
        }
    }
}

/// A case that needs writing, with everything gathered for it
struct PendingCase {
    document: CaseDocument,
    classification: Classification,
    panels: Vec<CasePanel>,
    demographics: CaseDemographics,
}

pub struct BatchOrchestrator {
    source: Arc<dyn CaseSource>,
    store: Arc<dyn Store>,
    annotation: Arc<dyn AnnotationService>,
    panels: PanelCache,
    demographics: Option<Arc<dyn DemographicsSource>>,
    pipeline: PipelineConfig,
}

impl BatchOrchestrator {
    pub fn new(
        source: Arc<dyn CaseSource>,
        store: Arc<dyn Store>,
        annotation: Arc<dyn AnnotationService>,
        panels: Arc<dyn PanelSource>,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            source,
            store,
            annotation,
            panels: PanelCache::new(panels),
            demographics: None,
            pipeline,
        }
    }

    pub fn with_demographics(mut self, demographics: Arc<dyn DemographicsSource>) -> Self {
        self.demographics = Some(demographics);
        self
    }

    /// Run one ingest. Returns `Err` only for faults that abort the run; the
    /// summary is recorded either way unless this is a dry run.
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::new(options.sample_type, options.dry_run);

        info!(
            sample_type = %options.sample_type,
            dry_run = options.dry_run,
            pull_t3 = options.pull_t3,
            "Starting ingest run"
        );

        let worklist = match self.worklist(options).await {
            Ok(worklist) => worklist,
            Err(e) => return self.abort(summary, options, e).await,
        };
        summary.listed = worklist.len();

        let batch_size = options
            .batch_size
            .unwrap_or(self.pipeline.batch_size)
            .max(1);
        let batches = worklist.len().div_ceil(batch_size);
        for (index, batch) in worklist.chunks(batch_size).enumerate() {
            info!(batch = index + 1, batches, cases = batch.len(), "Processing batch");
            if let Err(e) = self.process_batch(batch, options, &mut summary).await {
                return self.abort(summary, options, e).await;
            }
        }

        self.panels.log_stats().await;
        summary.finish();
        self.record(&summary, options).await;

        info!(
            listed = summary.listed,
            added = summary.added,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            duration_secs = start.elapsed().as_secs_f64(),
            "Ingest run complete"
        );
        Ok(summary)
    }

    async fn abort(&self, mut summary: RunSummary, options: &RunOptions, e: IngestError) -> Result<RunSummary> {
        error!(error = %e, "Ingest run aborted");
        summary.fatal(e.to_string());
        summary.finish();
        self.record(&summary, options).await;
        Err(e)
    }

    async fn worklist(&self, options: &RunOptions) -> Result<Vec<CaseSummary>> {
        self.source.authenticate().await.map_err(|e| {
            if e.is_fatal() {
                e
            } else {
                IngestError::Authentication(e.to_string())
            }
        })?;

        let listing = self.source.list_cases().await.map_err(|e| {
            if e.is_fatal() {
                e
            } else {
                IngestError::SourceUnavailable(format!("listing failed: {}", e))
            }
        })?;
        let total = listing.len();

        let worklist = select_worklist(listing, options, &self.pipeline.excluded_sites);
        info!(total, selected = worklist.len(), "Selected worklist");
        Ok(worklist)
    }

    async fn record(&self, summary: &RunSummary, options: &RunOptions) {
        if options.dry_run {
            debug!("Dry run, not recording run summary");
            return;
        }
        if let Err(e) = self.store.record_run(summary).await {
            warn!(error = %e, "Failed to record run summary");
        }
    }

    fn fail(&self, summary: &mut RunSummary, failure: CaseError) {
        let category = failure.error.category();
        warn!(
            case_id = %failure.case_id,
            state = %failure.state,
            %category,
            error = %failure.error,
            "Case failed"
        );
        summary.record_failure(failure.case_id, category, failure.error.to_string(), failure.state);
    }

    /// Writes what it can of one batch. Returns `Err` when a case fetch hits
    /// a fault that no later case can get past, such as revoked credentials.
    async fn process_batch(
        &self,
        batch: &[CaseSummary],
        options: &RunOptions,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let parse_options = ParseOptions {
            pull_t3: options.pull_t3,
            tier_threshold: self.pipeline.tier_threshold,
            exomiser_score: self.pipeline.exomiser_score,
        };

        let fetched: Vec<std::result::Result<CaseDocument, CaseError>> = stream::iter(batch)
            .map(|item| self.fetch(item, &parse_options))
            .buffered(DEFAULT_FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut pending = Vec::new();
        for result in fetched {
            let document = match result {
                Ok(document) => document,
                Err(failure) if failure.error.is_fatal() => {
                    error!(case_id = %failure.case_id, state = %failure.state, "Fatal fault fetching case");
                    return Err(failure.error);
                },
                Err(failure) => {
                    self.fail(summary, failure);
                    continue;
                },
            };

            let classification = ChangeDetector::classify(self.store.as_ref(), &document).await;
            debug!(
                case_id = %document.request_id,
                state = %CaseState::Classified,
                %classification,
                "Case state"
            );
            if classification == Classification::Skip {
                info!(case_id = %document.request_id, "Case unchanged, skipping");
                summary.skipped += 1;
                continue;
            }

            match self.gather(document, classification, options).await {
                Ok(case) => pending.push(case),
                Err(failure) => self.fail(summary, failure),
            }
        }

        if pending.is_empty() {
            return Ok(());
        }

        let outcome = self.annotate(&pending).await;

        for case in pending {
            let case_id = case.document.request_id.clone();
            if !case.document.variants.is_empty() {
                if let Some(e) = outcome.failure(case.document.genome_build) {
                    let category = e.category();
                    warn!(case_id = %case_id, error = %e, "Annotation failed for case build");
                    summary.record_failure(case_id, category, e.to_string(), CaseState::Annotating);
                    continue;
                }
            }

            match self.upsert(&case, &outcome, options.dry_run).await {
                Ok(ctx) => self.committed(case, ctx, options, summary).await,
                Err(e) => self.fail(
                    summary,
                    CaseError {
                        case_id,
                        state: CaseState::Upserting,
                        error: e,
                    },
                ),
            }
        }
        Ok(())
    }

    async fn fetch(
        &self,
        item: &CaseSummary,
        parse_options: &ParseOptions,
    ) -> std::result::Result<CaseDocument, CaseError> {
        let case_id = item.interpretation_request_id.as_str();
        let (ir_id, version) = item.ir_and_version().ok_or_else(|| {
            CaseError::at(case_id, CaseState::Fetched)(IngestError::data_integrity(
                case_id,
                "listing id is not of the form {ir_id}-{version}",
            ))
        })?;

        let raw = self
            .source
            .fetch_case(ir_id, version)
            .await
            .map_err(CaseError::at(case_id, CaseState::Fetched))?;
        debug!(case_id, state = %CaseState::Fetched, "Case state");

        let document =
            CaseDocument::parse(raw, parse_options).map_err(CaseError::at(case_id, CaseState::Hashed))?;
        debug!(
            case_id,
            state = %CaseState::Hashed,
            variants = document.variant_count(),
            excluded = document.excluded_variants,
            "Case state"
        );
        Ok(document)
    }

    async fn gather(
        &self,
        document: CaseDocument,
        classification: Classification,
        options: &RunOptions,
    ) -> std::result::Result<PendingCase, CaseError> {
        let case_id = document.request_id.clone();
        debug!(case_id = %case_id, state = %CaseState::Resolving, "Case state");

        let mut panels = Vec::with_capacity(document.panels.len());
        for reference in &document.panels {
            let info = self
                .panels
                .get(&reference.name, reference.version.as_deref())
                .await
                .map_err(CaseError::at(&case_id, CaseState::Resolving))?;
            panels.push(CasePanel {
                reference: reference.clone(),
                info,
            });
        }

        let demographics = if options.skip_demographics {
            CaseDemographics::default()
        } else {
            lookup_case(self.demographics.as_deref(), &document).await
        };

        Ok(PendingCase {
            document,
            classification,
            panels,
            demographics,
        })
    }

    async fn annotate(&self, pending: &[PendingCase]) -> AnnotationOutcome {
        let tagged: Vec<TaggedVariant> = pending
            .iter()
            .flat_map(|case| {
                case.document.variants.iter().map(|v| TaggedVariant {
                    case_id: case.document.request_id.clone(),
                    build: case.document.genome_build,
                    identity: v.identity.clone(),
                })
            })
            .collect();
        for case in pending {
            debug!(case_id = %case.document.request_id, state = %CaseState::Annotating, "Case state");
        }

        if tagged.is_empty() {
            return AnnotationOutcome::default();
        }
        AnnotationJoin::new(self.annotation.as_ref()).annotate(&tagged).await
    }

    async fn upsert(&self, case: &PendingCase, outcome: &AnnotationOutcome, dry_run: bool) -> Result<ResolveContext> {
        debug!(case_id = %case.document.request_id, state = %CaseState::Upserting, "Case state");
        let input = CaseInput {
            case: &case.document,
            demographics: &case.demographics,
            panels: &case.panels,
            annotations: outcome,
        };

        let mut tx = self.store.begin().await?;
        match upsert_case(tx.as_mut(), &input).await {
            Ok(ctx) => {
                if dry_run {
                    tx.rollback().await?;
                } else {
                    tx.commit().await?;
                }
                Ok(ctx)
            },
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(case_id = %case.document.request_id, error = %rollback, "Rollback failed");
                }
                Err(e)
            },
        }
    }

    async fn committed(
        &self,
        case: PendingCase,
        ctx: ResolveContext,
        options: &RunOptions,
        summary: &mut RunSummary,
    ) {
        let case_id = case.document.request_id.clone();
        let archived_version = ctx.archived_version.unwrap_or_default();
        debug!(case_id = %case_id, state = %CaseState::Committed, archived_version, "Case state");

        if !options.dry_run {
            if let Some(dir) = &self.pipeline.archive_dir {
                if let Err(e) = write_archive(dir, &case_id, archived_version, case.document.raw()).await {
                    warn!(case_id = %case_id, error = %e, "Failed to archive case document");
                }
            }
        }

        match case.classification {
            Classification::Update => {
                summary.updated += 1;
                summary.reports_updated.insert(case_id.clone(), archived_version);
            },
            _ => {
                summary.added += 1;
                summary.reports_added.insert(case_id.clone(), archived_version);
            },
        }
        summary.skipped_entities.extend(ctx.skipped);

        info!(
            case_id = %case_id,
            classification = %case.classification,
            archived_version,
            dry_run = options.dry_run,
            "Case committed"
        );
    }
}

/// Write the raw case document as `{dir}/{request_id}-{archived_version}.json`
pub async fn write_archive(dir: &Path, request_id: &str, archived_version: i64, raw: &Value) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}-{}.json", request_id, archived_version));
    let body = serde_json::to_vec_pretty(raw)?;
    tokio::fs::write(&path, body).await?;
    debug!(path = %path.display(), "Archived case document");
    Ok(())
}
