//! Batch-wide annotation keyed back onto each case's variants

use super::key::VariantKey;
use super::models::VariantAnnotation;
use super::AnnotationService;
use crate::case::VariantIdentity;
use crate::error::IngestError;
use mdt_common::GenomeBuild;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// A variant from one case, tagged with that case's build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedVariant {
    pub case_id: String,
    pub build: GenomeBuild,
    pub identity: VariantIdentity,
}

#[derive(Debug, Default)]
pub struct AnnotationOutcome {
    annotations: HashMap<(String, VariantIdentity), Arc<VariantAnnotation>>,
    /// Builds whose annotation call failed
    pub failures: BTreeMap<GenomeBuild, IngestError>,
}

impl AnnotationOutcome {
    pub fn get(&self, case_id: &str, identity: &VariantIdentity) -> Option<&VariantAnnotation> {
        self.annotations
            .get(&(case_id.to_string(), identity.clone()))
            .map(Arc::as_ref)
    }

    pub fn failure(&self, build: GenomeBuild) -> Option<&IngestError> {
        self.failures.get(&build)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}

pub struct AnnotationJoin<'a> {
    service: &'a dyn AnnotationService,
}

impl<'a> AnnotationJoin<'a> {
    pub fn new(service: &'a dyn AnnotationService) -> Self {
        Self { service }
    }

    /// One service call per build, however many cases share it. A failed
    /// build is recorded in the outcome; the other builds still annotate.
    pub async fn annotate(&self, variants: &[TaggedVariant]) -> AnnotationOutcome {
        let mut by_build: BTreeMap<GenomeBuild, BTreeSet<VariantKey>> = BTreeMap::new();
        let mut origins: HashMap<(GenomeBuild, VariantKey), Vec<(String, VariantIdentity)>> =
            HashMap::new();

        for variant in variants {
            let key = VariantKey::from_identity(&variant.identity);
            by_build.entry(variant.build).or_default().insert(key.clone());
            origins
                .entry((variant.build, key))
                .or_default()
                .push((variant.case_id.clone(), variant.identity.clone()));
        }

        let mut outcome = AnnotationOutcome::default();
        for (build, keys) in by_build {
            let keys: Vec<VariantKey> = keys.into_iter().collect();
            debug!(%build, keys = keys.len(), "Annotating build");

            let annotated = match self.service.annotate(build, &keys).await {
                Ok(annotated) => annotated,
                Err(e) => {
                    warn!(%build, error = %e, "Annotation failed for build");
                    outcome.failures.insert(build, e);
                    continue;
                },
            };

            for (key, annotation) in annotated {
                let Some(targets) = origins.get(&(build, key.clone())) else {
                    warn!(%build, variant = %key, "Annotation returned for an unknown variant");
                    continue;
                };
                let annotation = Arc::new(annotation);
                for target in targets {
                    outcome
                        .annotations
                        .insert(target.clone(), Arc::clone(&annotation));
                }
            }
        }
        outcome
    }
}
