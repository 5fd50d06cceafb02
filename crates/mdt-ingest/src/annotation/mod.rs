//! Variant annotation
//!
//! Variants from every case in a batch are grouped by genome build and sent
//! to the annotation service in one call per build; results are joined back
//! onto each originating case.

mod cellbase;
mod join;
mod key;
mod models;

pub use cellbase::CellBaseClient;
pub use join::{AnnotationJoin, AnnotationOutcome, TaggedVariant};
pub use key::VariantKey;
pub use models::{ConsequenceExtractor, TranscriptAnnotation, VariantAnnotation};

use crate::error::Result;
use async_trait::async_trait;
use mdt_common::GenomeBuild;
use std::collections::HashMap;

#[async_trait]
pub trait AnnotationService: Send + Sync {
    /// Annotate `keys`, all in `build`. Keys the service knows nothing about
    /// are absent from the result.
    async fn annotate(
        &self,
        build: GenomeBuild,
        keys: &[VariantKey],
    ) -> Result<HashMap<VariantKey, VariantAnnotation>>;
}
