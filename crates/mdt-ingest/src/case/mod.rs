//! Case documents fetched from the case source

mod document;
mod raw;
mod variant;

pub use document::{
    CaseDocument, CaseStatus, FamilyMember, PanelCoverage, PanelRef, ParseOptions, Participant,
    CLINICAL_REPORT_FLAG,
};
pub use variant::{
    min_tier, parse_tier, CaseVariant, Inheritance, ReportEventData, VariantIdentity,
    UNKNOWN_ZYGOSITY,
};
