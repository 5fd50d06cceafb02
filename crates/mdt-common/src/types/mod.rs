//! Shared domain types

use crate::error::MdtError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Programme a case was submitted under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    #[serde(rename = "raredisease")]
    RareDisease,
    Cancer,
}

impl SampleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleType::RareDisease => "raredisease",
            SampleType::Cancer => "cancer",
        }
    }

    /// Case statuses worth polling for this programme
    pub fn polled_statuses(&self) -> &'static [&'static str] {
        match self {
            SampleType::RareDisease => &["sent_to_gmcs", "report_generated", "report_sent"],
            SampleType::Cancer => &[
                "sent_to_gmcs",
                "report_generated",
                "report_sent",
                "interpretation_generated",
            ],
        }
    }
}

impl FromStr for SampleType {
    type Err = MdtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raredisease" | "rare_disease" | "rd" => Ok(SampleType::RareDisease),
            "cancer" => Ok(SampleType::Cancer),
            other => Err(MdtError::Parse(format!("Invalid sample type: {}", other))),
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference genome assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GenomeBuild {
    GRCh37,
    GRCh38,
}

impl GenomeBuild {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenomeBuild::GRCh37 => "GRCh37",
            GenomeBuild::GRCh38 => "GRCh38",
        }
    }
}

impl FromStr for GenomeBuild {
    type Err = MdtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        if lowered.starts_with("grch37") || lowered == "hg19" || lowered == "37" {
            Ok(GenomeBuild::GRCh37)
        } else if lowered.starts_with("grch38") || lowered == "hg38" || lowered == "38" {
            Ok(GenomeBuild::GRCh38)
        } else {
            Err(MdtError::Parse(format!("Unknown genome build: {}", s)))
        }
    }
}

impl fmt::Display for GenomeBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
