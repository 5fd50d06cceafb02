//! Participant demographics and clinician details from LabKey
//!
//! Demographics are optional enrichment: any lookup that fails or finds
//! nothing falls back to placeholder values and never fails the case.

use crate::case::CaseDocument;
use crate::config::{HttpConfig, LabKeyConfig};
use crate::error::{IngestError, Result};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::NaiveDate;
use mdt_common::SampleType;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const UNKNOWN: &str = "unknown";

fn default_date_of_birth() -> NaiveDate {
    NaiveDate::from_ymd_opt(2011, 1, 1).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Demographics {
    pub forename: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
    pub nhs_number: Option<String>,
}

impl Default for Demographics {
    fn default() -> Self {
        Self {
            forename: UNKNOWN.to_string(),
            surname: UNKNOWN.to_string(),
            date_of_birth: default_date_of_birth(),
            nhs_number: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicianInfo {
    pub name: String,
    pub hospital: String,
    pub email: String,
}

impl Default for ClinicianInfo {
    fn default() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            hospital: UNKNOWN.to_string(),
            email: UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnosis {
    pub disease_group: Option<String>,
    pub recruiting_disease: Option<String>,
    pub disease_subtype: Option<String>,
}

/// Everything looked up for one case
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseDemographics {
    pub proband: Demographics,
    /// Keyed by relative gel id
    pub relatives: HashMap<String, Demographics>,
    pub clinician: ClinicianInfo,
    pub diagnosis: Diagnosis,
}

#[async_trait]
pub trait DemographicsSource: Send + Sync {
    async fn participant(&self, sample_type: SampleType, gel_id: &str) -> Result<Option<Demographics>>;

    async fn clinician(
        &self,
        sample_type: SampleType,
        family_id: &str,
        proband_id: &str,
    ) -> Result<Option<ClinicianInfo>>;

    async fn diagnosis(&self, sample_type: SampleType, gel_id: &str) -> Result<Option<Diagnosis>>;
}

/// Look up everything a case needs, degrading each piece independently
pub async fn lookup_case(source: Option<&dyn DemographicsSource>, case: &CaseDocument) -> CaseDemographics {
    let Some(source) = source else {
        return CaseDemographics::default();
    };
    let sample_type = case.sample_type;
    let request_id = case.request_id.as_str();

    let degrade = |what: &str, e: &IngestError| {
        warn!(request_id, lookup = what, error = %e, "Demographics lookup failed, using defaults");
    };

    let proband = match source.participant(sample_type, &case.proband.gel_id).await {
        Ok(found) => found.unwrap_or_default(),
        Err(e) => {
            degrade("participant", &e);
            Demographics::default()
        },
    };

    let mut relatives = HashMap::new();
    for relative in &case.relatives {
        let demographics = match source.participant(sample_type, &relative.gel_id).await {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                degrade("relative", &e);
                Demographics::default()
            },
        };
        relatives.insert(relative.gel_id.clone(), demographics);
    }

    let clinician = match source
        .clinician(sample_type, &case.family_id, &case.proband.gel_id)
        .await
    {
        Ok(found) => found.unwrap_or_default(),
        Err(e) => {
            degrade("clinician", &e);
            ClinicianInfo::default()
        },
    };

    let diagnosis = match source.diagnosis(sample_type, &case.proband.gel_id).await {
        Ok(found) => found.unwrap_or_default(),
        Err(e) => {
            degrade("diagnosis", &e);
            Diagnosis::default()
        },
    };

    debug!(request_id, clinician = %clinician.name, "Resolved demographics");
    CaseDemographics {
        proband,
        relatives,
        clinician,
        diagnosis,
    }
}

// ============================================================================
// LabKey client
// ============================================================================

type LabKeyRow = Map<String, Value>;

#[derive(Debug, Deserialize)]
struct SelectRowsResponse {
    #[serde(default)]
    rows: Vec<LabKeyRow>,
}

fn schema_for(sample_type: SampleType) -> &'static str {
    match sample_type {
        SampleType::RareDisease => "gel_rare_diseases",
        SampleType::Cancer => "gel_cancer",
    }
}

fn text(row: &LabKeyRow, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// LabKey dates look like `"1980/03/14 00:00:00"`
fn parse_date(text: &str) -> Option<NaiveDate> {
    let date = text.get(..10)?;
    NaiveDate::parse_from_str(date, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(date, "%Y-%m-%d"))
        .ok()
}

pub struct LabKeyClient {
    http: reqwest::Client,
    base_url: String,
    containers: Vec<String>,
    retry: RetryPolicy,
}

impl LabKeyClient {
    pub fn new(config: &LabKeyConfig, http: &HttpConfig) -> Result<Self> {
        Self::with_client(config, http.client()?, http.retry_policy())
    }

    pub fn with_client(config: &LabKeyConfig, http: reqwest::Client, retry: RetryPolicy) -> Result<Self> {
        if config.containers.is_empty() {
            return Err(IngestError::Config(
                "LabKey needs at least one container".to_string(),
            ));
        }
        Ok(Self {
            http,
            base_url: crate::http::trim_base(&config.base_url),
            containers: config
                .containers
                .iter()
                .map(|c| c.trim_matches('/').to_string())
                .collect(),
            retry,
        })
    }

    async fn select_rows_once(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<SelectRowsResponse> {
        let response = self.http.get(url).query(params).send().await?;
        crate::http::read_json(response, url).await
    }

    /// First row matching the filter, trying each container in order
    async fn first_row(
        &self,
        schema: &str,
        query: &str,
        filter: (&str, &str, &str),
    ) -> Result<Option<LabKeyRow>> {
        let (column, operator, value) = filter;
        let params = vec![
            ("schemaName".to_string(), schema.to_string()),
            ("query.queryName".to_string(), query.to_string()),
            (format!("query.{}~{}", column, operator), value.to_string()),
        ];

        for container in &self.containers {
            let url = format!("{}/{}/query-selectRows.api", self.base_url, container);
            let response = self
                .retry
                .run("labkey_select_rows", || self.select_rows_once(&url, &params))
                .await?;

            if let Some(row) = response.rows.into_iter().next() {
                debug!(container = %container, query, value, "LabKey row found");
                return Ok(Some(row));
            }
            debug!(container = %container, query, value, "No LabKey row, trying next container");
        }
        Ok(None)
    }
}

#[async_trait]
impl DemographicsSource for LabKeyClient {
    async fn participant(&self, sample_type: SampleType, gel_id: &str) -> Result<Option<Demographics>> {
        let row = self
            .first_row(
                schema_for(sample_type),
                "participant_identifier",
                ("participant_id", "in", gel_id),
            )
            .await?;

        Ok(row.filter(|r| text(r, "surname").is_some()).map(|r| {
            let fallback = Demographics::default();
            Demographics {
                forename: text(&r, "forenames").unwrap_or(fallback.forename),
                surname: text(&r, "surname").unwrap_or(fallback.surname),
                date_of_birth: text(&r, "date_of_birth")
                    .as_deref()
                    .and_then(parse_date)
                    .unwrap_or(fallback.date_of_birth),
                nhs_number: text(&r, "person_identifier"),
            }
        }))
    }

    async fn clinician(
        &self,
        sample_type: SampleType,
        family_id: &str,
        proband_id: &str,
    ) -> Result<Option<ClinicianInfo>> {
        let (query, filter) = match sample_type {
            SampleType::RareDisease => (
                "rare_diseases_registration",
                ("family_id", "contains", family_id),
            ),
            SampleType::Cancer => (
                "cancer_registration",
                ("participant_identifiers_id", "contains", proband_id),
            ),
        };
        let row = self.first_row(schema_for(sample_type), query, filter).await?;

        Ok(row.and_then(|r| {
            let name = text(&r, "consultant_details_full_name_of_responsible_consultant")?;
            Some(ClinicianInfo {
                name,
                hospital: text(&r, "consultant_details_hospital_of_responsible_consultant")
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                email: UNKNOWN.to_string(),
            })
        }))
    }

    async fn diagnosis(&self, sample_type: SampleType, gel_id: &str) -> Result<Option<Diagnosis>> {
        if sample_type != SampleType::RareDisease {
            return Ok(None);
        }
        let row = self
            .first_row(
                schema_for(sample_type),
                "rare_diseases_diagnosis",
                ("participant_identifiers_id", "in", gel_id),
            )
            .await?;

        Ok(row.map(|r| Diagnosis {
            disease_group: text(&r, "gel_disease_information_disease_group"),
            recruiting_disease: text(&r, "gel_disease_information_specific_disease"),
            disease_subtype: text(&r, "gel_disease_information_disease_subgroup"),
        }))
    }
}
