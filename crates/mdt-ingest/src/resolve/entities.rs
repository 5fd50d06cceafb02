//! Candidate records for each entity table
//!
//! Field order in `values()` follows the column order in
//! [`crate::store::schema`].

use super::engine::Entity;
use crate::case::VariantIdentity;
use crate::store::{schema, KeyValue, RecordId, TableSpec, Value};
use chrono::{DateTime, NaiveDate, Utc};

fn text(value: &Option<String>) -> Value {
    Value::Text(value.clone())
}

fn date(value: NaiveDate) -> Value {
    Value::Text(Some(value.format("%Y-%m-%d").to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clinician {
    pub name: String,
    pub hospital: String,
    pub email: String,
}

impl Entity for Clinician {
    type Key = (String, String, String);
    const TABLE: &'static TableSpec = &schema::CLINICIAN;

    fn key(&self) -> Self::Key {
        (self.name.clone(), self.hospital.clone(), self.email.clone())
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![key.0.clone().into(), key.1.clone().into(), key.2.clone().into()]
    }

    fn values(&self) -> Vec<Value> {
        vec![]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Family {
    pub gel_family_id: String,
    pub clinician: RecordId,
    pub trio_sequenced: bool,
    pub has_de_novo: bool,
}

impl Entity for Family {
    type Key = String;
    const TABLE: &'static TableSpec = &schema::FAMILY;

    fn key(&self) -> String {
        self.gel_family_id.clone()
    }

    fn key_values(key: &String) -> Vec<KeyValue> {
        vec![key.clone().into()]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Int(Some(self.clinician)),
            Value::Bool(Some(self.trio_sequenced)),
            Value::Bool(Some(self.has_de_novo)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Phenotype {
    pub hpo_term: String,
}

impl Entity for Phenotype {
    type Key = String;
    const TABLE: &'static TableSpec = &schema::PHENOTYPE;

    fn key(&self) -> String {
        self.hpo_term.clone()
    }

    fn key_values(key: &String) -> Vec<KeyValue> {
        vec![key.clone().into()]
    }

    fn values(&self) -> Vec<Value> {
        vec![]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FamilyPhenotype {
    pub family: RecordId,
    pub phenotype: RecordId,
}

impl Entity for FamilyPhenotype {
    type Key = (RecordId, RecordId);
    const TABLE: &'static TableSpec = &schema::FAMILY_PHENOTYPE;

    fn key(&self) -> Self::Key {
        (self.family, self.phenotype)
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![KeyValue::Int(key.0), KeyValue::Int(key.1)]
    }

    fn values(&self) -> Vec<Value> {
        vec![]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolOrAssemblyVersion {
    pub tool_name: String,
    pub version_number: String,
}

impl Entity for ToolOrAssemblyVersion {
    type Key = (String, String);
    const TABLE: &'static TableSpec = &schema::TOOL_OR_ASSEMBLY_VERSION;

    fn key(&self) -> Self::Key {
        (self.tool_name.clone(), self.version_number.clone())
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![key.0.clone().into(), key.1.clone().into()]
    }

    fn values(&self) -> Vec<Value> {
        vec![]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub panelapp_id: String,
    pub panel_name: Option<String>,
    pub disease_group: Option<String>,
    pub disease_subgroup: Option<String>,
}

impl Entity for Panel {
    type Key = String;
    const TABLE: &'static TableSpec = &schema::PANEL;

    fn key(&self) -> String {
        self.panelapp_id.clone()
    }

    fn key_values(key: &String) -> Vec<KeyValue> {
        vec![key.clone().into()]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.panel_name),
            text(&self.disease_group),
            text(&self.disease_subgroup),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelVersion {
    pub panel: RecordId,
    pub version_number: String,
}

impl Entity for PanelVersion {
    type Key = (RecordId, String);
    const TABLE: &'static TableSpec = &schema::PANEL_VERSION;

    fn key(&self) -> Self::Key {
        (self.panel, self.version_number.clone())
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![KeyValue::Int(key.0), key.1.clone().into()]
    }

    fn values(&self) -> Vec<Value> {
        vec![]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gene {
    /// Ensembl id, or `HGNC:{symbol}` when PanelApp has none
    pub gene_key: String,
    pub ensembl_id: Option<String>,
    pub hgnc_name: Option<String>,
}

impl Entity for Gene {
    type Key = String;
    const TABLE: &'static TableSpec = &schema::GENE;

    fn key(&self) -> String {
        self.gene_key.clone()
    }

    fn key_values(key: &String) -> Vec<KeyValue> {
        vec![key.clone().into()]
    }

    fn values(&self) -> Vec<Value> {
        vec![text(&self.ensembl_id), text(&self.hgnc_name)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelVersionGene {
    pub panel_version: RecordId,
    pub gene: RecordId,
    pub level_of_confidence: Option<String>,
}

impl Entity for PanelVersionGene {
    type Key = (RecordId, RecordId);
    const TABLE: &'static TableSpec = &schema::PANEL_VERSION_GENE;

    fn key(&self) -> Self::Key {
        (self.panel_version, self.gene)
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![KeyValue::Int(key.0), KeyValue::Int(key.1)]
    }

    fn values(&self) -> Vec<Value> {
        vec![text(&self.level_of_confidence)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub name: String,
    pub genome_assembly: RecordId,
    pub gene: RecordId,
    pub canonical: bool,
    pub protein: Option<String>,
    pub strand: String,
}

impl Entity for Transcript {
    type Key = (String, RecordId);
    const TABLE: &'static TableSpec = &schema::TRANSCRIPT;

    fn key(&self) -> Self::Key {
        (self.name.clone(), self.genome_assembly)
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![key.0.clone().into(), KeyValue::Int(key.1)]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Int(Some(self.gene)),
            Value::Bool(Some(self.canonical)),
            text(&self.protein),
            Value::text(self.strand.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub identity: VariantIdentity,
    pub genome_assembly: RecordId,
    pub db_snp_id: Option<String>,
}

impl Entity for Variant {
    type Key = (VariantIdentity, RecordId);
    const TABLE: &'static TableSpec = &schema::VARIANT;

    fn key(&self) -> Self::Key {
        (self.identity.clone(), self.genome_assembly)
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        let (identity, assembly) = key;
        vec![
            identity.chromosome.clone().into(),
            KeyValue::Int(identity.position),
            identity.reference.clone().into(),
            identity.alternate.clone().into(),
            KeyValue::Int(*assembly),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![text(&self.db_snp_id)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptVariant {
    pub transcript: RecordId,
    pub variant: RecordId,
    pub effect: String,
    pub hgvs_c: Option<String>,
    pub hgvs_p: Option<String>,
    pub hgvs_g: String,
    pub sift: Option<String>,
    pub polyphen: Option<String>,
    pub af_max: Option<f64>,
}

impl Entity for TranscriptVariant {
    type Key = (RecordId, RecordId);
    const TABLE: &'static TableSpec = &schema::TRANSCRIPT_VARIANT;

    fn key(&self) -> Self::Key {
        (self.transcript, self.variant)
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![KeyValue::Int(key.0), KeyValue::Int(key.1)]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::text(self.effect.clone()),
            text(&self.hgvs_c),
            text(&self.hgvs_p),
            Value::text(self.hgvs_g.clone()),
            text(&self.sift),
            text(&self.polyphen),
            Value::Float(self.af_max),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Proband {
    pub gel_id: String,
    pub family: RecordId,
    pub forename: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
    pub sex: Option<String>,
    pub nhs_number: Option<String>,
    /// Hospital of the responsible clinician
    pub gmc: String,
    pub recruiting_disease: Option<String>,
    pub disease_group: Option<String>,
    pub disease_subtype: Option<String>,
}

impl Entity for Proband {
    type Key = String;
    const TABLE: &'static TableSpec = &schema::PROBAND;

    fn key(&self) -> String {
        self.gel_id.clone()
    }

    fn key_values(key: &String) -> Vec<KeyValue> {
        vec![key.clone().into()]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Int(Some(self.family)),
            Value::text(self.forename.clone()),
            Value::text(self.surname.clone()),
            date(self.date_of_birth),
            text(&self.sex),
            text(&self.nhs_number),
            Value::text(self.gmc.clone()),
            text(&self.recruiting_disease),
            text(&self.disease_group),
            text(&self.disease_subtype),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relative {
    pub gel_id: String,
    pub proband: RecordId,
    pub relation_to_proband: String,
    pub affection_status: Option<String>,
    pub sex: Option<String>,
    pub sequenced: bool,
    pub forename: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
}

impl Entity for Relative {
    type Key = (String, RecordId);
    const TABLE: &'static TableSpec = &schema::RELATIVE;

    fn key(&self) -> Self::Key {
        (self.gel_id.clone(), self.proband)
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![key.0.clone().into(), KeyValue::Int(key.1)]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::text(self.relation_to_proband.clone()),
            text(&self.affection_status),
            text(&self.sex),
            Value::Bool(Some(self.sequenced)),
            Value::text(self.forename.clone()),
            Value::text(self.surname.clone()),
            date(self.date_of_birth),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpretationReportFamily {
    /// `"{ir_id}-{version}"`
    pub ir_family_id: String,
    pub family: RecordId,
    pub sample_type: String,
    pub priority: Option<String>,
    pub cip: Option<String>,
}

impl Entity for InterpretationReportFamily {
    type Key = String;
    const TABLE: &'static TableSpec = &schema::INTERPRETATION_REPORT_FAMILY;

    fn key(&self) -> String {
        self.ir_family_id.clone()
    }

    fn key_values(key: &String) -> Vec<KeyValue> {
        vec![key.clone().into()]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Int(Some(self.family)),
            Value::text(self.sample_type.clone()),
            text(&self.priority),
            text(&self.cip),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpretationReportFamilyPanel {
    pub ir_family: RecordId,
    pub panel_version: RecordId,
    pub average_coverage: Option<f64>,
    pub proportion_above_15x: Option<f64>,
    /// Comma-joined, sorted
    pub genes_failing_coverage: Option<String>,
}

impl Entity for InterpretationReportFamilyPanel {
    type Key = (RecordId, RecordId);
    const TABLE: &'static TableSpec = &schema::INTERPRETATION_REPORT_FAMILY_PANEL;

    fn key(&self) -> Self::Key {
        (self.ir_family, self.panel_version)
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![KeyValue::Int(key.0), KeyValue::Int(key.1)]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Float(self.average_coverage),
            Value::Float(self.proportion_above_15x),
            text(&self.genes_failing_coverage),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GelInterpretationReport {
    pub ir_family: RecordId,
    pub archived_version: i64,
    pub content_hash: String,
    pub status: String,
    pub updated: Option<DateTime<Utc>>,
    pub user: Option<String>,
    pub sample_id: Option<String>,
    pub max_tier: Option<u8>,
    pub assembly: RecordId,
    pub sites: Option<String>,
}

impl Entity for GelInterpretationReport {
    type Key = (RecordId, i64);
    const TABLE: &'static TableSpec = &schema::GEL_INTERPRETATION_REPORT;

    fn key(&self) -> Self::Key {
        (self.ir_family, self.archived_version)
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![KeyValue::Int(key.0), KeyValue::Int(key.1)]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::text(self.content_hash.clone()),
            Value::text(self.status.clone()),
            Value::Timestamp(self.updated),
            text(&self.user),
            text(&self.sample_id),
            Value::Int(self.max_tier.map(i64::from)),
            Value::Int(Some(self.assembly)),
            text(&self.sites),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbandVariant {
    pub variant: RecordId,
    pub interpretation_report: RecordId,
    pub max_tier: Option<u8>,
    pub zygosity: String,
    pub maternal_zygosity: String,
    pub paternal_zygosity: String,
    pub inheritance: String,
    pub somatic: bool,
}

impl Entity for ProbandVariant {
    type Key = (RecordId, RecordId);
    const TABLE: &'static TableSpec = &schema::PROBAND_VARIANT;

    fn key(&self) -> Self::Key {
        (self.variant, self.interpretation_report)
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![KeyValue::Int(key.0), KeyValue::Int(key.1)]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Int(self.max_tier.map(i64::from)),
            Value::text(self.zygosity.clone()),
            Value::text(self.maternal_zygosity.clone()),
            Value::text(self.paternal_zygosity.clone()),
            Value::text(self.inheritance.clone()),
            Value::Bool(Some(self.somatic)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PvFlag {
    pub proband_variant: RecordId,
    pub flag_name: String,
}

impl Entity for PvFlag {
    type Key = (RecordId, String);
    const TABLE: &'static TableSpec = &schema::PV_FLAG;

    fn key(&self) -> Self::Key {
        (self.proband_variant, self.flag_name.clone())
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![KeyValue::Int(key.0), key.1.clone().into()]
    }

    fn values(&self) -> Vec<Value> {
        vec![]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbandTranscriptVariant {
    pub transcript: RecordId,
    pub proband_variant: RecordId,
    /// Whether this is the transcript shown for the variant
    pub selected: bool,
    pub effect: String,
}

impl Entity for ProbandTranscriptVariant {
    type Key = (RecordId, RecordId);
    const TABLE: &'static TableSpec = &schema::PROBAND_TRANSCRIPT_VARIANT;

    fn key(&self) -> Self::Key {
        (self.transcript, self.proband_variant)
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![KeyValue::Int(key.0), KeyValue::Int(key.1)]
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Bool(Some(self.selected)), Value::text(self.effect.clone())]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportEvent {
    pub re_id: String,
    pub proband_variant: RecordId,
    pub tier: Option<u8>,
    pub mode_of_inheritance: Option<String>,
    pub penetrance: Option<String>,
    pub panel_version: Option<RecordId>,
    pub gene: Option<RecordId>,
    pub score: Option<f64>,
}

impl Entity for ReportEvent {
    type Key = (String, RecordId);
    const TABLE: &'static TableSpec = &schema::REPORT_EVENT;

    fn key(&self) -> Self::Key {
        (self.re_id.clone(), self.proband_variant)
    }

    fn key_values(key: &Self::Key) -> Vec<KeyValue> {
        vec![key.0.clone().into(), KeyValue::Int(key.1)]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Int(self.tier.map(i64::from)),
            text(&self.mode_of_inheritance),
            text(&self.penetrance),
            Value::Int(self.panel_version),
            Value::Int(self.gene),
            Value::Float(self.score),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_shape<E: Entity>(entity: &E) {
        let key = E::key_values(&entity.key());
        assert_eq!(key.len(), E::TABLE.key.len(), "{} key", E::TABLE.name);
        assert_eq!(entity.values().len(), E::TABLE.columns.len(), "{} values", E::TABLE.name);
    }

    #[test]
    fn test_entities_match_table_layout() {
        let dob = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap_or_default();
        assert_shape(&Clinician {
            name: "a".into(),
            hospital: "b".into(),
            email: "c".into(),
        });
        assert_shape(&Family {
            gel_family_id: "F".into(),
            clinician: 1,
            trio_sequenced: false,
            has_de_novo: false,
        });
        assert_shape(&Phenotype { hpo_term: "HP:1".into() });
        assert_shape(&FamilyPhenotype { family: 1, phenotype: 2 });
        assert_shape(&ToolOrAssemblyVersion {
            tool_name: "genome_build".into(),
            version_number: "GRCh37".into(),
        });
        assert_shape(&Panel {
            panelapp_id: "245".into(),
            panel_name: None,
            disease_group: None,
            disease_subgroup: None,
        });
        assert_shape(&PanelVersion {
            panel: 1,
            version_number: "1.0".into(),
        });
        assert_shape(&Gene {
            gene_key: "ENSG1".into(),
            ensembl_id: None,
            hgnc_name: None,
        });
        assert_shape(&PanelVersionGene {
            panel_version: 1,
            gene: 2,
            level_of_confidence: None,
        });
        assert_shape(&Transcript {
            name: "ENST1".into(),
            genome_assembly: 1,
            gene: 2,
            canonical: true,
            protein: None,
            strand: "+".into(),
        });
        assert_shape(&Variant {
            identity: VariantIdentity::new("1", 1, "A", "G"),
            genome_assembly: 1,
            db_snp_id: None,
        });
        assert_shape(&TranscriptVariant {
            transcript: 1,
            variant: 2,
            effect: "x".into(),
            hgvs_c: None,
            hgvs_p: None,
            hgvs_g: "g".into(),
            sift: None,
            polyphen: None,
            af_max: None,
        });
        assert_shape(&Proband {
            gel_id: "P".into(),
            family: 1,
            forename: "f".into(),
            surname: "s".into(),
            date_of_birth: dob,
            sex: None,
            nhs_number: None,
            gmc: "g".into(),
            recruiting_disease: None,
            disease_group: None,
            disease_subtype: None,
        });
        assert_shape(&Relative {
            gel_id: "M".into(),
            proband: 1,
            relation_to_proband: "Mother".into(),
            affection_status: None,
            sex: None,
            sequenced: true,
            forename: "f".into(),
            surname: "s".into(),
            date_of_birth: dob,
        });
        assert_shape(&InterpretationReportFamily {
            ir_family_id: "1-1".into(),
            family: 1,
            sample_type: "raredisease".into(),
            priority: None,
            cip: None,
        });
        assert_shape(&InterpretationReportFamilyPanel {
            ir_family: 1,
            panel_version: 2,
            average_coverage: None,
            proportion_above_15x: None,
            genes_failing_coverage: None,
        });
        assert_shape(&GelInterpretationReport {
            ir_family: 1,
            archived_version: 1,
            content_hash: "h".into(),
            status: "s".into(),
            updated: None,
            user: None,
            sample_id: None,
            max_tier: None,
            assembly: 1,
            sites: None,
        });
        assert_shape(&ProbandVariant {
            variant: 1,
            interpretation_report: 2,
            max_tier: Some(1),
            zygosity: "z".into(),
            maternal_zygosity: "z".into(),
            paternal_zygosity: "z".into(),
            inheritance: "unknown".into(),
            somatic: false,
        });
        assert_shape(&PvFlag {
            proband_variant: 1,
            flag_name: "f".into(),
        });
        assert_shape(&ProbandTranscriptVariant {
            transcript: 1,
            proband_variant: 2,
            selected: true,
            effect: "e".into(),
        });
        assert_shape(&ReportEvent {
            re_id: "RE1".into(),
            proband_variant: 1,
            tier: Some(1),
            mode_of_inheritance: None,
            penetrance: None,
            panel_version: None,
            gene: None,
            score: None,
        });
    }
}
