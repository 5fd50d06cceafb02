//! Table layout shared by every store backend
//!
//! Each [`TableSpec`] mirrors one table in `migrations/`: the natural key
//! columns (the table's UNIQUE constraint) followed by the remaining
//! attribute columns. Every table also has a `BIGSERIAL id`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Text,
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyColumn {
    pub name: &'static str,
    pub kind: KeyKind,
}

const fn text(name: &'static str) -> KeyColumn {
    KeyColumn {
        name,
        kind: KeyKind::Text,
    }
}

const fn int(name: &'static str) -> KeyColumn {
    KeyColumn {
        name,
        kind: KeyKind::Int,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub key: &'static [KeyColumn],
    pub columns: &'static [&'static str],
}

impl TableSpec {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }
}

pub const CLINICIAN: TableSpec = TableSpec {
    name: "clinician",
    key: &[text("name"), text("hospital"), text("email")],
    columns: &[],
};

pub const FAMILY: TableSpec = TableSpec {
    name: "family",
    key: &[text("gel_family_id")],
    columns: &["clinician_id", "trio_sequenced", "has_de_novo"],
};

pub const PHENOTYPE: TableSpec = TableSpec {
    name: "phenotype",
    key: &[text("hpo_term")],
    columns: &[],
};

pub const FAMILY_PHENOTYPE: TableSpec = TableSpec {
    name: "family_phenotype",
    key: &[int("family_id"), int("phenotype_id")],
    columns: &[],
};

pub const TOOL_OR_ASSEMBLY_VERSION: TableSpec = TableSpec {
    name: "tool_or_assembly_version",
    key: &[text("tool_name"), text("version_number")],
    columns: &[],
};

pub const PANEL: TableSpec = TableSpec {
    name: "panel",
    key: &[text("panelapp_id")],
    columns: &["panel_name", "disease_group", "disease_subgroup"],
};

pub const PANEL_VERSION: TableSpec = TableSpec {
    name: "panel_version",
    key: &[int("panel_id"), text("version_number")],
    columns: &[],
};

pub const GENE: TableSpec = TableSpec {
    name: "gene",
    key: &[text("gene_key")],
    columns: &["ensembl_id", "hgnc_name"],
};

pub const PANEL_VERSION_GENE: TableSpec = TableSpec {
    name: "panel_version_gene",
    key: &[int("panel_version_id"), int("gene_id")],
    columns: &["level_of_confidence"],
};

pub const TRANSCRIPT: TableSpec = TableSpec {
    name: "transcript",
    key: &[text("name"), int("genome_assembly_id")],
    columns: &["gene_id", "canonical", "protein", "strand"],
};

pub const VARIANT: TableSpec = TableSpec {
    name: "variant",
    key: &[
        text("chromosome"),
        int("position"),
        text("reference"),
        text("alternate"),
        int("genome_assembly_id"),
    ],
    columns: &["db_snp_id"],
};

pub const TRANSCRIPT_VARIANT: TableSpec = TableSpec {
    name: "transcript_variant",
    key: &[int("transcript_id"), int("variant_id")],
    columns: &["effect", "hgvs_c", "hgvs_p", "hgvs_g", "sift", "polyphen", "af_max"],
};

pub const PROBAND: TableSpec = TableSpec {
    name: "proband",
    key: &[text("gel_id")],
    columns: &[
        "family_id",
        "forename",
        "surname",
        "date_of_birth",
        "sex",
        "nhs_number",
        "gmc",
        "recruiting_disease",
        "disease_group",
        "disease_subtype",
    ],
};

pub const RELATIVE: TableSpec = TableSpec {
    name: "relative",
    key: &[text("gel_id"), int("proband_id")],
    columns: &[
        "relation_to_proband",
        "affection_status",
        "sex",
        "sequenced",
        "forename",
        "surname",
        "date_of_birth",
    ],
};

pub const INTERPRETATION_REPORT_FAMILY: TableSpec = TableSpec {
    name: "interpretation_report_family",
    key: &[text("ir_family_id")],
    columns: &["participant_family_id", "sample_type", "priority", "cip"],
};

pub const INTERPRETATION_REPORT_FAMILY_PANEL: TableSpec = TableSpec {
    name: "interpretation_report_family_panel",
    key: &[int("ir_family_id"), int("panel_version_id")],
    columns: &["average_coverage", "proportion_above_15x", "genes_failing_coverage"],
};

pub const GEL_INTERPRETATION_REPORT: TableSpec = TableSpec {
    name: "gel_interpretation_report",
    key: &[int("ir_family_id"), int("archived_version")],
    columns: &[
        "content_hash",
        "status",
        "updated",
        "user_name",
        "sample_id",
        "max_tier",
        "assembly_id",
        "sites",
    ],
};

pub const PROBAND_VARIANT: TableSpec = TableSpec {
    name: "proband_variant",
    key: &[int("variant_id"), int("interpretation_report_id")],
    columns: &[
        "max_tier",
        "zygosity",
        "maternal_zygosity",
        "paternal_zygosity",
        "inheritance",
        "somatic",
    ],
};

pub const PV_FLAG: TableSpec = TableSpec {
    name: "pv_flag",
    key: &[int("proband_variant_id"), text("flag_name")],
    columns: &[],
};

pub const PROBAND_TRANSCRIPT_VARIANT: TableSpec = TableSpec {
    name: "proband_transcript_variant",
    key: &[int("transcript_id"), int("proband_variant_id")],
    columns: &["selected", "effect"],
};

pub const REPORT_EVENT: TableSpec = TableSpec {
    name: "report_event",
    key: &[text("re_id"), int("proband_variant_id")],
    columns: &[
        "tier",
        "mode_of_inheritance",
        "penetrance",
        "panel_version_id",
        "gene_id",
        "score",
    ],
};

/// Every entity table, in dependency order
pub const ALL_TABLES: &[&TableSpec] = &[
    &CLINICIAN,
    &FAMILY,
    &PHENOTYPE,
    &FAMILY_PHENOTYPE,
    &TOOL_OR_ASSEMBLY_VERSION,
    &PANEL,
    &PANEL_VERSION,
    &GENE,
    &PANEL_VERSION_GENE,
    &TRANSCRIPT,
    &VARIANT,
    &TRANSCRIPT_VARIANT,
    &PROBAND,
    &RELATIVE,
    &INTERPRETATION_REPORT_FAMILY,
    &INTERPRETATION_REPORT_FAMILY_PANEL,
    &GEL_INTERPRETATION_REPORT,
    &PROBAND_VARIANT,
    &PV_FLAG,
    &PROBAND_TRANSCRIPT_VARIANT,
    &REPORT_EVENT,
];
