//! Tolerant header resolution.
//!
//! Input tables are exported by hand and their headers drift between
//! `Número de empregos`, `numero_de_empregos` and `NUMERO DE EMPREGOS`.
//! Each table the crate reads declares its logical fields together with the
//! accepted spellings; [`ColumnResolver::resolve`] folds case, accents and
//! punctuation away and maps every logical field to the literal column
//! index once per file.

use std::collections::{BTreeMap, HashMap, HashSet};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    Year,
    ClassificationId,
    ClassificationLabel,
    WageMass,
    AverageWage,
    EmploymentCount,
    OpportunityGain,
    Sector,
    LookupLabel,
    MedianWage,
    Employability,
}

impl LogicalField {
    /// Canonical header written by this crate's own outputs.
    pub fn name(self) -> &'static str {
        match self {
            LogicalField::Year => "year",
            LogicalField::ClassificationId => "classification_id",
            LogicalField::ClassificationLabel => "classification_label",
            LogicalField::WageMass => "wage_mass",
            LogicalField::AverageWage => "average_wage",
            LogicalField::EmploymentCount => "employment_count",
            LogicalField::OpportunityGain => "opportunity_gain",
            LogicalField::Sector => "sector",
            LogicalField::LookupLabel => "label",
            LogicalField::MedianWage => "median_wage",
            LogicalField::Employability => "employability",
        }
    }

    /// Built-in spellings in preference order. The canonical name always
    /// comes first so the crate can re-read what it wrote.
    pub fn default_variants(self) -> &'static [&'static str] {
        match self {
            LogicalField::Year => &["year", "Ano", "ano_base"],
            LogicalField::ClassificationId => &["classification_id", "ID CNAE", "id_cnae", "idcnae"],
            LogicalField::ClassificationLabel => &["classification_label", "CNAE", "cnae_2_0"],
            LogicalField::WageMass => &["wage_mass", "Massa Salarial"],
            LogicalField::AverageWage => &["average_wage", "Salário Médio", "salario_medio"],
            LogicalField::EmploymentCount => &[
                "employment_count",
                "Número de empregos",
                "num_empregos",
                "demanda",
                "demand",
            ],
            LogicalField::OpportunityGain => &["opportunity_gain", "Ganho de Oportunidade"],
            LogicalField::Sector => &["sector", "SETOR"],
            LogicalField::LookupLabel => &["SETOR", "sector", "label", "CNAE", "classification_label"],
            LogicalField::MedianWage => &["median_wage", "salario_mediana", "mediana"],
            LogicalField::Employability => &["employability", "empregabilidade"],
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub field: LogicalField,
    pub required: bool,
    pub variants: Vec<String>,
}

impl FieldSpec {
    fn new(field: LogicalField, required: bool) -> Self {
        Self {
            field,
            required,
            variants: field
                .default_variants()
                .iter()
                .map(|v| v.to_string())
                .collect(),
        }
    }
}

/// Logical field → literal column index for one file.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    indices: HashMap<LogicalField, usize>,
}

impl ColumnMap {
    pub fn index(&self, field: LogicalField) -> Option<usize> {
        self.indices.get(&field).copied()
    }

    /// Trimmed cell for `field`; `None` if the column is absent from this file.
    pub fn cell<'r>(&self, row: &'r [String], field: LogicalField) -> Option<&'r str> {
        self.index(field)
            .map(|idx| row.get(idx).map(|s| s.trim()).unwrap_or(""))
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ColumnResolver {
    specs: Vec<FieldSpec>,
}

impl ColumnResolver {
    /// Fields earlier in `fields` claim matching headers first.
    pub fn new(fields: &[(LogicalField, bool)]) -> Self {
        Self {
            specs: fields
                .iter()
                .map(|(field, required)| FieldSpec::new(*field, *required))
                .collect(),
        }
    }

    pub fn raw_table() -> Self {
        Self::new(&[
            (LogicalField::Year, true),
            (LogicalField::ClassificationId, true),
            (LogicalField::ClassificationLabel, false),
            (LogicalField::WageMass, true),
            (LogicalField::AverageWage, true),
            (LogicalField::EmploymentCount, true),
            (LogicalField::OpportunityGain, false),
        ])
    }

    pub fn enriched_table() -> Self {
        let mut resolver = Self::raw_table();
        resolver
            .specs
            .push(FieldSpec::new(LogicalField::Sector, true));
        resolver
    }

    pub fn lookup_table() -> Self {
        Self::new(&[
            (LogicalField::ClassificationId, true),
            (LogicalField::LookupLabel, true),
        ])
    }

    /// Label-only scan used by lookup extraction.
    pub fn extraction_table() -> Self {
        Self::new(&[
            (LogicalField::ClassificationId, true),
            (LogicalField::ClassificationLabel, true),
        ])
    }

    pub fn aggregated_table() -> Self {
        Self::new(&[
            (LogicalField::Year, true),
            (LogicalField::Sector, true),
            (LogicalField::EmploymentCount, true),
            (LogicalField::MedianWage, true),
            (LogicalField::AverageWage, false),
            (LogicalField::Employability, false),
        ])
    }

    /// Appends configured spellings after the built-in ones.
    pub fn with_aliases(mut self, aliases: &BTreeMap<LogicalField, Vec<String>>) -> Self {
        for spec in &mut self.specs {
            if let Some(extra) = aliases.get(&spec.field) {
                spec.variants.extend(extra.iter().cloned());
            }
        }
        self
    }

    pub fn resolve(&self, headers: &[String]) -> Result<ColumnMap> {
        let folded = headers.iter().map(|h| fold_header(h)).collect::<Vec<_>>();
        let mut claimed = HashSet::new();
        let mut indices = HashMap::new();

        for spec in &self.specs {
            let found = spec.variants.iter().find_map(|variant| {
                let wanted = fold_header(variant);
                folded
                    .iter()
                    .enumerate()
                    .find(|(idx, header)| !claimed.contains(idx) && **header == wanted)
                    .map(|(idx, _)| idx)
            });
            match found {
                Some(idx) => {
                    claimed.insert(idx);
                    indices.insert(spec.field, idx);
                }
                None if spec.required => {
                    return Err(PipelineError::MissingRequiredColumn {
                        field: spec.field.name(),
                        accepted: spec.variants.iter().join(", "),
                        found: headers.iter().join(", "),
                    });
                }
                None => {}
            }
        }

        Ok(ColumnMap { indices })
    }
}

/// Lowercases, strips accents and drops everything that is not a letter or digit.
pub fn fold_header(header: &str) -> String {
    header
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_accent)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}
