//! Submission query and spreadsheet export.
//!
//! Records are loaded by the store layer; everything here is pure: filtering,
//! sorting, flattening into a sheet and writing CSV.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::answers::AnswerValue;
use crate::field_type::FieldType;
use crate::location::GeoPoint;
use crate::spec::field::{Field, FieldId};
use crate::spec::form::FormId;
use crate::spec::submission::{Submission, SubmissionId, SubmissionValue};

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A submission joined with its answers and the owning form's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submission: Submission,
    pub form_name: String,
    #[serde(default)]
    pub values: Vec<SubmissionValue>,
}

impl SubmissionRecord {
    pub fn value_for(&self, field_id: &FieldId) -> Option<&str> {
        self.values
            .iter()
            .find(|value| &value.field_id == field_id)
            .map(|value| value.value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "form_id")]
pub enum FormScope {
    #[default]
    All,
    One(FormId),
}

impl FormScope {
    pub fn includes(&self, form_id: &FormId) -> bool {
        match self {
            FormScope::All => true,
            FormScope::One(id) => id == form_id,
        }
    }

    /// Selection identifier used in export file names.
    pub fn label(&self) -> String {
        match self {
            FormScope::All => "all".to_string(),
            FormScope::One(id) => id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CreatedAt,
    FormName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmissionQuery {
    #[serde(default)]
    pub scope: FormScope,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Case-insensitive substring match over every answer and the form name.
/// A blank term matches everything.
pub fn matches_search(record: &SubmissionRecord, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    record.form_name.to_lowercase().contains(&term)
        || record
            .values
            .iter()
            .any(|value| value.value.to_lowercase().contains(&term))
}

/// Stable sort: records comparing equal keep their incoming order in both directions.
pub fn sort_records(records: &mut [SubmissionRecord], key: SortKey, direction: SortDirection) {
    records.sort_by(|a, b| {
        let ordering = match key {
            SortKey::CreatedAt => a.submission.created_at.cmp(&b.submission.created_at),
            SortKey::FormName => a
                .form_name
                .to_lowercase()
                .cmp(&b.form_name.to_lowercase()),
        };
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

/// Applies scope, search and sort in that order.
pub fn apply_query(records: Vec<SubmissionRecord>, query: &SubmissionQuery) -> Vec<SubmissionRecord> {
    let mut selected = records
        .into_iter()
        .filter(|record| query.scope.includes(&record.submission.form_id))
        .filter(|record| {
            query
                .search
                .as_deref()
                .is_none_or(|term| matches_search(record, term))
        })
        .collect::<Vec<_>>();
    sort_records(&mut selected, query.sort, query.direction);
    selected
}

/// Header row plus one data row per submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub const FIXED_COLUMNS: [&'static str; 3] = ["Submission ID", "Form", "Date"];

    pub fn field_columns(&self) -> &[String] {
        &self.headers[Self::FIXED_COLUMNS.len()..]
    }
}

struct Column {
    header: String,
    field_ids: Vec<FieldId>,
}

/// Flattens records into a sheet.
///
/// Field columns come from the fields of every form present in `records`, in
/// display order, merged by label so one column may cover fields of several
/// forms. Answers whose field no longer exists get a column headed by the raw
/// field id. Unanswered cells are empty.
pub fn build_sheet(records: &[SubmissionRecord], fields: &[Field]) -> Sheet {
    let form_ids: BTreeSet<FormId> = records
        .iter()
        .map(|record| record.submission.form_id)
        .collect();
    let mut involved = fields
        .iter()
        .filter(|field| form_ids.contains(&field.form_id))
        .collect::<Vec<_>>();
    involved.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });

    let mut columns: Vec<Column> = Vec::new();
    let mut by_label: BTreeMap<String, usize> = BTreeMap::new();
    for field in &involved {
        match by_label.get(&field.label) {
            Some(index) => columns[*index].field_ids.push(field.id),
            None => {
                by_label.insert(field.label.clone(), columns.len());
                columns.push(Column {
                    header: field.label.clone(),
                    field_ids: vec![field.id],
                });
            }
        }
    }

    let known: BTreeSet<FieldId> = fields.iter().map(|field| field.id).collect();
    let mut dangling = BTreeSet::new();
    for record in records {
        for value in &record.values {
            if !known.contains(&value.field_id) && dangling.insert(value.field_id) {
                columns.push(Column {
                    header: value.field_id.to_string(),
                    field_ids: vec![value.field_id],
                });
            }
        }
    }

    let kinds: BTreeMap<FieldId, FieldType> =
        fields.iter().map(|field| (field.id, field.kind)).collect();

    let headers = Sheet::FIXED_COLUMNS
        .iter()
        .map(|header| header.to_string())
        .chain(columns.iter().map(|column| column.header.clone()))
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            let mut row = vec![
                record.submission.id.to_string(),
                record.form_name.clone(),
                record.submission.created_at.format(DATE_FORMAT).to_string(),
            ];
            row.extend(columns.iter().map(|column| {
                column
                    .field_ids
                    .iter()
                    .find_map(|id| record.value_for(id).map(|raw| (id, raw)))
                    .map(|(id, raw)| display_cell(kinds.get(id).copied(), raw))
                    .unwrap_or_default()
            }));
            row
        })
        .collect();

    Sheet { headers, rows }
}

fn display_cell(kind: Option<FieldType>, raw: &str) -> String {
    match kind {
        Some(FieldType::Location) => AnswerValue::decode(FieldType::Location, raw)
            .map(|value| value.display())
            .unwrap_or_else(|_| raw.to_string()),
        _ => raw.to_string(),
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes the sheet as UTF-8 CSV with a byte-order mark.
pub fn write_csv<W: Write>(sheet: &Sheet, mut writer: W) -> Result<(), ExportError> {
    writer.write_all(UTF8_BOM)?;
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        csv.write_record(row)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn to_csv_bytes(sheet: &Sheet) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    write_csv(sheet, &mut buffer)?;
    Ok(buffer)
}

pub fn export_file_name(scope: &FormScope, at: DateTime<Utc>) -> String {
    format!(
        "submissions-{}-{}.csv",
        scope.label(),
        at.format("%Y%m%d-%H%M%S")
    )
}

/// One stored location answer, ready for a map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationPin {
    pub submission_id: SubmissionId,
    pub form_id: FormId,
    pub form_name: String,
    pub field_id: FieldId,
    pub field_label: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub point: GeoPoint,
}

/// Collects every parseable answer of a `location` field.
pub fn collect_locations(records: &[SubmissionRecord], fields: &[Field]) -> Vec<LocationPin> {
    let location_fields: BTreeMap<FieldId, &Field> = fields
        .iter()
        .filter(|field| field.kind == FieldType::Location)
        .map(|field| (field.id, field))
        .collect();

    records
        .iter()
        .flat_map(|record| {
            let location_fields = &location_fields;
            record.values.iter().filter_map(move |value| {
                let field = location_fields.get(&value.field_id)?;
                let point = GeoPoint::parse(&value.value).ok()?;
                Some(LocationPin {
                    submission_id: record.submission.id,
                    form_id: record.submission.form_id,
                    form_name: record.form_name.clone(),
                    field_id: field.id,
                    field_label: field.label.clone(),
                    created_at: record.submission.created_at,
                    point,
                })
            })
        })
        .collect()
}
