//! Tabular views over normalized hits and entity summaries.
//!
//! A thin stand-in for the dataframe layer the original toolkit leaned on:
//! named columns, row projection, descending sort, and head/top-N selection.

use serde_json::Value;

use crate::aggregate::{entity_hit_summaries, parse_entity_types, AggregateOptions};
use crate::error::{Result, TermiteError};
use crate::payload::{payload_records, HitFilter};

/// Default column set for the flat hit table, in fixed order.
pub const DEFAULT_COLUMNS: [&str; 9] = [
    "docID",
    "entityType",
    "hitID",
    "name",
    "score",
    "realSynList",
    "totnosyns",
    "nonambigsyns",
    "frag_vector_array",
];

/// Column set for the aggregated entity summary table.
pub const SUMMARY_COLUMNS: [&str; 7] = [
    "id",
    "type",
    "name",
    "hit_count",
    "max_relevance_score",
    "doc_id",
    "doc_count",
];

/// A simple column-named table of JSON cells.
#[derive(Debug, Clone, PartialEq)]
pub struct HitTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl HitTable {
    /// Build a table from pre-assembled rows. Every row must match the
    /// column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of one column, or an invalid-column error if absent.
    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Project a subset of columns into a new table, preserving row order.
    pub fn select(&self, names: &[&str]) -> Result<HitTable> {
        let indices = names
            .iter()
            .map(|n| self.column_index(n))
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(HitTable::new(
            names.iter().map(|n| n.to_string()).collect(),
            rows,
        ))
    }

    /// Stable sort rows by a numeric column, descending. Non-numeric cells
    /// sort last.
    pub fn sort_desc_by(&mut self, name: &str) -> Result<()> {
        let idx = self.column_index(name)?;
        self.rows.sort_by(|a, b| {
            let left = a[idx].as_f64().unwrap_or(f64::NEG_INFINITY);
            let right = b[idx].as_f64().unwrap_or(f64::NEG_INFINITY);
            right.total_cmp(&left)
        });
        Ok(())
    }

    /// Keep only the first `n` rows.
    pub fn head(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| TermiteError::InvalidColumns(vec![name.to_string()]))
    }
}

/// Project a response of any shape into the default hit table.
///
/// `extra_columns` is an optional comma-separated list appended after the
/// default set. Default columns missing from a record render as null; a
/// requested extra column present in no record at all is an invalid column
/// selection error.
pub fn hit_table(
    response: &Value,
    extra_columns: Option<&str>,
    filter: &HitFilter,
) -> Result<HitTable> {
    let records = payload_records(response, filter)?;

    let mut columns: Vec<String> = DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect();
    if let Some(extra) = extra_columns {
        let extra: Vec<String> = extra
            .replace(' ', "")
            .split(',')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        let missing: Vec<String> = extra
            .iter()
            .filter(|col| !records.iter().any(|r| r.contains_key(*col)))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(TermiteError::InvalidColumns(missing));
        }
        columns.extend(extra);
    }

    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|col| record.get(col).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Ok(HitTable::new(columns, rows))
}

/// Distinct entity types with retained hits, in order of first appearance.
pub fn all_entity_types(response: &Value) -> Result<Vec<String>> {
    let records = payload_records(response, &HitFilter::default())?;
    let mut types: Vec<String> = Vec::new();
    for record in &records {
        let entity_type = record
            .get("entityType")
            .and_then(Value::as_str)
            .ok_or_else(|| TermiteError::Shape("entityType".into()))?;
        if !types.iter().any(|t| t == entity_type) {
            types.push(entity_type.to_string());
        }
    }
    Ok(types)
}

/// Aggregated summary table over every entity type present in the response.
pub fn summary_table(response: &Value, options: &AggregateOptions) -> Result<HitTable> {
    let types = all_entity_types(response)?.join(",");
    let summaries = entity_hit_summaries(response, &types, options)?;

    let columns = SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect();
    let rows = summaries
        .into_iter()
        .map(|s| {
            vec![
                Value::String(s.id),
                Value::String(s.entity_type),
                Value::String(s.name),
                Value::from(s.hit_count),
                Value::from(s.max_relevance_score),
                Value::from(s.doc_ids),
                Value::from(s.doc_count as u64),
            ]
        })
        .collect();

    Ok(HitTable::new(columns, rows))
}

/// Entity-type occurrence counts over the default hit table, descending.
/// Ties keep first-encountered order.
pub fn entity_frequency(response: &Value, filter: &HitFilter) -> Result<Vec<(String, u64)>> {
    let table = hit_table(response, None, filter)?;
    let mut counts: Vec<(String, u64)> = Vec::new();
    for cell in table.column("entityType")? {
        let entity_type = cell
            .as_str()
            .ok_or_else(|| TermiteError::Shape("entityType".into()))?;
        match counts.iter_mut().find(|(t, _)| t == entity_type) {
            Some((_, n)) => *n += 1,
            None => counts.push((entity_type.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(counts)
}

/// Settings for the top-hits view.
#[derive(Debug, Clone)]
pub struct TopHitsOptions {
    /// Number of most frequent hits to return.
    pub selection: usize,
    /// Optional comma-separated entity type subset (exact match).
    pub entity_subset: Option<String>,
    /// Include the document-ID column.
    pub include_docs: bool,
    /// Aggregation settings for the underlying summaries.
    pub aggregate: AggregateOptions,
}

impl Default for TopHitsOptions {
    fn default() -> Self {
        Self {
            selection: 10,
            entity_subset: None,
            include_docs: false,
            aggregate: AggregateOptions::new(),
        }
    }
}

/// The N most frequent entity hits as a fixed-projection table.
///
/// Runs the full normalize/aggregate pipeline, sorts by hit count
/// descending, optionally restricts to an entity type subset, and projects
/// `name`, `doc_count` (plus `doc_id` when `include_docs`),
/// `max_relevance_score`, `type`, `id`.
pub fn top_hits(response: &Value, options: &TopHitsOptions) -> Result<HitTable> {
    let mut table = summary_table(response, &options.aggregate)?;
    table.sort_desc_by("hit_count")?;

    if let Some(subset) = &options.entity_subset {
        let wanted = parse_entity_types(subset);
        let type_idx = table
            .columns()
            .iter()
            .position(|c| c == "type")
            .expect("summary table always has a type column");
        let rows = table
            .rows()
            .iter()
            .filter(|row| {
                row[type_idx]
                    .as_str()
                    .is_some_and(|t| wanted.iter().any(|w| w == t))
            })
            .cloned()
            .collect();
        table = HitTable::new(table.columns().to_vec(), rows);
    }

    table.head(options.selection);

    let projection: &[&str] = if options.include_docs {
        &["name", "doc_count", "doc_id", "max_relevance_score", "type", "id"]
    } else {
        &["name", "doc_count", "max_relevance_score", "type", "id"]
    };
    table.select(projection)
}
