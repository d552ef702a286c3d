//! Incremental aggregation of hit records into per-entity summaries.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TermiteError};
use crate::payload::{payload_records, HitFilter};

/// Accumulated statistics for one entity across a response.
///
/// Keyed by the composite ID `entityType$hitID`. Under the default
/// de-duplication policy `doc_count` always equals the number of distinct
/// document IDs recorded in `doc_ids`; `hit_count` is the sum of per-hit
/// `hitCount` values across all retained hits.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySummary {
    /// Hit ID within the entity type (e.g. `CSF1`).
    pub id: String,
    /// Entity type (e.g. `GENE`).
    pub entity_type: String,
    /// Display name of the entity.
    pub name: String,
    /// Sum of `hitCount` across retained hits.
    pub hit_count: u64,
    /// Highest relevance score seen for this entity.
    pub max_relevance_score: f64,
    /// Originating document IDs, in order of first appearance.
    pub doc_ids: Vec<String>,
    /// Number of documents recorded in `doc_ids`.
    pub doc_count: usize,
}

impl EntitySummary {
    /// Composite aggregation key, `entityType$hitID`.
    pub fn composite_id(&self) -> String {
        format!("{}${}", self.entity_type, self.id)
    }
}

/// Aggregation settings.
#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    /// Hit-level filters applied before aggregation.
    pub filter: HitFilter,
    /// Suppress duplicate document IDs per entity.
    ///
    /// The legacy toolkit de-duplicated in its doc.JSONx path but not in its
    /// JSON path; here one policy applies to every shape. Disable to get the
    /// legacy JSON behavior of appending the document ID on every hit.
    pub dedupe_doc_ids: bool,
}

impl AggregateOptions {
    /// Default settings: default filters, de-duplicated document IDs.
    pub fn new() -> Self {
        Self {
            filter: HitFilter::default(),
            dedupe_doc_ids: true,
        }
    }
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a comma-separated entity type list, stripping whitespace.
pub fn parse_entity_types(entity_types: &str) -> Vec<String> {
    entity_types
        .replace(' ', "")
        .split(',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize a response of any shape and collapse its hits into per-entity
/// summaries, restricted to the given comma-separated entity types.
///
/// Summaries are returned in order of first appearance. Hits from the single
/// payload shape carry no document ID and are recorded against the empty
/// document ID, matching the legacy behavior.
pub fn entity_hit_summaries(
    response: &Value,
    entity_types: &str,
    options: &AggregateOptions,
) -> Result<Vec<EntitySummary>> {
    let wanted = parse_entity_types(entity_types);
    let records = payload_records(response, &options.filter)?;

    let mut summaries: Vec<EntitySummary> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in &records {
        let entity_type = record
            .get("entityType")
            .and_then(Value::as_str)
            .ok_or_else(|| TermiteError::Shape("entityType".into()))?;
        if !wanted.iter().any(|t| t == entity_type) {
            continue;
        }

        let hit_id = record
            .get("hitID")
            .and_then(Value::as_str)
            .ok_or_else(|| TermiteError::Shape("hitID".into()))?;
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| TermiteError::Shape("name".into()))?;
        let hit_count = record
            .get("hitCount")
            .and_then(Value::as_u64)
            .ok_or_else(|| TermiteError::Shape("hitCount".into()))?;
        let score = record
            .get("score")
            .and_then(Value::as_f64)
            .ok_or_else(|| TermiteError::Shape("score".into()))?;
        let doc_id = record
            .get("docID")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let composite_id = format!("{entity_type}${hit_id}");
        match index.get(&composite_id) {
            Some(&slot) => {
                let summary = &mut summaries[slot];
                summary.hit_count += hit_count;
                if score > summary.max_relevance_score {
                    summary.max_relevance_score = score;
                }
                let seen = summary.doc_ids.iter().any(|d| d == doc_id);
                if !options.dedupe_doc_ids || !seen {
                    summary.doc_ids.push(doc_id.to_string());
                    summary.doc_count += 1;
                }
            }
            None => {
                index.insert(composite_id, summaries.len());
                summaries.push(EntitySummary {
                    id: hit_id.to_string(),
                    entity_type: entity_type.to_string(),
                    name: name.to_string(),
                    hit_count,
                    max_relevance_score: score,
                    doc_ids: vec![doc_id.to_string()],
                    doc_count: 1,
                });
            }
        }
    }

    debug!(
        "Aggregated {} hit records into {} entity summaries",
        records.len(),
        summaries.len()
    );
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_entity_type_lists() {
        assert_eq!(parse_entity_types("GENE, DRUG ,INDICATION"), [
            "GENE",
            "DRUG",
            "INDICATION"
        ]);
        assert!(parse_entity_types("").is_empty());
    }

    #[test]
    fn single_document_round_trip() {
        let response = json!({"RESP_MULTIDOC_PAYLOAD": {"doc1": {"GENE": [
            {"hitID": "X", "name": "X", "score": 2.0, "nonambigsyns": 1, "hitCount": 3}
        ]}}});
        let summaries =
            entity_hit_summaries(&response, "GENE", &AggregateOptions::new()).unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.composite_id(), "GENE$X");
        assert_eq!(summary.hit_count, 3);
        assert_eq!(summary.doc_count, 1);
        assert_eq!(summary.doc_ids, ["doc1"]);
    }

    #[test]
    fn accumulates_across_documents() {
        let response = json!({"RESP_MULTIDOC_PAYLOAD": {
            "doc1": {"GENE": [
                {"hitID": "X", "name": "X", "score": 1.0, "nonambigsyns": 1, "hitCount": 2}
            ]},
            "doc2": {"GENE": [
                {"hitID": "X", "name": "X", "score": 3.0, "nonambigsyns": 1, "hitCount": 5}
            ]},
        }});
        let summaries =
            entity_hit_summaries(&response, "GENE", &AggregateOptions::new()).unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.hit_count, 7);
        assert_eq!(summary.max_relevance_score, 3.0);
        assert_eq!(summary.doc_count, 2);
        assert_eq!(summary.doc_ids, ["doc1", "doc2"]);
    }

    #[test]
    fn restricts_to_requested_entity_types() {
        let response = json!({"RESP_MULTIDOC_PAYLOAD": {"doc1": {
            "GENE": [
                {"hitID": "X", "name": "X", "score": 2.0, "nonambigsyns": 1, "hitCount": 1}
            ],
            "DRUG": [
                {"hitID": "Y", "name": "Y", "score": 2.0, "nonambigsyns": 1, "hitCount": 1}
            ],
        }}});
        let summaries =
            entity_hit_summaries(&response, "GENE", &AggregateOptions::new()).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].composite_id(), "GENE$X");
        assert_eq!(summaries[0].doc_ids, ["doc1"]);
    }

    #[test]
    fn dedupes_repeated_doc_ids_by_default() {
        let response = json!([
            {"docID": "doc1", "termiteTags": [
                {"hitID": "X", "entityType": "GENE", "name": "X", "score": 1.0,
                 "nonambigsyns": 1, "hitCount": 1},
                {"hitID": "X", "entityType": "GENE", "name": "X", "score": 2.0,
                 "nonambigsyns": 1, "hitCount": 1},
            ]},
        ]);
        let summaries =
            entity_hit_summaries(&response, "GENE", &AggregateOptions::new()).unwrap();
        assert_eq!(summaries[0].hit_count, 2);
        assert_eq!(summaries[0].doc_count, 1);
        assert_eq!(summaries[0].doc_ids, ["doc1"]);
        assert_eq!(summaries[0].max_relevance_score, 2.0);
    }

    #[test]
    fn legacy_append_policy_keeps_duplicates() {
        let options = AggregateOptions {
            dedupe_doc_ids: false,
            ..AggregateOptions::new()
        };
        let response = json!([
            {"docID": "doc1", "termiteTags": [
                {"hitID": "X", "entityType": "GENE", "name": "X", "score": 1.0,
                 "nonambigsyns": 1, "hitCount": 1},
                {"hitID": "X", "entityType": "GENE", "name": "X", "score": 1.0,
                 "nonambigsyns": 1, "hitCount": 1},
            ]},
        ]);
        let summaries = entity_hit_summaries(&response, "GENE", &options).unwrap();
        assert_eq!(summaries[0].doc_count, 2);
        assert_eq!(summaries[0].doc_ids, ["doc1", "doc1"]);
    }

    #[test]
    fn single_payload_uses_empty_doc_id() {
        let response = json!({"RESP_PAYLOAD": {"GENE": [
            {"hitID": "X", "name": "X", "score": 2.0, "nonambigsyns": 1, "hitCount": 1}
        ]}});
        let summaries =
            entity_hit_summaries(&response, "GENE", &AggregateOptions::new()).unwrap();
        assert_eq!(summaries[0].doc_ids, [""]);
        assert_eq!(summaries[0].doc_count, 1);
    }
}
