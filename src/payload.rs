//! Response-shape detection and hit-record normalization.
//!
//! TERMite emits results in three JSON shapes:
//! - multi-doc: `{"RESP_MULTIDOC_PAYLOAD": {docID: {entityType: [hit, ..]}}}`
//! - single:    `{"RESP_PAYLOAD": {entityType: [hit, ..]}}`
//! - doc.JSONx: `[{..doc metadata.., "termiteTags": [hit, ..]}, ..]`
//!
//! This module reconciles all three into one flat, order-preserving sequence
//! of hit records, applying the ambiguity, subsumption, and score filters
//! identically across shapes. Normalization is a pure function of the parsed
//! response and the filter settings.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, TermiteError};

/// Wire key wrapping multi-document results.
pub const MULTIDOC_KEY: &str = "RESP_MULTIDOC_PAYLOAD";
/// Wire key wrapping single-document results.
pub const PAYLOAD_KEY: &str = "RESP_PAYLOAD";
/// Wire key holding embedded hits in doc.JSONx documents.
pub const TAGS_KEY: &str = "termiteTags";

/// Hit-level filter settings.
///
/// Defaults match the service conventions: ambiguous hits and subsumed hits
/// are dropped, and the score cutoff of 0 retains everything (the boundary is
/// inclusive, so `score >= cutoff` keeps the hit).
#[derive(Debug, Clone, Copy)]
pub struct HitFilter {
    /// Drop hits whose non-ambiguous-synonym count is zero.
    pub reject_ambiguous: bool,
    /// Drop hits whose `subsume` flag list contains `true`.
    pub remove_subsumed: bool,
    /// Drop hits scoring strictly below this value.
    pub score_cutoff: f64,
}

impl Default for HitFilter {
    fn default() -> Self {
        Self {
            reject_ambiguous: true,
            remove_subsumed: true,
            score_cutoff: 0.0,
        }
    }
}

/// A TERMite response classified into one of the three recognized shapes.
#[derive(Debug)]
pub enum TermitePayload<'a> {
    /// Document ID -> per-document payload (entity type -> hits).
    MultiDoc(&'a Map<String, Value>),
    /// Entity type -> hits, no document context.
    Single(&'a Map<String, Value>),
    /// Ordered document objects with embedded `termiteTags` hit lists.
    DocJsonx(&'a Vec<Value>),
}

/// Classify a parsed response by inspecting the available keys.
///
/// The multi-doc key is checked first, then the single-payload key; a JSON
/// array is assumed to be doc.JSONx. Anything else is a shape error.
pub fn classify(response: &Value) -> Result<TermitePayload<'_>> {
    if let Some(obj) = response.as_object() {
        if let Some(docs) = obj.get(MULTIDOC_KEY) {
            let docs = docs
                .as_object()
                .ok_or_else(|| TermiteError::Shape(MULTIDOC_KEY.into()))?;
            return Ok(TermitePayload::MultiDoc(docs));
        }
        if let Some(payload) = obj.get(PAYLOAD_KEY) {
            let payload = payload
                .as_object()
                .ok_or_else(|| TermiteError::Shape(PAYLOAD_KEY.into()))?;
            return Ok(TermitePayload::Single(payload));
        }
    }
    if let Some(docs) = response.as_array() {
        return Ok(TermitePayload::DocJsonx(docs));
    }
    Err(TermiteError::Shape(PAYLOAD_KEY.into()))
}

/// Flatten a TERMite response of any shape into filtered hit records.
///
/// Order is preserved. Multi-doc hits gain a `docID` field taken from the
/// outer mapping key; single-payload hits carry no document ID; doc.JSONx
/// hits absorb their document's metadata fields (document fields win on
/// collision, the `termiteTags` list itself is dropped).
pub fn payload_records(response: &Value, filter: &HitFilter) -> Result<Vec<Map<String, Value>>> {
    let mut records = Vec::new();

    match classify(response)? {
        TermitePayload::MultiDoc(docs) => {
            for (doc_id, doc_payload) in docs {
                let doc_payload = doc_payload
                    .as_object()
                    .ok_or_else(|| TermiteError::Shape(MULTIDOC_KEY.into()))?;
                collect_payload_hits(doc_payload, Some(doc_id), filter, &mut records)?;
            }
        }
        TermitePayload::Single(payload) => {
            collect_payload_hits(payload, None, filter, &mut records)?;
        }
        TermitePayload::DocJsonx(docs) => {
            for doc in docs {
                let doc = doc
                    .as_object()
                    .ok_or_else(|| TermiteError::Shape(TAGS_KEY.into()))?;
                // Documents with no hits carry no tag list at all.
                let Some(tags) = doc.get(TAGS_KEY) else {
                    continue;
                };
                let tags = tags
                    .as_array()
                    .ok_or_else(|| TermiteError::Shape(TAGS_KEY.into()))?;
                for hit in tags {
                    let hit = hit
                        .as_object()
                        .ok_or_else(|| TermiteError::Shape(TAGS_KEY.into()))?;
                    if !accept_hit(hit, filter)? {
                        continue;
                    }
                    let mut record = hit.clone();
                    for (key, value) in doc {
                        if key != TAGS_KEY {
                            record.insert(key.clone(), value.clone());
                        }
                    }
                    records.push(record);
                }
            }
        }
    }

    debug!("Normalized response into {} hit records", records.len());
    Ok(records)
}

/// Flatten one entity-type -> hits payload, tagging hits with `doc_id` when
/// the payload came from a multi-doc response.
fn collect_payload_hits(
    payload: &Map<String, Value>,
    doc_id: Option<&str>,
    filter: &HitFilter,
    records: &mut Vec<Map<String, Value>>,
) -> Result<()> {
    for (entity_type, hits) in payload {
        let hits = hits
            .as_array()
            .ok_or_else(|| TermiteError::Shape(entity_type.clone()))?;
        for hit in hits {
            let hit = hit
                .as_object()
                .ok_or_else(|| TermiteError::Shape(entity_type.clone()))?;
            if !accept_hit(hit, filter)? {
                continue;
            }
            let mut record = hit.clone();
            record
                .entry("entityType".to_string())
                .or_insert_with(|| Value::String(entity_type.clone()));
            if let Some(doc_id) = doc_id {
                record.insert("docID".to_string(), Value::String(doc_id.to_string()));
            }
            records.push(record);
        }
    }
    Ok(())
}

/// Apply the three filter predicates to a single hit.
pub(crate) fn accept_hit(hit: &Map<String, Value>, filter: &HitFilter) -> Result<bool> {
    let nonambigsyns = hit
        .get("nonambigsyns")
        .and_then(Value::as_i64)
        .ok_or_else(|| TermiteError::Shape("nonambigsyns".into()))?;
    if filter.reject_ambiguous && nonambigsyns == 0 {
        return Ok(false);
    }

    if filter.remove_subsumed {
        if let Some(flags) = hit.get("subsume").and_then(Value::as_array) {
            if flags.iter().any(|flag| flag.as_bool() == Some(true)) {
                return Ok(false);
            }
        }
    }

    let score = hit
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| TermiteError::Shape("score".into()))?;
    Ok(score >= filter.score_cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: &str, score: f64, nonambigsyns: i64) -> Value {
        json!({
            "hitID": id,
            "name": id,
            "score": score,
            "nonambigsyns": nonambigsyns,
            "hitCount": 1,
        })
    }

    #[test]
    fn classifies_multidoc_before_single() {
        let response = json!({"RESP_MULTIDOC_PAYLOAD": {}, "RESP_PAYLOAD": {}});
        assert!(matches!(
            classify(&response).unwrap(),
            TermitePayload::MultiDoc(_)
        ));
    }

    #[test]
    fn classifies_array_as_docjsonx() {
        let response = json!([{"docID": "a"}]);
        assert!(matches!(
            classify(&response).unwrap(),
            TermitePayload::DocJsonx(_)
        ));
    }

    #[test]
    fn rejects_unrecognized_shape() {
        let response = json!({"something": "else"});
        assert!(matches!(
            classify(&response),
            Err(TermiteError::Shape(_))
        ));
    }

    #[test]
    fn ambiguous_hits_dropped_across_shapes() {
        let filter = HitFilter::default();

        let single = json!({"RESP_PAYLOAD": {"GENE": [hit("A", 2.0, 0), hit("B", 2.0, 1)]}});
        let records = payload_records(&single, &filter).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["hitID"], "B");

        let multi = json!({"RESP_MULTIDOC_PAYLOAD": {"doc1": {"GENE": [hit("A", 2.0, 0)]}}});
        assert!(payload_records(&multi, &filter).unwrap().is_empty());

        let docjsonx = json!([{"docID": "doc1", "termiteTags": [hit("A", 2.0, 0)]}]);
        assert!(payload_records(&docjsonx, &filter).unwrap().is_empty());
    }

    #[test]
    fn ambiguous_hits_kept_when_filter_disabled() {
        let filter = HitFilter {
            reject_ambiguous: false,
            ..HitFilter::default()
        };
        let single = json!({"RESP_PAYLOAD": {"GENE": [hit("A", 2.0, 0)]}});
        assert_eq!(payload_records(&single, &filter).unwrap().len(), 1);
    }

    #[test]
    fn subsumed_hits_dropped() {
        let mut subsumed = hit("A", 2.0, 1);
        subsumed["subsume"] = json!([false, true]);
        let mut clear = hit("B", 2.0, 1);
        clear["subsume"] = json!([false, false]);

        let response = json!({"RESP_PAYLOAD": {"GENE": [subsumed, clear]}});
        let records = payload_records(&response, &HitFilter::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["hitID"], "B");
    }

    #[test]
    fn score_cutoff_is_inclusive() {
        let filter = HitFilter {
            score_cutoff: 2.0,
            ..HitFilter::default()
        };
        let response = json!({"RESP_PAYLOAD": {
            "GENE": [hit("low", 1.9, 1), hit("edge", 2.0, 1), hit("high", 3.0, 1)]
        }});
        let records = payload_records(&response, &filter).unwrap();
        let ids: Vec<&str> = records
            .iter()
            .map(|r| r["hitID"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["edge", "high"]);
    }

    #[test]
    fn multidoc_hits_carry_outer_doc_id() {
        let response = json!({"RESP_MULTIDOC_PAYLOAD": {
            "doc1": {"GENE": [hit("A", 2.0, 1)]},
            "doc2": {"GENE": [hit("B", 2.0, 1)]},
        }});
        let records = payload_records(&response, &HitFilter::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["docID"], "doc1");
        assert_eq!(records[1]["docID"], "doc2");
    }

    #[test]
    fn single_payload_hits_have_no_doc_id() {
        let response = json!({"RESP_PAYLOAD": {"GENE": [hit("A", 2.0, 1)]}});
        let records = payload_records(&response, &HitFilter::default()).unwrap();
        assert!(!records[0].contains_key("docID"));
        assert_eq!(records[0]["entityType"], "GENE");
    }

    #[test]
    fn docjsonx_merges_document_metadata() {
        let response = json!([{
            "docID": "doc1",
            "source": "medline",
            "termiteTags": [hit("A", 2.0, 1)],
        }]);
        let records = payload_records(&response, &HitFilter::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["docID"], "doc1");
        assert_eq!(records[0]["source"], "medline");
        assert!(!records[0].contains_key("termiteTags"));
    }

    #[test]
    fn docjsonx_documents_without_tags_are_skipped() {
        let response = json!([
            {"docID": "empty"},
            {"docID": "doc2", "termiteTags": [hit("A", 2.0, 1)]},
        ]);
        let records = payload_records(&response, &HitFilter::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["docID"], "doc2");
    }

    #[test]
    fn missing_score_is_a_shape_error() {
        let response = json!({"RESP_PAYLOAD": {"GENE": [{"hitID": "A", "nonambigsyns": 1}]}});
        assert!(matches!(
            payload_records(&response, &HitFilter::default()),
            Err(TermiteError::Shape(field)) if field == "score"
        ));
    }
}
