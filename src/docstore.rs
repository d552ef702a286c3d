//! DOCStore search request builder and response flattening.
//!
//! DOCStore is the companion document search / co-occurrence service. All
//! operations are GETs against `/api/ds/v1/search/...` with the search
//! parameters as a query string; range filters travel as a JSON string in
//! the `filters` parameter.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TermiteError};
use crate::termite::{build_client, Credentials, TlsVerification};

/// A date range filter over a document field.
#[derive(Debug, Clone, Serialize)]
pub struct RangeFilter {
    pub field: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Filter set serialized into the `filters` query parameter.
#[derive(Debug, Clone, Serialize)]
pub struct SearchFilters {
    pub rangefilters: Vec<RangeFilter>,
}

/// Search parameters shared by the DOCStore endpoints.
///
/// Defaults mirror the service conventions: JSON format, all fields, ten
/// results from offset zero, newest documents first.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub fmt: String,
    pub fields: String,
    pub limit: u32,
    pub from: u32,
    pub facet_type: String,
    pub significant_terms: bool,
    pub exclude_hits: bool,
    pub sort_by: String,
    /// Sentence co-occurrence: require terms in order.
    pub inorder: bool,
    /// Sentence co-occurrence: allowed token slop between terms.
    pub slop: u32,
    /// Sentence co-occurrence: compress the response.
    pub zip: bool,
    pub filters: Option<SearchFilters>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fmt: "json".to_string(),
            fields: "*".to_string(),
            limit: 10,
            from: 0,
            facet_type: "NONE".to_string(),
            significant_terms: false,
            exclude_hits: false,
            sort_by: "document_date:desc".to_string(),
            inorder: false,
            slop: 2,
            zip: false,
            filters: None,
        }
    }
}

impl SearchOptions {
    fn filters_json(&self) -> String {
        self.filters
            .as_ref()
            .map(|f| serde_json::to_string(f).expect("range filters serialize to JSON"))
            .unwrap_or_default()
    }
}

/// One flattened document co-occurrence hit: the lead section's title and
/// text plus document metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub document_id: String,
    pub title: String,
    /// Author list as returned by the service.
    pub authors: Value,
    /// Document date truncated to `YYYY-MM-DD`.
    pub date: String,
    pub text: String,
}

/// One flattened sentence co-occurrence hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceRecord {
    pub document_id: String,
    pub document_date: String,
    pub sentence: String,
}

/// Builder for DOCStore search requests.
///
/// Build one per logical request; setters mutate plain state with no
/// synchronization.
#[derive(Debug)]
pub struct DocStoreRequestBuilder {
    url: String,
    basic_auth: Option<Credentials>,
    verification: TlsVerification,
}

impl Default for DocStoreRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocStoreRequestBuilder {
    pub fn new() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            basic_auth: None,
            verification: TlsVerification::Enabled,
        }
    }

    /// Set the URL of the DOCStore instance.
    pub fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    /// Pass basic authentication credentials and the TLS verification policy.
    pub fn set_basic_auth(
        &mut self,
        username: &str,
        password: &str,
        verification: TlsVerification,
    ) {
        self.basic_auth = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        self.verification = verification;
    }

    /// Retrieve document co-occurrence of the provided entities.
    pub async fn get_dcc_docs(
        &self,
        entities: &[&str],
        source: &str,
        options: &SearchOptions,
    ) -> Result<Value> {
        let url = format!("{}/api/ds/v1/search/co/document/{}/*/*/*", self.url, source);
        let params = vec![
            ("fmt", options.fmt.clone()),
            ("fields", options.fields.clone()),
            ("terms", entities.join(" ")),
            ("limit", options.limit.to_string()),
            ("from", options.from.to_string()),
            ("facettype", options.facet_type.clone()),
            ("significantTerms", options.significant_terms.to_string()),
            ("excludehits", options.exclude_hits.to_string()),
            ("sortby", options.sort_by.clone()),
        ];
        self.send_search(&url, &params).await
    }

    /// Retrieve documents matching a DOCStore query string, e.g.
    /// `type:ANAT AND id:GENE$CSF1`.
    pub async fn get_dcc_docs_query(
        &self,
        query: &str,
        source: &str,
        options: &SearchOptions,
    ) -> Result<Value> {
        let url = format!("{}/api/ds/v1/search/document/{}/*/*/*", self.url, source);
        let params = vec![
            ("fmt", options.fmt.clone()),
            ("fields", options.fields.clone()),
            ("query", query.to_string()),
            ("limit", options.limit.to_string()),
            ("from", options.from.to_string()),
            ("facettype", options.facet_type.clone()),
            ("significantTerms", options.significant_terms.to_string()),
            ("excludehits", options.exclude_hits.to_string()),
            ("sortby", options.sort_by.clone()),
            ("filters", options.filters_json()),
        ];
        self.send_search(&url, &params).await
    }

    /// Retrieve sentence co-occurrence of the provided entities.
    pub async fn get_scc_docs(
        &self,
        entities: &[&str],
        source: &str,
        options: &SearchOptions,
    ) -> Result<Value> {
        let url = format!(
            "{}/api/ds/v1/search/co/sentence/sentencedetail/flat/{}/*/*/*",
            self.url, source
        );
        let params = vec![
            ("fmt", options.fmt.clone()),
            ("fields", options.fields.clone()),
            ("terms", entities.join(" ")),
            ("inorder", options.inorder.to_string()),
            ("slop", options.slop.to_string()),
            ("limit", options.limit.to_string()),
            ("from", options.from.to_string()),
            ("sortby", options.sort_by.clone()),
            ("zip", options.zip.to_string()),
        ];
        self.send_search(&url, &params).await
    }

    async fn send_search(&self, url: &str, params: &[(&str, String)]) -> Result<Value> {
        let client = build_client(&self.verification, url)?;
        debug!("Submitting DOCStore search to {}", url);

        let mut request = client.get(url).query(params);
        if let Some(auth) = &self.basic_auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request.send().await.map_err(|source| TermiteError::Transport {
            url: url.to_string(),
            source,
        })?;
        response.json().await.map_err(TermiteError::Decode)
    }
}

/// Flatten a document co-occurrence response: one record per hit, with the
/// title and text concatenated from the lead sections (`sectionId == 0`).
pub fn document_cooccurrence_records(response: &Value) -> Result<Vec<DocumentRecord>> {
    let hits = response
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| TermiteError::Shape("hits".into()))?;

    let mut records = Vec::with_capacity(hits.len());
    for hit in hits {
        let sections = hit
            .get("section")
            .and_then(Value::as_array)
            .ok_or_else(|| TermiteError::Shape("section".into()))?;

        let mut title = String::new();
        let mut text = String::new();
        for section in sections {
            if section.get("sectionId").and_then(Value::as_i64) == Some(0) {
                title += section
                    .get("titleText")
                    .and_then(Value::as_str)
                    .ok_or_else(|| TermiteError::Shape("titleText".into()))?;
                text += section
                    .get("text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| TermiteError::Shape("text".into()))?;
            }
        }

        let document_id = hit
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| TermiteError::Shape("id".into()))?;
        let date = hit
            .get("documentDate")
            .and_then(Value::as_str)
            .ok_or_else(|| TermiteError::Shape("documentDate".into()))?;

        records.push(DocumentRecord {
            document_id: document_id.to_string(),
            title,
            authors: hit.get("authors").cloned().unwrap_or(Value::Null),
            date: truncate_date(date).to_string(),
            text,
        });
    }
    Ok(records)
}

/// Flatten a sentence co-occurrence response into one record per sentence.
pub fn sentence_cooccurrence_records(response: &Value) -> Result<Vec<SentenceRecord>> {
    let hits = response
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| TermiteError::Shape("hits".into()))?;

    let mut records = Vec::with_capacity(hits.len());
    for hit in hits {
        let document_id = hit
            .get("docId")
            .and_then(Value::as_str)
            .ok_or_else(|| TermiteError::Shape("docId".into()))?;
        let date = hit
            .get("docDate")
            .and_then(Value::as_str)
            .ok_or_else(|| TermiteError::Shape("docDate".into()))?;
        let sentence = hit
            .get("sentence")
            .and_then(Value::as_str)
            .ok_or_else(|| TermiteError::Shape("sentence".into()))?;

        records.push(SentenceRecord {
            document_id: document_id.to_string(),
            document_date: truncate_date(date).to_string(),
            sentence: sentence.to_string(),
        });
    }
    Ok(records)
}

/// First ten characters of a timestamp, i.e. the `YYYY-MM-DD` date part.
fn truncate_date(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}
