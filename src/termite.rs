//! TERMite request builder.
//!
//! Accumulates request configuration through setter calls and submits one
//! POST to the TERMite endpoint. Build one builder per logical request; the
//! accumulated state is plain mutable data with no synchronization.

use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};
use reqwest::{Certificate, Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TermiteError};

/// Basic-auth credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// TLS verification policy, independent of whether credentials are set.
///
/// Only disable verification when calling a known source.
#[derive(Debug, Clone, Default)]
pub enum TlsVerification {
    /// Verify the server certificate against the system roots.
    #[default]
    Enabled,
    /// Skip certificate verification entirely.
    Disabled,
    /// Verify against a PEM CA bundle at the given path.
    CaBundle(PathBuf),
}

/// A TERMite response body: parsed JSON when the output format contains
/// "json", otherwise the raw text (tsv and friends are passed through).
#[derive(Debug, Clone)]
pub enum TermiteResponse {
    Json(Value),
    Text(String),
}

impl TermiteResponse {
    /// The parsed JSON body, if this was a JSON response.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            TermiteResponse::Json(value) => Some(value),
            TermiteResponse::Text(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            TermiteResponse::Json(value) => Some(value),
            TermiteResponse::Text(_) => None,
        }
    }
}

/// Builder for TERMite annotation requests.
///
/// Setters mutate the builder and return nothing; `execute` consumes nothing
/// and may be called once all settings are in place. Recognized options are
/// stored as typed fields and serialized to the wire `opts` string only at
/// execute time, so option precedence does not depend on call-order string
/// concatenation. Extra `set_options` pairs keep their historical prepend
/// order: the most recently set batch serializes first.
#[derive(Debug)]
pub struct TermiteRequestBuilder {
    url: String,
    output: String,
    text: Option<String>,
    attachment: Option<PathBuf>,
    entities: Option<String>,
    input_format: Option<String>,
    max_docs: Option<u32>,
    fuzzy: Option<bool>,
    subsume: Option<bool>,
    no_empty: Option<bool>,
    reject_ambiguous: Option<bool>,
    extra_opts: Vec<(String, String)>,
    basic_auth: Option<Credentials>,
    verification: TlsVerification,
}

impl Default for TermiteRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TermiteRequestBuilder {
    /// A builder targeting a local TERMite instance with JSON output.
    pub fn new() -> Self {
        Self {
            url: "http://localhost:9090/termite".to_string(),
            output: "json".to_string(),
            text: None,
            attachment: None,
            entities: None,
            input_format: None,
            max_docs: None,
            fuzzy: None,
            subsume: None,
            no_empty: None,
            reject_ambiguous: None,
            extra_opts: Vec::new(),
            basic_auth: None,
            verification: TlsVerification::Enabled,
        }
    }

    /// Set the URL of the TERMite instance, e.g.
    /// `http://localhost:9090/termite`.
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

    /// Tag raw text, e.g. when looping through file content.
    pub fn set_text(&mut self, text: &str) {
        self.text = Some(text.to_string());
    }

    /// Annotate file content. The file is read when `execute` runs and the
    /// handle is released as soon as the bytes are loaded; a zip archive
    /// sends multiple files of the same type in one call.
    pub fn set_binary_content(&mut self, input_file_path: impl AsRef<Path>) {
        self.attachment = Some(input_file_path.as_ref().to_path_buf());
    }

    /// Limit annotation to a comma-separated list of entity types,
    /// e.g. `"DRUG,GENE"`.
    pub fn set_entities(&mut self, entities: &str) {
        self.entities = Some(entities.to_string());
    }

    /// Set the input format, e.g. `txt`, `medline.xml`, `pdf`, `xlsx`.
    pub fn set_input_format(&mut self, format: &str) {
        self.input_format = Some(format.to_string());
    }

    /// Set the output format, e.g. `tsv`, `json`, `doc.json`.
    pub fn set_output_format(&mut self, format: &str) {
        self.output = format.to_string();
    }

    /// Enable or disable fuzzy matching.
    pub fn set_fuzzy(&mut self, enabled: bool) {
        self.fuzzy = Some(enabled);
    }

    /// Take the longest hit where an entity matches more than one dictionary.
    pub fn set_subsume(&mut self, enabled: bool) {
        self.subsume = Some(enabled);
    }

    /// Automatically reject any hits flagged as ambiguous.
    pub fn set_reject_ambiguous(&mut self, enabled: bool) {
        self.reject_ambiguous = Some(enabled);
    }

    /// When tagging an archive or multi-record file, limit how many
    /// documents are scanned.
    pub fn set_max_docs(&mut self, max_docs: u32) {
        self.max_docs = Some(max_docs);
    }

    /// Drop documents that produced no hits from the response.
    pub fn set_no_empty(&mut self, enabled: bool) {
        self.no_empty = Some(enabled);
    }

    /// Bulk-set API options as key/value pairs.
    ///
    /// An `output` key routes to the output format; everything else is
    /// prepended to the running option list and joined with `&` on the wire.
    pub fn set_options(&mut self, options: &[(&str, &str)]) {
        let mut batch = Vec::new();
        for (key, value) in options {
            if *key == "output" {
                self.output = value.to_string();
            } else {
                batch.push((key.to_string(), value.to_string()));
            }
        }
        batch.append(&mut self.extra_opts);
        self.extra_opts = batch;
    }

    /// The `&`-joined option string as it will appear on the wire: extra
    /// options first (most recently set batch leading), then `fzy.promote`,
    /// then `rejectAmbig`.
    pub fn options_string(&self) -> Option<String> {
        let mut parts: Vec<String> = self
            .extra_opts
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if let Some(fuzzy) = self.fuzzy {
            parts.push(format!("fzy.promote={fuzzy}"));
        }
        if let Some(reject) = self.reject_ambiguous {
            parts.push(format!("rejectAmbig={reject}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("&"))
        }
    }

    /// Form fields for the request, minus any binary attachment.
    fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("output", self.output.clone())];
        if let Some(text) = &self.text {
            fields.push(("text", text.clone()));
        }
        if let Some(entities) = &self.entities {
            fields.push(("entities", entities.clone()));
        }
        if let Some(format) = &self.input_format {
            fields.push(("format", format.clone()));
        }
        if let Some(max_docs) = self.max_docs {
            fields.push(("maxDocs", max_docs.to_string()));
        }
        if let Some(fuzzy) = self.fuzzy {
            fields.push(("fuzzy", fuzzy.to_string()));
        }
        if let Some(subsume) = self.subsume {
            fields.push(("subsume", subsume.to_string()));
        }
        if let Some(no_empty) = self.no_empty {
            fields.push(("noEmpty", no_empty.to_string()));
        }
        if let Some(opts) = self.options_string() {
            fields.push(("opts", opts));
        }
        fields
    }

    /// POST the accumulated settings to the TERMite API.
    ///
    /// Returns parsed JSON when the output format contains "json", raw text
    /// otherwise. Network failures come back as [`TermiteError::Transport`]
    /// carrying the configured URL.
    pub async fn execute(&self) -> Result<TermiteResponse> {
        let client = build_client(&self.verification, &self.url)?;
        let fields = self.form_fields();
        debug!("Submitting TERMite request to {}", self.url);

        let request: RequestBuilder = match (&self.attachment, &self.basic_auth) {
            (Some(path), Some(auth)) => client
                .post(&self.url)
                .multipart(multipart_form(path, &fields)?)
                .basic_auth(&auth.username, Some(&auth.password)),
            (Some(path), None) => client
                .post(&self.url)
                .multipart(multipart_form(path, &fields)?),
            (None, Some(auth)) => client
                .post(&self.url)
                .form(&fields)
                .basic_auth(&auth.username, Some(&auth.password)),
            (None, None) => client.post(&self.url).form(&fields),
        };

        let response = request.send().await.map_err(|source| TermiteError::Transport {
            url: self.url.clone(),
            source,
        })?;

        if self.output.contains("json") {
            let body = response.json().await.map_err(TermiteError::Decode)?;
            Ok(TermiteResponse::Json(body))
        } else {
            let body = response.text().await.map_err(TermiteError::Decode)?;
            Ok(TermiteResponse::Text(body))
        }
    }
}

/// Build an HTTP client honoring the TLS verification policy. The target
/// URL is only used to label any construction failure.
pub(crate) fn build_client(verification: &TlsVerification, url: &str) -> Result<Client> {
    let builder = match verification {
        TlsVerification::Enabled => Client::builder(),
        TlsVerification::Disabled => Client::builder().danger_accept_invalid_certs(true),
        TlsVerification::CaBundle(path) => {
            let pem = std::fs::read(path).map_err(|source| TermiteError::Certificate {
                path: path.clone(),
                source: Box::new(source),
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|source| TermiteError::Certificate {
                path: path.clone(),
                source: Box::new(source),
            })?;
            Client::builder().add_root_certificate(cert)
        }
    };
    builder.build().map_err(|source| TermiteError::Transport {
        url: url.to_string(),
        source,
    })
}

/// Assemble the multipart form: all payload fields as text parts plus the
/// attachment under the `binary` part, named after the file. The file is
/// read here so the handle never outlives the call.
fn multipart_form(path: &Path, fields: &[(&'static str, String)]) -> Result<Form> {
    let bytes = std::fs::read(path).map_err(|source| TermiteError::Attachment {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "binary".to_string());

    let mut form = Form::new();
    for (key, value) in fields {
        form = form.text(*key, value.clone());
    }
    Ok(form.part("binary", Part::bytes(bytes).file_name(file_name)))
}

/// Annotate the content of a single file or zip archive in one call.
pub async fn annotate_files(
    url: &str,
    input_file_path: impl AsRef<Path>,
    options: &[(&str, &str)],
) -> Result<TermiteResponse> {
    let mut builder = TermiteRequestBuilder::new();
    builder.set_url(url);
    builder.set_binary_content(input_file_path);
    builder.set_options(options);
    builder.execute().await
}

/// Annotate a string of text in one call.
pub async fn annotate_text(
    url: &str,
    text: &str,
    options: &[(&str, &str)],
) -> Result<TermiteResponse> {
    let mut builder = TermiteRequestBuilder::new();
    builder.set_url(url);
    builder.set_text(text);
    builder.set_options(options);
    builder.execute().await
}
