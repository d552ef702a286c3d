//! Entity lookup against the TERMite toolkit API.

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TermiteError};

/// Metadata subset for one entity: display name plus mappings to external
/// IDs, each mapping split on `|` into its component parts.
///
/// Fetched on demand; nothing is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDetails {
    pub id: String,
    pub entity_type: String,
    pub name: String,
    pub mappings: Vec<Vec<String>>,
}

/// Look up an entity with a `describe` call, e.g.
/// `http://localhost:9090/termite/toolkit/tool.api?t=describe&id=INDICATION:D001249`.
///
/// A non-success HTTP status is reported as [`TermiteError::Rejected`] with
/// the status code, distinct from a network-level [`TermiteError::Transport`].
pub async fn get_entity(termite_home: &str, entity_type: &str, entity_id: &str) -> Result<Value> {
    let url = format!("{termite_home}/toolkit/tool.api?t=describe&id={entity_type}:{entity_id}");
    debug!("Looking up entity via {}", url);

    let response = reqwest::get(&url)
        .await
        .map_err(|source| TermiteError::Transport {
            url: url.clone(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(TermiteError::Rejected(response.status().as_u16()));
    }
    response.json().await.map_err(TermiteError::Decode)
}

/// Fetch an entity and extract its name and external-ID mappings from the
/// first `TOOL_RESULT` item. An empty result list yields empty details; a
/// response without a `TOOL_RESULT` key is a shape error.
pub async fn get_entity_details(
    termite_home: &str,
    entity_type: &str,
    entity_id: &str,
) -> Result<EntityDetails> {
    let entity = get_entity(termite_home, entity_type, entity_id).await?;
    let results = entity
        .get("TOOL_RESULT")
        .and_then(Value::as_array)
        .ok_or_else(|| TermiteError::Shape("TOOL_RESULT".into()))?;

    let mut details = EntityDetails {
        id: entity_id.to_string(),
        entity_type: entity_type.to_string(),
        name: String::new(),
        mappings: Vec::new(),
    };

    if let Some(first) = results.first() {
        details.name = first
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| TermiteError::Shape("name".into()))?
            .to_string();
        if let Some(mappings) = first.get("mappings").and_then(Value::as_array) {
            for mapping in mappings {
                let mapping = mapping
                    .as_str()
                    .ok_or_else(|| TermiteError::Shape("mappings".into()))?;
                details
                    .mappings
                    .push(mapping.split('|').map(str::to_string).collect());
            }
        }
    }

    Ok(details)
}
