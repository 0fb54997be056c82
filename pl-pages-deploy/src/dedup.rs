//! Content-hash deduplication against the storage network's index.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use pl_pages_core::tags::APP_NAME;
use pl_pages_core::{ObjectId, Tag, TagName};

use crate::error::HttpError;
use crate::http::Http;

/// An object found in the index, with its tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedObject {
    pub id: ObjectId,
    pub tags: Vec<Tag>,
}

impl IndexedObject {
    pub fn tag(&self, name: TagName) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name == name.as_str())
            .map(|t| t.value.as_str())
    }
}

/// Lookup of previously uploaded objects by content hash.
#[async_trait]
pub trait ContentIndex: Send + Sync {
    /// Objects uploaded by this tool whose `File-Hash` is one of `hashes`.
    async fn find_by_hashes(&self, hashes: &[String]) -> Result<Vec<IndexedObject>, HttpError>;
}

/// Map each digest in `hashes` to an existing object id.
///
/// One batched lookup per run. Any lookup failure is logged and treated as
/// "nothing found", so every file gets uploaded.
pub async fn resolve(index: &dyn ContentIndex, hashes: &[String]) -> HashMap<String, ObjectId> {
    let mut found = HashMap::new();
    if hashes.is_empty() {
        return found;
    }
    let wanted: BTreeSet<&str> = hashes.iter().map(String::as_str).collect();
    match index.find_by_hashes(hashes).await {
        Ok(objects) => {
            for object in objects {
                let Some(hash) = object.tag(TagName::FileHash) else {
                    continue;
                };
                if wanted.contains(hash) {
                    found.entry(hash.to_owned()).or_insert(object.id);
                }
            }
        }
        Err(err) => {
            tracing::warn!("dedup lookup failed; uploading everything");
            tracing::debug!(error = %err, "dedup lookup failure");
        }
    }
    tracing::info!(known = found.len(), total = wanted.len(), "resolved existing uploads");
    found
}

// ---------------------------------------------------------------------------
// GraphQL index
// ---------------------------------------------------------------------------

const TRANSACTIONS_QUERY: &str = "query($tags: [TagFilter!], $after: String, $first: Int) {
  transactions(tags: $tags, after: $after, first: $first) {
    pageInfo { hasNextPage }
    edges { cursor node { id tags { name value } } }
  }
}";

const PAGE_SIZE: u32 = 100;

/// [`ContentIndex`] backed by a gateway's GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct GraphqlIndex {
    http: Http,
    url: String,
}

#[derive(Debug, Deserialize)]
struct GqlReply {
    data: Option<GqlData>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GqlData {
    transactions: GqlConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlConnection {
    page_info: GqlPageInfo,
    edges: Vec<GqlEdge>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlPageInfo {
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct GqlEdge {
    cursor: String,
    node: GqlNode,
}

#[derive(Debug, Deserialize)]
struct GqlNode {
    id: String,
    tags: Vec<Tag>,
}

impl GraphqlIndex {
    pub fn new(http: Http, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ContentIndex for GraphqlIndex {
    async fn find_by_hashes(&self, hashes: &[String]) -> Result<Vec<IndexedObject>, HttpError> {
        let tags = json!([
            { "name": TagName::AppName.as_str(), "values": [APP_NAME] },
            { "name": TagName::FileHash.as_str(), "values": hashes },
        ]);
        let mut objects = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let body = json!({
                "query": TRANSACTIONS_QUERY,
                "variables": { "tags": tags, "after": after, "first": PAGE_SIZE },
            });
            let response = self.http.post_json(&self.url, body).await?;
            if !response.is_success() {
                return Err(HttpError::Transport {
                    url: self.url.clone(),
                    message: format!("HTTP {}", response.status),
                });
            }
            let reply: GqlReply = response.json()?;
            let Some(data) = reply.data else {
                return Err(HttpError::Transport {
                    url: self.url.clone(),
                    message: format!("GraphQL errors: {}", reply.errors.unwrap_or_default()),
                });
            };
            let connection = data.transactions;
            after = connection.edges.last().map(|e| e.cursor.clone());
            objects.extend(connection.edges.into_iter().map(|e| IndexedObject {
                id: ObjectId(e.node.id),
                tags: e.node.tags,
            }));
            if !connection.page_info.has_next_page || after.is_none() {
                break;
            }
        }
        Ok(objects)
    }
}
