//! Deployment registry client.
//!
//! Reads are dry-run evaluations against a compute unit; writes are signed
//! messages posted to a messenger unit whose evaluation result is then
//! checked for an error output. The registry does not deduplicate
//! deployments, so callers check [`Repository::deployment_for`] first.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use pl_pages_core::{Deployment, Repository, Settings, Tag};

use crate::data_item::{decode_target, DataItem};
use crate::error::RegistryError;
use crate::http::Http;
use crate::signer::Signer;

/// Repository fields requested on reads.
const REPOSITORY_FIELDS: &[&str] = &[
    "id",
    "name",
    "description",
    "owner",
    "deployments",
    "deploymentBranch",
    "contributors",
];

/// Message payload sent with every registry message.
const MESSAGE_DATA: &str = "1234";

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Current state of the repository with registry id `id`.
    async fn view_repository(&self, id: &str) -> Result<Repository, RegistryError>;

    /// Append `deployment` to the repository's deployment list.
    async fn add_deployment(
        &self,
        repo: &Repository,
        deployment: &Deployment,
        signer: &dyn Signer,
    ) -> Result<(), RegistryError>;

    /// Set the branch whose tip commits get deployed.
    async fn update_deployment_branch(
        &self,
        repo: &Repository,
        branch: &str,
        signer: &dyn Signer,
    ) -> Result<(), RegistryError>;
}

pub(crate) fn require_id(repo: &Repository) -> Result<&str, RegistryError> {
    if repo.id.is_empty() {
        Err(RegistryError::MissingId)
    } else {
        Ok(&repo.id)
    }
}

/// [`RegistryClient`] for the registry process on the compute network.
#[derive(Debug, Clone)]
pub struct AoRegistry {
    http: Http,
    compute_unit_url: String,
    messenger_unit_url: String,
    process_id: String,
}

impl AoRegistry {
    pub fn from_settings(settings: &Settings, http: &Http) -> Self {
        Self {
            http: http.clone(),
            compute_unit_url: trim(&settings.compute_unit_url),
            messenger_unit_url: trim(&settings.messenger_unit_url),
            process_id: settings.registry_process_id.clone(),
        }
    }

    async fn dry_run(&self, tags: Vec<Tag>) -> Result<Value, RegistryError> {
        let url = format!(
            "{}/dry-run?process-id={}",
            self.compute_unit_url, self.process_id
        );
        let mut all_tags = protocol_tags();
        all_tags.extend(tags);
        let body = json!({
            "Id": "1234",
            "Target": self.process_id,
            "Owner": "1234",
            "Anchor": "0",
            "Data": MESSAGE_DATA,
            "Tags": all_tags,
        });
        let response = self.http.post_json(&url, body).await?;
        if !response.is_success() {
            return Err(RegistryError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response.json()?)
    }

    async fn send_message(&self, tags: Vec<Tag>, signer: &dyn Signer) -> Result<String, RegistryError> {
        let target = decode_target(&self.process_id)?;
        let mut all_tags = protocol_tags();
        all_tags.extend(tags);
        let item = DataItem::sign(MESSAGE_DATA.as_bytes(), &all_tags, Some(&target), None, signer)?;
        let item_id = item.id().0;

        let response = self
            .http
            .post_bytes(
                &format!("{}/", self.messenger_unit_url),
                "application/octet-stream",
                item.into_bytes(),
            )
            .await?;
        if !response.is_success() {
            return Err(RegistryError::Status {
                status: response.status,
                body: response.body,
            });
        }
        let message_id = response
            .json::<Value>()
            .ok()
            .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or(item_id);

        let url = format!(
            "{}/result/{}?process-id={}",
            self.compute_unit_url, message_id, self.process_id
        );
        let response = self.http.get(&url).await?;
        if !response.is_success() {
            return Err(RegistryError::Status {
                status: response.status,
                body: response.body,
            });
        }
        check_result(&response.json()?)?;
        tracing::debug!(message = %message_id, "registry message evaluated");
        Ok(message_id)
    }
}

#[async_trait]
impl RegistryClient for AoRegistry {
    async fn view_repository(&self, id: &str) -> Result<Repository, RegistryError> {
        let fields = serde_json::to_string(REPOSITORY_FIELDS).unwrap_or_default();
        let reply = self
            .dry_run(vec![
                Tag::new("Action", "Get-Repository"),
                Tag::new("Id", id),
                Tag::new("Fields", fields),
            ])
            .await?;
        repository_from_reply(id, &reply)
    }

    async fn add_deployment(
        &self,
        repo: &Repository,
        deployment: &Deployment,
        signer: &dyn Signer,
    ) -> Result<(), RegistryError> {
        let id = require_id(repo)?;
        let payload =
            serde_json::to_string(deployment).map_err(|e| RegistryError::Malformed(e.to_string()))?;
        self.send_message(
            vec![
                Tag::new("Action", "Add-Deployment"),
                Tag::new("Id", id),
                Tag::new("Deployment", payload),
            ],
            signer,
        )
        .await
        .map(drop)
    }

    async fn update_deployment_branch(
        &self,
        repo: &Repository,
        branch: &str,
        signer: &dyn Signer,
    ) -> Result<(), RegistryError> {
        let id = require_id(repo)?;
        self.send_message(
            vec![
                Tag::new("Action", "Update-Repository-Details"),
                Tag::new("Id", id),
                Tag::new("DeploymentBranch", branch),
            ],
            signer,
        )
        .await
        .map(drop)
    }
}

fn trim(url: &str) -> String {
    url.trim_end_matches('/').to_owned()
}

fn protocol_tags() -> Vec<Tag> {
    vec![
        Tag::new("Data-Protocol", "ao"),
        Tag::new("Variant", "ao.TN.1"),
        Tag::new("Type", "Message"),
    ]
}

#[derive(Debug, Deserialize)]
struct RepositoryReply {
    result: Option<Repository>,
}

/// Extract the repository from a dry-run reply: `Messages[0].Data` is a JSON
/// string whose `result` is the record.
fn repository_from_reply(id: &str, reply: &Value) -> Result<Repository, RegistryError> {
    let data = reply
        .pointer("/Messages/0/Data")
        .and_then(Value::as_str)
        .ok_or_else(|| RegistryError::NotFound { id: id.to_owned() })?;
    let parsed: RepositoryReply =
        serde_json::from_str(data).map_err(|e| RegistryError::Malformed(e.to_string()))?;
    parsed
        .result
        .ok_or_else(|| RegistryError::NotFound { id: id.to_owned() })
}

/// Fail when the evaluation result carries an error output.
fn check_result(result: &Value) -> Result<(), RegistryError> {
    if let Some(error) = result.get("Error").and_then(Value::as_str) {
        if !error.is_empty() {
            return Err(RegistryError::Rejected(error_summary(error)));
        }
    }
    match result.pointer("/Output/data/output") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(()),
        Some(Value::String(s)) if s.is_empty() => Ok(()),
        Some(Value::String(s)) => Err(RegistryError::Rejected(error_summary(s))),
        Some(other) => Err(RegistryError::Rejected(other.to_string())),
    }
}

/// Pull the message out of `...: <message>!` process output; falls back to
/// the whole text.
fn error_summary(text: &str) -> String {
    for (pos, _) in text.match_indices(':') {
        let rest = &text[pos + 1..];
        let end = rest.find(|c: char| c == ':' || c == '!').unwrap_or(rest.len());
        if end > 0 && rest[end..].starts_with('!') {
            let message = rest[..end].trim();
            if !message.is_empty() {
                return message.to_owned();
            }
        }
    }
    text.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Ed25519Signer;
    use pl_pages_core::{Address, CommitOid, ObjectId};

    fn repo(id: &str) -> Repository {
        Repository {
            id: id.into(),
            name: "site".into(),
            description: String::new(),
            owner: Address::from("owner"),
            contributors: Default::default(),
            deployments: vec![],
            deployment_branch: Some("pl-pages".into()),
        }
    }

    #[test]
    fn parses_dry_run_reply() {
        let record = json!({
            "result": {
                "id": "github.com/u/site",
                "name": "site",
                "description": "docs",
                "owner": "addr",
                "contributors": ["c1"],
                "deployments": [{"txId": "tx", "commitOid": "abc", "commitMessage": "msg"}],
                "deploymentBranch": "pl-pages"
            }
        });
        let reply = json!({ "Messages": [{ "Data": record.to_string() }] });
        let repo = repository_from_reply("github.com/u/site", &reply).unwrap();
        assert_eq!(repo.deployment_branch(), Some("pl-pages"));
        assert!(repo.is_owner_or_contributor(&Address::from("c1")));
        assert_eq!(
            repo.deployment_for(&CommitOid::from("abc")).map(|d| &d.tx_id),
            Some(&ObjectId::from("tx"))
        );
    }

    #[test]
    fn empty_reply_is_not_found() {
        let err = repository_from_reply("x", &json!({ "Messages": [] })).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
        let err = repository_from_reply("x", &json!({ "Messages": [{ "Data": "{\"result\":null}" }] }))
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[test]
    fn error_output_fails_the_write() {
        let ok = json!({ "Output": { "data": { "output": "" } }, "Messages": [] });
        assert!(check_result(&ok).is_ok());
        assert!(check_result(&json!({})).is_ok());

        let failed = json!({
            "Output": { "data": { "output": "[string \"repo\"]:42: Repository not found!" } }
        });
        let err = check_result(&failed).unwrap_err();
        assert_eq!(err.to_string(), "registry rejected the message: Repository not found");
    }

    #[test]
    fn error_summary_falls_back_to_text() {
        assert_eq!(error_summary("plain failure"), "plain failure");
        assert_eq!(error_summary("Error: Not allowed!"), "Not allowed");
    }

    #[tokio::test]
    async fn writes_require_a_repository_id() {
        let registry = AoRegistry::from_settings(&Settings::default(), &Http::new());
        let signer = Ed25519Signer::from_secret([1u8; 32]);
        let err = registry
            .update_deployment_branch(&repo(""), "pl-pages", &signer)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingId));

        let deployment = Deployment {
            tx_id: ObjectId::from("tx"),
            commit_oid: CommitOid::from("abc"),
            commit_message: "m".into(),
        };
        let err = registry
            .add_deployment(&repo(""), &deployment, &signer)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingId));
    }

    #[test]
    fn default_process_id_is_a_valid_target() {
        assert!(decode_target(&Settings::default().registry_process_id).is_ok());
    }
}
