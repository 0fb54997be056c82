//! Domain types for publishing and deployment records.
//!
//! `Repository` and `Deployment` mirror the records held by the external
//! registry; field names follow its camelCase JSON.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A wallet address on the storage network (base64url of the owner key hash).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier of an object stored on the storage network.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A Git commit object id (hex).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitOid(pub String);

impl fmt::Display for CommitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CommitOid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CommitOid {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Registry records
// ---------------------------------------------------------------------------

/// One archived snapshot of the deployment branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Object id of the uploaded manifest.
    pub tx_id: ObjectId,
    pub commit_oid: CommitOid,
    #[serde(default)]
    pub commit_message: String,
}

/// A repository as recorded by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner: Address,
    #[serde(default)]
    pub contributors: BTreeSet<Address>,
    #[serde(default)]
    pub deployments: Vec<Deployment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_branch: Option<String>,
}

impl Repository {
    /// Derive the registry id from a repository URL: everything up to and
    /// including the last `://` is dropped.
    pub fn id_from_url(url: &str) -> String {
        match url.rfind("://") {
            Some(pos) => url[pos + 3..].to_owned(),
            None => url.to_owned(),
        }
    }

    /// `true` when `address` owns the repository or is one of its contributors.
    pub fn is_owner_or_contributor(&self, address: &Address) -> bool {
        &self.owner == address || self.contributors.contains(address)
    }

    /// The existing deployment of `oid`, if any.
    ///
    /// The registry accepts duplicate commits, so callers must consult this
    /// before recording a new deployment.
    pub fn deployment_for(&self, oid: &CommitOid) -> Option<&Deployment> {
        self.deployments.iter().find(|d| &d.commit_oid == oid)
    }

    /// The configured deployment branch; empty strings count as unset.
    pub fn deployment_branch(&self) -> Option<&str> {
        self.deployment_branch
            .as_deref()
            .filter(|branch| !branch.is_empty())
    }
}

/// The tip commit of the deployment branch after a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub oid: CommitOid,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Author identity
// ---------------------------------------------------------------------------

/// Commit author identity applied to the checkout before committing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

impl FromStr for UserIdentity {
    type Err = CoreError;

    /// Accepts `Full Name <email@example.com>` or a bare `email@example.com`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidUser {
            input: s.to_owned(),
        };
        let trimmed = s.trim();

        if let Some(open) = trimmed.find('<') {
            let email = trimmed[open + 1..]
                .strip_suffix('>')
                .filter(|e| is_email(e))
                .ok_or_else(invalid)?;
            let name = trimmed[..open].trim();
            if name.is_empty() {
                return Err(invalid());
            }
            return Ok(Self {
                name: Some(name.to_owned()),
                email: email.to_owned(),
            });
        }

        if is_email(trimmed) {
            return Ok(Self {
                name: None,
                email: trimmed.to_owned(),
            });
        }
        Err(invalid())
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !s.chars().any(|c| c.is_whitespace() || c == '<' || c == '>')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
