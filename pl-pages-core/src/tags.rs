//! Tag schema for objects uploaded to the storage network.
//!
//! Every uploaded object carries a fixed set of tags determined by its
//! [`ObjectKind`]. A [`TagSet`] can only be constructed when its names match
//! the kind's schema exactly, so providers never see a partial or foreign tag
//! list.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Commit, Repository};

/// `App-Name` of every object this tool uploads; dedup lookups filter on it.
pub const APP_NAME: &str = "Dragon-Deploy";
pub const APP_VERSION: &str = "0.3.0";
pub const MANIFEST_CONTENT_TYPE: &str = "application/x.arweave-manifest+json";
pub const DEPLOYED_THROUGH: &str = "Protocol.Land";
pub const PAGE_TYPE: &str = "web-page";

/// The closed set of tag names used on uploaded objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagName {
    ContentType,
    AppName,
    AppVersion,
    FileHash,
    Title,
    UnixTime,
    Description,
    Type,
    DeployedThrough,
    RepoId,
    RepoBranch,
    CommitOid,
    CommitMessage,
}

impl TagName {
    /// Wire name of the tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            TagName::ContentType => "Content-Type",
            TagName::AppName => "App-Name",
            TagName::AppVersion => "App-Version",
            TagName::FileHash => "File-Hash",
            TagName::Title => "Title",
            TagName::UnixTime => "Unix-Time",
            TagName::Description => "Description",
            TagName::Type => "Type",
            TagName::DeployedThrough => "Deployed-Through",
            TagName::RepoId => "Repo-Id",
            TagName::RepoBranch => "Repo-Branch",
            TagName::CommitOid => "Commit-Oid",
            TagName::CommitMessage => "Commit-Message",
        }
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kinds of object a deployment uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A single file of the published directory.
    File,
    /// The path manifest describing a deployment.
    Manifest,
}

const FILE_SCHEMA: &[TagName] = &[
    TagName::ContentType,
    TagName::AppName,
    TagName::AppVersion,
    TagName::FileHash,
];

const MANIFEST_SCHEMA: &[TagName] = &[
    TagName::ContentType,
    TagName::Title,
    TagName::AppName,
    TagName::AppVersion,
    TagName::UnixTime,
    TagName::Description,
    TagName::Type,
    TagName::DeployedThrough,
    TagName::RepoId,
    TagName::RepoBranch,
    TagName::CommitOid,
    TagName::CommitMessage,
];

impl ObjectKind {
    /// Tag names carried by this kind, in wire order.
    pub fn schema(self) -> &'static [TagName] {
        match self {
            ObjectKind::File => FILE_SCHEMA,
            ObjectKind::Manifest => MANIFEST_SCHEMA,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::File => write!(f, "file"),
            ObjectKind::Manifest => write!(f, "manifest"),
        }
    }
}

/// A single name/value pair as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A validated tag mapping for one object kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    kind: ObjectKind,
    values: BTreeMap<TagName, String>,
}

impl TagSet {
    /// Build a tag set, checking that `values` covers the kind's schema
    /// exactly. A repeated name keeps the last value.
    pub fn new(
        kind: ObjectKind,
        values: impl IntoIterator<Item = (TagName, String)>,
    ) -> Result<Self, CoreError> {
        let schema = kind.schema();
        let mut map = BTreeMap::new();
        for (name, value) in values {
            if !schema.contains(&name) {
                return Err(CoreError::UnexpectedTag { kind, tag: name });
            }
            map.insert(name, value);
        }
        if let Some(missing) = schema.iter().find(|name| !map.contains_key(*name)) {
            return Err(CoreError::MissingTag {
                kind,
                tag: *missing,
            });
        }
        Ok(Self { kind, values: map })
    }

    /// Tags for an uploaded file.
    pub fn for_file(content_type: &str, file_hash: &str) -> Self {
        Self::from_schema_values(
            ObjectKind::File,
            [
                (TagName::ContentType, content_type.to_owned()),
                (TagName::AppName, APP_NAME.to_owned()),
                (TagName::AppVersion, APP_VERSION.to_owned()),
                (TagName::FileHash, file_hash.to_owned()),
            ],
        )
    }

    /// Tags for a deployment manifest.
    pub fn for_manifest(repo: &Repository, commit: &Commit, unix_time: i64) -> Self {
        Self::from_schema_values(
            ObjectKind::Manifest,
            [
                (TagName::ContentType, MANIFEST_CONTENT_TYPE.to_owned()),
                (TagName::Title, repo.name.clone()),
                (TagName::AppName, APP_NAME.to_owned()),
                (TagName::AppVersion, APP_VERSION.to_owned()),
                (TagName::UnixTime, unix_time.to_string()),
                (TagName::Description, repo.description.clone()),
                (TagName::Type, PAGE_TYPE.to_owned()),
                (TagName::DeployedThrough, DEPLOYED_THROUGH.to_owned()),
                (TagName::RepoId, repo.id.clone()),
                (
                    TagName::RepoBranch,
                    repo.deployment_branch().unwrap_or_default().to_owned(),
                ),
                (TagName::CommitOid, commit.oid.0.clone()),
                (TagName::CommitMessage, commit.message.clone()),
            ],
        )
    }

    // Callers pass exactly the schema, so validation cannot fail.
    fn from_schema_values<const N: usize>(kind: ObjectKind, values: [(TagName, String); N]) -> Self {
        Self {
            kind,
            values: values.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn get(&self, name: TagName) -> Option<&str> {
        self.values.get(&name).map(String::as_str)
    }

    /// Wire tags in schema order.
    pub fn to_tags(&self) -> Vec<Tag> {
        self.kind
            .schema()
            .iter()
            .filter_map(|name| self.values.get(name).map(|v| Tag::new(name.as_str(), v.clone())))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
