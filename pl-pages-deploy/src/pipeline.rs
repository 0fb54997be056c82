//! Deployment pipeline run after the branch has been pushed.
//!
//! ## `Deployer::deploy`: step order
//!
//! 1. Fetch the repository from the registry.
//! 2. Reject callers that are neither owner nor contributor.
//! 3. Reject commits that already have a deployment.
//! 4. Require a configured deployment branch.
//! 5. Route every path and reject two files sharing a manifest key.
//! 6. Hash every file and look the digests up in the content index.
//! 7. Log the cost estimate.
//! 8. Upload each missing digest once, concurrently, and wait for all.
//! 9. Build and upload the manifest.
//! 10. Record the deployment in the registry.
//!
//! Nothing is uploaded or written when steps 1–5 fail. The registry write is
//! the last action, so a failed run can simply be repeated.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;

use pl_pages_core::{Commit, Deployment, ObjectId, Repository, Settings, TagSet};

use crate::dedup::{self, ContentIndex, GraphqlIndex};
use crate::error::DeployError;
use crate::estimate::{self, NetworkOracle, PriceOracle};
use crate::hasher::{self, TrackedFile};
use crate::http::Http;
use crate::manifest::{self, Manifest, PathRewrite, StaticExportRule};
use crate::registry::{AoRegistry, RegistryClient};
use crate::signer::Signer;
use crate::upload::UploadChain;

/// What to deploy.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// The commit just pushed to the deployment branch.
    pub commit: Commit,
    pub repo_url: String,
    /// Directory the files are read from.
    pub base: PathBuf,
    /// Files to deploy, relative to `base`.
    pub files: Vec<String>,
}

/// The deployment pipeline and its collaborators.
#[derive(Clone)]
pub struct Deployer {
    registry: Arc<dyn RegistryClient>,
    index: Arc<dyn ContentIndex>,
    uploads: Arc<UploadChain>,
    oracle: Arc<dyn PriceOracle>,
    rewrite: Arc<dyn PathRewrite>,
    gateway_url: String,
}

impl Deployer {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        index: Arc<dyn ContentIndex>,
        uploads: UploadChain,
        oracle: Arc<dyn PriceOracle>,
    ) -> Self {
        Self {
            registry,
            index,
            uploads: Arc::new(uploads),
            oracle,
            rewrite: Arc::new(StaticExportRule::default()),
            gateway_url: Settings::default().gateway_url,
        }
    }

    /// Network-backed pipeline configured from `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        let http = Http::new();
        Self::new(
            Arc::new(AoRegistry::from_settings(settings, &http)),
            Arc::new(GraphqlIndex::new(http.clone(), settings.graphql_url.clone())),
            UploadChain::from_settings(settings, &http),
            Arc::new(NetworkOracle::from_settings(settings, &http)),
        )
        .with_rewrite(Arc::new(StaticExportRule::new(
            settings.static_export_markers.clone(),
        )))
        .with_gateway(&settings.gateway_url)
    }

    pub fn with_rewrite(mut self, rewrite: Arc<dyn PathRewrite>) -> Self {
        self.rewrite = rewrite;
        self
    }

    pub fn with_gateway(mut self, gateway_url: &str) -> Self {
        self.gateway_url = gateway_url.trim_end_matches('/').to_owned();
        self
    }

    pub fn registry(&self) -> &Arc<dyn RegistryClient> {
        &self.registry
    }

    /// Public URL of a deployed manifest.
    pub fn deployment_link(&self, tx_id: &ObjectId) -> String {
        format!("{}/{}", self.gateway_url, tx_id)
    }

    /// Archive `request.files` and record the deployment of `request.commit`.
    pub async fn deploy(
        &self,
        request: &DeployRequest,
        signer: Option<Arc<dyn Signer>>,
    ) -> Result<Deployment, DeployError> {
        let signer = signer.ok_or(DeployError::MissingSigner)?;
        let commit = &request.commit;

        let repo_id = Repository::id_from_url(&request.repo_url);
        tracing::info!(repo = %repo_id, commit = %commit.oid, "Deploying...");
        let repo = self.registry.view_repository(&repo_id).await?;

        let address = signer.address();
        if !repo.is_owner_or_contributor(&address) {
            return Err(DeployError::NotAuthorized { address });
        }
        if let Some(existing) = repo.deployment_for(&commit.oid) {
            return Err(DeployError::AlreadyDeployed {
                oid: commit.oid.clone(),
                tx_id: existing.tx_id.clone(),
            });
        }
        if repo.deployment_branch().is_none() {
            return Err(DeployError::NoDeploymentBranch);
        }

        let paths: Vec<&str> = request.files.iter().map(String::as_str).collect();
        let routed = manifest::routed_paths(self.rewrite.as_ref(), &paths);
        manifest::ensure_unique(&routed)?;

        let files = hasher::hash_files(&request.base, &request.files).await?;
        let mut by_digest: BTreeMap<String, Arc<TrackedFile>> = BTreeMap::new();
        let mut total_bytes = 0u64;
        for file in &files {
            let digest = file.digest().await?;
            total_bytes += digest.size;
            by_digest
                .entry(digest.hash.clone())
                .or_insert_with(|| Arc::clone(file));
        }
        let digests: Vec<String> = by_digest.keys().cloned().collect();
        let known = dedup::resolve(self.index.as_ref(), &digests).await;

        let estimate = estimate::estimate(self.oracle.as_ref(), total_bytes).await;
        tracing::info!("Cost Estimates: {estimate}. This is an approximate cost for this deployment.");

        let missing: Vec<(String, Arc<TrackedFile>)> = by_digest
            .into_iter()
            .filter(|(hash, _)| !known.contains_key(hash))
            .collect();
        let mut ids = known;
        ids.extend(self.upload_missing(missing, &signer).await?);

        let mut manifest = Manifest::new();
        for (file, key) in files.iter().zip(routed) {
            let hash = &file.digest().await?.hash;
            let id = ids
                .get(hash)
                .cloned()
                .ok_or_else(|| DeployError::Unresolved { path: key.clone() })?;
            manifest.insert(key, id)?;
        }

        let tags = TagSet::for_manifest(&repo, commit, chrono::Utc::now().timestamp());
        let tx_id = self
            .uploads
            .upload(&manifest.to_bytes()?, &tags, signer.as_ref())
            .await?;
        tracing::info!(manifest = %tx_id, paths = manifest.len(), "uploaded manifest");

        let deployment = Deployment {
            tx_id,
            commit_oid: commit.oid.clone(),
            commit_message: commit.message.clone(),
        };
        self.registry
            .add_deployment(&repo, &deployment, signer.as_ref())
            .await?;
        tracing::info!("Deployment Link: {}", self.deployment_link(&deployment.tx_id));
        Ok(deployment)
    }

    /// Upload one object per missing digest. Files sharing a digest share
    /// the object, so its `Content-Type` is that of the first such file
    /// even when the others have different extensions.
    async fn upload_missing(
        &self,
        missing: Vec<(String, Arc<TrackedFile>)>,
        signer: &Arc<dyn Signer>,
    ) -> Result<HashMap<String, ObjectId>, DeployError> {
        let mut tasks = JoinSet::new();
        for (hash, file) in missing {
            let uploads = Arc::clone(&self.uploads);
            let signer = Arc::clone(signer);
            tasks.spawn(async move {
                let data = file.content().await?;
                let tags = TagSet::for_file(manifest::content_type(file.path()), &hash);
                let id = uploads.upload(&data, &tags, signer.as_ref()).await?;
                tracing::debug!(path = file.path(), id = %id, "uploaded file");
                Ok::<_, DeployError>((hash, id))
            });
        }

        let mut ids = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (hash, id) = joined??;
            ids.insert(hash, id);
        }
        Ok(ids)
    }
}
