//! Upload fallback chain.
//!
//! Providers are tried in priority order. The first success wins and no
//! later provider is contacted; a failing provider is never retried. When
//! every provider fails the individual failures are returned together.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use pl_pages_core::{ObjectId, Settings, Tag, TagSet};

use crate::data_item::{self, DataItem};
use crate::error::{ProviderError, ProviderFailure, UploadError};
use crate::http::Http;
use crate::signer::{Signer, RSA_SIGNATURE_TYPE};
use crate::transaction::Transaction;

/// A storage provider accepting signed, tagged payloads.
#[async_trait]
pub trait UploadProvider: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    async fn upload(
        &self,
        data: &[u8],
        tags: &[Tag],
        signer: &dyn Signer,
    ) -> Result<ObjectId, ProviderError>;
}

/// Ordered list of providers folded over until one succeeds.
#[derive(Clone)]
pub struct UploadChain {
    providers: Vec<Arc<dyn UploadProvider>>,
}

impl UploadChain {
    pub fn new(providers: Vec<Arc<dyn UploadProvider>>) -> Self {
        Self { providers }
    }

    /// Subsidized relay, then bundler, then gateway.
    pub fn from_settings(settings: &Settings, http: &Http) -> Self {
        Self::new(vec![
            Arc::new(SubsidizedRelay::new(http.clone(), &settings.subsidize_url)),
            Arc::new(BundlerNode::new(http.clone(), &settings.bundler_url)),
            Arc::new(GatewayDirect::new(http.clone(), &settings.gateway_url)),
        ])
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn upload(
        &self,
        data: &[u8],
        tags: &TagSet,
        signer: &dyn Signer,
    ) -> Result<ObjectId, UploadError> {
        let wire_tags = tags.to_tags();
        let mut attempts = Vec::new();
        for provider in &self.providers {
            match provider.upload(data, &wire_tags, signer).await {
                Ok(id) => {
                    tracing::debug!(provider = provider.name(), id = %id, kind = %tags.kind(), "uploaded");
                    return Ok(id);
                }
                Err(error) => {
                    tracing::warn!(provider = provider.name(), "upload failed, trying next provider");
                    tracing::debug!(provider = provider.name(), error = %error, "provider failure");
                    attempts.push(ProviderFailure {
                        provider: provider.name().to_owned(),
                        error,
                    });
                }
            }
        }
        Err(UploadError::Exhausted { attempts })
    }
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Relay that pays for uploads on the caller's behalf. Receives a one-item
/// bundle as a JSON byte array.
#[derive(Debug, Clone)]
pub struct SubsidizedRelay {
    http: Http,
    url: String,
}

impl SubsidizedRelay {
    pub fn new(http: Http, url: &str) -> Self {
        Self {
            http,
            url: url.to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RelayReply {
    #[serde(default)]
    success: bool,
    data: Option<RelayData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayData {
    repo_tx_id: String,
}

#[async_trait]
impl UploadProvider for SubsidizedRelay {
    fn name(&self) -> &str {
        "subsidize"
    }

    async fn upload(
        &self,
        data: &[u8],
        tags: &[Tag],
        signer: &dyn Signer,
    ) -> Result<ObjectId, ProviderError> {
        let item = DataItem::sign(data, tags, None, None, signer)?;
        let bundle = data_item::bundle(&[item]);
        let body = json!({
            "txBundle": { "type": "Buffer", "data": bundle },
            "platform": "CLI",
            "owner": signer.address(),
        });
        let response = self.http.post_json(&self.url, body).await?;
        let reply: RelayReply = response.json().map_err(|_| ProviderError::Status {
            status: response.status,
            body: response.body.clone(),
        })?;
        if !reply.success {
            return Err(ProviderError::Rejected(format!(
                "HTTP {} {}",
                response.status, response.body
            )));
        }
        reply
            .data
            .map(|d| ObjectId(d.repo_tx_id))
            .ok_or_else(|| ProviderError::Rejected("reply is missing data.repoTxId".into()))
    }
}

/// Bundler node accepting raw data items at `/tx`.
#[derive(Debug, Clone)]
pub struct BundlerNode {
    http: Http,
    node: String,
}

impl BundlerNode {
    pub fn new(http: Http, node: &str) -> Self {
        Self {
            http,
            node: node.to_owned(),
        }
    }
}

#[async_trait]
impl UploadProvider for BundlerNode {
    fn name(&self) -> &str {
        "turbo"
    }

    async fn upload(
        &self,
        data: &[u8],
        tags: &[Tag],
        signer: &dyn Signer,
    ) -> Result<ObjectId, ProviderError> {
        let item = DataItem::sign(data, tags, None, None, signer)?;
        let id = item.id();
        let response = self
            .http
            .post_bytes(&endpoint(&self.node, "tx"), "application/octet-stream", item.into_bytes())
            .await?;
        if response.status >= 400 {
            return Err(ProviderError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(id)
    }
}

/// Last resort: a layer-1 transaction posted straight to the gateway,
/// paid for by the wallet itself. Only RSA wallets can sign these.
#[derive(Debug, Clone)]
pub struct GatewayDirect {
    http: Http,
    gateway: String,
}

impl GatewayDirect {
    pub fn new(http: Http, gateway: &str) -> Self {
        Self {
            http,
            gateway: gateway.to_owned(),
        }
    }

    async fn text(&self, path: &str) -> Result<String, ProviderError> {
        let response = self.http.get(&endpoint(&self.gateway, path)).await?;
        if !response.is_success() {
            return Err(ProviderError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response.body.trim().to_owned())
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
        size_kb: usize,
    ) -> Result<(), ProviderError> {
        let response = self
            .http
            .post_json(&endpoint(&self.gateway, path), body)
            .await?;
        if response.status != 200 {
            return Err(ProviderError::Rejected(format!(
                "HTTP {} - {}. Check that the wallet can pay for ~{size_kb} KB of data.",
                response.status, response.body
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UploadProvider for GatewayDirect {
    fn name(&self) -> &str {
        "arweave"
    }

    async fn upload(
        &self,
        data: &[u8],
        tags: &[Tag],
        signer: &dyn Signer,
    ) -> Result<ObjectId, ProviderError> {
        if signer.signature_type() != RSA_SIGNATURE_TYPE {
            return Err(ProviderError::Rejected("direct gateway uploads need an RSA wallet".into()));
        }
        let anchor = self.text("tx_anchor").await?;
        let reward = self.text(&format!("price/{}", data.len())).await?;
        let tx = Transaction::sign(data, tags, &anchor, &reward, signer)?;
        let size_kb = data.len().div_ceil(1024);

        self.post("tx", tx.header_json(), size_kb).await?;
        for chunk in tx.chunk_bodies() {
            self.post("chunk", chunk, size_kb).await?;
        }
        Ok(tx.id())
    }
}
