//! # pl-pages-deploy
//!
//! Permanent-storage deployment of a published branch.
//!
//! Call [`publish`] to synchronize the branch and, when the push succeeds,
//! run the [`Deployer`]: hash the files, skip content already stored, upload
//! the rest through the [`UploadChain`], upload a path [`Manifest`] and
//! record the deployment with the [`RegistryClient`].

pub mod data_item;
pub mod dedup;
pub mod error;
pub mod estimate;
pub mod hasher;
pub mod http;
pub mod manifest;
pub mod pipeline;
pub mod publish;
pub mod registry;
pub mod signer;
pub mod transaction;
pub mod upload;

pub use dedup::{ContentIndex, GraphqlIndex, IndexedObject};
pub use error::{
    DeployError, HttpError, ProviderError, ProviderFailure, PublishError, RegistryError,
    SignError, UploadError,
};
pub use estimate::{Estimate, NetworkOracle, PriceOracle};
pub use manifest::{Manifest, PathRewrite, StaticExportRule};
pub use pipeline::{DeployRequest, Deployer};
pub use publish::{publish, PublishContext};
pub use registry::{AoRegistry, RegistryClient};
pub use signer::{load_jwk, Ed25519Signer, RsaSigner, Signer};
pub use transaction::Transaction;
pub use upload::{BundlerNode, GatewayDirect, SubsidizedRelay, UploadChain, UploadProvider};
