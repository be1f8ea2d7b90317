//! Container image existence checks.
//!
//! Images are extracted from a rendered manifest, parsed into
//! [`ImageReference`]s and probed against their registries with bounded
//! parallelism and a shared deadline.

pub mod client;
pub mod images;
pub mod prober;
pub mod reference;

pub use client::{ManifestStore, RegistryClient, RegistryCredentials};
pub use images::extract_images;
pub use prober::{ProbeSettings, check_images_exist};
pub use reference::ImageReference;

/// Error type for registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid image reference '{0}'")]
    InvalidReference(String),

    #[error("Manifest not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Registry returned {status} for {url}")]
    Status { status: u16, url: String },
}
