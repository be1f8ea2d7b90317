//! Image reference parsing with Docker Hub normalization.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::RegistryError;

pub const DOCKER_HUB: &str = "docker.io";
const DOCKER_HUB_API: &str = "registry-1.docker.io";
const DEFAULT_TAG: &str = "latest";

static REPOSITORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[._-]+[a-z0-9]+)*(?:/[a-z0-9]+(?:[._-]+[a-z0-9]+)*)*$")
        .expect("valid repository regex")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("valid tag regex"));

/// A parsed `[registry/]repository[:tag|@digest]` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageReference {
    /// Registry host, `docker.io` when omitted
    pub registry: String,
    /// Repository path, `library/` prefixed for official Docker Hub images
    pub repository: String,
    /// Tag or digest
    pub reference: String,
}

impl ImageReference {
    pub fn parse(image: &str) -> Result<Self, RegistryError> {
        let invalid = || RegistryError::InvalidReference(image.to_string());
        let trimmed = image.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return Err(invalid());
        }

        let (name, digest) = match trimmed.split_once('@') {
            Some((name, digest)) => (name, Some(digest)),
            None => (trimmed, None),
        };
        if digest.is_some_and(|d| !d.contains(':')) {
            return Err(invalid());
        }

        let last_slash = name.rfind('/');
        let (name, tag) = match name.rfind(':') {
            Some(i) if last_slash.is_none_or(|s| i > s) => (&name[..i], Some(&name[i + 1..])),
            _ => (name, None),
        };
        if tag.is_some_and(|t| !TAG.is_match(t)) {
            return Err(invalid());
        }

        let (registry, repository) = match name.split_once('/') {
            Some((host, rest)) if is_registry_host(host) => (host.to_string(), rest.to_string()),
            _ => (DOCKER_HUB.to_string(), name.to_string()),
        };
        let repository = if registry == DOCKER_HUB && !repository.contains('/') {
            format!("library/{}", repository)
        } else {
            repository
        };
        if !REPOSITORY.is_match(&repository) {
            return Err(invalid());
        }

        let reference = digest.or(tag).unwrap_or(DEFAULT_TAG).to_string();
        Ok(Self {
            registry,
            repository,
            reference,
        })
    }

    /// Host that serves the distribution API for this registry.
    pub fn api_host(&self) -> &str {
        if self.registry == DOCKER_HUB {
            DOCKER_HUB_API
        } else {
            &self.registry
        }
    }

    pub fn is_digest(&self) -> bool {
        self.reference.contains(':')
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.is_digest() { '@' } else { ':' };
        write!(f, "{}/{}{}{}", self.registry, self.repository, sep, self.reference)
    }
}

fn is_registry_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}
