use std::collections::BTreeMap;
use std::time::Duration;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use semver::{Version, VersionReq};
use serde::Deserialize;
use crate::error::{Error, Result};

/// Registry used when `HOIST_REGISTRY` is not set.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Upper bound for a single registry request.
pub const REGISTRY_TIMEOUT: Duration = Duration::from_secs(5);

/// The subset of a registry package document that hoist reads.
///
/// Everything other than the `versions` map is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct Packument {
    #[serde(default)]
    pub versions: BTreeMap<String, PublishedVersion>,
}

/// Metadata for one published version of a package.
#[derive(Debug, Default, Deserialize)]
pub struct PublishedVersion {
    #[serde(default)]
    pub dist: Option<Dist>,
}

/// Where the archive of a published version lives and how to verify it.
#[derive(Debug, Deserialize)]
pub struct Dist {
    /// The URL of the gzipped tarball.
    pub tarball: String,
    /// Subresource-integrity string, e.g. `sha512-<base64>`.
    #[serde(default)]
    pub integrity: Option<String>,
}

impl Packument {
    pub fn dist(&self, version: &Version) -> Option<&Dist> {
        self.versions.get(&version.to_string())?.dist.as_ref()
    }
}

/// A source of published versions for a package name.
///
/// [`RegistryClient`] is the network implementation. Resolution helpers are
/// provided on top of [`VersionSource::list_versions`] so every source orders
/// versions the same way.
pub trait VersionSource {
    /// Lists every published version of `name`.
    ///
    /// An unknown package yields an empty list, not an error.
    fn list_versions(&self, name: &str) -> Result<Vec<String>>;

    /// The highest published version of `name`, if any.
    fn resolve_latest(&self, name: &str) -> Result<Option<Version>> {
        let versions = self.list_versions(name)?;
        Ok(select_latest(&versions))
    }

    /// The highest published version of `name` compatible with `^base`.
    fn resolve_compatible(&self, base: &Version, name: &str) -> Result<Option<Version>> {
        let versions = self.list_versions(name)?;
        Ok(select_compatible(base, &versions))
    }
}

/// Picks the highest version by semver precedence.
///
/// Strings that are not valid semver are skipped.
pub fn select_latest<S: AsRef<str>>(versions: &[S]) -> Option<Version> {
    parse_versions(versions).into_iter().max()
}

/// Picks the highest version satisfying the caret range anchored at `base`.
pub fn select_compatible<S: AsRef<str>>(base: &Version, versions: &[S]) -> Option<Version> {
    let req = caret(base);
    parse_versions(versions)
        .into_iter()
        .filter(|version| req.matches(version))
        .max()
}

/// Name under which the hoist CLI itself is published.
pub const CLI_PACKAGE: &str = "@hoist/cli";

/// The newest published release of `name` compatible with `current`, if it
/// is newer than `current`.
pub fn newer_compatible(
    source: &dyn VersionSource,
    name: &str,
    current: &Version,
) -> Result<Option<Version>> {
    Ok(source
        .resolve_compatible(current, name)?
        .filter(|latest| latest > current))
}

/// Builds `^base`, keeping any pre-release tag of the anchor.
pub fn caret(base: &Version) -> VersionReq {
    VersionReq {
        comparators: vec![semver::Comparator {
            op: semver::Op::Caret,
            major: base.major,
            minor: Some(base.minor),
            patch: Some(base.patch),
            pre: base.pre.clone(),
        }],
    }
}

fn parse_versions<S: AsRef<str>>(versions: &[S]) -> Vec<Version> {
    versions
        .iter()
        .filter_map(|raw| match Version::parse(raw.as_ref()) {
            Ok(version) => Some(version),
            Err(_) => {
                tracing::debug!(version = raw.as_ref(), "skipping non-semver version");
                None
            }
        })
        .collect()
}

/// Blocking HTTP client for an npm-compatible registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    http: Client,
}

impl RegistryClient {
    /// Creates a client for `base_url` with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL is not http(s) and
    /// [`Error::Registry`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, REGISTRY_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(Error::Config(format!("invalid registry URL '{base_url}'")));
        }
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hoist/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: trimmed.to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The underlying HTTP client, shared with tarball downloads.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// URL of the package document for `name`.
    ///
    /// The scope separator of scoped names is percent-encoded.
    pub fn package_url(&self, name: &str) -> String {
        let encoded = if name.starts_with('@') {
            name.replace('/', "%2F")
        } else {
            name.to_string()
        };
        format!("{}/{}", self.base_url, encoded)
    }

    /// Fetches the package document for `name`.
    ///
    /// Returns `Ok(None)` when the registry does not know the package.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] on transport failure, timeout, any status
    /// other than 200/404, or a body that is not a package document.
    pub fn fetch_packument(&self, name: &str) -> Result<Option<Packument>> {
        let url = self.package_url(name);
        tracing::debug!(%url, "querying registry");
        let response = self.http.get(&url).send()?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Ok(None),
            status => {
                return Err(Error::registry(format!(
                    "registry returned {status} for '{name}'"
                )));
            }
        }
        let body = response.text()?;
        let packument: Packument = serde_json::from_str(&body)
            .map_err(|e| Error::registry(format!("malformed registry document for '{name}': {e}")))?;
        Ok(Some(packument))
    }
}

impl VersionSource for RegistryClient {
    fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .fetch_packument(name)?
            .map(|packument| packument.versions.into_keys().collect())
            .unwrap_or_default())
    }
}
