use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use semver::Version;
use sha2::{Digest, Sha512};
use tar::Archive;
use crate::error::{Error, Result};
use crate::global::cache::{cache_path, version_dir};
use crate::registry::RegistryClient;

/// Largest tarball accepted from the registry.
pub const MAX_TARBALL_SIZE: u64 = 200 * 1024 * 1024;

/// One package to install at an exact version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: Version,
}

/// Everything an installer needs to place packages into a store.
#[derive(Debug)]
pub struct InstallRequest<'a> {
    /// Root the packages are installed for.
    pub root: &'a Path,
    /// Store directory receiving the flattened `.store/<key>@<version>` layout.
    pub store_dir: &'a Path,
    /// Registry base URL.
    pub registry: &'a str,
    pub packages: Vec<PackageSpec>,
}

/// Fetches and unpacks packages into a store.
///
/// Implementations must either place every requested package at its
/// [`cache_path`] or return an error.
pub trait Installer {
    fn install(&self, request: &InstallRequest<'_>) -> Result<()>;
}

/// Installs packages by downloading their registry tarballs.
#[derive(Debug, Default)]
pub struct TarballInstaller;

impl Installer for TarballInstaller {
    fn install(&self, request: &InstallRequest<'_>) -> Result<()> {
        let client = RegistryClient::new(request.registry)?;
        for spec in &request.packages {
            install_package(&client, spec, request.store_dir)
                .map_err(|err| match err {
                    err @ Error::Install { .. } => err,
                    other => Error::install(&spec.name, &spec.version, other),
                })?;
        }
        Ok(())
    }
}

fn install_package(client: &RegistryClient, spec: &PackageSpec, store_dir: &Path) -> Result<()> {
    let dest = cache_path(store_dir, &spec.name, &spec.version);
    if dest.exists() {
        tracing::debug!(path = %dest.display(), "already in store");
        return Ok(());
    }
    let packument = client
        .fetch_packument(&spec.name)?
        .ok_or_else(|| Error::install(&spec.name, &spec.version, "package not found in registry"))?;
    let dist = packument
        .dist(&spec.version)
        .ok_or_else(|| Error::install(&spec.name, &spec.version, "version has no tarball"))?;

    tracing::info!(package = %spec.name, version = %spec.version, url = %dist.tarball, "downloading");
    let bytes = download(client, &dist.tarball)?;
    if let Some(integrity) = &dist.integrity {
        verify_integrity(&bytes, integrity)
            .map_err(|reason| Error::install(&spec.name, &spec.version, reason))?;
    }

    let staging_parent = version_dir(store_dir, &spec.name, &spec.version);
    fs::create_dir_all(&staging_parent)?;
    extract_tarball(&bytes, &staging_parent, &dest)
}

fn download(client: &RegistryClient, url: &str) -> Result<Vec<u8>> {
    let response = client.http().get(url).send()?;
    if !response.status().is_success() {
        return Err(Error::registry(format!(
            "download of {url} failed with status {}",
            response.status()
        )));
    }
    if response.content_length().is_some_and(|len| len > MAX_TARBALL_SIZE) {
        return Err(Error::registry(format!("tarball {url} exceeds {MAX_TARBALL_SIZE} bytes")));
    }
    let mut bytes = Vec::new();
    response
        .take(MAX_TARBALL_SIZE + 1)
        .read_to_end(&mut bytes)?;
    if bytes.len() as u64 > MAX_TARBALL_SIZE {
        return Err(Error::registry(format!("tarball {url} exceeds {MAX_TARBALL_SIZE} bytes")));
    }
    Ok(bytes)
}

/// Checks `bytes` against a `sha512-<base64>` integrity string.
///
/// Other algorithms are accepted unverified.
pub fn verify_integrity(bytes: &[u8], integrity: &str) -> std::result::Result<(), String> {
    let Some(expected) = integrity
        .split_whitespace()
        .find_map(|entry| entry.strip_prefix("sha512-"))
    else {
        tracing::debug!(integrity, "no sha512 digest to verify");
        return Ok(());
    };
    let expected = STANDARD
        .decode(expected)
        .map_err(|e| format!("malformed integrity '{integrity}': {e}"))?;
    let actual = Sha512::digest(bytes);
    if actual.as_slice() != expected.as_slice() {
        return Err(format!(
            "integrity mismatch: expected sha512-{}, got sha512-{}",
            STANDARD.encode(&expected),
            STANDARD.encode(actual.as_slice())
        ));
    }
    Ok(())
}

/// Unpacks a gzipped tarball into a staging directory under `staging_parent`
/// and moves its single top-level directory to `dest`.
///
/// Entries that would land outside the staging directory are skipped.
pub fn extract_tarball(bytes: &[u8], staging_parent: &Path, dest: &Path) -> Result<()> {
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(staging_parent)?;

    let mut archive = Archive::new(GzDecoder::new(bytes));
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.unpack_in(staging.path())? {
            tracing::warn!(path = %entry.path()?.display(), "skipping archive entry outside the package");
        }
    }

    let root = extracted_root(staging.path())?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    if let Err(err) = fs::rename(&root, dest) {
        // another install of the same version finished first
        if dest.exists() {
            tracing::debug!(path = %dest.display(), error = %err, "package already extracted");
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

/// Registry tarballs usually wrap everything in `package/`, some use another single directory.
fn extracted_root(staging: &Path) -> Result<PathBuf> {
    let package = staging.join("package");
    if package.is_dir() {
        return Ok(package);
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(staging)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    match dirs.len() {
        1 => Ok(dirs.remove(0)),
        n => Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("expected one top-level directory in tarball, found {n}"),
        ))),
    }
}
