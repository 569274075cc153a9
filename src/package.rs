use std::fmt;
use std::path::{Path, PathBuf};
use semver::Version;
use crate::error::{Error, Result};
use crate::global::cache::{cache_path, cached_versions};
use crate::installer::{InstallRequest, Installer, PackageSpec};
use crate::registry::{VersionSource, caret};
use crate::util::validate_package_name;

/// The version a descriptor asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestedVersion {
    /// The highest published version.
    Latest,
    /// The highest published version compatible with `^anchor`.
    Compatible(Version),
    /// Exactly this version. Resolving it never touches the registry.
    Exact(Version),
}

impl RequestedVersion {
    /// Parses `latest` (or an empty string), `^x.y.z` or a plain semver version.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "latest" {
            return Ok(RequestedVersion::Latest);
        }
        let (anchor, compatible) = match raw.strip_prefix('^') {
            Some(anchor) => (anchor, true),
            None => (raw.strip_prefix('v').unwrap_or(raw), false),
        };
        let version = Version::parse(anchor)
            .map_err(|e| Error::Config(format!("invalid version '{raw}': {e}")))?;
        Ok(if compatible {
            RequestedVersion::Compatible(version)
        } else {
            RequestedVersion::Exact(version)
        })
    }

    pub fn exact(&self) -> Option<&Version> {
        match self {
            RequestedVersion::Exact(version) => Some(version),
            _ => None,
        }
    }

    /// Whether an already-concrete `version` satisfies this request.
    pub fn allows(&self, version: &Version) -> bool {
        match self {
            RequestedVersion::Latest => true,
            RequestedVersion::Compatible(anchor) => caret(anchor).matches(version),
            RequestedVersion::Exact(exact) => exact == version,
        }
    }
}

impl fmt::Display for RequestedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestedVersion::Latest => f.write_str("latest"),
            RequestedVersion::Compatible(anchor) => write!(f, "^{anchor}"),
            RequestedVersion::Exact(version) => write!(f, "{version}"),
        }
    }
}

/// Identifies one installable package and where it lives on disk.
///
/// With a `store_dir` the package is cached in the flattened, per-version
/// store layout; without one it is expected directly at `target_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    name: String,
    version: RequestedVersion,
    target_path: PathBuf,
    store_dir: Option<PathBuf>,
}

impl PackageDescriptor {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `name` is not a valid package name.
    pub fn new(
        name: impl Into<String>,
        version: RequestedVersion,
        target_path: impl Into<PathBuf>,
        store_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let name = name.into();
        validate_package_name(&name)?;
        Ok(Self {
            name,
            version,
            target_path: target_path.into(),
            store_dir,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &RequestedVersion {
        &self.version
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn store_dir(&self) -> Option<&Path> {
        self.store_dir.as_deref()
    }

    /// Returns a copy of this descriptor pinned to `version`.
    pub fn with_version(&self, version: Version) -> Self {
        Self {
            version: RequestedVersion::Exact(version),
            ..self.clone()
        }
    }

    /// Resolves the requested version to a concrete one.
    ///
    /// Produces a new descriptor and leaves `self` untouched. An exact request
    /// is returned as is without querying `source`.
    ///
    /// # Errors
    ///
    /// [`Error::Registry`] if the source cannot be queried and
    /// [`Error::UnknownPackage`] if nothing satisfies the request.
    pub fn resolve(&self, source: &dyn VersionSource) -> Result<Self> {
        let resolved = match &self.version {
            RequestedVersion::Exact(_) => return Ok(self.clone()),
            RequestedVersion::Latest => source.resolve_latest(&self.name)?,
            RequestedVersion::Compatible(anchor) => source.resolve_compatible(anchor, &self.name)?,
        };
        match resolved {
            Some(version) => {
                tracing::debug!(package = %self.name, requested = %self.version, %version, "resolved version");
                Ok(self.with_version(version))
            }
            None => Err(Error::UnknownPackage {
                name: self.name.clone(),
                requested: self.version.to_string(),
            }),
        }
    }

    /// The on-disk location of this package.
    ///
    /// For a stored descriptor this is its cache path, which requires a
    /// resolved version; otherwise it is `target_path`.
    pub fn location(&self) -> Option<PathBuf> {
        match (&self.store_dir, &self.version) {
            (None, _) => Some(self.target_path.clone()),
            (Some(store), RequestedVersion::Exact(version)) => {
                Some(cache_path(store, &self.name, version))
            }
            (Some(_), _) => None,
        }
    }
}

impl fmt::Display for PackageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Checks, installs and updates packages in a store, resolving versions
/// through a [`VersionSource`] and delegating downloads to an [`Installer`].
///
/// No method prints or reports progress; failures are returned to the caller.
pub struct PackageCache<'a> {
    source: &'a dyn VersionSource,
    installer: &'a dyn Installer,
    registry: &'a str,
}

impl<'a> PackageCache<'a> {
    pub fn new(source: &'a dyn VersionSource, installer: &'a dyn Installer, registry: &'a str) -> Self {
        Self {
            source,
            installer,
            registry,
        }
    }

    /// Reports whether the package is present on disk.
    ///
    /// Stored descriptors are resolved first and the resolved descriptor is
    /// returned alongside the answer. Descriptors without a store only check
    /// `target_path` and never query the registry.
    pub fn exists(&self, desc: &PackageDescriptor) -> Result<(PackageDescriptor, bool)> {
        let Some(store) = desc.store_dir() else {
            return Ok((desc.clone(), desc.target_path().exists()));
        };
        let resolved = self.resolve_or_cached(desc, store)?;
        let present = resolved.location().is_some_and(|path| path.exists());
        Ok((resolved, present))
    }

    /// Installs the package, resolving its version first.
    ///
    /// # Errors
    ///
    /// [`Error::Install`] if the installer fails or leaves nothing at the
    /// cache path.
    pub fn install(&self, desc: &PackageDescriptor) -> Result<PackageDescriptor> {
        std::fs::create_dir_all(desc.target_path())?;
        if let Some(store) = desc.store_dir() {
            std::fs::create_dir_all(store)?;
        }
        let resolved = desc.resolve(self.source)?;
        self.install_resolved(&resolved)?;
        Ok(resolved)
    }

    /// Brings the package to the newest version its request allows.
    ///
    /// Installs only when that version is not cached yet. The returned
    /// descriptor always names the version now on disk. When the registry is
    /// unreachable the newest cached version that satisfies the request is
    /// kept.
    pub fn update(&self, desc: &PackageDescriptor) -> Result<PackageDescriptor> {
        let Some(store) = desc.store_dir() else {
            return Ok(desc.clone());
        };
        let target = self.resolve_or_cached(desc, store)?;
        if target.location().is_some_and(|path| path.exists()) {
            tracing::debug!(package = %target, "cached version is up to date");
        } else {
            tracing::info!(package = %target, "installing newer version");
            self.install_resolved(&target)?;
        }
        Ok(target)
    }

    fn resolve_or_cached(&self, desc: &PackageDescriptor, store: &Path) -> Result<PackageDescriptor> {
        match desc.resolve(self.source) {
            Ok(resolved) => Ok(resolved),
            Err(err) if err.is_registry() => match cached_fallback(desc, store)? {
                Some(cached) => {
                    tracing::warn!(package = %cached, error = %err, "registry unreachable, using cached version");
                    Ok(cached)
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    fn install_resolved(&self, resolved: &PackageDescriptor) -> Result<()> {
        let Some(version) = resolved.version().exact() else {
            return Err(Error::Config(format!("cannot install unresolved {resolved}")));
        };
        let store = resolved.store_dir().unwrap_or_else(|| resolved.target_path());
        let request = InstallRequest {
            root: resolved.target_path(),
            store_dir: store,
            registry: self.registry,
            packages: vec![PackageSpec {
                name: resolved.name().to_string(),
                version: version.clone(),
            }],
        };
        self.installer
            .install(&request)
            .map_err(|err| match err {
                err @ Error::Install { .. } => err,
                other => Error::install(resolved.name(), version, other),
            })?;
        match resolved.location() {
            Some(path) if path.exists() => Ok(()),
            _ => Err(Error::install(
                resolved.name(),
                version,
                "installer reported success but the package is missing from the store",
            )),
        }
    }
}

/// The newest version already in the store that satisfies the descriptor's request.
fn cached_fallback(desc: &PackageDescriptor, store: &Path) -> Result<Option<PackageDescriptor>> {
    Ok(cached_versions(store, desc.name())?
        .into_iter()
        .find(|version| desc.version().allows(version))
        .map(|version| desc.with_version(version)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use tempfile::tempdir;

    struct FixedVersions(Vec<&'static str>);

    impl VersionSource for FixedVersions {
        fn list_versions(&self, _name: &str) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|v| v.to_string()).collect())
        }
    }

    struct Offline;

    impl VersionSource for Offline {
        fn list_versions(&self, name: &str) -> Result<Vec<String>> {
            Err(Error::registry(format!("offline while looking up {name}")))
        }
    }

    struct NoNetwork;

    impl VersionSource for NoNetwork {
        fn list_versions(&self, name: &str) -> Result<Vec<String>> {
            panic!("unexpected registry lookup for {name}");
        }
    }

    /// Materializes the requested cache path and counts calls.
    #[derive(Default)]
    struct FakeInstaller {
        calls: Cell<usize>,
        installed: RefCell<Vec<String>>,
        skip_materialize: bool,
    }

    impl Installer for FakeInstaller {
        fn install(&self, request: &InstallRequest<'_>) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            for spec in &request.packages {
                self.installed.borrow_mut().push(format!("{}@{}", spec.name, spec.version));
                if !self.skip_materialize {
                    std::fs::create_dir_all(cache_path(request.store_dir, &spec.name, &spec.version))?;
                }
            }
            Ok(())
        }
    }

    struct FailingInstaller;

    impl Installer for FailingInstaller {
        fn install(&self, request: &InstallRequest<'_>) -> Result<()> {
            let spec = &request.packages[0];
            Err(Error::install(&spec.name, &spec.version, "tarball download failed"))
        }
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn stored(root: &Path, version: RequestedVersion) -> PackageDescriptor {
        PackageDescriptor::new(
            "scaffold-tool",
            version,
            root.to_path_buf(),
            Some(root.join("node_modules")),
        )
        .unwrap()
    }

    #[test]
    fn test_requested_version_parse() {
        assert_eq!(RequestedVersion::parse("latest").unwrap(), RequestedVersion::Latest);
        assert_eq!(RequestedVersion::parse("").unwrap(), RequestedVersion::Latest);
        assert_eq!(RequestedVersion::parse("^1.2.0").unwrap(), RequestedVersion::Compatible(v("1.2.0")));
        assert_eq!(RequestedVersion::parse("1.0.1").unwrap(), RequestedVersion::Exact(v("1.0.1")));
        assert!(RequestedVersion::parse("~1.0").is_err());
    }

    #[test]
    fn test_descriptor_rejects_bad_name() {
        let result = PackageDescriptor::new("Bad Name", RequestedVersion::Latest, "/tmp", None);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_resolve_exact_is_noop() {
        let desc = stored(Path::new("/c"), RequestedVersion::Exact(v("1.0.0")));
        let resolved = desc.resolve(&NoNetwork).unwrap();
        assert_eq!(resolved, desc);
    }

    #[test]
    fn test_resolve_returns_new_value() {
        let desc = stored(Path::new("/c"), RequestedVersion::Latest);
        let resolved = desc.resolve(&FixedVersions(vec!["1.0.0", "1.0.1"])).unwrap();
        assert_eq!(resolved.version(), &RequestedVersion::Exact(v("1.0.1")));
        assert_eq!(desc.version(), &RequestedVersion::Latest);
        // resolving twice yields the same concrete version
        assert_eq!(resolved.resolve(&NoNetwork).unwrap(), resolved);
    }

    #[test]
    fn test_resolve_unknown_package() {
        let desc = stored(Path::new("/c"), RequestedVersion::Latest);
        let err = desc.resolve(&FixedVersions(vec![])).unwrap_err();
        assert!(matches!(err, Error::UnknownPackage { .. }));
    }

    #[test]
    fn test_exists_without_store_skips_network() {
        let dir = tempdir().unwrap();
        let desc = PackageDescriptor::new(
            "scaffold-tool",
            RequestedVersion::Latest,
            dir.path().join("missing"),
            None,
        )
        .unwrap();
        let installer = FakeInstaller::default();
        let cache = PackageCache::new(&NoNetwork, &installer, "https://r");
        let (same, present) = cache.exists(&desc).unwrap();
        assert!(!present);
        assert_eq!(same, desc);
    }

    #[test]
    fn test_exists_resolves_then_checks_store() {
        let dir = tempdir().unwrap();
        let desc = stored(dir.path(), RequestedVersion::Latest);
        let installer = FakeInstaller::default();
        let source = FixedVersions(vec!["1.0.0", "1.0.1"]);
        let cache = PackageCache::new(&source, &installer, "https://r");

        let (resolved, present) = cache.exists(&desc).unwrap();
        assert!(!present);
        assert_eq!(resolved.version().exact(), Some(&v("1.0.1")));

        std::fs::create_dir_all(resolved.location().unwrap()).unwrap();
        let (_, present) = cache.exists(&desc).unwrap();
        assert!(present);
    }

    #[test]
    fn test_exists_offline_falls_back_to_cached() {
        let dir = tempdir().unwrap();
        let desc = stored(dir.path(), RequestedVersion::Latest);
        let store = desc.store_dir().unwrap().to_path_buf();
        std::fs::create_dir_all(cache_path(&store, "scaffold-tool", &v("1.0.0"))).unwrap();
        let installer = FakeInstaller::default();
        let cache = PackageCache::new(&Offline, &installer, "https://r");

        let (resolved, present) = cache.exists(&desc).unwrap();
        assert!(present);
        assert_eq!(resolved.version().exact(), Some(&v("1.0.0")));
    }

    #[test]
    fn test_exists_offline_without_cache_fails() {
        let dir = tempdir().unwrap();
        let desc = stored(dir.path(), RequestedVersion::Latest);
        let installer = FakeInstaller::default();
        let cache = PackageCache::new(&Offline, &installer, "https://r");
        assert!(cache.exists(&desc).unwrap_err().is_registry());
    }

    #[test]
    fn test_install_creates_dirs_and_resolves() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("deps");
        let desc = stored(&root, RequestedVersion::Latest);
        let installer = FakeInstaller::default();
        let source = FixedVersions(vec!["9.9.9", "10.0.0"]);
        let cache = PackageCache::new(&source, &installer, "https://r");

        let installed = cache.install(&desc).unwrap();
        assert!(root.exists());
        assert_eq!(installed.version().exact(), Some(&v("10.0.0")));
        assert_eq!(*installer.installed.borrow(), vec!["scaffold-tool@10.0.0".to_string()]);
        assert!(installed.location().unwrap().exists());
    }

    #[test]
    fn test_install_failure_propagates() {
        let dir = tempdir().unwrap();
        let desc = stored(dir.path(), RequestedVersion::Latest);
        let source = FixedVersions(vec!["1.0.0"]);
        let cache = PackageCache::new(&source, &FailingInstaller, "https://r");
        assert!(matches!(cache.install(&desc), Err(Error::Install { .. })));
    }

    #[test]
    fn test_install_without_materialized_path_fails() {
        let dir = tempdir().unwrap();
        let desc = stored(dir.path(), RequestedVersion::Latest);
        let source = FixedVersions(vec!["1.0.0"]);
        let installer = FakeInstaller {
            skip_materialize: true,
            ..Default::default()
        };
        let cache = PackageCache::new(&source, &installer, "https://r");
        assert!(matches!(cache.install(&desc), Err(Error::Install { .. })));
    }

    #[test]
    fn test_update_twice_installs_once() {
        let dir = tempdir().unwrap();
        let desc = stored(dir.path(), RequestedVersion::Latest);
        let installer = FakeInstaller::default();
        let source = FixedVersions(vec!["1.0.0", "1.1.0"]);
        let cache = PackageCache::new(&source, &installer, "https://r");

        let first = cache.update(&desc).unwrap();
        let second = cache.update(&desc).unwrap();
        assert_eq!(installer.calls.get(), 1);
        assert_eq!(first.version().exact(), Some(&v("1.1.0")));
        assert_eq!(second, first);
    }

    #[test]
    fn test_update_exact_pin_does_not_move() {
        let dir = tempdir().unwrap();
        let desc = stored(dir.path(), RequestedVersion::Exact(v("1.0.0")));
        let installer = FakeInstaller::default();
        let cache = PackageCache::new(&NoNetwork, &installer, "https://r");

        let updated = cache.update(&desc).unwrap();
        assert_eq!(updated, desc);
        assert_eq!(*installer.installed.borrow(), vec!["scaffold-tool@1.0.0".to_string()]);
    }

    #[test]
    fn test_update_respects_compatible_anchor() {
        let dir = tempdir().unwrap();
        let desc = stored(dir.path(), RequestedVersion::Compatible(v("1.2.0")));
        let installer = FakeInstaller::default();
        let source = FixedVersions(vec!["1.1.0", "1.3.0", "2.0.0"]);
        let cache = PackageCache::new(&source, &installer, "https://r");

        let updated = cache.update(&desc).unwrap();
        assert_eq!(updated.version().exact(), Some(&v("1.3.0")));
    }

    #[test]
    fn test_update_offline_keeps_cached_version() {
        let dir = tempdir().unwrap();
        let desc = stored(dir.path(), RequestedVersion::Latest);
        let pinned = desc.with_version(v("1.0.0"));
        std::fs::create_dir_all(pinned.location().unwrap()).unwrap();
        let installer = FakeInstaller::default();
        let cache = PackageCache::new(&Offline, &installer, "https://r");

        let kept = cache.update(&desc).unwrap();
        assert_eq!(kept, pinned);
        assert_eq!(installer.calls.get(), 0);
    }

    #[test]
    fn test_update_offline_without_cache_fails() {
        let dir = tempdir().unwrap();
        let desc = stored(dir.path(), RequestedVersion::Latest);
        let installer = FakeInstaller::default();
        let cache = PackageCache::new(&Offline, &installer, "https://r");
        assert!(cache.update(&desc).unwrap_err().is_registry());
    }

    #[test]
    fn test_update_offline_keeps_newest_allowed_version() {
        let dir = tempdir().unwrap();
        let desc = stored(dir.path(), RequestedVersion::Compatible(v("1.2.0")));
        for version in ["1.1.0", "1.4.0", "2.0.0"] {
            std::fs::create_dir_all(desc.with_version(v(version)).location().unwrap()).unwrap();
        }
        let installer = FakeInstaller::default();
        let cache = PackageCache::new(&Offline, &installer, "https://r");

        let kept = cache.update(&desc).unwrap();
        assert_eq!(kept.version().exact(), Some(&v("1.4.0")));
        assert_eq!(installer.calls.get(), 0);
    }
}
