//! YAML configuration layer.
//!
//! # Storage layout
//!
//! ```text
//! ~/.relforge/
//!   config/
//!     main.yaml        (global settings — mode 0600, created by `init`)
//!     <pkg>.yaml       (one file per package — mode 0600)
//!   state/
//!     <pkg>/           (state.json + update audit records)
//!   cache/             (scratch area, reserved)
//! ```
//!
//! # API pattern
//!
//! Every function touching the base directory has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tera::Tera;

use crate::error::ConfigError;
use crate::types::{PkgId, PkgStatus};

// ---------------------------------------------------------------------------
// Embedded scaffold templates — baked into the binary via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("main.yaml.tera", include_str!("templates/main.yaml.tera")),
    ("pkg.yaml.tera", include_str!("templates/pkg.yaml.tera")),
];

const DEFAULT_RELEASE_ROOT: &str = "~/PKG/RELEASE";
const DEFAULT_WATCH_INTERVAL_SEC: u64 = 60;

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Global settings loaded from `config/main.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainConfig {
    pub version: u32,
    /// Parent directory for per-package release areas.
    pub release_root: PathBuf,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub git: GitDefaults,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionConfig>,
}

/// Watch daemon settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub interval_sec: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { interval_sec: DEFAULT_WATCH_INTERVAL_SEC }
    }
}

/// Global defaults for commit collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GitDefaults {
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A named shell action runnable via `relforge run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Shell command line, run via `sh -c`.
    pub cmd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Per-package settings loaded from `config/<pkg>.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkgConfig {
    pub pkg: PkgSection,
    #[serde(default)]
    pub include: IncludeSection,
    #[serde(default)]
    pub git: GitOverrides,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkgSection {
    pub id: PkgId,
    /// The package's release area; roots live directly under it.
    pub root: PathBuf,
    /// Working tree the include sources are drawn from.
    pub dir: PathBuf,
    #[serde(default)]
    pub status: PkgStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IncludeSection {
    #[serde(default)]
    pub sources: Vec<PathBuf>,
}

/// Per-package overrides for commit collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GitOverrides {
    /// Repository to scan; defaults to `pkg.dir` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<PathBuf>,
    /// Empty list falls back to the main config's keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
}

impl PkgConfig {
    /// Keywords to collect with: the package override when non-empty,
    /// otherwise the main config's defaults.
    pub fn effective_keywords<'a>(&'a self, main: &'a MainConfig) -> &'a [String] {
        if self.git.keywords.is_empty() {
            &main.git.keywords
        } else {
            &self.git.keywords
        }
    }

    /// Repository to scan for commits: the override, else the working tree.
    pub fn git_repo(&self) -> &Path {
        self.git.repo.as_deref().unwrap_or(&self.pkg.dir)
    }
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.relforge` — pure, no I/O.
pub fn base_dir_at(home: &Path) -> PathBuf {
    home.join(".relforge")
}

/// `<home>/.relforge/config` — pure, no I/O.
pub fn config_dir_at(home: &Path) -> PathBuf {
    base_dir_at(home).join("config")
}

/// `<home>/.relforge/state/<pkg>` — pure, no I/O.
pub fn state_dir_at(home: &Path, pkg: &PkgId) -> PathBuf {
    base_dir_at(home).join("state").join(&pkg.0)
}

/// `<home>/.relforge/cache` — pure, no I/O.
pub fn cache_dir_at(home: &Path) -> PathBuf {
    base_dir_at(home).join("cache")
}

/// `<home>/.relforge/config/main.yaml` — pure, no I/O.
pub fn main_config_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join("main.yaml")
}

/// `<home>/.relforge/config/<pkg>.yaml` — pure, no I/O.
pub fn pkg_config_path_at(home: &Path, pkg: &PkgId) -> PathBuf {
    config_dir_at(home).join(format!("{}.yaml", pkg.0))
}

/// Replace a leading `~` component with `home`. Non-tilde paths pass through.
pub fn expand_tilde(path: &Path, home: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(c) if c.as_os_str() == "~" => home.join(components.as_path()),
        _ => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load the main config, expanding `~` in `release_root` against `home`.
///
/// Returns [`ConfigError::ConfigNotFound`] if absent,
/// [`ConfigError::Parse`] (with path + line context) if malformed YAML.
pub fn load_main_at(home: &Path) -> Result<MainConfig, ConfigError> {
    let path = main_config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let mut cfg: MainConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    cfg.release_root = expand_tilde(&cfg.release_root, home);
    Ok(cfg)
}

/// `load_main_at` convenience wrapper.
pub fn load_main() -> Result<MainConfig, ConfigError> {
    load_main_at(&home()?)
}

/// Load a package config, expanding `~` in its path fields against `home`.
pub fn load_pkg_at(home: &Path, pkg: &PkgId) -> Result<PkgConfig, ConfigError> {
    let path = pkg_config_path_at(home, pkg);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let mut cfg: PkgConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    cfg.pkg.root = expand_tilde(&cfg.pkg.root, home);
    cfg.pkg.dir = expand_tilde(&cfg.pkg.dir, home);
    if let Some(repo) = cfg.git.repo.take() {
        cfg.git.repo = Some(expand_tilde(&repo, home));
    }
    for source in &mut cfg.include.sources {
        *source = expand_tilde(source, home);
    }
    Ok(cfg)
}

/// `load_pkg_at` convenience wrapper.
pub fn load_pkg(pkg: &PkgId) -> Result<PkgConfig, ConfigError> {
    load_pkg_at(&home()?, pkg)
}

/// List the ids of all package configs under `config/`, sorted by name.
///
/// Skips `main.yaml`.
pub fn list_pkg_ids_at(home: &Path) -> Result<Vec<PkgId>, ConfigError> {
    let dir = config_dir_at(home);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut ids: Vec<PkgId> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let fname = e.file_name().to_string_lossy().into_owned();
            let id = fname.strip_suffix(".yaml")?;
            if id == "main" {
                return None;
            }
            Some(PkgId::from(id))
        })
        .collect();
    ids.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(ids)
}

/// `list_pkg_ids_at` convenience wrapper.
pub fn list_pkg_ids() -> Result<Vec<PkgId>, ConfigError> {
    list_pkg_ids_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Scaffolding
// ---------------------------------------------------------------------------

/// Create the base directory layout and scaffold `main.yaml`.
///
/// Idempotent: an existing `main.yaml` is left untouched. Returns the
/// path of the main config either way.
pub fn init_at(home: &Path) -> Result<PathBuf, ConfigError> {
    ensure_layout_at(home)?;
    let path = main_config_path_at(home);
    if path.exists() {
        return Ok(path);
    }
    let mut ctx = tera::Context::new();
    ctx.insert("release_root", DEFAULT_RELEASE_ROOT);
    ctx.insert("interval_sec", &DEFAULT_WATCH_INTERVAL_SEC);
    let contents = render_template("main.yaml.tera", &ctx)?;
    write_atomic(&path, &contents)?;
    Ok(path)
}

/// `init_at` convenience wrapper.
pub fn init() -> Result<PathBuf, ConfigError> {
    init_at(&home()?)
}

/// Scaffold `config/<pkg>.yaml` for a new package.
///
/// The package's release area defaults to `<release_root>/<pkg>` from the
/// main config (which must exist — run `init` first). `pkg_dir` is the
/// working tree sources are drawn from. Idempotent: an existing package
/// config is left untouched.
pub fn create_pkg_at(home: &Path, pkg: &PkgId, pkg_dir: &Path) -> Result<PathBuf, ConfigError> {
    let main = load_main_at(home)?;
    ensure_layout_at(home)?;
    let path = pkg_config_path_at(home, pkg);
    if path.exists() {
        return Ok(path);
    }
    let root = main.release_root.join(&pkg.0);
    let mut ctx = tera::Context::new();
    ctx.insert("id", &pkg.0);
    ctx.insert("root", &root.to_string_lossy().into_owned());
    ctx.insert("dir", &pkg_dir.to_string_lossy().into_owned());
    let contents = render_template("pkg.yaml.tera", &ctx)?;
    write_atomic(&path, &contents)?;
    Ok(path)
}

/// `create_pkg_at` convenience wrapper.
pub fn create_pkg(pkg: &PkgId, pkg_dir: &Path) -> Result<PathBuf, ConfigError> {
    create_pkg_at(&home()?, pkg, pkg_dir)
}

/// Create `config/`, `state/` and `cache/` under the base dir (mode `0700`).
pub fn ensure_layout_at(home: &Path) -> Result<(), ConfigError> {
    for dir in [
        config_dir_at(home),
        base_dir_at(home).join("state"),
        cache_dir_at(home),
    ] {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            set_dir_permissions(&dir)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

fn render_template(name: &str, ctx: &tera::Context) -> Result<String, ConfigError> {
    let mut tera = Tera::default();
    let items: Vec<(&str, &str)> = TPLS.to_vec();
    tera.add_raw_templates(items)?;
    Ok(tera.render(name, ctx)?)
}

/// Write flow: `.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem).
fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, contents)?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    #[test]
    fn init_scaffolds_main_config() {
        let home = make_home();
        let path = init_at(home.path()).expect("init");
        assert!(path.exists());
        let cfg = load_main_at(home.path()).expect("load");
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.release_root, home.path().join("PKG").join("RELEASE"));
        assert_eq!(cfg.watch.interval_sec, 60);
        assert!(!cfg.git.keywords.is_empty());
        assert!(cfg.actions.is_empty());
    }

    #[test]
    fn init_is_idempotent() {
        let home = make_home();
        let path = init_at(home.path()).expect("first");
        std::fs::write(&path, "version: 1\nrelease_root: /custom\n").unwrap();
        init_at(home.path()).expect("second");
        let cfg = load_main_at(home.path()).expect("load");
        assert_eq!(cfg.release_root, PathBuf::from("/custom"));
    }

    #[test]
    fn create_pkg_scaffolds_parseable_config() {
        let home = make_home();
        init_at(home.path()).expect("init");
        let pkg = PkgId::from("webapp");
        create_pkg_at(home.path(), &pkg, Path::new("/src/webapp")).expect("create");
        let cfg = load_pkg_at(home.path(), &pkg).expect("load");
        assert_eq!(cfg.pkg.id, pkg);
        assert_eq!(cfg.pkg.status, PkgStatus::Open);
        assert_eq!(cfg.pkg.dir, PathBuf::from("/src/webapp"));
        assert!(cfg.pkg.root.ends_with("PKG/RELEASE/webapp"));
        assert!(cfg.include.sources.is_empty());
        assert!(cfg.git.keywords.is_empty());
    }

    #[test]
    fn create_pkg_requires_main_config() {
        let home = make_home();
        let err = create_pkg_at(home.path(), &PkgId::from("x"), Path::new("/src/x")).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigNotFound { .. }));
    }

    #[test]
    fn load_missing_pkg_returns_not_found() {
        let home = make_home();
        let err = load_pkg_at(home.path(), &PkgId::from("ghost")).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigNotFound { .. }));
    }

    #[test]
    fn list_pkg_ids_skips_main() {
        let home = make_home();
        init_at(home.path()).expect("init");
        create_pkg_at(home.path(), &PkgId::from("beta"), Path::new("/b")).unwrap();
        create_pkg_at(home.path(), &PkgId::from("alpha"), Path::new("/a")).unwrap();
        let ids = list_pkg_ids_at(home.path()).expect("list");
        assert_eq!(ids, vec![PkgId::from("alpha"), PkgId::from("beta")]);
    }

    #[rstest]
    #[case("~/PKG/RELEASE", true)]
    #[case("~", true)]
    #[case("/abs/path", false)]
    #[case("relative/path", false)]
    fn tilde_expansion(#[case] input: &str, #[case] expanded: bool) {
        let home = Path::new("/home/u");
        let out = expand_tilde(Path::new(input), home);
        assert_eq!(out.starts_with(home), expanded);
    }

    #[test]
    fn effective_keywords_fall_back_when_override_empty() {
        let home = make_home();
        init_at(home.path()).expect("init");
        let main = load_main_at(home.path()).expect("main");
        create_pkg_at(home.path(), &PkgId::from("p"), Path::new("/p")).unwrap();
        let mut pkg = load_pkg_at(home.path(), &PkgId::from("p")).unwrap();
        assert_eq!(pkg.effective_keywords(&main), main.git.keywords.as_slice());
        pkg.git.keywords = vec!["hotfix".to_owned()];
        assert_eq!(pkg.effective_keywords(&main), ["hotfix".to_owned()].as_slice());
    }

    #[test]
    fn layout_dirs_created_with_perms() {
        let home = assert_fs::TempDir::new().expect("tempdir");
        ensure_layout_at(home.path()).expect("layout");
        use assert_fs::prelude::*;
        use predicates::prelude::*;
        home.child(".relforge/config").assert(predicate::path::is_dir());
        home.child(".relforge/cache").assert(predicate::path::is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(config_dir_at(home.path()))
                .unwrap()
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(mode, 0o700);
        }
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let home = make_home();
        init_at(home.path()).expect("init");
        let tmp = main_config_path_at(home.path()).with_extension("yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful write");
    }
}
