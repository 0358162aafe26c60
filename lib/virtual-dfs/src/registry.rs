//! Backend registry.
//!
//! Maps URL schemes to backend constructors. The process-wide default
//! registry knows about `mem` and (with the `host-fs` feature) `file`;
//! applications can register their own schemes on it or build a private
//! [`BackendRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use tracing::debug;
use url::Url;

use crate::{mem_fs, BackendConfig, Dfs, DfsError, Result};

/// Builds a backend from a parsed configuration URL.
pub trait BackendFactory: Send + Sync {
    fn connect(&self, url: &Url, config: BackendConfig) -> Result<Arc<dyn Dfs>>;
}

impl<F> BackendFactory for F
where
    F: Fn(&Url, BackendConfig) -> Result<Arc<dyn Dfs>> + Send + Sync,
{
    fn connect(&self, url: &Url, config: BackendConfig) -> Result<Arc<dyn Dfs>> {
        self(url, config)
    }
}

fn normalize_scheme(input: &str) -> Result<String> {
    let scheme = input.trim().to_ascii_lowercase();
    let valid = scheme.starts_with(|c: char| c.is_ascii_lowercase())
        && scheme
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'+' | b'-' | b'.'));
    if !valid {
        return Err(DfsError::InvalidConfig(format!(
            "`{input}` is not a valid URL scheme"
        )));
    }
    Ok(scheme)
}

#[derive(Default)]
pub struct BackendRegistry {
    factories: RwLock<HashMap<String, Arc<dyn BackendFactory>>>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("schemes", &self.schemes().unwrap_or_default())
            .finish()
    }
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the bundled backends installed.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        // Fresh registries never hold these schemes yet.
        let _ = registry.register("mem", MemFactory::default());
        #[cfg(feature = "host-fs")]
        let _ = registry.register("file", connect_host);
        registry
    }

    pub fn register(&self, scheme: &str, factory: impl BackendFactory + 'static) -> Result<()> {
        let scheme = normalize_scheme(scheme)?;
        let mut factories = self.factories.write()?;
        if factories.contains_key(&scheme) {
            return Err(DfsError::InvalidConfig(format!(
                "a backend is already registered for `{scheme}`"
            )));
        }
        factories.insert(scheme, Arc::new(factory));
        Ok(())
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Result<Vec<String>> {
        let factories = self.factories.read()?;
        let mut schemes: Vec<String> = factories.keys().cloned().collect();
        schemes.sort();
        Ok(schemes)
    }

    /// Parses `conf` as a URL and hands it to the factory registered for
    /// its scheme. Query parameters become the [`BackendConfig`].
    pub fn connect(&self, conf: &str) -> Result<Arc<dyn Dfs>> {
        let url = Url::parse(conf)
            .map_err(|e| DfsError::InvalidConfig(format!("cannot parse `{conf}`: {e}")))?;
        let config = BackendConfig::from_pairs(url.query_pairs())?;

        let factory = {
            let factories = self.factories.read()?;
            factories.get(url.scheme()).cloned().ok_or_else(|| {
                DfsError::InvalidConfig(format!(
                    "no backend registered for scheme `{}`",
                    url.scheme()
                ))
            })?
        };
        let dfs = factory.connect(&url, config)?;
        debug!(scheme = url.scheme(), "connected backend");
        Ok(dfs)
    }
}

/// Hands out in-memory backends. `mem://` is always a new, empty backend;
/// `mem://<name>` is shared by every connection that uses the same name.
///
/// Named backends live as long as the registry does, even after every
/// connection to them is dropped, so a process can reconnect and find its
/// data again. For the default registry that is the life of the process.
#[derive(Default)]
struct MemFactory {
    named: Mutex<HashMap<String, mem_fs::FileSystem>>,
}

impl BackendFactory for MemFactory {
    fn connect(&self, url: &Url, config: BackendConfig) -> Result<Arc<dyn Dfs>> {
        if !matches!(url.path(), "" | "/") {
            return Err(DfsError::InvalidConfig(format!(
                "the mem backend takes no path, got `{}`",
                url.path()
            )));
        }

        match url.host_str().filter(|name| !name.is_empty()) {
            None => Ok(Arc::new(mem_fs::FileSystem::new(config))),
            Some(name) => {
                let mut named = self.named.lock()?;
                let fs = named
                    .entry(name.to_string())
                    .or_insert_with(|| mem_fs::FileSystem::new(config));
                Ok(Arc::new(fs.clone()))
            }
        }
    }
}

#[cfg(feature = "host-fs")]
fn connect_host(url: &Url, config: BackendConfig) -> Result<Arc<dyn Dfs>> {
    if config.max_file_size.is_some() {
        return Err(DfsError::InvalidConfig(
            "max_file_size is only supported by the mem backend".to_string(),
        ));
    }
    let root = url
        .to_file_path()
        .map_err(|()| DfsError::InvalidConfig(format!("`{url}` is not a local file URL")))?;
    Ok(Arc::new(crate::host_fs::FileSystem::new(root, config)?))
}

fn default_registry() -> &'static BackendRegistry {
    static REGISTRY: OnceLock<BackendRegistry> = OnceLock::new();
    REGISTRY.get_or_init(BackendRegistry::with_builtin)
}

/// Connects through the process-wide registry.
pub fn connect(conf: &str) -> Result<Arc<dyn Dfs>> {
    default_registry().connect(conf)
}

/// Installs `factory` for `scheme` on the process-wide registry.
pub fn register(scheme: &str, factory: impl BackendFactory + 'static) -> Result<()> {
    default_registry().register(scheme, factory)
}
