// Copyright 2018-2024 the Deno authors. MIT license.

use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use deno_semver::Version;
use sys_traits::impls::RealSys;
use thiserror::Error;

use crate::ast::DenoAstTransformer;
use crate::bundler::BareSpecifierResolver;
use crate::bundler::BundlerResolver;
use crate::hooks::HookProtocol;
use crate::hooks::LoadResponse;
use crate::media::ModuleFormat;
use crate::media::SourceLoader;
use crate::module_specifier::is_network_url;
use crate::module_specifier::normalize_path;
use crate::module_specifier::specifier_to_file_path;
use crate::network::NetworkModuleCache;
use crate::path_mapping::ConfigError;
use crate::path_mapping::PathMappingTable;
use crate::resolution::Resolution;
use crate::resolution::ResolutionEngine;
use crate::resolution::ResolveContext;
use crate::source::FetchError;
use crate::source::Fetcher;
use crate::source::FileSystem;
use crate::source::HttpFetcher;
use crate::transform::TransformDispatcher;
use crate::transform::TransformError;
use crate::transform::TransformResult;
use crate::transform::Transformer;
use crate::ModuleSpecifier;

/// Environment variable naming the tsconfig file to read path mappings
/// from, relative to the working directory.
pub const TS_NODE_PROJECT_ENV_VAR: &str = "TS_NODE_PROJECT";

#[derive(Debug, Error, deno_error::JsError)]
pub enum InitError {
  #[class(type)]
  #[error("Invalid host runtime version \"{text}\": {message}")]
  InvalidHostVersion { text: String, message: String },
  #[class(generic)]
  #[error("Unable to determine the current working directory.")]
  CurrentDir(#[source] std::io::Error),
  #[class(inherit)]
  #[error(transparent)]
  Config(#[from] ConfigError),
}

#[derive(Debug, Error, deno_error::JsError)]
pub enum LoaderError {
  #[class(generic)]
  #[error("Unable to read '{specifier}'.")]
  Read {
    specifier: ModuleSpecifier,
    #[source]
    source: std::io::Error,
  },
  #[class(type)]
  #[error("Expected a file URL, but got '{0}'.")]
  InvalidFileUrl(ModuleSpecifier),
  #[class(inherit)]
  #[error(transparent)]
  Transform(#[from] TransformError),
  #[class(inherit)]
  #[error(transparent)]
  Fetch(#[from] FetchError),
  /// An error returned by one of the host's default hooks.
  #[class(inherit)]
  #[error(transparent)]
  Host(#[from] deno_error::JsErrorBox),
}

/// Where path mappings are read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TsConfigLocation {
  /// `tsconfig.json` in the working directory, if it exists.
  #[default]
  Discover,
  /// A specific config file, relative to the working directory. It must
  /// exist.
  Path(PathBuf),
  Disabled,
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
  pub cwd: PathBuf,
  /// The version of the host runtime (ex. `v16.14.0`).
  pub host_version: String,
  pub tsconfig: TsConfigLocation,
  pub file_system: Rc<dyn FileSystem>,
  pub fetcher: Rc<dyn Fetcher>,
  pub bare_resolver: Rc<dyn BareSpecifierResolver>,
  pub transformer: Rc<dyn Transformer>,
}

impl LoaderOptions {
  pub fn new(cwd: impl Into<PathBuf>, host_version: impl Into<String>) -> Self {
    Self {
      cwd: cwd.into(),
      host_version: host_version.into(),
      tsconfig: TsConfigLocation::Discover,
      file_system: Rc::new(RealSys),
      fetcher: Rc::new(HttpFetcher::default()),
      bare_resolver: Rc::new(BundlerResolver::new()),
      transformer: Rc::new(DenoAstTransformer),
    }
  }

  /// Options for the current process: the current working directory and,
  /// when `TS_NODE_PROJECT` is set, that tsconfig file.
  pub fn from_env(host_version: impl Into<String>) -> Result<Self, InitError> {
    let cwd = std::env::current_dir().map_err(InitError::CurrentDir)?;
    let mut options = Self::new(cwd, host_version);
    if let Some(project) = std::env::var_os(TS_NODE_PROJECT_ENV_VAR) {
      if !project.is_empty() {
        options.tsconfig = TsConfigLocation::Path(PathBuf::from(project));
      }
    }
    Ok(options)
  }

  pub fn with_tsconfig(mut self, tsconfig: TsConfigLocation) -> Self {
    self.tsconfig = tsconfig;
    self
  }

  pub fn with_file_system(mut self, file_system: Rc<dyn FileSystem>) -> Self {
    self.file_system = file_system;
    self
  }

  pub fn with_fetcher(mut self, fetcher: Rc<dyn Fetcher>) -> Self {
    self.fetcher = fetcher;
    self
  }

  pub fn with_bare_resolver(
    mut self,
    bare_resolver: Rc<dyn BareSpecifierResolver>,
  ) -> Self {
    self.bare_resolver = bare_resolver;
    self
  }

  pub fn with_transformer(mut self, transformer: Rc<dyn Transformer>) -> Self {
    self.transformer = transformer;
    self
  }

  fn load_path_mapping(&self) -> Result<Option<PathMappingTable>, ConfigError> {
    let path = match &self.tsconfig {
      TsConfigLocation::Discover => self.cwd.join("tsconfig.json"),
      TsConfigLocation::Path(path) => {
        let path = normalize_path(&self.cwd.join(path));
        if !self.file_system.is_file(&path) {
          return Err(ConfigError::Read {
            source: std::io::Error::new(
              std::io::ErrorKind::NotFound,
              "tsconfig file does not exist",
            ),
            path,
          });
        }
        path
      }
      TsConfigLocation::Disabled => return Ok(None),
    };
    PathMappingTable::load(self.file_system.as_ref(), &path)
  }
}

/// Parses a host version such as `v16.14.0`.
pub fn parse_host_version(text: &str) -> Result<Version, InitError> {
  let trimmed = text.trim();
  let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
  Version::parse_standard(trimmed).map_err(|err| {
    InitError::InvalidHostVersion {
      text: text.to_string(),
      message: err.to_string(),
    }
  })
}

/// The resolution and transform pipeline shared by every hook protocol.
///
/// Only the network cache changes after construction.
#[derive(Debug)]
pub struct TsLoader {
  host_version: Version,
  protocol: HookProtocol,
  file_system: Rc<dyn FileSystem>,
  resolution: ResolutionEngine,
  dispatcher: TransformDispatcher,
  network_cache: NetworkModuleCache,
}

impl TsLoader {
  pub fn new(options: LoaderOptions) -> Result<Self, InitError> {
    let host_version = parse_host_version(&options.host_version)?;
    let protocol = HookProtocol::for_version(&host_version);
    let path_mapping = options.load_path_mapping()?;
    match &path_mapping {
      Some(table) => log::debug!(
        "Loaded {} path mapping(s) relative to {}",
        table.len(),
        table.base_dir().display()
      ),
      None => log::debug!("Path mapping disabled"),
    }
    log::debug!("Using the {:?} hook protocol for {}", protocol, host_version);
    let dispatcher =
      TransformDispatcher::new(options.transformer, &host_version);
    Ok(Self {
      host_version,
      protocol,
      resolution: ResolutionEngine::new(
        options.cwd,
        options.file_system.clone(),
        path_mapping,
        options.bare_resolver,
      ),
      file_system: options.file_system,
      dispatcher,
      network_cache: NetworkModuleCache::new(options.fetcher),
    })
  }

  pub fn host_version(&self) -> &Version {
    &self.host_version
  }

  pub fn protocol(&self) -> HookProtocol {
    self.protocol
  }

  pub fn path_mapping(&self) -> Option<&PathMappingTable> {
    self.resolution.path_mapping()
  }

  pub fn network_cache(&self) -> &NetworkModuleCache {
    &self.network_cache
  }

  pub fn resolve(
    &self,
    specifier: &str,
    context: &ResolveContext,
  ) -> Resolution {
    self.resolution.resolve(specifier, context)
  }

  /// If loading the URL is handled here instead of by the host.
  pub fn owns(&self, url: &ModuleSpecifier) -> bool {
    is_network_url(url) || SourceLoader::from_specifier(url).is_some()
  }

  pub async fn fetch_network(
    &self,
    url: &ModuleSpecifier,
  ) -> Result<Arc<str>, LoaderError> {
    Ok(self.network_cache.fetch(url).await?)
  }

  /// Fetches a remote module. Recognized extensions are transformed; the
  /// module is always an ES module.
  pub async fn load_network_module(
    &self,
    url: &ModuleSpecifier,
  ) -> Result<LoadResponse, LoaderError> {
    let text = self.fetch_network(url).await?;
    match self.transform(&text, url, Some(ModuleFormat::Module))? {
      Some(result) => Ok(result.into()),
      None => Ok(LoadResponse {
        format: ModuleFormat::Module,
        source: text.to_string(),
        source_map: None,
      }),
    }
  }

  /// Reads and transforms a local module with a recognized extension.
  /// Returns `None` for any other URL.
  pub fn load_file_module(
    &self,
    url: &ModuleSpecifier,
    declared_format: Option<ModuleFormat>,
  ) -> Result<Option<LoadResponse>, LoaderError> {
    if SourceLoader::from_specifier(url).is_none() {
      return Ok(None);
    }
    let path = specifier_to_file_path(url)
      .ok_or_else(|| LoaderError::InvalidFileUrl(url.clone()))?;
    let text = self.read_file(url, &path)?;
    Ok(
      self
        .transform(&text, url, declared_format)?
        .map(LoadResponse::from),
    )
  }

  pub fn transform(
    &self,
    source: &str,
    url: &ModuleSpecifier,
    declared_format: Option<ModuleFormat>,
  ) -> Result<Option<TransformResult>, LoaderError> {
    Ok(self.dispatcher.transform(source, url, declared_format)?)
  }

  fn read_file(
    &self,
    url: &ModuleSpecifier,
    path: &Path,
  ) -> Result<String, LoaderError> {
    self
      .file_system
      .read_to_string(path)
      .map_err(|source| LoaderError::Read {
        specifier: url.clone(),
        source,
      })
  }
}
