// Copyright 2018-2024 the Deno authors. MIT license.

//! The loader hooks handed to the host runtime.
//!
//! Hosts before 16.12.0 call `resolve`, `getFormat`, `getSource` and
//! `transformSource`. Later hosts call `resolve` and a single `load`. The
//! protocol is chosen once from the host version and both sets of hooks run
//! the same [`TsLoader`] pipeline. Anything not handled here goes to the
//! host's default hook, which is passed into every call.

use std::rc::Rc;

use async_trait::async_trait;
use deno_error::JsErrorBox;
use deno_semver::Version;
use serde::Deserialize;
use serde::Serialize;

use crate::loader::parse_host_version;
use crate::loader::InitError;
use crate::loader::LoaderError;
use crate::loader::LoaderOptions;
use crate::loader::TsLoader;
use crate::media::ModuleFormat;
use crate::module_specifier::is_network_url;
use crate::resolution::Resolution;
use crate::resolution::ResolveContext;
use crate::resolution::ResolvedModule;
use crate::transform::TransformResult;
use crate::ModuleSpecifier;

/// The first host version with the unified `load` hook.
const UNIFIED_LOAD_VERSION: (u64, u64, u64) = (16, 12, 0);

pub type ResolveResponse = ResolvedModule;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoadContext {
  /// The format returned by `resolve`, if any.
  pub format: Option<ModuleFormat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResponse {
  pub format: ModuleFormat,
  pub source: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source_map: Option<String>,
}

impl From<TransformResult> for LoadResponse {
  fn from(result: TransformResult) -> Self {
    Self {
      format: result.module_format(),
      source: result.code,
      source_map: result.source_map,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FormatResponse {
  pub format: ModuleFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceResponse {
  pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TransformSourceContext {
  pub url: ModuleSpecifier,
  pub format: Option<ModuleFormat>,
}

#[async_trait(?Send)]
pub trait DefaultResolve {
  async fn resolve(
    &self,
    specifier: &str,
    context: &ResolveContext,
  ) -> Result<ResolveResponse, JsErrorBox>;
}

#[async_trait(?Send)]
pub trait DefaultLoad {
  async fn load(
    &self,
    url: &ModuleSpecifier,
    context: &LoadContext,
  ) -> Result<LoadResponse, JsErrorBox>;
}

#[async_trait(?Send)]
pub trait DefaultGetFormat {
  async fn get_format(
    &self,
    url: &ModuleSpecifier,
  ) -> Result<FormatResponse, JsErrorBox>;
}

#[async_trait(?Send)]
pub trait DefaultGetSource {
  async fn get_source(
    &self,
    url: &ModuleSpecifier,
    format: Option<ModuleFormat>,
  ) -> Result<SourceResponse, JsErrorBox>;
}

#[async_trait(?Send)]
pub trait DefaultTransformSource {
  async fn transform_source(
    &self,
    source: &str,
    context: &TransformSourceContext,
  ) -> Result<SourceResponse, JsErrorBox>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HookProtocol {
  /// `resolve` and `load`.
  UnifiedLoad,
  /// `resolve`, `getFormat`, `getSource` and `transformSource`.
  LegacyTriad,
}

impl HookProtocol {
  pub fn from_host_version(version: &str) -> Result<Self, InitError> {
    Ok(Self::for_version(&parse_host_version(version)?))
  }

  pub fn for_version(version: &Version) -> Self {
    if (version.major, version.minor, version.patch) >= UNIFIED_LOAD_VERSION {
      Self::UnifiedLoad
    } else {
      Self::LegacyTriad
    }
  }
}

async fn resolve_hook(
  loader: &TsLoader,
  specifier: &str,
  context: &ResolveContext,
  default_resolve: &dyn DefaultResolve,
) -> Result<ResolveResponse, LoaderError> {
  match loader.resolve(specifier, context) {
    Resolution::Resolved(resolved) => Ok(resolved),
    Resolution::Delegate { specifier } => {
      Ok(default_resolve.resolve(&specifier, context).await?)
    }
  }
}

/// Hooks for hosts with the unified `load` hook.
#[derive(Debug, Clone)]
pub struct UnifiedLoadHooks {
  loader: Rc<TsLoader>,
}

impl UnifiedLoadHooks {
  pub async fn resolve(
    &self,
    specifier: &str,
    context: &ResolveContext,
    default_resolve: &dyn DefaultResolve,
  ) -> Result<ResolveResponse, LoaderError> {
    resolve_hook(&self.loader, specifier, context, default_resolve).await
  }

  pub async fn load(
    &self,
    url: &ModuleSpecifier,
    context: &LoadContext,
    default_load: &dyn DefaultLoad,
  ) -> Result<LoadResponse, LoaderError> {
    if is_network_url(url) {
      return self.loader.load_network_module(url).await;
    }
    if let Some(response) = self.loader.load_file_module(url, context.format)? {
      return Ok(response);
    }
    Ok(default_load.load(url, context).await?)
  }
}

/// Hooks for hosts before the unified `load` hook.
#[derive(Debug, Clone)]
pub struct LegacyTriadHooks {
  loader: Rc<TsLoader>,
}

impl LegacyTriadHooks {
  pub async fn resolve(
    &self,
    specifier: &str,
    context: &ResolveContext,
    default_resolve: &dyn DefaultResolve,
  ) -> Result<ResolveResponse, LoaderError> {
    resolve_hook(&self.loader, specifier, context, default_resolve).await
  }

  pub async fn get_format(
    &self,
    url: &ModuleSpecifier,
    default_get_format: &dyn DefaultGetFormat,
  ) -> Result<FormatResponse, LoaderError> {
    if self.loader.owns(url) {
      return Ok(FormatResponse {
        format: ModuleFormat::Module,
      });
    }
    Ok(default_get_format.get_format(url).await?)
  }

  /// Only network modules are sourced here. Local files are read by the
  /// host and arrive in `transform_source`.
  pub async fn get_source(
    &self,
    url: &ModuleSpecifier,
    format: Option<ModuleFormat>,
    default_get_source: &dyn DefaultGetSource,
  ) -> Result<SourceResponse, LoaderError> {
    if is_network_url(url) {
      let text = self.loader.fetch_network(url).await?;
      return Ok(SourceResponse {
        source: text.to_string(),
      });
    }
    Ok(default_get_source.get_source(url, format).await?)
  }

  pub async fn transform_source(
    &self,
    source: &str,
    context: &TransformSourceContext,
    default_transform_source: &dyn DefaultTransformSource,
  ) -> Result<SourceResponse, LoaderError> {
    if is_network_url(&context.url) {
      let response = self.loader.load_network_module(&context.url).await?;
      return Ok(SourceResponse {
        source: response.source,
      });
    }
    if let Some(result) =
      self
        .loader
        .transform(source, &context.url, context.format)?
    {
      return Ok(SourceResponse {
        source: result.code,
      });
    }
    Ok(
      default_transform_source
        .transform_source(source, context)
        .await?,
    )
  }
}

/// The hook set matching the host's protocol.
#[derive(Debug, Clone)]
pub enum LoaderHooks {
  UnifiedLoad(UnifiedLoadHooks),
  LegacyTriad(LegacyTriadHooks),
}

impl LoaderHooks {
  /// Builds the pipeline and selects the hook protocol. Path mappings are
  /// read here and nowhere else.
  pub fn initialize(options: LoaderOptions) -> Result<Self, InitError> {
    Ok(Self::from_loader(Rc::new(TsLoader::new(options)?)))
  }

  pub fn from_loader(loader: Rc<TsLoader>) -> Self {
    match loader.protocol() {
      HookProtocol::UnifiedLoad => {
        Self::UnifiedLoad(UnifiedLoadHooks { loader })
      }
      HookProtocol::LegacyTriad => {
        Self::LegacyTriad(LegacyTriadHooks { loader })
      }
    }
  }

  pub fn protocol(&self) -> HookProtocol {
    match self {
      Self::UnifiedLoad(_) => HookProtocol::UnifiedLoad,
      Self::LegacyTriad(_) => HookProtocol::LegacyTriad,
    }
  }

  pub fn loader(&self) -> &TsLoader {
    match self {
      Self::UnifiedLoad(hooks) => &hooks.loader,
      Self::LegacyTriad(hooks) => &hooks.loader,
    }
  }

  pub async fn resolve(
    &self,
    specifier: &str,
    context: &ResolveContext,
    default_resolve: &dyn DefaultResolve,
  ) -> Result<ResolveResponse, LoaderError> {
    resolve_hook(self.loader(), specifier, context, default_resolve).await
  }

  pub fn as_unified_load(&self) -> Option<&UnifiedLoadHooks> {
    match self {
      Self::UnifiedLoad(hooks) => Some(hooks),
      Self::LegacyTriad(_) => None,
    }
  }

  pub fn as_legacy_triad(&self) -> Option<&LegacyTriadHooks> {
    match self {
      Self::LegacyTriad(hooks) => Some(hooks),
      Self::UnifiedLoad(_) => None,
    }
  }
}
