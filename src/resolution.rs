// Copyright 2018-2024 the Deno authors. MIT license.

use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use serde::Deserialize;
use serde::Serialize;

use crate::bundler::BareSpecifierResolver;
use crate::bundler::ResolutionMode;
use crate::media::typed_extension_aliases;
use crate::media::ModuleFormat;
use crate::media::SourceLoader;
use crate::media::COMPILED_EXTENSIONS;
use crate::media::SOURCE_EXTENSIONS;
use crate::module_specifier::file_url_with_suffix;
use crate::module_specifier::is_absolute_path_specifier;
use crate::module_specifier::is_bare_specifier;
use crate::module_specifier::is_network_specifier;
use crate::module_specifier::is_network_url;
use crate::module_specifier::is_relative_specifier;
use crate::module_specifier::normalize_path;
use crate::module_specifier::parse_url_specifier;
use crate::module_specifier::specifier_to_file_path;
use crate::path_mapping::PathMappingTable;
use crate::source::FileSystem;
use crate::ModuleSpecifier;

/// Information about the module doing the import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveContext {
  /// `None` only for the entry module.
  pub parent_url: Option<ModuleSpecifier>,
  pub parent_format: Option<ModuleFormat>,
}

impl ResolveContext {
  pub fn from_parent(parent_url: ModuleSpecifier) -> Self {
    Self {
      parent_url: Some(parent_url),
      parent_format: None,
    }
  }

  pub fn with_parent_format(mut self, format: ModuleFormat) -> Self {
    self.parent_format = Some(format);
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResolvedModule {
  pub url: ModuleSpecifier,
  /// Left unset to let the host infer the format.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub format: Option<ModuleFormat>,
}

/// The outcome of resolving a specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  Resolved(ResolvedModule),
  /// Not handled here. The host's default resolver should be given this
  /// specifier, which is either the original text or the URL of a file
  /// that was found but whose format the host decides.
  Delegate { specifier: String },
}

impl Resolution {
  fn delegate(specifier: impl Into<String>) -> Self {
    Self::Delegate {
      specifier: specifier.into(),
    }
  }

  pub fn maybe_resolved(&self) -> Option<&ResolvedModule> {
    match self {
      Self::Resolved(resolved) => Some(resolved),
      Self::Delegate { .. } => None,
    }
  }
}

/// Tries extensions on a base path that has none.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionProber<'a> {
  file_system: &'a dyn FileSystem,
  extension_groups: &'a [&'a [&'a str]],
}

impl<'a> ExtensionProber<'a> {
  pub fn new(
    file_system: &'a dyn FileSystem,
    extension_groups: &'a [&'a [&'a str]],
  ) -> Self {
    Self {
      file_system,
      extension_groups,
    }
  }

  /// The first existing file of: the path as is, the path with each
  /// extension appended, then `index` in the path with each extension.
  pub fn probe(&self, base: &Path) -> Option<PathBuf> {
    if self.file_system.is_file(base) {
      return Some(base.to_path_buf());
    }
    self
      .probe_extensions(base)
      .or_else(|| self.probe_extensions(&base.join("index")))
  }

  fn probe_extensions(&self, base: &Path) -> Option<PathBuf> {
    self
      .extension_groups
      .iter()
      .flat_map(|group| group.iter())
      .map(|extension| with_appended_extension(base, extension))
      .find(|candidate| self.file_system.is_file(candidate))
  }
}

fn with_appended_extension(path: &Path, extension: &str) -> PathBuf {
  let mut text = OsString::from(path.as_os_str());
  text.push(".");
  text.push(extension);
  PathBuf::from(text)
}

/// Turns a specifier and the context it was imported from into a module
/// URL and format.
///
/// Rules are tried in order and the first match wins:
///
/// 1. Network URLs, or any specifier imported from a network module.
/// 2. Path mapped bare specifiers.
/// 3. Relative and absolute paths, probing typed extensions.
/// 4. Other bare specifiers, resolved like a bundler would.
/// 5. Everything else is left to the host.
#[derive(Debug)]
pub struct ResolutionEngine {
  cwd: PathBuf,
  file_system: Rc<dyn FileSystem>,
  path_mapping: Option<PathMappingTable>,
  bare_resolver: Rc<dyn BareSpecifierResolver>,
}

impl ResolutionEngine {
  pub fn new(
    cwd: PathBuf,
    file_system: Rc<dyn FileSystem>,
    path_mapping: Option<PathMappingTable>,
    bare_resolver: Rc<dyn BareSpecifierResolver>,
  ) -> Self {
    Self {
      cwd,
      file_system,
      path_mapping,
      bare_resolver,
    }
  }

  pub fn path_mapping(&self) -> Option<&PathMappingTable> {
    self.path_mapping.as_ref()
  }

  pub fn resolve(
    &self,
    specifier: &str,
    context: &ResolveContext,
  ) -> Resolution {
    let resolution = self.resolve_inner(specifier, context);
    log::debug!(
      "Resolved \"{}\" from {} to {:?}",
      specifier,
      context
        .parent_url
        .as_ref()
        .map(|url| url.as_str())
        .unwrap_or("<entry>"),
      resolution
    );
    resolution
  }

  fn resolve_inner(
    &self,
    specifier: &str,
    context: &ResolveContext,
  ) -> Resolution {
    if let Some(resolved) = self.resolve_network(specifier, context) {
      return Resolution::Resolved(resolved);
    }
    if let Some(url) = parse_url_specifier(specifier) {
      return resolve_url(url);
    }
    if is_bare_specifier(specifier) {
      if let Some(resolution) = self.resolve_path_mapped(specifier) {
        return resolution;
      }
    }
    if is_relative_specifier(specifier) || is_absolute_path_specifier(specifier)
    {
      return self
        .resolve_path(specifier, context)
        .unwrap_or_else(|| Resolution::delegate(specifier));
    }
    self
      .resolve_bare(specifier, context)
      .unwrap_or_else(|| Resolution::delegate(specifier))
  }

  fn resolve_network(
    &self,
    specifier: &str,
    context: &ResolveContext,
  ) -> Option<ResolvedModule> {
    let url = match &context.parent_url {
      Some(parent) if is_network_url(parent) => parent.join(specifier).ok()?,
      _ if is_network_specifier(specifier) => {
        ModuleSpecifier::parse(specifier).ok()?
      }
      _ => return None,
    };
    Some(ResolvedModule {
      url,
      format: Some(ModuleFormat::Module),
    })
  }

  fn resolve_path_mapped(&self, specifier: &str) -> Option<Resolution> {
    let candidates = self.path_mapping.as_ref()?.match_specifier(specifier)?;
    let prober = ExtensionProber::new(
      self.file_system.as_ref(),
      &[SOURCE_EXTENSIONS, COMPILED_EXTENSIONS],
    );
    let found = candidates.iter().find_map(|base| prober.probe(base));
    if found.is_none() {
      log::debug!(
        "No file found for path mapped \"{}\" in {:?}",
        specifier,
        candidates
      );
    }
    classify_path(&found?, None, None)
  }

  fn resolve_path(
    &self,
    specifier: &str,
    context: &ResolveContext,
  ) -> Option<Resolution> {
    let url = if is_relative_specifier(specifier) || specifier.starts_with('/')
    {
      self.referrer_url(context)?.join(specifier).ok()?
    } else {
      ModuleSpecifier::from_file_path(specifier).ok()?
    };
    let path = normalize_path(&specifier_to_file_path(&url)?);
    let found = self.probe_path(&path)?;
    classify_path(&found, url.query(), url.fragment())
  }

  fn probe_path(&self, path: &Path) -> Option<PathBuf> {
    if self.file_system.is_file(path) {
      return Some(path.to_path_buf());
    }
    let aliases = path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(typed_extension_aliases)
      .unwrap_or_default();
    let alias = aliases
      .iter()
      .map(|extension| path.with_extension(extension))
      .find(|candidate| self.file_system.is_file(candidate));
    if alias.is_some() {
      return alias;
    }
    ExtensionProber::new(self.file_system.as_ref(), &[SOURCE_EXTENSIONS])
      .probe(path)
  }

  fn resolve_bare(
    &self,
    specifier: &str,
    context: &ResolveContext,
  ) -> Option<Resolution> {
    let referrer_dir = match &context.parent_url {
      Some(parent) => specifier_to_file_path(parent)?.parent()?.to_path_buf(),
      None => self.cwd.clone(),
    };
    let mode = ResolutionMode::from_parent_format(context.parent_format);
    let path =
      self
        .bare_resolver
        .resolve_bare(specifier, &referrer_dir, mode)?;
    classify_path(&path, None, None)
  }

  /// The URL relative specifiers are joined with. The working directory
  /// stands in for the parent of the entry module.
  fn referrer_url(&self, context: &ResolveContext) -> Option<ModuleSpecifier> {
    match &context.parent_url {
      Some(parent) if parent.scheme() == "file" => Some(parent.clone()),
      Some(_) => None,
      None => ModuleSpecifier::from_directory_path(&self.cwd).ok(),
    }
  }
}

/// URLs that aren't network URLs are never probed.
fn resolve_url(url: ModuleSpecifier) -> Resolution {
  if url.scheme() == "file" && SourceLoader::from_specifier(&url).is_some() {
    Resolution::Resolved(ResolvedModule {
      url,
      format: Some(ModuleFormat::Module),
    })
  } else {
    Resolution::delegate(url.as_str())
  }
}

/// Recognized files resolve as `module`. Other found files are handed to
/// the host by URL so it infers the format.
fn classify_path(
  path: &Path,
  query: Option<&str>,
  fragment: Option<&str>,
) -> Option<Resolution> {
  let url = file_url_with_suffix(path, query, fragment)?;
  Some(if SourceLoader::from_specifier(&url).is_some() {
    Resolution::Resolved(ResolvedModule {
      url,
      format: Some(ModuleFormat::Module),
    })
  } else {
    Resolution::delegate(url.as_str())
  })
}
