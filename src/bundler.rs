// Copyright 2018-2024 the Deno authors. MIT license.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use oxc_resolver::ResolveOptions;
use oxc_resolver::Resolver;
use serde::Deserialize;
use serde::Serialize;

use crate::media::ModuleFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionMode {
  /// Resolving as an ES module.
  Import,
  /// Resolving as a CJS module.
  Require,
}

impl ResolutionMode {
  /// A CommonJS parent resolves with the `require` condition. Everything
  /// else, including the entry module, resolves with `import`.
  pub fn from_parent_format(parent_format: Option<ModuleFormat>) -> Self {
    match parent_format {
      Some(ModuleFormat::CommonJs) => Self::Require,
      _ => Self::Import,
    }
  }
}

/// Resolves package specifiers (`pkg`, `@scope/pkg/sub`) the way the
/// ecosystem's bundlers do.
pub trait BareSpecifierResolver: fmt::Debug {
  /// The file the specifier resolves to when imported from a module in
  /// `referrer_dir`, or `None` when it can't be resolved.
  fn resolve_bare(
    &self,
    specifier: &str,
    referrer_dir: &Path,
    mode: ResolutionMode,
  ) -> Option<PathBuf>;
}

/// Resolution backed by `oxc_resolver`, the enhanced-resolve compatible
/// resolver used by the rolldown bundler, configured like a bundle that
/// targets the node platform.
///
/// This answers the same question as bundling a one line entry module
/// that imports the specifier and observing the first file the bundler
/// loads, without doing the bundling. Package exports conditions,
/// self references and symlinks behave like the bundler's.
pub struct BundlerResolver {
  import: Resolver,
  require: Resolver,
}

impl fmt::Debug for BundlerResolver {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BundlerResolver").finish_non_exhaustive()
  }
}

impl Default for BundlerResolver {
  fn default() -> Self {
    Self::new()
  }
}

impl BundlerResolver {
  pub fn new() -> Self {
    Self {
      import: Resolver::new(resolve_options("import")),
      require: Resolver::new(resolve_options("require")),
    }
  }
}

fn resolve_options(mode_condition: &str) -> ResolveOptions {
  ResolveOptions {
    extensions: [".tsx", ".ts", ".jsx", ".js", ".css", ".json"]
      .into_iter()
      .map(String::from)
      .collect(),
    main_fields: vec!["main".to_string(), "module".to_string()],
    condition_names: vec![
      "node".to_string(),
      mode_condition.to_string(),
      "default".to_string(),
    ],
    symlinks: true,
    ..ResolveOptions::default()
  }
}

impl BareSpecifierResolver for BundlerResolver {
  fn resolve_bare(
    &self,
    specifier: &str,
    referrer_dir: &Path,
    mode: ResolutionMode,
  ) -> Option<PathBuf> {
    let resolver = match mode {
      ResolutionMode::Import => &self.import,
      ResolutionMode::Require => &self.require,
    };
    match resolver.resolve(referrer_dir, specifier) {
      Ok(resolution) => Some(resolution.path().to_path_buf()),
      Err(err) => {
        log::debug!(
          "Bundler resolution of \"{}\" from {} failed: {}",
          specifier,
          referrer_dir.display(),
          err
        );
        None
      }
    }
  }
}
