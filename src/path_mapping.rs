// Copyright 2018-2024 the Deno authors. MIT license.

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::module_specifier::normalize_path;
use crate::source::FileSystem;

#[derive(Debug, Error, deno_error::JsError)]
pub enum ConfigError {
  #[class(generic)]
  #[error("Failed reading '{}'.", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[class(generic)]
  #[error("Failed parsing '{}'.", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: json5::Error,
  },
  #[class("NotFound")]
  #[error(
    "Could not find \"{extends}\" extended by '{}'.",
    .path.display()
  )]
  ExtendsNotFound { path: PathBuf, extends: String },
  #[class(generic)]
  #[error(
    "Cycle detected while following \"extends\" at '{}'.",
    .path.display()
  )]
  ExtendsCycle { path: PathBuf },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTsConfig {
  #[serde(default)]
  extends: Option<String>,
  #[serde(default)]
  compiler_options: RawCompilerOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompilerOptions {
  #[serde(default)]
  base_url: Option<String>,
  #[serde(default)]
  paths: Option<IndexMap<String, Vec<String>>>,
}

/// Path options with every path already resolved against the directory of
/// the config file that declared it.
#[derive(Debug, Default)]
struct PathOptions {
  base_url: Option<PathBuf>,
  paths: Option<(PathBuf, IndexMap<String, Vec<String>>)>,
}

#[derive(Debug, Clone)]
struct PathMapping {
  pattern: String,
  prefix: String,
  /// `None` for patterns without a wildcard.
  suffix: Option<String>,
  targets: Vec<String>,
}

impl PathMapping {
  fn new(pattern: String, targets: Vec<String>) -> Option<Self> {
    match pattern.matches('*').count() {
      0 => Some(Self {
        prefix: pattern.clone(),
        suffix: None,
        pattern,
        targets,
      }),
      1 => {
        let (prefix, suffix) = pattern.split_once('*')?;
        Some(Self {
          prefix: prefix.to_string(),
          suffix: Some(suffix.to_string()),
          pattern,
          targets,
        })
      }
      _ => {
        log::warn!(
          "Ignoring path mapping \"{}\". A pattern can contain at most \
           one '*'.",
          pattern
        );
        None
      }
    }
  }

  /// Returns the text matched by the wildcard (empty for exact patterns).
  fn capture<'a>(&self, specifier: &'a str) -> Option<&'a str> {
    match &self.suffix {
      None => (specifier == self.prefix).then_some(""),
      Some(suffix) => {
        if specifier.len() < self.prefix.len() + suffix.len() {
          return None;
        }
        specifier
          .strip_prefix(self.prefix.as_str())?
          .strip_suffix(suffix.as_str())
      }
    }
  }
}

/// Alias patterns from a project's `compilerOptions.paths` mapped to the
/// directories they stand for.
///
/// Built once and only read afterwards.
#[derive(Debug, Clone)]
pub struct PathMappingTable {
  base_dir: PathBuf,
  mappings: Vec<PathMapping>,
}

impl PathMappingTable {
  pub fn new(
    base_dir: impl Into<PathBuf>,
    paths: impl IntoIterator<Item = (String, Vec<String>)>,
  ) -> Self {
    Self {
      base_dir: base_dir.into(),
      mappings: paths
        .into_iter()
        .filter_map(|(pattern, targets)| PathMapping::new(pattern, targets))
        .collect(),
    }
  }

  /// Loads the table from a tsconfig file, following `extends`.
  ///
  /// Returns `None` when the file does not exist or it configures no
  /// `paths`, in which case mapping is disabled.
  pub fn load(
    file_system: &dyn FileSystem,
    tsconfig_path: &Path,
  ) -> Result<Option<Self>, ConfigError> {
    if !file_system.is_file(tsconfig_path) {
      log::debug!(
        "No path mapping configuration at {}",
        tsconfig_path.display()
      );
      return Ok(None);
    }
    let mut visited = HashSet::new();
    let options =
      load_path_options(file_system, tsconfig_path, &mut visited)?;
    let Some((paths_dir, paths)) = options.paths else {
      return Ok(None);
    };
    // paths without a baseUrl resolve from the config declaring them
    let base_dir = options.base_url.unwrap_or(paths_dir);
    Ok(Some(Self::new(base_dir, paths)))
  }

  pub fn base_dir(&self) -> &Path {
    &self.base_dir
  }

  pub fn len(&self) -> usize {
    self.mappings.len()
  }

  pub fn is_empty(&self) -> bool {
    self.mappings.is_empty()
  }

  /// Candidate base paths (without an extension) for the specifier in
  /// target order, or `None` when no pattern matches.
  ///
  /// An exact pattern wins over wildcards. Among wildcards the longest
  /// prefix wins and ties go to the first declared.
  pub fn match_specifier(&self, specifier: &str) -> Option<Vec<PathBuf>> {
    let (mapping, captured) = self.find_mapping(specifier)?;
    log::debug!(
      "Specifier \"{}\" matched path mapping \"{}\"",
      specifier,
      mapping.pattern
    );
    Some(
      mapping
        .targets
        .iter()
        .map(|target| {
          let target = target.replacen('*', captured, 1);
          normalize_path(&self.base_dir.join(target))
        })
        .collect(),
    )
  }

  fn find_mapping<'a>(
    &self,
    specifier: &'a str,
  ) -> Option<(&PathMapping, &'a str)> {
    let exact = self.mappings.iter().find(|mapping| {
      mapping.suffix.is_none() && mapping.capture(specifier).is_some()
    });
    if let Some(mapping) = exact {
      return Some((mapping, ""));
    }
    let mut best: Option<(&PathMapping, &'a str)> = None;
    for mapping in self.mappings.iter().filter(|m| m.suffix.is_some()) {
      let Some(captured) = mapping.capture(specifier) else {
        continue;
      };
      let is_longer = best
        .map(|(current, _)| mapping.prefix.len() > current.prefix.len())
        .unwrap_or(true);
      if is_longer {
        best = Some((mapping, captured));
      }
    }
    best
  }
}

fn load_path_options(
  file_system: &dyn FileSystem,
  path: &Path,
  visited: &mut HashSet<PathBuf>,
) -> Result<PathOptions, ConfigError> {
  let path = normalize_path(path);
  if !visited.insert(path.clone()) {
    return Err(ConfigError::ExtendsCycle { path });
  }
  let text =
    file_system
      .read_to_string(&path)
      .map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
      })?;
  let text = text.strip_prefix('\u{FEFF}').unwrap_or(&text);
  let raw: RawTsConfig =
    json5::from_str(text).map_err(|source| ConfigError::Parse {
      path: path.clone(),
      source,
    })?;
  let config_dir = path.parent().unwrap_or(Path::new("/")).to_path_buf();

  let own = PathOptions {
    base_url: raw
      .compiler_options
      .base_url
      .map(|base_url| normalize_path(&config_dir.join(base_url))),
    paths: raw
      .compiler_options
      .paths
      .map(|paths| (config_dir.clone(), paths)),
  };
  let Some(extends) = raw.extends else {
    return Ok(own);
  };
  let extends_path = resolve_extends(file_system, &config_dir, &extends)
    .ok_or_else(|| ConfigError::ExtendsNotFound {
      path: path.clone(),
      extends,
    })?;
  let base = load_path_options(file_system, &extends_path, visited)?;
  Ok(PathOptions {
    base_url: own.base_url.or(base.base_url),
    paths: own.paths.or(base.paths),
  })
}

fn resolve_extends(
  file_system: &dyn FileSystem,
  config_dir: &Path,
  extends: &str,
) -> Option<PathBuf> {
  if extends.starts_with('.') || Path::new(extends).is_absolute() {
    return resolve_extends_file(file_system, &config_dir.join(extends));
  }
  config_dir.ancestors().find_map(|ancestor| {
    resolve_extends_file(
      file_system,
      &ancestor.join("node_modules").join(extends),
    )
  })
}

fn resolve_extends_file(
  file_system: &dyn FileSystem,
  candidate: &Path,
) -> Option<PathBuf> {
  let candidate = normalize_path(candidate);
  let mut attempts = vec![candidate.clone()];
  // `./tsconfig.base` names `tsconfig.base.json`
  if candidate.extension().and_then(|ext| ext.to_str()) != Some("json") {
    let mut with_json = candidate.clone().into_os_string();
    with_json.push(".json");
    attempts.push(PathBuf::from(with_json));
  }
  attempts.push(candidate.join("tsconfig.json"));
  attempts
    .into_iter()
    .find(|attempt| file_system.is_file(attempt))
}
