// Copyright 2018-2024 the Deno authors. MIT license.

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use crate::ModuleSpecifier;

/// Matches the extensions this crate transforms. The capture is the loader.
static SOURCE_EXTENSION_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\.m?(tsx?|json)$").unwrap());

/// Typed source extensions in probing priority order.
pub const SOURCE_EXTENSIONS: &[&str] = &["mts", "ts", "mtsx", "tsx"];

/// Already compiled extensions, probed after the typed ones when resolving
/// a path mapped specifier.
pub const COMPILED_EXTENSIONS: &[&str] = &["mjs", "js", "cjs", "json"];

/// The transformer mode a source file is handled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLoader {
  Ts,
  Tsx,
  Json,
}

impl SourceLoader {
  pub fn from_path_str(path: &str) -> Option<Self> {
    let captures = SOURCE_EXTENSION_RE.captures(path)?;
    match captures.get(1)?.as_str() {
      "ts" => Some(Self::Ts),
      "tsx" => Some(Self::Tsx),
      "json" => Some(Self::Json),
      _ => None,
    }
  }

  /// Only the path of the URL is considered, so `./a.ts?x=1` is still `Ts`.
  pub fn from_specifier(specifier: &ModuleSpecifier) -> Option<Self> {
    Self::from_path_str(specifier.path())
  }

  pub fn from_path(path: &Path) -> Option<Self> {
    Self::from_path_str(path.to_str()?)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Ts => "ts",
      Self::Tsx => "tsx",
      Self::Json => "json",
    }
  }
}

impl fmt::Display for SourceLoader {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Typed extensions to retry when a relative import names the emitted
/// JavaScript file (ex. `./mod.js` written for `./mod.ts`).
pub fn typed_extension_aliases(extension: &str) -> &'static [&'static str] {
  match extension {
    "js" => &["ts", "tsx"],
    "jsx" => &["tsx"],
    "mjs" => &["mts", "mtsx"],
    _ => &[],
  }
}

/// The module format of a resolved or loaded module as understood by the
/// host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
  Module,
  #[serde(rename = "commonjs")]
  CommonJs,
  Json,
  Builtin,
  Wasm,
}

impl ModuleFormat {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Module => "module",
      Self::CommonJs => "commonjs",
      Self::Json => "json",
      Self::Builtin => "builtin",
      Self::Wasm => "wasm",
    }
  }
}

impl fmt::Display for ModuleFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The module system transformed code is emitted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmitFormat {
  Esm,
  Cjs,
}

impl EmitFormat {
  /// A declared `module` format emits ESM. Anything else, including an
  /// unknown format, emits CommonJS.
  pub fn from_declared(format: Option<ModuleFormat>) -> Self {
    match format {
      Some(ModuleFormat::Module) => Self::Esm,
      _ => Self::Cjs,
    }
  }

  pub fn module_format(&self) -> ModuleFormat {
    match self {
      Self::Esm => ModuleFormat::Module,
      Self::Cjs => ModuleFormat::CommonJs,
    }
  }
}
