// Copyright 2018-2024 the Deno authors. MIT license.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

pub type ModuleSpecifier = url::Url;

static NETWORK_SPECIFIER_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^https?://").unwrap());

/// If the text starts with `http://` or `https://`.
pub fn is_network_specifier(specifier: &str) -> bool {
  NETWORK_SPECIFIER_RE.is_match(specifier)
}

pub fn is_network_url(url: &ModuleSpecifier) -> bool {
  matches!(url.scheme(), "http" | "https")
}

/// Parses the specifier as a URL when it is one.
///
/// Malformed URLs return `None` so the caller can keep treating the text as
/// a relative or bare specifier. Windows drive paths (`C:\a.ts`) parse as a
/// URL with a single letter scheme and are rejected here as well.
pub fn parse_url_specifier(specifier: &str) -> Option<ModuleSpecifier> {
  let url = ModuleSpecifier::parse(specifier).ok()?;
  if url.scheme().len() == 1 {
    None
  } else {
    Some(url)
  }
}

pub fn is_relative_specifier(specifier: &str) -> bool {
  specifier == "."
    || specifier == ".."
    || specifier.starts_with("./")
    || specifier.starts_with("../")
}

pub fn is_absolute_path_specifier(specifier: &str) -> bool {
  specifier.starts_with('/') || Path::new(specifier).is_absolute()
}

/// A specifier that is neither a URL nor a relative or absolute path, such
/// as `pkg`, `@scope/pkg/sub` or an alias like `@/utils`.
pub fn is_bare_specifier(specifier: &str) -> bool {
  !is_relative_specifier(specifier)
    && !is_absolute_path_specifier(specifier)
    && parse_url_specifier(specifier).is_none()
}

pub fn specifier_to_file_path(specifier: &ModuleSpecifier) -> Option<PathBuf> {
  if specifier.scheme() != "file" {
    return None;
  }
  specifier.to_file_path().ok()
}

/// Creates a `file:` URL for the path and reattaches the query and fragment
/// of the original specifier.
pub fn file_url_with_suffix(
  path: &Path,
  query: Option<&str>,
  fragment: Option<&str>,
) -> Option<ModuleSpecifier> {
  let mut url = ModuleSpecifier::from_file_path(path).ok()?;
  url.set_query(query);
  url.set_fragment(fragment);
  Some(url)
}

/// Lexically resolves `.` and `..` components without touching the file
/// system.
pub fn normalize_path(path: &Path) -> PathBuf {
  let mut components = path.components().peekable();
  let mut result =
    if let Some(c @ Component::Prefix(..)) = components.peek().cloned() {
      components.next();
      PathBuf::from(c.as_os_str())
    } else {
      PathBuf::new()
    };

  for component in components {
    match component {
      Component::Prefix(..) => unreachable!(),
      Component::RootDir => {
        result.push(component.as_os_str());
      }
      Component::CurDir => {}
      Component::ParentDir => {
        result.pop();
      }
      Component::Normal(c) => {
        result.push(c);
      }
    }
  }
  result
}
