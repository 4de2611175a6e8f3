// Copyright 2018-2022 the Deno authors. All rights reserved. MIT license.

use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

static SOURCE_MAP_URL_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#"(?m)^//# sourceMappingURL=([^\s'"]+)\s*$"#).unwrap()
});

const INLINE_SOURCE_MAP_PREFIX: &str = "data:application/json;base64,";

/// Finds the last `//# sourceMappingURL=` comment in emitted code.
pub fn find_source_map_url(code: &str) -> Option<&str> {
  SOURCE_MAP_URL_RE
    .captures_iter(code)
    .last()
    .and_then(|caps| caps.get(1))
    .map(|m| m.as_str())
}

pub fn inline_source_map_url(source_map: &str) -> String {
  format!(
    "{}{}",
    INLINE_SOURCE_MAP_PREFIX,
    base64::engine::general_purpose::STANDARD.encode(source_map.as_bytes())
  )
}

/// Replaces any existing source map comment with one holding the whole map
/// as a data URL.
pub fn append_inline_source_map(code: &str, source_map: &str) -> String {
  let code = SOURCE_MAP_URL_RE.replace_all(code, "");
  let mut code = code.trim_end().to_string();
  code.push_str("\n//# sourceMappingURL=");
  code.push_str(&inline_source_map_url(source_map));
  code.push('\n');
  code
}

/// Decodes a source map previously inlined as a data URL.
pub fn decode_inline_source_map(url: &str) -> Option<String> {
  let encoded = url.strip_prefix(INLINE_SOURCE_MAP_PREFIX)?;
  let bytes = base64::engine::general_purpose::STANDARD
    .decode(encoded)
    .ok()?;
  String::from_utf8(bytes).ok()
}
