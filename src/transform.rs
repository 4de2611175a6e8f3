// Copyright 2018-2024 the Deno authors. MIT license.

use std::fmt;
use std::rc::Rc;

use deno_semver::Version;
use thiserror::Error;

use crate::media::EmitFormat;
use crate::media::ModuleFormat;
use crate::media::SourceLoader;
use crate::module_specifier::specifier_to_file_path;
use crate::ModuleSpecifier;

const BOM_CHAR: char = '\u{FEFF}';

#[derive(Debug, Clone, Error, deno_error::JsError)]
pub enum TransformError {
  /// The source text could not be parsed.
  #[class(syntax)]
  #[error(
    "The module's source code could not be parsed: {message}\n  \
     Specifier: {specifier}"
  )]
  Parse {
    specifier: ModuleSpecifier,
    message: String,
  },
  #[class(generic)]
  #[error("Failed transforming {specifier}: {message}")]
  Emit {
    specifier: ModuleSpecifier,
    message: String,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMapMode {
  None,
  /// Appended to the code as a data URL comment.
  Inline,
  /// Returned separately from the code.
  Separate,
  /// Both inline and separate.
  Both,
}

impl SourceMapMode {
  pub fn is_inline(&self) -> bool {
    matches!(self, Self::Inline | Self::Both)
  }

  pub fn is_separate(&self) -> bool {
    matches!(self, Self::Separate | Self::Both)
  }
}

#[derive(Debug, Clone, Copy)]
pub struct TransformRequest<'a> {
  pub specifier: &'a ModuleSpecifier,
  /// Name used for the module in diagnostics and the source map.
  pub file_name: &'a str,
  pub source: &'a str,
  pub loader: SourceLoader,
  pub format: EmitFormat,
  /// Syntax level of the host (ex. `node16.14.0`). Newer syntax is lowered
  /// to what this version runs.
  pub target: &'a str,
  pub source_map: SourceMapMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformLocation {
  pub file: String,
  /// 1-indexed
  pub line: usize,
  /// 1-indexed
  pub column: usize,
}

impl fmt::Display for TransformLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.file, self.line, self.column)
  }
}

/// A non-fatal diagnostic surfaced while transforming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformWarning {
  pub location: Option<TransformLocation>,
  pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOutput {
  pub code: String,
  pub source_map: Option<String>,
  pub warnings: Vec<TransformWarning>,
}

/// Turns typed source text into code the host can execute.
pub trait Transformer: fmt::Debug {
  fn transform(
    &self,
    request: TransformRequest<'_>,
  ) -> Result<TransformOutput, TransformError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
  pub code: String,
  pub source_map: Option<String>,
  /// The module system the code was emitted for.
  pub format: EmitFormat,
}

impl TransformResult {
  pub fn module_format(&self) -> ModuleFormat {
    self.format.module_format()
  }
}

/// Picks the transformer mode from a module's extension and runs the
/// transformer with settings pinned to the host.
#[derive(Debug)]
pub struct TransformDispatcher {
  transformer: Rc<dyn Transformer>,
  target: String,
}

impl TransformDispatcher {
  pub fn new(transformer: Rc<dyn Transformer>, host_version: &Version) -> Self {
    Self {
      transformer,
      target: format!("node{}", host_version),
    }
  }

  pub fn target(&self) -> &str {
    &self.target
  }

  /// Transforms the source of a recognized module. Returns `None` when the
  /// specifier's extension isn't one this crate handles.
  ///
  /// Warnings are logged and don't stop the transform.
  pub fn transform(
    &self,
    source: &str,
    specifier: &ModuleSpecifier,
    declared_format: Option<ModuleFormat>,
  ) -> Result<Option<TransformResult>, TransformError> {
    let Some(loader) = SourceLoader::from_specifier(specifier) else {
      return Ok(None);
    };
    let format = EmitFormat::from_declared(declared_format);
    let file_name = display_file_name(specifier);
    let source = source.strip_prefix(BOM_CHAR).unwrap_or(source);
    log::debug!(
      "Transforming {} with the {} loader ({:?})",
      specifier,
      loader,
      format
    );
    let output = self.transformer.transform(TransformRequest {
      specifier,
      file_name: &file_name,
      source,
      loader,
      format,
      target: &self.target,
      source_map: SourceMapMode::Both,
    })?;
    for warning in &output.warnings {
      match &warning.location {
        Some(location) => {
          log::warn!("{}\n    at {}", warning.message, location)
        }
        None => log::warn!("{}\n    at {}", warning.message, file_name),
      }
    }
    Ok(Some(TransformResult {
      code: output.code,
      source_map: output.source_map,
      format,
    }))
  }
}

/// The file path for `file:` URLs, otherwise the URL itself.
fn display_file_name(specifier: &ModuleSpecifier) -> String {
  match specifier_to_file_path(specifier) {
    Some(path) => path.display().to_string(),
    None => specifier.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use pretty_assertions::assert_eq;

  use super::*;

  #[derive(Debug, Clone, PartialEq, Eq)]
  struct RecordedRequest {
    specifier: String,
    file_name: String,
    source: String,
    loader: SourceLoader,
    format: EmitFormat,
    target: String,
    source_map: SourceMapMode,
  }

  #[derive(Debug, Default)]
  struct RecordingTransformer {
    requests: RefCell<Vec<RecordedRequest>>,
    warnings: Vec<TransformWarning>,
    fail: bool,
  }

  impl Transformer for RecordingTransformer {
    fn transform(
      &self,
      request: TransformRequest<'_>,
    ) -> Result<TransformOutput, TransformError> {
      self.requests.borrow_mut().push(RecordedRequest {
        specifier: request.specifier.to_string(),
        file_name: request.file_name.to_string(),
        source: request.source.to_string(),
        loader: request.loader,
        format: request.format,
        target: request.target.to_string(),
        source_map: request.source_map,
      });
      if self.fail {
        return Err(TransformError::Parse {
          specifier: request.specifier.clone(),
          message: "Expression expected".to_string(),
        });
      }
      Ok(TransformOutput {
        code: format!("/* {} */ {}", request.loader, request.source),
        source_map: Some("{}".to_string()),
        warnings: self.warnings.clone(),
      })
    }
  }

  fn dispatcher(transformer: Rc<RecordingTransformer>) -> TransformDispatcher {
    TransformDispatcher::new(
      transformer,
      &Version::parse_standard("16.14.0").unwrap(),
    )
  }

  fn url(text: &str) -> ModuleSpecifier {
    ModuleSpecifier::parse(text).unwrap()
  }

  #[test]
  fn selects_loader_by_extension() {
    let transformer = Rc::new(RecordingTransformer::default());
    let dispatcher = dispatcher(transformer.clone());
    let cases = [
      ("file:///a/mod.ts", SourceLoader::Ts),
      ("file:///a/mod.mts", SourceLoader::Ts),
      ("file:///a/mod.tsx?x=1", SourceLoader::Tsx),
      ("file:///a/data.json", SourceLoader::Json),
    ];
    for (specifier, loader) in cases {
      let result = dispatcher
        .transform("1", &url(specifier), Some(ModuleFormat::Module))
        .unwrap()
        .unwrap();
      assert_eq!(result.code, format!("/* {} */ 1", loader));
    }
    let loaders = transformer
      .requests
      .borrow()
      .iter()
      .map(|r| r.loader)
      .collect::<Vec<_>>();
    assert_eq!(
      loaders,
      vec![
        SourceLoader::Ts,
        SourceLoader::Ts,
        SourceLoader::Tsx,
        SourceLoader::Json
      ]
    );
  }

  #[test]
  fn unrecognized_extension_is_not_transformed() {
    let transformer = Rc::new(RecordingTransformer::default());
    let dispatcher = dispatcher(transformer.clone());
    let result = dispatcher
      .transform("1", &url("file:///a/mod.js"), Some(ModuleFormat::Module))
      .unwrap();
    assert_eq!(result, None);
    assert!(transformer.requests.borrow().is_empty());
  }

  #[test]
  fn request_is_pinned_to_host_and_format() {
    let transformer = Rc::new(RecordingTransformer::default());
    let dispatcher = dispatcher(transformer.clone());
    let esm = dispatcher
      .transform(
        "\u{FEFF}export {};",
        &url("file:///a/mod.ts"),
        Some(ModuleFormat::Module),
      )
      .unwrap()
      .unwrap();
    assert_eq!(esm.module_format(), ModuleFormat::Module);
    let cjs = dispatcher
      .transform("1", &url("https://example.com/mod.ts"), None)
      .unwrap()
      .unwrap();
    assert_eq!(cjs.module_format(), ModuleFormat::CommonJs);
    assert_eq!(cjs.source_map.as_deref(), Some("{}"));

    let requests = transformer.requests.borrow();
    assert_eq!(
      requests[0],
      RecordedRequest {
        specifier: "file:///a/mod.ts".to_string(),
        file_name: "/a/mod.ts".to_string(),
        source: "export {};".to_string(),
        loader: SourceLoader::Ts,
        format: EmitFormat::Esm,
        target: "node16.14.0".to_string(),
        source_map: SourceMapMode::Both,
      }
    );
    assert_eq!(requests[1].file_name, "https://example.com/mod.ts");
    assert_eq!(requests[1].format, EmitFormat::Cjs);
  }

  #[test]
  fn warnings_do_not_abort() {
    let transformer = Rc::new(RecordingTransformer {
      warnings: vec![TransformWarning {
        location: Some(TransformLocation {
          file: "/a/mod.ts".to_string(),
          line: 1,
          column: 5,
        }),
        message: "Duplicate key".to_string(),
      }],
      ..Default::default()
    });
    let dispatcher = dispatcher(transformer);
    let result = dispatcher
      .transform("1", &url("file:///a/mod.ts"), Some(ModuleFormat::Module))
      .unwrap();
    assert!(result.is_some());
  }

  #[test]
  fn failures_propagate() {
    let transformer = Rc::new(RecordingTransformer {
      fail: true,
      ..Default::default()
    });
    let dispatcher = dispatcher(transformer);
    let err = dispatcher
      .transform("let", &url("file:///a/mod.ts"), Some(ModuleFormat::Module))
      .unwrap_err();
    assert!(matches!(err, TransformError::Parse { .. }));
  }
}
