// Copyright 2018-2024 the Deno authors. All rights reserved. MIT license.

use std::sync::Arc;
use std::sync::Mutex;

use deno_ast::diagnostics::Diagnostic;
use deno_ast::swc::ast::EsVersion;
use deno_ast::swc::ast::Program;
use deno_ast::swc::common::comments::SingleThreadedComments;
use deno_ast::swc::common::errors::DiagnosticBuilder;
use deno_ast::swc::common::errors::Emitter;
use deno_ast::swc::common::errors::Handler;
use deno_ast::swc::common::errors::HANDLER;
use deno_ast::swc::common::Mark;
use deno_ast::swc::transforms::compat;
use deno_ast::swc::transforms::fixer;
use deno_ast::swc::transforms::helpers;
use deno_ast::swc::transforms::hygiene;
use deno_ast::swc::transforms::resolver;
use deno_ast::swc::visit::Optional;
use deno_ast::EmitOptions;
use deno_ast::FoldProgramError;
use deno_ast::MediaType;
use deno_ast::ParseParams;
use deno_ast::ProgramRef;
use deno_ast::SourceMap;
use deno_ast::SourceMapOption;
use deno_ast::TranspileOptions;
use deno_semver::Version;
use swc_ecma_transforms_base::feature::enable_available_feature_from_es_version;
use swc_ecma_transforms_module::common_js;
use swc_ecma_transforms_module::path::Resolver;
use swc_ecma_transforms_module::util::ImportInterop;

use crate::media::EmitFormat;
use crate::media::SourceLoader;
use crate::source_map::append_inline_source_map;
use crate::transform::SourceMapMode;
use crate::transform::TransformError;
use crate::transform::TransformLocation;
use crate::transform::TransformOutput;
use crate::transform::TransformRequest;
use crate::transform::TransformWarning;
use crate::transform::Transformer;
use crate::ModuleSpecifier;

/// Strips types and transforms JSX with `deno_ast` (swc), then lowers
/// syntax the host named by `target` cannot run and rewrites ES module
/// syntax to CommonJS when a CommonJS emit is requested.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenoAstTransformer;

impl Transformer for DenoAstTransformer {
  fn transform(
    &self,
    request: TransformRequest<'_>,
  ) -> Result<TransformOutput, TransformError> {
    match request.loader {
      SourceLoader::Json => transform_json(request),
      SourceLoader::Ts | SourceLoader::Tsx => transpile(request),
    }
  }
}

fn media_type(loader: SourceLoader, specifier: &ModuleSpecifier) -> MediaType {
  match loader {
    SourceLoader::Ts if specifier.path().ends_with(".mts") => MediaType::Mts,
    SourceLoader::Ts => MediaType::TypeScript,
    SourceLoader::Tsx => MediaType::Tsx,
    SourceLoader::Json => MediaType::Json,
  }
}

/// Maps a `node<version>` target to the newest ECMAScript edition whose
/// syntax that Node.js release runs natively.
fn es_version_for_target(target: &str) -> EsVersion {
  let Some(version) = target
    .strip_prefix("node")
    .and_then(|version| Version::parse_standard(version).ok())
  else {
    log::debug!("Unknown transform target '{}', not lowering.", target);
    return EsVersion::EsNext;
  };
  let at_least = |major: u64, minor: u64| {
    (version.major, version.minor) >= (major, minor)
  };
  if at_least(16, 11) {
    // class static blocks
    EsVersion::Es2022
  } else if at_least(15, 0) {
    // logical assignment
    EsVersion::Es2021
  } else if at_least(14, 0) {
    // optional chaining and nullish coalescing
    EsVersion::Es2020
  } else if at_least(10, 0) {
    EsVersion::Es2019
  } else {
    EsVersion::Es2018
  }
}

fn transpile(
  request: TransformRequest<'_>,
) -> Result<TransformOutput, TransformError> {
  let media_type = media_type(request.loader, request.specifier);
  let parsed = deno_ast::parse_module(ParseParams {
    specifier: request.specifier.clone(),
    text: request.source.into(),
    media_type,
    capture_tokens: false,
    scope_analysis: false,
    maybe_syntax: None,
  })
  .map_err(|diagnostic| TransformError::Parse {
    specifier: request.specifier.clone(),
    message: diagnostic.to_string(),
  })?;

  let warnings = parsed
    .diagnostics()
    .iter()
    .map(|diagnostic| {
      let position = diagnostic.display_position();
      TransformWarning {
        location: Some(TransformLocation {
          file: request.file_name.to_string(),
          line: position.line_number,
          column: position.column_number,
        }),
        message: diagnostic.message().to_string(),
      }
    })
    .collect::<Vec<_>>();

  let es_version = es_version_for_target(request.target);
  let transpile_options = TranspileOptions {
    transform_jsx: media_type == MediaType::Tsx,
    ..Default::default()
  };
  let source_map =
    SourceMap::single(request.specifier.clone(), request.source.to_string());
  let comments = parsed.comments().as_single_threaded();
  let program = (*parsed.program()).clone();
  let program = parsed.globals().with(|marks| {
    let program = deno_ast::fold_program(
      program,
      &transpile_options,
      &source_map,
      &comments,
      marks,
      Box::new(parsed.diagnostics().iter()),
    )
    .map_err(|err| match err {
      FoldProgramError::ParseDiagnostics(err) => TransformError::Parse {
        specifier: request.specifier.clone(),
        message: err.to_string(),
      },
      FoldProgramError::Swc(err) => TransformError::Emit {
        specifier: request.specifier.clone(),
        message: err.to_string(),
      },
    })?;
    lower_program(program, request.format, es_version, &comments).map_err(
      |errors| TransformError::Emit {
        specifier: request.specifier.clone(),
        message: errors.join("\n\n"),
      },
    )
  })?;

  let emitted = deno_ast::emit(
    ProgramRef::from(&program),
    &comments,
    &source_map,
    &EmitOptions {
      source_map: match request.source_map {
        SourceMapMode::None => SourceMapOption::None,
        _ => SourceMapOption::Separate,
      },
      inline_sources: true,
      ..Default::default()
    },
  )
  .map_err(|err| TransformError::Emit {
    specifier: request.specifier.clone(),
    message: err.to_string(),
  })?;

  let code = match (&emitted.source_map, request.source_map.is_inline()) {
    (Some(source_map), true) => {
      append_inline_source_map(&emitted.text, source_map)
    }
    _ => emitted.text,
  };
  let source_map = if request.source_map.is_separate() {
    emitted.source_map
  } else {
    None
  };
  Ok(TransformOutput {
    code,
    source_map,
    warnings,
  })
}

/// Collects error diagnostics the swc passes report through `HANDLER`.
#[derive(Debug, Default, Clone)]
struct SwcErrorCollector(Arc<Mutex<Vec<String>>>);

impl SwcErrorCollector {
  fn take(&self) -> Vec<String> {
    match self.0.lock() {
      Ok(mut errors) => std::mem::take(&mut *errors),
      Err(_) => Vec::new(),
    }
  }
}

impl Emitter for SwcErrorCollector {
  fn emit(&mut self, db: &mut DiagnosticBuilder<'_>) {
    let diagnostic = db.take();
    if diagnostic.is_error() {
      if let Ok(mut errors) = self.0.lock() {
        errors.push(diagnostic.message());
      }
    }
  }
}

/// Runs the syntax lowering and module passes over a program that has
/// already had its types stripped. Must be called with swc's globals set.
fn lower_program(
  program: Program,
  format: EmitFormat,
  es_version: EsVersion,
  comments: &SingleThreadedComments,
) -> Result<Program, Vec<String>> {
  let is_cjs = format == EmitFormat::Cjs;
  if !is_cjs && es_version >= EsVersion::Es2022 {
    return Ok(program);
  }

  // hygiene cleared the syntax contexts from the first fold
  let unresolved_mark = Mark::new();
  let top_level_mark = Mark::new();
  let passes = (
    resolver(unresolved_mark, top_level_mark, false),
    Optional::new(
      compat::es2022(Default::default(), unresolved_mark),
      es_version < EsVersion::Es2022,
    ),
    Optional::new(compat::es2021(), es_version < EsVersion::Es2021),
    Optional::new(
      compat::es2020(Default::default(), unresolved_mark),
      es_version < EsVersion::Es2020,
    ),
    Optional::new(compat::es2019(), es_version < EsVersion::Es2019),
    helpers::inject_helpers(top_level_mark),
    Optional::new(
      common_js(
        Resolver::Default,
        unresolved_mark,
        common_js::Config {
          import_interop: Some(ImportInterop::Node),
          ..Default::default()
        },
        enable_available_feature_from_es_version(es_version),
      ),
      is_cjs,
    ),
    (fixer(Some(comments)), hygiene()),
  );

  let collector = SwcErrorCollector::default();
  let handler = Handler::with_emitter(true, false, Box::new(collector.clone()));
  let program = HANDLER.set(&handler, || {
    helpers::HELPERS
      .set(&helpers::Helpers::new(false), || program.apply(passes))
  });
  let errors = collector.take();
  if errors.is_empty() {
    Ok(program)
  } else {
    Err(errors)
  }
}

fn transform_json(
  request: TransformRequest<'_>,
) -> Result<TransformOutput, TransformError> {
  let value: serde_json::Value =
    serde_json::from_str(request.source).map_err(|err| {
      TransformError::Parse {
        specifier: request.specifier.clone(),
        message: err.to_string(),
      }
    })?;
  let json = value.to_string();
  let code = match request.format {
    EmitFormat::Esm => format!("export default {};\n", json),
    EmitFormat::Cjs => format!("module.exports = {};\n", json),
  };
  Ok(TransformOutput {
    code,
    source_map: None,
    warnings: Vec::new(),
  })
}
