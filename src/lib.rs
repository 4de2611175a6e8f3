// Copyright 2018-2024 the Deno authors. All rights reserved. MIT license.

#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]

mod ast;
mod bundler;
mod hooks;
mod loader;
mod media;
mod module_specifier;
mod network;
mod path_mapping;
mod resolution;
pub mod source;
mod source_map;
mod transform;

pub use ast::DenoAstTransformer;
pub use bundler::BareSpecifierResolver;
pub use bundler::BundlerResolver;
pub use bundler::ResolutionMode;
pub use hooks::DefaultGetFormat;
pub use hooks::DefaultGetSource;
pub use hooks::DefaultLoad;
pub use hooks::DefaultResolve;
pub use hooks::DefaultTransformSource;
pub use hooks::FormatResponse;
pub use hooks::HookProtocol;
pub use hooks::LegacyTriadHooks;
pub use hooks::LoadContext;
pub use hooks::LoadResponse;
pub use hooks::LoaderHooks;
pub use hooks::ResolveResponse;
pub use hooks::SourceResponse;
pub use hooks::TransformSourceContext;
pub use hooks::UnifiedLoadHooks;
pub use loader::parse_host_version;
pub use loader::InitError;
pub use loader::LoaderError;
pub use loader::LoaderOptions;
pub use loader::TsConfigLocation;
pub use loader::TsLoader;
pub use loader::TS_NODE_PROJECT_ENV_VAR;
pub use media::typed_extension_aliases;
pub use media::EmitFormat;
pub use media::ModuleFormat;
pub use media::SourceLoader;
pub use media::COMPILED_EXTENSIONS;
pub use media::SOURCE_EXTENSIONS;
pub use module_specifier::is_bare_specifier;
pub use module_specifier::is_network_specifier;
pub use module_specifier::ModuleSpecifier;
pub use network::NetworkModuleCache;
pub use network::NetworkModuleFuture;
pub use path_mapping::ConfigError;
pub use path_mapping::PathMappingTable;
pub use resolution::ExtensionProber;
pub use resolution::Resolution;
pub use resolution::ResolutionEngine;
pub use resolution::ResolveContext;
pub use resolution::ResolvedModule;
pub use source_map::decode_inline_source_map;
pub use source_map::find_source_map_url;
pub use transform::SourceMapMode;
pub use transform::TransformDispatcher;
pub use transform::TransformError;
pub use transform::TransformLocation;
pub use transform::TransformOutput;
pub use transform::TransformRequest;
pub use transform::TransformResult;
pub use transform::TransformWarning;
pub use transform::Transformer;
