// Copyright 2018-2024 the Deno authors. All rights reserved. MIT license.

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use async_trait::async_trait;
use deno_error::JsErrorBox;
use sys_traits::impls::InMemorySys;
use sys_traits::FsCreateDirAll;
use sys_traits::FsWrite;
use ts_loader::source::FetchError;
use ts_loader::source::Fetcher;
use ts_loader::source::FileSystem;
use ts_loader::BareSpecifierResolver;
use ts_loader::DefaultGetFormat;
use ts_loader::DefaultGetSource;
use ts_loader::DefaultLoad;
use ts_loader::DefaultResolve;
use ts_loader::DefaultTransformSource;
use ts_loader::FormatResponse;
use ts_loader::LoadContext;
use ts_loader::LoadResponse;
use ts_loader::LoaderHooks;
use ts_loader::LoaderOptions;
use ts_loader::ModuleFormat;
use ts_loader::ModuleSpecifier;
use ts_loader::ResolutionMode;
use ts_loader::ResolveContext;
use ts_loader::ResolveResponse;
use ts_loader::SourceResponse;
use ts_loader::TransformSourceContext;

pub const CWD: &str = "/project";

#[derive(Debug, Default)]
pub struct MemoryFetcher {
  remote: HashMap<ModuleSpecifier, String>,
  requests: Cell<usize>,
}

impl MemoryFetcher {
  pub fn requests(&self) -> usize {
    self.requests.get()
  }
}

#[async_trait(?Send)]
impl Fetcher for MemoryFetcher {
  async fn fetch_text(
    &self,
    specifier: &ModuleSpecifier,
  ) -> Result<String, FetchError> {
    self.requests.set(self.requests.get() + 1);
    tokio::task::yield_now().await;
    self
      .remote
      .get(specifier)
      .cloned()
      .ok_or_else(|| FetchError::new(specifier.clone(), "404 Not Found"))
  }
}

/// Resolves bare specifiers from a fixed table, ignoring the referrer.
#[derive(Debug, Default)]
pub struct TableBareResolver {
  table: HashMap<String, PathBuf>,
}

impl BareSpecifierResolver for TableBareResolver {
  fn resolve_bare(
    &self,
    specifier: &str,
    _referrer_dir: &Path,
    _mode: ResolutionMode,
  ) -> Option<PathBuf> {
    self.table.get(specifier).cloned()
  }
}

/// Stands in for the host runtime's default hooks. Builtins resolve to
/// `node:` URLs and every call is recorded.
#[derive(Debug, Default)]
pub struct RecordingHost {
  calls: RefCell<Vec<String>>,
}

impl RecordingHost {
  pub fn calls(&self) -> Vec<String> {
    self.calls.borrow().clone()
  }

  fn record(&self, call: String) {
    self.calls.borrow_mut().push(call);
  }
}

#[async_trait(?Send)]
impl DefaultResolve for RecordingHost {
  async fn resolve(
    &self,
    specifier: &str,
    _context: &ResolveContext,
  ) -> Result<ResolveResponse, JsErrorBox> {
    self.record(format!("resolve {}", specifier));
    if let Ok(url) = ModuleSpecifier::parse(specifier) {
      return Ok(ResolveResponse { url, format: None });
    }
    match specifier {
      "fs" | "path" | "url" => Ok(ResolveResponse {
        url: ModuleSpecifier::parse(&format!("node:{}", specifier))
          .map_err(|err| JsErrorBox::type_error(err.to_string()))?,
        format: Some(ModuleFormat::Builtin),
      }),
      _ => Err(JsErrorBox::new(
        "ERR_MODULE_NOT_FOUND",
        format!("Cannot find package '{}'", specifier),
      )),
    }
  }
}

#[async_trait(?Send)]
impl DefaultLoad for RecordingHost {
  async fn load(
    &self,
    url: &ModuleSpecifier,
    context: &LoadContext,
  ) -> Result<LoadResponse, JsErrorBox> {
    self.record(format!("load {}", url));
    Ok(LoadResponse {
      format: context.format.unwrap_or(ModuleFormat::CommonJs),
      source: String::new(),
      source_map: None,
    })
  }
}

#[async_trait(?Send)]
impl DefaultGetFormat for RecordingHost {
  async fn get_format(
    &self,
    url: &ModuleSpecifier,
  ) -> Result<FormatResponse, JsErrorBox> {
    self.record(format!("getFormat {}", url));
    let format = if url.scheme() == "node" {
      ModuleFormat::Builtin
    } else {
      ModuleFormat::CommonJs
    };
    Ok(FormatResponse { format })
  }
}

#[async_trait(?Send)]
impl DefaultGetSource for RecordingHost {
  async fn get_source(
    &self,
    url: &ModuleSpecifier,
    _format: Option<ModuleFormat>,
  ) -> Result<SourceResponse, JsErrorBox> {
    self.record(format!("getSource {}", url));
    Ok(SourceResponse {
      source: String::new(),
    })
  }
}

#[async_trait(?Send)]
impl DefaultTransformSource for RecordingHost {
  async fn transform_source(
    &self,
    source: &str,
    context: &TransformSourceContext,
  ) -> Result<SourceResponse, JsErrorBox> {
    self.record(format!("transformSource {}", context.url));
    Ok(SourceResponse {
      source: source.to_string(),
    })
  }
}

pub struct TestBuilder {
  host_version: String,
  file_system: InMemorySys,
  fetcher: MemoryFetcher,
  bare_resolver: TableBareResolver,
}

impl TestBuilder {
  pub fn new() -> Self {
    let _ = env_logger::builder().is_test(true).try_init();
    Self {
      host_version: "v18.19.0".to_string(),
      file_system: InMemorySys::default(),
      fetcher: MemoryFetcher::default(),
      bare_resolver: TableBareResolver::default(),
    }
  }

  pub fn host_version(&mut self, version: &str) -> &mut Self {
    self.host_version = version.to_string();
    self
  }

  /// Adds a file relative to the working directory.
  pub fn file(&mut self, path: &str, text: &str) -> &mut Self {
    let path = Path::new(CWD).join(path);
    if let Some(parent) = path.parent() {
      self.file_system.fs_create_dir_all(parent).unwrap();
    }
    self.file_system.fs_write(&path, text).unwrap();
    self
  }

  pub fn remote(&mut self, url: &str, text: &str) -> &mut Self {
    self
      .fetcher
      .remote
      .insert(ModuleSpecifier::parse(url).unwrap(), text.to_string());
    self
  }

  pub fn bare(&mut self, specifier: &str, path: &str) -> &mut Self {
    self
      .bare_resolver
      .table
      .insert(specifier.to_string(), Path::new(CWD).join(path));
    self
  }

  pub fn build(self) -> TestHarness {
    let fetcher = Rc::new(self.fetcher);
    let file_system = Rc::new(self.file_system);
    let options = LoaderOptions::new(CWD, self.host_version)
      .with_file_system(file_system.clone())
      .with_fetcher(fetcher.clone())
      .with_bare_resolver(Rc::new(self.bare_resolver));
    TestHarness {
      hooks: LoaderHooks::initialize(options).unwrap(),
      host: RecordingHost::default(),
      fetcher,
      file_system,
    }
  }
}

pub struct TestHarness {
  pub hooks: LoaderHooks,
  pub host: RecordingHost,
  pub fetcher: Rc<MemoryFetcher>,
  file_system: Rc<InMemorySys>,
}

impl TestHarness {
  /// Resolves the specifier imported from `parent`, or as the entry module
  /// when `parent` is `None`.
  pub async fn resolve(
    &self,
    specifier: &str,
    parent: Option<&ModuleSpecifier>,
  ) -> ResolveResponse {
    let context = ResolveContext {
      parent_url: parent.cloned(),
      parent_format: None,
    };
    self
      .hooks
      .resolve(specifier, &context, &self.host)
      .await
      .unwrap()
  }

  /// Runs `resolve` followed by the load hook(s) of the active protocol and
  /// returns the source handed to the host.
  pub async fn import(
    &self,
    specifier: &str,
    parent: Option<&ModuleSpecifier>,
  ) -> (ResolveResponse, String) {
    let resolved = self.resolve(specifier, parent).await;
    let source = match &self.hooks {
      LoaderHooks::UnifiedLoad(hooks) => {
        hooks
          .load(
            &resolved.url,
            &LoadContext {
              format: resolved.format,
            },
            &self.host,
          )
          .await
          .unwrap()
          .source
      }
      LoaderHooks::LegacyTriad(hooks) => {
        let format = hooks
          .get_format(&resolved.url, &self.host)
          .await
          .unwrap()
          .format;
        let source = hooks
          .get_source(&resolved.url, Some(format), &self.host)
          .await
          .unwrap()
          .source;
        // the host reads local files itself
        let source = if resolved.url.scheme() == "file" && source.is_empty() {
          self.read_file(&resolved.url)
        } else {
          source
        };
        hooks
          .transform_source(
            &source,
            &TransformSourceContext {
              url: resolved.url.clone(),
              format: Some(format),
            },
            &self.host,
          )
          .await
          .unwrap()
          .source
      }
    };
    (resolved, source)
  }

  fn read_file(&self, url: &ModuleSpecifier) -> String {
    let path = url.to_file_path().unwrap();
    self.file_system.read_to_string(&path).unwrap_or_default()
  }
}
