// Copyright 2018-2024 the Deno authors. MIT license.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use futures::future::LocalBoxFuture;
use futures::future::Shared;
use futures::FutureExt;

use crate::source::FetchError;
use crate::source::Fetcher;
use crate::ModuleSpecifier;

pub type NetworkModuleFuture =
  Shared<LocalBoxFuture<'static, Result<Arc<str>, FetchError>>>;

/// Process lifetime cache of remote module text.
///
/// The pending future is stored on the first request, so concurrent imports
/// of the same URL share a single fetch. Entries are never evicted and a
/// failed fetch stays failed.
pub struct NetworkModuleCache {
  fetcher: Rc<dyn Fetcher>,
  entries: RefCell<HashMap<ModuleSpecifier, NetworkModuleFuture>>,
}

impl fmt::Debug for NetworkModuleCache {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NetworkModuleCache")
      .field("fetcher", &self.fetcher)
      .field("entries", &self.entries.borrow().keys().collect::<Vec<_>>())
      .finish()
  }
}

impl NetworkModuleCache {
  pub fn new(fetcher: Rc<dyn Fetcher>) -> Self {
    Self {
      fetcher,
      entries: Default::default(),
    }
  }

  pub fn fetch(&self, specifier: &ModuleSpecifier) -> NetworkModuleFuture {
    let mut entries = self.entries.borrow_mut();
    if let Some(future) = entries.get(specifier) {
      return future.clone();
    }
    log::debug!("Fetching {}", specifier);
    let fetcher = self.fetcher.clone();
    let fetch_specifier = specifier.clone();
    let future = async move {
      fetcher
        .fetch_text(&fetch_specifier)
        .await
        .map(Arc::<str>::from)
    }
    .boxed_local()
    .shared();
    entries.insert(specifier.clone(), future.clone());
    future
  }

  pub fn contains(&self, specifier: &ModuleSpecifier) -> bool {
    self.entries.borrow().contains_key(specifier)
  }

  pub fn len(&self) -> usize {
    self.entries.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.borrow().is_empty()
  }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use async_trait::async_trait;
  use pretty_assertions::assert_eq;

  use super::*;

  #[derive(Debug, Default)]
  struct CountingFetcher {
    calls: Cell<usize>,
    fail: bool,
  }

  #[async_trait(?Send)]
  impl Fetcher for CountingFetcher {
    async fn fetch_text(
      &self,
      specifier: &ModuleSpecifier,
    ) -> Result<String, FetchError> {
      self.calls.set(self.calls.get() + 1);
      tokio::task::yield_now().await;
      if self.fail {
        Err(FetchError::new(specifier.clone(), "network down"))
      } else {
        Ok(format!("export default {:?};", specifier.as_str()))
      }
    }
  }

  fn url(text: &str) -> ModuleSpecifier {
    ModuleSpecifier::parse(text).unwrap()
  }

  #[tokio::test]
  async fn concurrent_fetches_share_one_request() {
    let fetcher = Rc::new(CountingFetcher::default());
    let cache = NetworkModuleCache::new(fetcher.clone());
    let specifier = url("https://example.com/mod.ts");
    let first = cache.fetch(&specifier);
    let second = cache.fetch(&specifier);
    let (first, second) = futures::join!(first, second);
    assert_eq!(fetcher.calls.get(), 1);
    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test]
  async fn completed_fetch_is_reused() {
    let fetcher = Rc::new(CountingFetcher::default());
    let cache = NetworkModuleCache::new(fetcher.clone());
    let specifier = url("https://example.com/mod.ts");
    let text = cache.fetch(&specifier).await.unwrap();
    assert_eq!(&*text, "export default \"https://example.com/mod.ts\";");
    cache.fetch(&specifier).await.unwrap();
    assert_eq!(fetcher.calls.get(), 1);

    cache.fetch(&url("https://example.com/other.ts")).await.unwrap();
    assert_eq!(fetcher.calls.get(), 2);
    assert!(cache.contains(&url("https://example.com/other.ts")));
  }

  #[tokio::test]
  async fn failures_are_cached() {
    let fetcher = Rc::new(CountingFetcher {
      fail: true,
      ..Default::default()
    });
    let cache = NetworkModuleCache::new(fetcher.clone());
    let specifier = url("https://example.com/mod.ts");
    let err = cache.fetch(&specifier).await.unwrap_err();
    assert_eq!(err.specifier, specifier);
    assert!(cache.fetch(&specifier).await.is_err());
    assert_eq!(fetcher.calls.get(), 1);
  }
}
