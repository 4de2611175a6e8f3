// Copyright 2018-2024 the Deno authors. MIT license.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::ModuleSpecifier;

mod file_system;

#[cfg(test)]
pub(crate) use file_system::testing;
pub use file_system::FileSystem;

/// A failed network fetch. Cloning is cheap so every waiter on a shared
/// fetch receives the same error.
#[derive(Debug, Clone, Error, deno_error::JsError)]
#[class(generic)]
#[error("Failed fetching '{specifier}'.")]
pub struct FetchError {
  pub specifier: ModuleSpecifier,
  #[source]
  pub source: Arc<dyn std::error::Error + Send + Sync>,
}

impl FetchError {
  pub fn new(
    specifier: ModuleSpecifier,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
  ) -> Self {
    Self {
      specifier,
      source: Arc::from(err.into()),
    }
  }
}

/// Retrieves the text of a remote module.
#[async_trait(?Send)]
pub trait Fetcher: fmt::Debug {
  async fn fetch_text(
    &self,
    specifier: &ModuleSpecifier,
  ) -> Result<String, FetchError>;
}

/// Fetches over HTTP(S). Any non-success status is treated as a failure.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new(client: reqwest::Client) -> Self {
    Self { client }
  }
}

#[async_trait(?Send)]
impl Fetcher for HttpFetcher {
  async fn fetch_text(
    &self,
    specifier: &ModuleSpecifier,
  ) -> Result<String, FetchError> {
    let response = self
      .client
      .get(specifier.clone())
      .send()
      .await
      .and_then(|response| response.error_for_status())
      .map_err(|err| FetchError::new(specifier.clone(), err))?;
    response
      .text()
      .await
      .map_err(|err| FetchError::new(specifier.clone(), err))
  }
}
