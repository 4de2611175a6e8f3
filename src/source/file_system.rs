// Copyright 2018-2024 the Deno authors. All rights reserved. MIT license.

use std::fmt;
use std::io;
use std::path::Path;

use sys_traits::FsMetadata;
use sys_traits::FsRead;

/// The file system operations used for probing candidates and reading
/// module sources.
///
/// Every `sys_traits` system implements this, so pass `RealSys` for the
/// disk or an `InMemorySys` in tests.
pub trait FileSystem: fmt::Debug {
  fn is_file(&self, path: &Path) -> bool;
  fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

impl<TSys: FsMetadata + FsRead + fmt::Debug> FileSystem for TSys {
  fn is_file(&self, path: &Path) -> bool {
    match self.fs_is_file(path) {
      Ok(is_file) => is_file,
      Err(err)
        if matches!(
          err.kind(),
          io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
        ) =>
      {
        false
      }
      Err(err) => {
        log::debug!("Failed reading metadata of {}: {:#}", path.display(), err);
        false
      }
    }
  }

  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    self.fs_read_to_string(path).map(|text| text.into_owned())
  }
}
