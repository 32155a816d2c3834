// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Utility methods.

use anyhow::{Context, Error};
use log::warn;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

/// Outcome of a lookup that must never fail its caller. `value` is `None`
/// when nothing usable was found; `diagnostics` explains why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BestEffort<T> {
    pub value: Option<T>,
    pub diagnostics: Vec<String>,
}

impl<T> BestEffort<T> {
    pub fn found(value: T) -> Self {
        BestEffort {
            value: Some(value),
            diagnostics: Vec::new(),
        }
    }

    pub fn missing(reason: impl Into<String>) -> Self {
        BestEffort {
            value: None,
            diagnostics: vec![reason.into()],
        }
    }

    pub fn note(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostics.push(diagnostic.into());
        self
    }

    /// Emit the diagnostics as warnings and hand back the value.
    pub fn into_logged(self) -> Option<T> {
        for d in &self.diagnostics {
            warn!("{}", d);
        }
        self.value
    }
}

pub fn is_dir(p: impl AsRef<Path>) -> bool {
    p.as_ref().is_dir()
}

/// A path entry exists, including a dangling symlink.
pub fn entry_exists(p: impl AsRef<Path>) -> bool {
    fs::symlink_metadata(p.as_ref()).is_ok()
}

#[cfg(unix)]
pub fn symlink(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
pub fn symlink(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> io::Result<()> {
    if src.as_ref().is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

/// Create `dir` and its parents if missing, returning it.
pub fn safe_mkdir(dir: impl AsRef<Path>) -> Result<PathBuf, Error> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("creating directory {:?}", dir))?;
    Ok(dir.to_path_buf())
}

/// True when `target` is a regular file (not a symlink) whose modification
/// time is no older than that of any of `sources`.
pub fn is_up_to_date(target: impl AsRef<Path>, sources: &[PathBuf]) -> Result<bool, Error> {
    let target = target.as_ref();
    let meta = match fs::symlink_metadata(target) {
        Ok(m) => m,
        Err(_) => return Ok(false),
    };
    if !meta.file_type().is_file() {
        return Ok(false);
    }
    let target_mtime = meta.modified()?;

    for src in sources {
        let src_mtime = fs::metadata(src)
            .and_then(|m| m.modified())
            .with_context(|| format!("reading modification time of {:?}", src))?;
        if src_mtime > target_mtime {
            return Ok(false);
        }
    }
    Ok(true)
}

/// A temporary file created with the mode a plain `File::create` would get.
#[cfg(unix)]
fn temp_file_in(dir: &Path) -> io::Result<NamedTempFile> {
    use std::os::unix::fs::PermissionsExt;
    Builder::new()
        .permissions(fs::Permissions::from_mode(0o666))
        .tempfile_in(dir)
}

#[cfg(not(unix))]
fn temp_file_in(dir: &Path) -> io::Result<NamedTempFile> {
    Builder::new().tempfile_in(dir)
}

/// Write a file next to its final location and move it into place only once
/// it is complete. Dropping the transaction without `commit` removes the
/// partial file.
pub struct FileTransaction {
    target: PathBuf,
    writer: BufWriter<NamedTempFile>,
}

impl FileTransaction {
    pub fn new(target: impl AsRef<Path>) -> Result<FileTransaction, Error> {
        let target = target.as_ref().to_path_buf();
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp = temp_file_in(&dir)
            .with_context(|| format!("creating temporary file in {:?}", dir))?;
        Ok(FileTransaction {
            target,
            writer: BufWriter::new(tmp),
        })
    }

    pub fn writer(&mut self) -> &mut impl Write {
        &mut self.writer
    }

    pub fn commit(self) -> Result<PathBuf, Error> {
        let target = self.target;
        let tmp = self
            .writer
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("flushing temporary file for {:?}", target))?;
        tmp.persist(&target)
            .map_err(|e| e.error)
            .with_context(|| format!("moving temporary file into place at {:?}", target))?;
        Ok(target)
    }
}
