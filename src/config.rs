// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Run-level settings and the externally assigned project descriptors.

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Options that change how a dataset is resolved and consolidated.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(default)]
pub struct RunConfig {
    /// Keep an existing merged FASTQ if it is at least as new as every lane file.
    pub reuse_intermediate: bool,
    /// Fail instead of merging when rows with the same sample name carry
    /// different indices, or when two samples of a project sanitize to the
    /// same output name.
    pub strict_index: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            reuse_intermediate: true,
            strict_index: false,
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<RunConfig, Error> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("opening run config {:?}", path))?;
        let cfg = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parsing run config {:?}", path))?;
        Ok(cfg)
    }
}

/// Where the outputs of one sample sheet project go.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ProjectInfo {
    /// Human readable project name, used for the project report file name.
    pub display_name: String,
    pub analysis_dir: PathBuf,
    /// Root of the per-project outputs (`fastq/`, `Downsample_TargQC/`, ...).
    pub output_dir: PathBuf,
}

/// Expected projects keyed by their sample sheet name.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
#[serde(transparent)]
pub struct ProjectInfos(BTreeMap<String, ProjectInfo>);

impl ProjectInfos {
    pub fn new() -> Self {
        ProjectInfos::default()
    }

    /// A run with one project: the descriptor applies whatever the sheet calls it.
    pub fn single(info: ProjectInfo) -> Self {
        let mut infos = ProjectInfos::new();
        infos.insert("", info);
        infos
    }

    pub fn insert(&mut self, sheet_name: impl Into<String>, info: ProjectInfo) {
        self.0.insert(sheet_name.into(), info);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, sheet_name: &str) -> Option<&ProjectInfo> {
        self.0.get(sheet_name)
    }

    /// The descriptor for sheet project `sheet_name`, if one can be chosen
    /// unambiguously.
    pub fn resolve(&self, sheet_name: &str) -> Option<&ProjectInfo> {
        if self.0.len() == 1 {
            return self.0.values().next();
        }
        self.0.get(sheet_name)
    }
}
