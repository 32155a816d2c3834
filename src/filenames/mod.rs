// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Utilities for finding the per-lane FASTQ files of a sample on disk.

pub mod bcl2fastq;

use anyhow::{Context, Error};
use log::info;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::dataset::DatasetSample;
use crate::errors::DatasetError;
use crate::ReadDirection;

pub use bcl2fastq::FastqPattern;

/// A method to find a set of FASTQ files based on
/// some configuration information held by `self`,
/// and some conventions encoded in the implementing
/// type
pub trait FindFastqs {
    fn find_fastqs(&self) -> Result<Vec<PathBuf>, Error>;
}

/// The lane files of one read of one sample, located in a single directory.
#[derive(Clone, Debug)]
pub struct LaneFastqDef {
    pub fastq_path: PathBuf,
    pub sample_name: String,
    pub read: ReadDirection,
    pub regex: Regex,
}

impl LaneFastqDef {
    pub fn new(
        sample: &DatasetSample,
        fastq_path: impl AsRef<Path>,
        pattern: FastqPattern,
        read: ReadDirection,
    ) -> Result<LaneFastqDef, Error> {
        Ok(LaneFastqDef {
            fastq_path: fastq_path.as_ref().to_path_buf(),
            sample_name: sample.name.clone(),
            read,
            regex: pattern.regex(&sample.name, sample.index.as_deref(), read)?,
        })
    }
}

impl FindFastqs for LaneFastqDef {
    /// Matching files sorted by path, so lanes concatenate in a stable order.
    /// Finding none is an error.
    fn find_fastqs(&self) -> Result<Vec<PathBuf>, Error> {
        let dir_files = std::fs::read_dir(&self.fastq_path)
            .with_context(|| format!("listing fastq directory {:?}", self.fastq_path))?;

        let mut res = Vec::new();
        for f in dir_files {
            let path = f?.path();
            let matched = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| self.regex.is_match(n));
            if matched {
                res.push(path);
            }
        }
        res.sort();

        if res.is_empty() {
            return Err(DatasetError::NoFastqFound {
                sample: self.sample_name.clone(),
                read: self.read.to_string(),
                dir: self.fastq_path.clone(),
            }
            .into());
        }
        info!(
            "{}: found raw fastq files {}",
            self.sample_name,
            res.iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(res)
    }
}

/// Lane files for `read` of a sample whose paths are bound.
pub fn find_raw_fastqs(
    sample: &DatasetSample,
    pattern: FastqPattern,
    read: ReadDirection,
) -> Result<Vec<PathBuf>, Error> {
    let dir = sample
        .source_fastq_dir()
        .with_context(|| format!("sample {} has no source fastq directory", sample.name))?;
    LaneFastqDef::new(sample, dir, pattern, read)?.find_fastqs()
}
