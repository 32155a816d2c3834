// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Projects and samples of a sequencing run.
//!
//! Both are built in two steps: the sample sheet gives their identity, and the
//! layout later binds the directories they are read from and written to. The
//! bound paths are set exactly once.

use anyhow::{bail, Error};
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::errors::DatasetError;
use crate::ReadDirection;

lazy_static! {
    static ref NON_WORD_RUN: Regex = Regex::new(r"\W+").unwrap();
}

/// Replace every run of characters other than letters, digits and `_` with a
/// single `_`. Applying it twice changes nothing.
pub fn sanitize_name(raw: &str) -> String {
    NON_WORD_RUN.replace_all(raw, "_").into_owned()
}

/// Directories and report locations of a project, fixed once the layout is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectPaths {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub display_name: String,
    /// The dataset shipped with `<source_dir>/merged`; nothing to consolidate.
    pub merged_dir_found: bool,
    pub fastq_dir: PathBuf,
    pub fastqc_dir: PathBuf,
    pub comb_fastqc_html: PathBuf,
    pub downsample_metamapping_dir: PathBuf,
    pub downsample_targqc_dir: PathBuf,
    pub downsample_targqc_report: PathBuf,
    pub project_report_html: PathBuf,
}

impl ProjectPaths {
    fn resolve(source_dir: &Path, output_dir: &Path, display_name: &str) -> ProjectPaths {
        let merged = source_dir.join("merged");
        let (merged_dir_found, fastq_dir, fastqc_dir) = if merged.is_dir() {
            info!("  found pre-merged fastq directory {:?}", merged);
            (true, merged.clone(), merged)
        } else {
            let fastq_dir = output_dir.join("fastq");
            let fastqc_dir = fastq_dir.join("FastQC");
            (false, fastq_dir, fastqc_dir)
        };
        let downsample_targqc_dir = output_dir.join("Downsample_TargQC");

        ProjectPaths {
            source_dir: source_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            display_name: display_name.to_string(),
            merged_dir_found,
            comb_fastqc_html: fastqc_dir.join("FastQC.html"),
            fastq_dir,
            fastqc_dir,
            downsample_metamapping_dir: output_dir.join("Downsample_MetaMapping"),
            downsample_targqc_report: downsample_targqc_dir.join("summary.html"),
            downsample_targqc_dir,
            project_report_html: output_dir.join(format!("{}.html", display_name)),
        }
    }
}

/// Where a sample's raw lane files live and where its consolidated reads go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplePaths {
    pub source_fastq_dir: PathBuf,
    pub fastq_dir: PathBuf,
    pub fastqc_dir: PathBuf,
    pub downsample_targqc_dir: PathBuf,
    pub l_fpath: PathBuf,
    pub r_fpath: PathBuf,
    pub l_fastqc_base_name: String,
    pub r_fastqc_base_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetSample {
    /// Name as written in the sample sheet; rows are grouped on it.
    pub raw_name: String,
    /// Sanitized name used for every output file.
    pub name: String,
    pub index: Option<String>,
    pub lane_numbers: BTreeSet<u32>,
    /// Flow cell ID, only present in HiSeq sheets.
    pub fcid: Option<String>,
    paths: Option<SamplePaths>,
}

impl DatasetSample {
    pub fn new(raw_name: &str, index: Option<String>) -> DatasetSample {
        DatasetSample {
            raw_name: raw_name.to_string(),
            name: sanitize_name(raw_name),
            index,
            lane_numbers: BTreeSet::new(),
            fcid: None,
            paths: None,
        }
    }

    pub fn bind_paths(
        &mut self,
        source_fastq_dir: PathBuf,
        project: &ProjectPaths,
    ) -> Result<(), Error> {
        if self.paths.is_some() {
            bail!("paths of sample {} are already bound", self.name);
        }
        let l_fastqc_base_name = format!("{}_R1", self.name);
        let r_fastqc_base_name = format!("{}_R2", self.name);
        self.paths = Some(SamplePaths {
            source_fastq_dir,
            fastq_dir: project.fastq_dir.clone(),
            fastqc_dir: project.fastqc_dir.clone(),
            downsample_targqc_dir: project.downsample_targqc_dir.clone(),
            l_fpath: project.fastq_dir.join(format!("{}.fastq.gz", l_fastqc_base_name)),
            r_fpath: project.fastq_dir.join(format!("{}.fastq.gz", r_fastqc_base_name)),
            l_fastqc_base_name,
            r_fastqc_base_name,
        });
        Ok(())
    }

    pub fn paths(&self) -> Option<&SamplePaths> {
        self.paths.as_ref()
    }

    pub fn source_fastq_dir(&self) -> Option<&Path> {
        self.paths.as_ref().map(|p| p.source_fastq_dir.as_path())
    }

    pub fn l_fpath(&self) -> Option<&Path> {
        self.paths.as_ref().map(|p| p.l_fpath.as_path())
    }

    pub fn r_fpath(&self) -> Option<&Path> {
        self.paths.as_ref().map(|p| p.r_fpath.as_path())
    }

    /// Consolidated output file for `read`.
    pub fn fastq_fpath(&self, read: ReadDirection) -> Option<&Path> {
        match read {
            ReadDirection::R1 => self.l_fpath(),
            ReadDirection::R2 => self.r_fpath(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetProject {
    /// Project column of the sample sheet, possibly empty.
    pub name: String,
    samples: Vec<DatasetSample>,
    paths: Option<ProjectPaths>,
    /// `BaseCallsReports` symlink in the source directory (HiSeq only).
    pub basecalls_link: Option<PathBuf>,
}

impl DatasetProject {
    pub fn new(name: &str) -> DatasetProject {
        DatasetProject {
            name: name.to_string(),
            samples: Vec::new(),
            paths: None,
            basecalls_link: None,
        }
    }

    /// Samples in sample sheet order.
    pub fn samples(&self) -> &[DatasetSample] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [DatasetSample] {
        &mut self.samples
    }

    pub fn sample(&self, raw_name: &str) -> Option<&DatasetSample> {
        self.samples.iter().find(|s| s.raw_name == raw_name)
    }

    pub fn sample_mut(&mut self, raw_name: &str) -> Option<&mut DatasetSample> {
        self.samples.iter_mut().find(|s| s.raw_name == raw_name)
    }

    pub fn add_sample(&mut self, sample: DatasetSample) -> Result<(), Error> {
        if self.sample(&sample.raw_name).is_some() {
            bail!(
                "duplicate sample {} in project {}",
                sample.raw_name,
                self.name
            );
        }
        self.samples.push(sample);
        Ok(())
    }

    /// A sample other than `raw_name` whose sanitized name is `name`.
    pub fn name_clash(&self, raw_name: &str, name: &str) -> Option<&DatasetSample> {
        self.samples
            .iter()
            .find(|s| s.name == name && s.raw_name != raw_name)
    }

    pub fn paths(&self) -> Option<&ProjectPaths> {
        self.paths.as_ref()
    }

    pub fn fastq_dirpath(&self) -> Option<&Path> {
        self.paths.as_ref().map(|p| p.fastq_dir.as_path())
    }

    pub fn merged_dir_found(&self) -> bool {
        self.paths.as_ref().map_or(false, |p| p.merged_dir_found)
    }

    /// Fix the directories of this project. `source_dir` must exist.
    pub fn bind_paths(
        &mut self,
        source_dir: &Path,
        output_dir: &Path,
        display_name: &str,
    ) -> Result<&ProjectPaths, Error> {
        if self.paths.is_some() {
            bail!("paths of project {} are already bound", self.name);
        }
        if !source_dir.is_dir() {
            let err = DatasetError::MissingSourceDir(source_dir.to_path_buf(), self.name.clone());
            return Err(err.into());
        }
        Ok(&*self
            .paths
            .insert(ProjectPaths::resolve(source_dir, output_dir, display_name)))
    }
}
