// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Parse Illumina sample sheets into ordered projects and samples.
//!
//! Three dialects are recognized by the first column of their header line:
//! `Sample_ID,` (MiSeq), `FCID,` (HiSeq) and `Lane,` (HiSeq4000 / NextSeq500).
//! Everything before the first header is ignored, and every later header line
//! replaces the active column names. Rows are split on bare commas; quoted
//! fields are not supported.

use anyhow::{Context, Error};
use log::{info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::dataset::{DatasetProject, DatasetSample};
use crate::errors::DatasetError;

const HEADER_PREFIXES: [&str; 3] = ["Sample_ID,", "FCID,", "Lane,"];
const PROJECT_COLUMNS: [&str; 3] = ["Sample_Project", "SampleProject", "Project"];
// SampleRef holds the reference genome in HiSeq sheets, so it only serves as a last resort.
const SAMPLE_NAME_COLUMNS: [&str; 5] = [
    "Sample_Name",
    "SampleName",
    "SampleID",
    "Sample_ID",
    "SampleRef",
];
const INDEX_COLUMNS: [&str; 2] = ["index", "Index"];

fn is_header(line: &str) -> bool {
    HEADER_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// One data line zipped against the active header.
struct SheetRow<'a> {
    fields: HashMap<&'a str, &'a str>,
}

impl<'a> SheetRow<'a> {
    fn new(keys: &'a [String], line: &'a str) -> SheetRow<'a> {
        SheetRow {
            fields: keys.iter().map(String::as_str).zip(line.split(',')).collect(),
        }
    }

    fn get(&self, column: &str) -> Option<&'a str> {
        self.fields.get(column).copied()
    }

    /// Value of the first of `columns` present in the row, even if empty.
    fn first_present(&self, columns: &[&str]) -> Option<&'a str> {
        columns.iter().find_map(|c| self.get(c))
    }

    fn first_non_empty(&self, columns: &[&str]) -> Option<&'a str> {
        columns
            .iter()
            .filter_map(|c| self.get(c))
            .find(|v| !v.is_empty())
    }
}

/// The projects of a sample sheet, in the order they first appear.
#[derive(Clone, Debug)]
pub struct SampleSheet {
    pub path: PathBuf,
    pub projects: Vec<DatasetProject>,
}

impl SampleSheet {
    pub fn read_path(path: impl AsRef<Path>, cfg: &RunConfig) -> Result<SampleSheet, Error> {
        let path = path.as_ref();
        info!("Parsing sample sheet {:?}", path);
        let f = File::open(path).with_context(|| format!("opening sample sheet {:?}", path))?;
        SampleSheet::from_reader(BufReader::new(f), path, cfg)
    }

    /// Parse sample sheet text. `path` is only used in messages.
    pub fn from_reader<R: BufRead>(
        rdr: R,
        path: impl AsRef<Path>,
        cfg: &RunConfig,
    ) -> Result<SampleSheet, Error> {
        let mut sheet = SampleSheet {
            path: path.as_ref().to_path_buf(),
            projects: Vec::new(),
        };
        let mut keys: Option<Vec<String>> = None;

        for (i, line) in rdr.lines().enumerate() {
            let line = line.with_context(|| format!("reading sample sheet {:?}", sheet.path))?;
            let line = line.trim_start_matches('\u{feff}').trim();

            if is_header(line) {
                keys = Some(line.split(',').map(String::from).collect());
                continue;
            }
            let keys = match keys {
                Some(ref k) => k,
                None => continue,
            };
            if line.is_empty() || line.starts_with('[') || line.chars().all(|c| c == ',') {
                continue;
            }
            sheet.add_row(&SheetRow::new(keys, line), i + 1, cfg)?;
        }

        if keys.is_none() {
            return Err(DatasetError::ManifestFormat {
                path: sheet.path,
                reason: "no header line starting with Sample_ID, FCID or Lane".to_string(),
            }
            .into());
        }
        Ok(sheet)
    }

    fn format_error(&self, line_no: usize, reason: String) -> Error {
        DatasetError::ManifestFormat {
            path: self.path.clone(),
            reason: format!("line {}: {}", line_no, reason),
        }
        .into()
    }

    fn add_row(
        &mut self,
        row: &SheetRow<'_>,
        line_no: usize,
        cfg: &RunConfig,
    ) -> Result<(), Error> {
        let project_name = match row.first_present(&PROJECT_COLUMNS) {
            None => {
                warn!(
                    "  no SampleProject or Sample_Project field in the sample sheet {:?}",
                    self.path
                );
                ""
            }
            Some("") => {
                warn!(
                    "  SampleProject/Sample_Project field is empty in the sample sheet {:?}",
                    self.path
                );
                ""
            }
            Some(p) => p,
        };

        let raw_name = match row.first_non_empty(&SAMPLE_NAME_COLUMNS) {
            Some(n) => n,
            None => {
                let reason = "row has no sample name".to_string();
                return Err(self.format_error(line_no, reason));
            }
        };

        let lane = match row.get("Lane") {
            None | Some("") => 1,
            Some(l) => match l.parse::<u32>() {
                Ok(lane) => lane,
                Err(_) => {
                    let reason = format!("invalid lane number {:?}", l);
                    return Err(self.format_error(line_no, reason));
                }
            },
        };
        let index = row.first_non_empty(&INDEX_COLUMNS).map(String::from);

        let pos = match self.projects.iter().position(|p| p.name == project_name) {
            Some(pos) => pos,
            None => {
                self.projects.push(DatasetProject::new(project_name));
                self.projects.len() - 1
            }
        };
        let project = &mut self.projects[pos];

        match project.sample_mut(raw_name) {
            Some(sample) => {
                sample.lane_numbers.insert(lane);
                if let Some(index) = index {
                    if let Some(prev) = sample.index.as_ref().filter(|p| **p != index) {
                        if cfg.strict_index {
                            return Err(DatasetError::IndexMismatch {
                                sample: raw_name.to_string(),
                                first: prev.clone(),
                                second: index,
                            }
                            .into());
                        }
                        warn!(
                            "  sample {} is listed with indices {} and {}; keeping {}",
                            raw_name, prev, index, index
                        );
                    }
                    sample.index = Some(index);
                }
            }
            None => {
                let mut sample = DatasetSample::new(raw_name, index);
                if let Some(other) = project.name_clash(raw_name, &sample.name) {
                    if cfg.strict_index {
                        return Err(DatasetError::SampleNameClash {
                            project: project_name.to_string(),
                            name: sample.name,
                            first: other.raw_name.clone(),
                            second: raw_name.to_string(),
                        }
                        .into());
                    }
                    warn!(
                        "  samples {:?} and {:?} both write {}_R1/R2.fastq.gz",
                        other.raw_name, raw_name, sample.name
                    );
                }
                info!("  {}: {}", project_name, sample.name);
                sample.lane_numbers.insert(lane);
                sample.fcid = row.get("FCID").map(String::from);
                project.add_sample(sample)?;
            }
        }
        Ok(())
    }

    pub fn project(&self, name: &str) -> Option<&DatasetProject> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Narrow the sheet down to the project called `name`.
    pub fn retain_project(&mut self, name: &str) -> Result<(), Error> {
        if self.project(name).is_none() {
            return Err(DatasetError::ProjectNotFound {
                project: name.to_string(),
                sample_sheet: self.path.clone(),
            }
            .into());
        }
        self.projects.retain(|p| p.name == name);
        Ok(())
    }
}
