// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Resolve a sequencer run folder into bound projects and samples.
//!
//! The instrument layout is picked from the `datasets/<instrument>/` part of
//! the input path. Each layout is a `LayoutStrategy`: where a project's lane
//! files are searched, where each sample's files are, which filename
//! convention they follow, and where the demultiplexing reports are.
//!
//! A path of the form `<run>/Unalign/<project>` selects a single project of
//! the run.

use anyhow::Error;
use itertools::Itertools;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::config::{ProjectInfo, ProjectInfos, RunConfig};
use crate::consolidate::{concat_project_fastqs, SampleOutcome};
use crate::dataset::{DatasetProject, DatasetSample};
use crate::errors::DatasetError;
use crate::filenames::FastqPattern;
use crate::sample_sheet::SampleSheet;
use crate::utils::{self, BestEffort};

const UNALIGN: &str = "Unalign";
const BASECALLS_SUBDIR: [&str; 3] = ["Data", "Intensities", "BaseCalls"];
const SAMPLE_SHEET: &str = "SampleSheet.csv";
const BASECALLS_LINK: &str = "BaseCallsReports";
const HISEQ_STATS_REPORTS: [&str; 3] = ["Demultiplex_Stats.htm", "All.htm", "IVC.htm"];

/// Instrument directory conventions.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LayoutVariant {
    HiSeq,
    HiSeq4000,
    MiSeq,
    NextSeq500,
}

impl fmt::Display for LayoutVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayoutVariant::HiSeq => "HiSeq",
            LayoutVariant::HiSeq4000 => "HiSeq4000",
            LayoutVariant::MiSeq => "MiSeq",
            LayoutVariant::NextSeq500 => "NextSeq500",
        };
        f.write_str(s)
    }
}

impl LayoutVariant {
    /// Pick the layout from a `datasets/<instrument>` pair of path components,
    /// compared case-insensitively.
    pub fn detect(ds_dir: impl AsRef<Path>) -> Result<LayoutVariant, Error> {
        let ds_dir = ds_dir.as_ref();
        let components: Vec<String> = ds_dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
            .collect();

        for pair in components.windows(2) {
            if pair[0] != "datasets" {
                continue;
            }
            let variant = match pair[1].as_str() {
                "miseq" => LayoutVariant::MiSeq,
                "hiseq4000" => LayoutVariant::HiSeq4000,
                "hiseq" => LayoutVariant::HiSeq,
                "nextseq500" => LayoutVariant::NextSeq500,
                _ => continue,
            };
            return Ok(variant);
        }
        Err(DatasetError::UnsupportedLayout(ds_dir.to_path_buf()).into())
    }

    pub fn strategy(self) -> LayoutStrategy {
        match self {
            LayoutVariant::HiSeq => LayoutStrategy {
                requires_unalign: true,
                project_dir: hiseq_project_dir,
                sample_dir: hiseq_sample_dir,
                pattern: FastqPattern::SampleIndexLane,
                basecall_reports: hiseq_basecall_reports,
                links_basecalls: true,
            },
            LayoutVariant::HiSeq4000 => LayoutStrategy {
                requires_unalign: true,
                project_dir: named_project_dir,
                sample_dir: same_as_project,
                pattern: FastqPattern::SampleNumberLane,
                basecall_reports: html_index_report,
                links_basecalls: false,
            },
            LayoutVariant::MiSeq => LayoutStrategy {
                requires_unalign: false,
                project_dir: miseq_project_dir,
                sample_dir: same_as_project,
                pattern: FastqPattern::SampleNumberLane,
                basecall_reports: no_reports,
                links_basecalls: false,
            },
            LayoutVariant::NextSeq500 => LayoutStrategy {
                requires_unalign: true,
                project_dir: flat_project_dir,
                sample_dir: same_as_project,
                pattern: FastqPattern::SampleNumberOptionalLane,
                basecall_reports: html_index_report,
                links_basecalls: false,
            },
        }
    }
}

/// Directories shared by every project of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunDirs {
    pub ds_dir: PathBuf,
    pub unaligned_dir: Option<PathBuf>,
    pub basecalls_dir: PathBuf,
}

impl RunDirs {
    fn unaligned(&self) -> Result<&Path, Error> {
        match self.unaligned_dir {
            Some(ref d) => Ok(d.as_path()),
            None => {
                let unalign = self.ds_dir.join(UNALIGN);
                Err(DatasetError::MissingUnalignDir(unalign).into())
            }
        }
    }
}

/// How one instrument layout places its files.
#[derive(Clone, Copy)]
pub struct LayoutStrategy {
    pub requires_unalign: bool,
    /// Search directory of a project, from its sample sheet name.
    pub project_dir: fn(&RunDirs, &str) -> Result<PathBuf, Error>,
    /// Directory holding a sample's lane files, given its project's directory.
    pub sample_dir: fn(&Path, &DatasetSample) -> PathBuf,
    pub pattern: FastqPattern,
    pub basecall_reports: fn(&RunDirs) -> BestEffort<Vec<PathBuf>>,
    /// Put a `BaseCallsReports` symlink to the base calls into each project directory.
    pub links_basecalls: bool,
}

fn join_name(base: &Path, name: &str) -> PathBuf {
    if name.is_empty() {
        base.to_path_buf()
    } else {
        base.join(name)
    }
}

fn hiseq_project_dir(dirs: &RunDirs, name: &str) -> Result<PathBuf, Error> {
    Ok(dirs
        .unaligned()?
        .join(format!("Project_{}", name.replace(' ', "-"))))
}

fn hiseq_sample_dir(project_dir: &Path, sample: &DatasetSample) -> PathBuf {
    project_dir.join(format!("Sample_{}", sample.raw_name.replace(' ', "-")))
}

fn named_project_dir(dirs: &RunDirs, name: &str) -> Result<PathBuf, Error> {
    Ok(join_name(dirs.unaligned()?, name))
}

fn miseq_project_dir(dirs: &RunDirs, name: &str) -> Result<PathBuf, Error> {
    let base = dirs.unaligned_dir.as_deref().unwrap_or(&dirs.basecalls_dir);
    let dir = join_name(base, name);
    if dir.is_dir() {
        Ok(dir)
    } else {
        Ok(base.to_path_buf())
    }
}

fn flat_project_dir(dirs: &RunDirs, _name: &str) -> Result<PathBuf, Error> {
    Ok(dirs.unaligned()?.to_path_buf())
}

fn same_as_project(project_dir: &Path, _sample: &DatasetSample) -> PathBuf {
    project_dir.to_path_buf()
}

fn hiseq_basecall_reports(dirs: &RunDirs) -> BestEffort<Vec<PathBuf>> {
    let unalign = match dirs.unaligned_dir {
        Some(ref d) => d,
        None => return BestEffort::missing("no Unalign directory to search for Basecall_Stats_*"),
    };
    let entries = match fs::read_dir(unalign) {
        Ok(e) => e,
        Err(e) => return BestEffort::missing(format!("cannot list {:?}: {}", unalign, e)),
    };
    let stats_dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("Basecall_Stats_"))
        .map(|e| e.path())
        .sorted()
        .collect();

    match stats_dirs.as_slice() {
        [] => BestEffort::missing(format!("No Basecall_Stats_* dirs found in {:?}", unalign)),
        [dir] => BestEffort::found(
            HISEQ_STATS_REPORTS
                .iter()
                .map(|f| dir.join(f))
                .filter(|p| p.is_file())
                .collect(),
        ),
        _ => BestEffort::missing(format!(
            "More than 1 Basecall_Stats_* dirs found in {:?}",
            unalign
        )),
    }
}

fn html_index_report(dirs: &RunDirs) -> BestEffort<Vec<PathBuf>> {
    let unalign = match dirs.unaligned_dir {
        Some(ref d) => d,
        None => return BestEffort::missing("no Unalign directory to search for Reports/html"),
    };
    let index_html = unalign.join("Reports").join("html").join("index.html");
    if index_html.is_file() {
        BestEffort::found(vec![index_html])
    } else {
        BestEffort::missing(format!("basecall report {:?} not found", index_html))
    }
}

fn no_reports(_dirs: &RunDirs) -> BestEffort<Vec<PathBuf>> {
    BestEffort::found(Vec::new())
}

/// Split `<run>/Unalign/<project>/...` into the run directory and the project.
fn split_unalign(input_dir: &Path) -> (PathBuf, Option<String>) {
    let components: Vec<Component<'_>> = input_dir.components().collect();
    match components.iter().position(|c| c.as_os_str() == UNALIGN) {
        Some(pos) => {
            let ds_dir = components[..pos].iter().collect();
            let project = components
                .get(pos + 1)
                .map(|c| c.as_os_str().to_string_lossy().into_owned());
            (ds_dir, project)
        }
        None => (input_dir.to_path_buf(), None),
    }
}

fn find_sample_sheet(ds_dir: &Path, basecalls_dir: &Path) -> Result<PathBuf, Error> {
    let candidates = vec![ds_dir.join(SAMPLE_SHEET), basecalls_dir.join(SAMPLE_SHEET)];
    match candidates.iter().find(|p| p.is_file()) {
        Some(p) => Ok(p.clone()),
        None => Err(DatasetError::MissingManifest(candidates).into()),
    }
}

fn link_basecalls(basecalls_dir: &Path, project_dir: &Path) -> BestEffort<PathBuf> {
    let link = project_dir.join(BASECALLS_LINK);
    if utils::entry_exists(&link) {
        return BestEffort::found(link);
    }
    info!(
        "Creating BaseCalls symlink {:?} -> {:?}",
        basecalls_dir, link
    );
    match utils::symlink(basecalls_dir, &link) {
        Ok(()) => BestEffort::found(link),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let note = format!("{:?} appeared while linking", link);
            BestEffort::found(link).note(note)
        }
        Err(e) => BestEffort::missing(format!("Cannot create symlink {:?}: {}", link, e)),
    }
}

/// A run folder with its projects bound to source and output directories.
#[derive(Clone, Debug)]
pub struct DatasetStructure {
    pub variant: LayoutVariant,
    pub dirs: RunDirs,
    pub sample_sheet: PathBuf,
    /// Projects in sample sheet order.
    pub projects: Vec<DatasetProject>,
    pub basecall_stat_html_reports: Vec<PathBuf>,
}

impl DatasetStructure {
    /// Resolve `input_dir`. `project_infos` must hold one descriptor per
    /// sample sheet project, or a single descriptor for a single-project run.
    /// No output directory is created unless every project can be resolved.
    pub fn create(
        input_dir: impl AsRef<Path>,
        project_infos: &ProjectInfos,
        sample_sheet: Option<&Path>,
        cfg: &RunConfig,
    ) -> Result<DatasetStructure, Error> {
        let input_dir = input_dir.as_ref();
        let variant = LayoutVariant::detect(input_dir)?;
        info!("Parsing the {} project structure", variant);
        let strategy = variant.strategy();

        let (ds_dir, project_filter) = split_unalign(input_dir);

        let unalign = ds_dir.join(UNALIGN);
        let unaligned_dir = if unalign.is_dir() {
            Some(unalign)
        } else {
            warn!("No unalign directory {:?}", unalign);
            None
        };
        let basecalls_dir = BASECALLS_SUBDIR.iter().fold(ds_dir.clone(), |p, d| p.join(d));
        if !basecalls_dir.is_dir() {
            return Err(DatasetError::MissingBaseCalls(basecalls_dir).into());
        }
        let dirs = RunDirs {
            ds_dir,
            unaligned_dir,
            basecalls_dir,
        };
        if project_filter.is_some() || strategy.requires_unalign {
            dirs.unaligned()?;
        }

        let sample_sheet = match sample_sheet {
            Some(p) if p.is_file() => p.to_path_buf(),
            Some(p) => return Err(DatasetError::MissingManifest(vec![p.to_path_buf()]).into()),
            None => find_sample_sheet(&dirs.ds_dir, &dirs.basecalls_dir)?,
        };
        let mut sheet = SampleSheet::read_path(&sample_sheet, cfg)?;
        if let Some(ref name) = project_filter {
            info!("Processing sub-project {}", name);
            sheet.retain_project(name)?;
        }

        let mut projects = sheet.projects;
        let infos = match_project_infos(&projects, project_infos)?;

        // Bind every project before creating anything on disk.
        for (project, info) in projects.iter_mut().zip(&infos) {
            let source_dir = (strategy.project_dir)(&dirs, &project.name)?;
            project.bind_paths(&source_dir, &info.output_dir, &info.display_name)?;
        }

        for project in projects.iter_mut() {
            let paths = match project.paths() {
                Some(p) => p.clone(),
                None => continue,
            };
            utils::safe_mkdir(&paths.output_dir)?;
            for sample in project.samples_mut() {
                let sample_dir = (strategy.sample_dir)(&paths.source_dir, sample);
                sample.bind_paths(sample_dir, &paths)?;
            }
            if strategy.links_basecalls {
                project.basecalls_link =
                    link_basecalls(&dirs.basecalls_dir, &paths.source_dir).into_logged();
            }
        }

        let basecall_stat_html_reports = (strategy.basecall_reports)(&dirs)
            .into_logged()
            .unwrap_or_default();
        info!(
            "basecall_stat_html_reports: {:?}",
            basecall_stat_html_reports
        );

        Ok(DatasetStructure {
            variant,
            dirs,
            sample_sheet,
            projects,
            basecall_stat_html_reports,
        })
    }

    pub fn fastq_pattern(&self) -> FastqPattern {
        self.variant.strategy().pattern
    }

    pub fn project(&self, name: &str) -> Option<&DatasetProject> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn samples(&self) -> impl Iterator<Item = &DatasetSample> {
        self.projects.iter().flat_map(|p| p.samples())
    }

    /// Consolidate the lane files of every project, one project at a time.
    pub fn concat_fastqs(&self, cfg: &RunConfig) -> Result<Vec<Vec<SampleOutcome>>, Error> {
        let pattern = self.fastq_pattern();
        self.projects
            .iter()
            .map(|p| concat_project_fastqs(p, pattern, cfg))
            .collect()
    }
}

/// Pair each sheet project with its descriptor, in sheet order.
fn match_project_infos<'a>(
    projects: &[DatasetProject],
    infos: &'a ProjectInfos,
) -> Result<Vec<&'a ProjectInfo>, Error> {
    if infos.len() != projects.len() {
        return Err(DatasetError::ProjectCountMismatch {
            in_sheet: projects.len(),
            supplied: infos.len(),
        }
        .into());
    }
    projects
        .iter()
        .map(|p| {
            infos
                .resolve(&p.name)
                .ok_or_else(|| DatasetError::ProjectMatch(p.name.clone()).into())
        })
        .collect()
}
