// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Turn the per-lane FASTQ files of each sample into one file per read.
//!
//! A single lane file is exposed through a symlink, so a consolidated file
//! may be an alias of the raw data: resolve it before modifying anything.
//! Several lane files are concatenated in path order into a temporary file
//! that is renamed into place once complete. Gzip members concatenate into a
//! valid multi-member gzip stream.

use anyhow::{bail, Context, Error};
use log::{error, info, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::dataset::DatasetProject;
use crate::errors::DatasetError;
use crate::filenames::{find_raw_fastqs, FastqPattern};
use crate::utils::{self, FileTransaction};
use crate::ReadDirection;

/// What `concat_fastqs` did to produce its output.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Consolidated {
    /// Output is a symlink to the only lane file.
    Symlinked,
    /// Lane files were concatenated into a new output file.
    Merged,
    /// An existing output was kept untouched.
    Reused,
}

/// Sample name, read and what was done for it.
pub type SampleOutcome = (String, ReadDirection, Consolidated);

/// Consolidate the sorted lane files `fastqs` into `output`.
pub fn concat_fastqs(
    fastqs: &[PathBuf],
    output: impl AsRef<Path>,
    cfg: &RunConfig,
) -> Result<Consolidated, Error> {
    let output = output.as_ref();
    match fastqs {
        [] => bail!("no fastq files to consolidate into {:?}", output),
        [single] => link_fastq(single, output),
        _ => merge_fastqs(fastqs, output, cfg),
    }
}

fn link_fastq(src: &Path, output: &Path) -> Result<Consolidated, Error> {
    if output.exists() {
        info!("  {:?} exists, reusing", output);
        return Ok(Consolidated::Reused);
    }
    let dir = output.parent().unwrap_or_else(|| Path::new("."));
    if !utils::is_dir(dir) {
        return Err(DatasetError::MissingOutputDir(dir.to_path_buf()).into());
    }
    if utils::entry_exists(output) {
        warn!("  replacing dangling symlink {:?}", output);
        fs::remove_file(output).with_context(|| format!("removing {:?}", output))?;
    }

    info!("  no need to merge - symlinking {:?} -> {:?}", src, output);
    match utils::symlink(src, output) {
        Ok(()) => Ok(Consolidated::Symlinked),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            warn!("  {:?} appeared while linking, reusing", output);
            Ok(Consolidated::Reused)
        }
        Err(e) => Err(e).with_context(|| format!("symlinking {:?} -> {:?}", src, output)),
    }
}

fn merge_fastqs(fastqs: &[PathBuf], output: &Path, cfg: &RunConfig) -> Result<Consolidated, Error> {
    info!(
        "  merging {}",
        fastqs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if cfg.reuse_intermediate && utils::is_up_to_date(output, fastqs)? {
        info!("  {:?} exists, reusing", output);
        return Ok(Consolidated::Reused);
    }

    let mut tx = FileTransaction::new(output)?;
    for fq in fastqs {
        let mut inp = File::open(fq).with_context(|| format!("opening {:?}", fq))?;
        io::copy(&mut inp, tx.writer())
            .with_context(|| format!("copying {:?} into {:?}", fq, output))?;
    }
    tx.commit()?;
    Ok(Consolidated::Merged)
}

/// Consolidate R1 and R2 of every sample of a bound project. Returns one entry
/// per sample and read, in sample sheet order.
pub fn concat_project_fastqs(
    project: &DatasetProject,
    pattern: FastqPattern,
    cfg: &RunConfig,
) -> Result<Vec<SampleOutcome>, Error> {
    let paths = project
        .paths()
        .with_context(|| format!("project {:?} has no bound directories", project.name))?;
    info!(
        "Preparing fastq files for the project named {}",
        if project.name.is_empty() {
            &paths.display_name
        } else {
            &project.name
        }
    );

    if paths.merged_dir_found {
        info!("  found already merged fastq dir, skipping.");
        return Ok(Vec::new());
    }
    if project.samples().is_empty() {
        error!("  no samples found.");
        return Ok(Vec::new());
    }
    utils::safe_mkdir(&paths.fastq_dir)?;

    let mut res = Vec::new();
    for sample in project.samples() {
        for read in ReadDirection::both() {
            let fastqs = find_raw_fastqs(sample, pattern, read)?;
            let output = sample
                .fastq_fpath(read)
                .with_context(|| format!("sample {} has no output paths", sample.name))?;
            let outcome = concat_fastqs(&fastqs, output, cfg)?;
            res.push((sample.name.clone(), read, outcome));
        }
    }
    Ok(res)
}
