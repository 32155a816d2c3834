// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Fatal conditions that stop the resolution of a run folder.

use std::path::PathBuf;
use thiserror::Error;

/// Every variant aborts processing of the dataset. Operations return them
/// wrapped in `anyhow::Error`; use `downcast_ref::<DatasetError>()` to match.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("malformed sample sheet {path:?}: {reason}")]
    ManifestFormat { path: PathBuf, reason: String },

    #[error("base calls directory {0:?} does not exist")]
    MissingBaseCalls(PathBuf),

    #[error(
        "sample sheet not found; looked at {}",
        .0.iter().map(|p| format!("{:?}", p)).collect::<Vec<_>>().join(", ")
    )]
    MissingManifest(Vec<PathBuf>),

    #[error(
        "directory must be under datasets/miseq/, datasets/nextseq500/, datasets/hiseq/, \
         or datasets/hiseq4000/. Found {0:?}"
    )]
    UnsupportedLayout(PathBuf),

    #[error("project {project} is not in the sample sheet {sample_sheet:?}")]
    ProjectNotFound {
        project: String,
        sample_sheet: PathBuf,
    },

    #[error(
        "the sample sheet lists {in_sheet} project(s) but {supplied} project descriptor(s) \
         were supplied; cannot correspond sub-projects to output locations"
    )]
    ProjectCountMismatch { in_sheet: usize, supplied: usize },

    #[error("no project descriptor matches sample sheet project {0:?}")]
    ProjectMatch(String),

    #[error("no fastq files for the sample {sample} ({read}) were found inside {dir:?}")]
    NoFastqFound {
        sample: String,
        read: String,
        dir: PathBuf,
    },

    #[error("Unalign directory {0:?} does not exist")]
    MissingUnalignDir(PathBuf),

    #[error("source fastq directory {0:?} for project {1:?} does not exist")]
    MissingSourceDir(PathBuf, String),

    #[error("directory {0:?} for the output fastq does not exist")]
    MissingOutputDir(PathBuf),

    #[error("sample {sample} is listed with different indices {first} and {second}")]
    IndexMismatch {
        sample: String,
        first: String,
        second: String,
    },

    #[error(
        "samples {first:?} and {second:?} of project {project:?} both write files named {name}"
    )]
    SampleNameClash {
        project: String,
        name: String,
        first: String,
        second: String,
    },
}
