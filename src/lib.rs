// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Resolve raw sequencer run directories into per-project, per-sample FASTQ inputs.
//! Major functionality includes:
//! * Detect the instrument layout (HiSeq, HiSeq4000, MiSeq, NextSeq500) of a run folder
//! * Parse Illumina sample sheets into ordered projects and samples, merging
//!   rows that describe the same sample on several lanes
//! * Locate the per-lane FASTQ files of each sample following bcl2fastq/CASAVA
//!   filename conventions
//! * Consolidate the lane files into one R1 and one R2 file per sample, by symlink
//!   or by atomic concatenation, reusing up-to-date outputs on re-runs

pub mod config;
pub mod consolidate;
pub mod dataset;
pub mod errors;
pub mod filenames;
pub mod layout;
pub mod sample_sheet;
pub mod utils;

pub use crate::config::{ProjectInfo, ProjectInfos, RunConfig};
pub use crate::consolidate::Consolidated;
pub use crate::dataset::{DatasetProject, DatasetSample};
pub use crate::errors::DatasetError;
pub use crate::layout::{DatasetStructure, LayoutVariant};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The read of a paired-end sample a FASTQ file holds.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ReadDirection {
    R1,
    R2,
}

impl ReadDirection {
    pub fn both() -> [ReadDirection; 2] {
        [ReadDirection::R1, ReadDirection::R2]
    }

    pub fn suffix(self) -> &'static str {
        match self {
            ReadDirection::R1 => "R1",
            ReadDirection::R2 => "R2",
        }
    }
}

impl fmt::Display for ReadDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}
