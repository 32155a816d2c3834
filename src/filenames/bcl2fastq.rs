// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

use anyhow::Error;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ReadDirection;

lazy_static! {
    static ref SEPARATOR_RUN: Regex = Regex::new(r"[\W_]+").unwrap();
}

/// Filename conventions of the demultiplexers behind each run layout.
/// All files end in `<read><anything>.fastq.gz`, e.g. `_R1_001.fastq.gz`.
#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum FastqPattern {
    /// CASAVA: `<name>_<index>_L001_R1_001.fastq.gz`. Samples without an
    /// index use `NoIndex`.
    SampleIndexLane,
    /// bcl2fastq split by lane: `<name>_S1_L001_R1_001.fastq.gz`
    SampleNumberLane,
    /// bcl2fastq with or without `--no-lane-splitting`:
    /// `<name>_S1_R1_001.fastq.gz` or `<name>_S1_L001_R1_001.fastq.gz`
    SampleNumberOptionalLane,
}

impl FastqPattern {
    /// Anchored regex for the lane files of a sample named `name`.
    pub fn regex(
        self,
        name: &str,
        index: Option<&str>,
        read: ReadDirection,
    ) -> Result<Regex, Error> {
        let name = sample_name_pattern(name);
        let middle = match self {
            FastqPattern::SampleIndexLane => {
                format!("_{}_L\\d{{3}}", regex::escape(index.unwrap_or("NoIndex")))
            }
            FastqPattern::SampleNumberLane => r"_S\d+_L\d{3}".to_string(),
            FastqPattern::SampleNumberOptionalLane => r"_S\d+(?:_L\d{3})?".to_string(),
        };
        let pattern = format!(r"^{}{}_{}.*\.fastq\.gz$", name, middle, read.suffix());
        Ok(Regex::new(&pattern)?)
    }
}

/// Regex fragment matching a (sanitized) sample name against the raw name
/// the demultiplexer used. Every run of separators matches one or more
/// non-word or `_` characters; a trailing run may also match none.
pub fn sample_name_pattern(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len() * 2);
    let mut last = 0;
    for m in SEPARATOR_RUN.find_iter(name) {
        pattern.push_str(&regex::escape(&name[last..m.start()]));
        if m.end() == name.len() {
            pattern.push_str(r"[\W_]*");
        } else {
            pattern.push_str(r"[\W_]+");
        }
        last = m.end();
    }
    pattern.push_str(&regex::escape(&name[last..]));
    pattern
}
