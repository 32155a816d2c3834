//! Resolve and consolidate synthetic run folders of every instrument layout.

use anyhow::Error;
use fastq_dataset::{
    Consolidated, DatasetError, DatasetStructure, LayoutVariant, ProjectInfo, ProjectInfos,
    ReadDirection, RunConfig,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;

/// `<root>/datasets/<instrument>/<run>` with its base calls directory.
fn make_run(root: &Path, instrument: &str, run: &str) -> Result<PathBuf, Error> {
    let ds_dir = root.join("datasets").join(instrument).join(run);
    fs::create_dir_all(ds_dir.join("Data/Intensities/BaseCalls"))?;
    Ok(ds_dir)
}

fn write(path: &Path, content: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

fn info(root: &Path, name: &str) -> ProjectInfo {
    ProjectInfo {
        display_name: name.to_string(),
        analysis_dir: root.join("analysis").join(name),
        output_dir: root.join("out").join(name),
    }
}

fn kind(err: &Error) -> Option<&DatasetError> {
    err.downcast_ref::<DatasetError>()
}

#[test]
fn miseq_same_name_rows_merge() -> Result<(), Error> {
    let tmp = TempDir::new()?;
    let ds = make_run(tmp.path(), "miseq", "150612_M00123_0042")?;
    write(
        &ds.join("SampleSheet.csv"),
        "[Header]\nIEMFileVersion,4\n\n[Data]\n\
         Sample_ID,Sample_Name,Sample_Project,index\n\
         1,Tumor01,AURA,TAAGGCGA\n\
         2,Tumor01,AURA,CGTACTAG\n\
         3,Normal-02,AURA,AGGCAGAA\n",
    )?;
    let basecalls = ds.join("Data/Intensities/BaseCalls");
    for f in &[
        "Tumor01_S1_L001_R1_001.fastq.gz",
        "Tumor01_S1_L001_R2_001.fastq.gz",
        "Normal-02_S3_L001_R1_001.fastq.gz",
        "Normal-02_S3_L001_R2_001.fastq.gz",
    ] {
        write(&basecalls.join(f), f)?;
    }

    let infos = ProjectInfos::single(info(tmp.path(), "Bio_42_AURA"));
    let cfg = RunConfig::default();
    let ds_struct = DatasetStructure::create(&ds, &infos, None, &cfg)?;
    assert_eq!(ds_struct.variant, LayoutVariant::MiSeq);
    assert_eq!(ds_struct.dirs.unaligned_dir, None);
    assert!(ds_struct.basecall_stat_html_reports.is_empty());

    let project = ds_struct.project("AURA").unwrap();
    let names: Vec<_> = project.samples().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Tumor01", "Normal_02"]);

    let tumor = &project.samples()[0];
    assert_eq!(
        tumor.lane_numbers,
        [1].iter().copied().collect::<BTreeSet<u32>>()
    );
    assert_eq!(tumor.index.as_deref(), Some("CGTACTAG"));
    assert_eq!(tumor.source_fastq_dir(), Some(basecalls.as_path()));

    let out = tmp.path().join("out/Bio_42_AURA");
    assert_eq!(project.fastq_dirpath(), Some(out.join("fastq").as_path()));
    assert_eq!(
        tumor.l_fpath(),
        Some(out.join("fastq/Tumor01_R1.fastq.gz").as_path())
    );
    assert!(out.is_dir());

    let res = ds_struct.concat_fastqs(&cfg)?;
    assert_eq!(res.len(), 1);
    assert!(res[0].iter().all(|(_, _, c)| *c == Consolidated::Symlinked));
    assert_eq!(
        fs::read_link(out.join("fastq/Normal_02_R2.fastq.gz"))?,
        basecalls.join("Normal-02_S3_L001_R2_001.fastq.gz")
    );

    let res = ds_struct.concat_fastqs(&cfg)?;
    assert!(res[0].iter().all(|(_, _, c)| *c == Consolidated::Reused));
    Ok(())
}

#[test]
fn hiseq4000_multi_lane_merge_is_idempotent() -> Result<(), Error> {
    let tmp = TempDir::new()?;
    let ds = make_run(tmp.path(), "HiSeq4000", "160101_K00123_0001")?;
    write(
        &ds.join("SampleSheet.csv"),
        "Lane,Sample_ID,Sample_Name,index,Sample_Project\n\
         1,S1,Sample-A (1),ACGT,ProjA\n\
         2,S1,Sample-A (1),ACGT,ProjA\n",
    )?;
    let proj_dir = ds.join("Unalign/ProjA");
    for read in &["R1", "R2"] {
        for lane in &["L001", "L002"] {
            let fname = format!("Sample-A (1)_S1_{}_{}_001.fastq.gz", lane, read);
            let content = format!("l{}{}\n", &lane[3..], read.to_lowercase());
            write(&proj_dir.join(fname), &content)?;
        }
    }
    write(&ds.join("Unalign/Reports/html/index.html"), "<html/>")?;

    let infos = ProjectInfos::single(info(tmp.path(), "Bio_1"));
    let cfg = RunConfig::default();
    let ds_struct = DatasetStructure::create(&ds, &infos, None, &cfg)?;
    assert_eq!(ds_struct.variant, LayoutVariant::HiSeq4000);
    assert_eq!(
        ds_struct.basecall_stat_html_reports,
        vec![ds.join("Unalign/Reports/html/index.html")]
    );

    let sample = ds_struct.samples().next().unwrap();
    assert_eq!(sample.name, "Sample_A_1_");
    assert_eq!(
        sample.lane_numbers,
        [1, 2].iter().copied().collect::<BTreeSet<u32>>()
    );
    assert_eq!(sample.source_fastq_dir(), Some(proj_dir.as_path()));

    let res = ds_struct.concat_fastqs(&cfg)?;
    assert_eq!(
        res[0],
        vec![
            ("Sample_A_1_".to_string(), ReadDirection::R1, Consolidated::Merged),
            ("Sample_A_1_".to_string(), ReadDirection::R2, Consolidated::Merged),
        ]
    );
    let r1 = sample.l_fpath().unwrap();
    assert_eq!(fs::read_to_string(r1)?, "l1r1\nl2r1\n");
    assert_eq!(
        fs::read_to_string(sample.r_fpath().unwrap())?,
        "l1r2\nl2r2\n"
    );
    let mtime = fs::metadata(r1)?.modified()?;

    sleep(Duration::from_millis(20));
    let res = ds_struct.concat_fastqs(&cfg)?;
    assert!(res[0].iter().all(|(_, _, c)| *c == Consolidated::Reused));
    assert_eq!(fs::metadata(r1)?.modified()?, mtime);
    Ok(())
}

#[test]
fn hiseq_project_and_sample_dirs() -> Result<(), Error> {
    let tmp = TempDir::new()?;
    let ds = make_run(tmp.path(), "hiseq", "150612_SN123_0123_AH7XYZ")?;
    write(
        &ds.join("Data/Intensities/BaseCalls/SampleSheet.csv"),
        "FCID,Lane,SampleID,SampleRef,Index,Description,Control,Recipe,Operator,SampleProject\n\
         H7XYZ,3,S 1,hg19,ACGTAC,,N,,op,My Proj\n\
         H7XYZ,4,S 1,hg19,ACGTAC,,N,,op,My Proj\n",
    )?;
    let sample_dir = ds.join("Unalign/Project_My-Proj/Sample_S-1");
    write(&sample_dir.join("S-1_ACGTAC_L003_R1_001.fastq.gz"), "a")?;
    write(&sample_dir.join("S-1_ACGTAC_L004_R1_001.fastq.gz"), "b")?;
    write(&sample_dir.join("S-1_ACGTAC_L003_R2_001.fastq.gz"), "c")?;
    write(&sample_dir.join("S-1_ACGTAC_L004_R2_001.fastq.gz"), "d")?;
    write(
        &ds.join("Unalign/Basecall_Stats_H7XYZ/Demultiplex_Stats.htm"),
        "<html/>",
    )?;

    let infos = ProjectInfos::single(info(tmp.path(), "Bio_7"));
    let cfg = RunConfig::default();
    let ds_struct = DatasetStructure::create(&ds, &infos, None, &cfg)?;
    assert_eq!(ds_struct.variant, LayoutVariant::HiSeq);
    assert_eq!(
        ds_struct.sample_sheet,
        ds.join("Data/Intensities/BaseCalls/SampleSheet.csv")
    );
    assert_eq!(
        ds_struct.basecall_stat_html_reports,
        vec![ds.join("Unalign/Basecall_Stats_H7XYZ/Demultiplex_Stats.htm")]
    );

    let project = &ds_struct.projects[0];
    let link = ds.join("Unalign/Project_My-Proj/BaseCallsReports");
    assert_eq!(project.basecalls_link.as_deref(), Some(link.as_path()));
    assert_eq!(fs::read_link(&link)?, ds.join("Data/Intensities/BaseCalls"));

    let sample = &project.samples()[0];
    assert_eq!(sample.name, "S_1");
    assert_eq!(sample.fcid.as_deref(), Some("H7XYZ"));
    assert_eq!(sample.source_fastq_dir(), Some(sample_dir.as_path()));

    ds_struct.concat_fastqs(&cfg)?;
    assert_eq!(fs::read_to_string(sample.l_fpath().unwrap())?, "ab");
    assert_eq!(fs::read_to_string(sample.r_fpath().unwrap())?, "cd");

    // The link already exists on a second resolution.
    let again = DatasetStructure::create(&ds, &infos, None, &cfg)?;
    assert_eq!(
        again.projects[0].basecalls_link.as_deref(),
        Some(link.as_path())
    );
    Ok(())
}

#[test]
fn nextseq500_flat_unalign_two_projects() -> Result<(), Error> {
    let tmp = TempDir::new()?;
    let ds = make_run(tmp.path(), "NextSeq500", "160101_NS500_0001")?;
    write(
        &ds.join("SampleSheet.csv"),
        "Sample_ID,Sample_Name,Sample_Project\n\
         1,N1,P1\n\
         2,N2,P2\n",
    )?;
    let unalign = ds.join("Unalign");
    for f in &[
        "N1_S1_R1_001.fastq.gz",
        "N1_S1_R2_001.fastq.gz",
        "N2_S2_R1_001.fastq.gz",
        "N2_S2_R2_001.fastq.gz",
    ] {
        write(&unalign.join(f), f)?;
    }

    let mut infos = ProjectInfos::new();
    infos.insert("P1", info(tmp.path(), "Bio_P1"));
    infos.insert("P2", info(tmp.path(), "Bio_P2"));
    let cfg = RunConfig::default();
    let ds_struct = DatasetStructure::create(&ds, &infos, None, &cfg)?;
    assert_eq!(ds_struct.variant, LayoutVariant::NextSeq500);
    assert!(ds_struct.basecall_stat_html_reports.is_empty());

    let p2 = ds_struct.project("P2").unwrap();
    assert_eq!(p2.paths().unwrap().source_dir, unalign);
    assert_eq!(
        p2.paths().unwrap().output_dir,
        tmp.path().join("out/Bio_P2")
    );
    assert_eq!(
        p2.paths().unwrap().project_report_html,
        tmp.path().join("out/Bio_P2/Bio_P2.html")
    );

    let res = ds_struct.concat_fastqs(&cfg)?;
    assert_eq!(res.len(), 2);
    assert_eq!(
        fs::read_link(tmp.path().join("out/Bio_P2/fastq/N2_R1.fastq.gz"))?,
        unalign.join("N2_S2_R1_001.fastq.gz")
    );
    Ok(())
}

#[test]
fn descriptor_count_mismatch_creates_nothing() -> Result<(), Error> {
    let tmp = TempDir::new()?;
    let ds = make_run(tmp.path(), "miseq", "run")?;
    write(
        &ds.join("SampleSheet.csv"),
        "Sample_ID,Sample_Name,Sample_Project\n1,A,P1\n2,B,P2\n",
    )?;

    let infos = ProjectInfos::single(info(tmp.path(), "Bio_1"));
    let err = DatasetStructure::create(&ds, &infos, None, &RunConfig::default()).unwrap_err();
    assert!(matches!(
        kind(&err),
        Some(DatasetError::ProjectCountMismatch {
            in_sheet: 2,
            supplied: 1
        })
    ));
    assert!(!tmp.path().join("out").exists());
    Ok(())
}

#[test]
fn descriptor_names_must_match() -> Result<(), Error> {
    let tmp = TempDir::new()?;
    let ds = make_run(tmp.path(), "miseq", "run")?;
    write(
        &ds.join("SampleSheet.csv"),
        "Sample_ID,Sample_Name,Sample_Project\n1,A,P1\n2,B,P2\n",
    )?;

    let mut infos = ProjectInfos::new();
    infos.insert("P1", info(tmp.path(), "Bio_1"));
    infos.insert("Other", info(tmp.path(), "Bio_2"));
    let err = DatasetStructure::create(&ds, &infos, None, &RunConfig::default()).unwrap_err();
    match kind(&err) {
        Some(DatasetError::ProjectMatch(name)) => assert_eq!(name, "P2"),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!tmp.path().join("out").exists());
    Ok(())
}

#[test]
fn unalign_path_selects_one_project() -> Result<(), Error> {
    let tmp = TempDir::new()?;
    let ds = make_run(tmp.path(), "hiseq4000", "run")?;
    write(
        &ds.join("SampleSheet.csv"),
        "Lane,Sample_ID,Sample_Project\n1,A,P1\n1,B,P2\n",
    )?;
    fs::create_dir_all(ds.join("Unalign/P1"))?;
    fs::create_dir_all(ds.join("Unalign/P2"))?;

    let infos = ProjectInfos::single(info(tmp.path(), "Bio_2"));
    let ds_struct =
        DatasetStructure::create(ds.join("Unalign/P2"), &infos, None, &RunConfig::default())?;
    assert_eq!(ds_struct.dirs.ds_dir, ds);
    assert_eq!(ds_struct.projects.len(), 1);
    assert_eq!(ds_struct.projects[0].name, "P2");
    assert_eq!(ds_struct.projects[0].samples()[0].name, "B");

    let cfg = RunConfig::default();
    let err = DatasetStructure::create(ds.join("Unalign/P3"), &infos, None, &cfg).unwrap_err();
    assert!(matches!(
        kind(&err),
        Some(DatasetError::ProjectNotFound { .. })
    ));
    Ok(())
}

#[test]
fn missing_preconditions() -> Result<(), Error> {
    let tmp = TempDir::new()?;
    let infos = ProjectInfos::single(info(tmp.path(), "Bio_1"));
    let cfg = RunConfig::default();

    let unsupported = tmp.path().join("runs/x");
    let err = DatasetStructure::create(&unsupported, &infos, None, &cfg).unwrap_err();
    assert!(matches!(
        kind(&err),
        Some(DatasetError::UnsupportedLayout(_))
    ));

    let no_basecalls = tmp.path().join("datasets/miseq/empty");
    fs::create_dir_all(&no_basecalls)?;
    let err = DatasetStructure::create(&no_basecalls, &infos, None, &cfg).unwrap_err();
    assert!(matches!(
        kind(&err),
        Some(DatasetError::MissingBaseCalls(_))
    ));

    let ds = make_run(tmp.path(), "miseq", "nosheet")?;
    let err = DatasetStructure::create(&ds, &infos, None, &cfg).unwrap_err();
    match kind(&err) {
        Some(DatasetError::MissingManifest(tried)) => assert_eq!(tried.len(), 2),
        other => panic!("unexpected error {:?}", other),
    }

    let h4k = make_run(tmp.path(), "hiseq4000", "nounalign")?;
    write(
        &h4k.join("SampleSheet.csv"),
        "Lane,Sample_ID,Sample_Project\n1,A,P\n",
    )?;
    let err = DatasetStructure::create(&h4k, &infos, None, &cfg).unwrap_err();
    assert!(matches!(
        kind(&err),
        Some(DatasetError::MissingUnalignDir(_))
    ));
    Ok(())
}

#[test]
fn explicit_sample_sheet_and_missing_fastqs() -> Result<(), Error> {
    let tmp = TempDir::new()?;
    let ds = make_run(tmp.path(), "miseq", "run")?;
    let sheet = tmp.path().join("sheets/custom.csv");
    write(&sheet, "Sample_ID,Sample_Name,Sample_Project\n1,Ghost,P\n")?;

    let infos = ProjectInfos::single(info(tmp.path(), "Bio_1"));
    let cfg = RunConfig::default();
    let ds_struct = DatasetStructure::create(&ds, &infos, Some(&sheet), &cfg)?;
    assert_eq!(ds_struct.sample_sheet, sheet);

    let err = ds_struct.concat_fastqs(&cfg).unwrap_err();
    match kind(&err) {
        Some(DatasetError::NoFastqFound { sample, read, .. }) => {
            assert_eq!(sample, "Ghost");
            assert_eq!(read, "R1");
        }
        other => panic!("unexpected error {:?}", other),
    }

    let err = DatasetStructure::create(&ds, &infos, Some(&tmp.path().join("nope.csv")), &cfg)
        .unwrap_err();
    assert!(matches!(
        kind(&err),
        Some(DatasetError::MissingManifest(_))
    ));
    Ok(())
}

/// A HiSeq run with one project and no sample data.
fn make_hiseq_run(root: &Path) -> Result<PathBuf, Error> {
    let ds = make_run(root, "hiseq", "150612_SN123_0124_BH7XYZ")?;
    write(
        &ds.join("SampleSheet.csv"),
        "FCID,Lane,SampleID,SampleRef,Index,Description,Control,Recipe,Operator,SampleProject\n\
         H7XYZ,1,S1,hg19,ACGTAC,,N,,op,P\n",
    )?;
    fs::create_dir_all(ds.join("Unalign/Project_P/Sample_S1"))?;
    Ok(ds)
}

#[test]
fn hiseq_without_basecall_stats() -> Result<(), Error> {
    let tmp = TempDir::new()?;
    let ds = make_hiseq_run(tmp.path())?;
    let infos = ProjectInfos::single(info(tmp.path(), "Bio_1"));

    let ds_struct = DatasetStructure::create(&ds, &infos, None, &RunConfig::default())?;
    assert!(ds_struct.basecall_stat_html_reports.is_empty());
    assert_eq!(ds_struct.projects.len(), 1);
    Ok(())
}

#[test]
fn hiseq_with_ambiguous_basecall_stats() -> Result<(), Error> {
    let tmp = TempDir::new()?;
    let ds = make_hiseq_run(tmp.path())?;
    write(
        &ds.join("Unalign/Basecall_Stats_A/Demultiplex_Stats.htm"),
        "<html/>",
    )?;
    write(
        &ds.join("Unalign/Basecall_Stats_B/Demultiplex_Stats.htm"),
        "<html/>",
    )?;
    let infos = ProjectInfos::single(info(tmp.path(), "Bio_1"));

    let ds_struct = DatasetStructure::create(&ds, &infos, None, &RunConfig::default())?;
    assert!(ds_struct.basecall_stat_html_reports.is_empty());
    assert!(ds_struct.projects[0].basecalls_link.is_some());
    Ok(())
}
