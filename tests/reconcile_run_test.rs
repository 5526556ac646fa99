use anyhow::Result;
use pid_reconciler::pipeline::{pre_processed_name, processed_name, Phase, Pipeline};
use pid_reconciler::storage::{read_table, CsvTableSink, MemorySink};
use pid_reconciler::{Config, ReconcileError};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const MASTER: &str = "\
PID,parent_PID,content_model,title,filetype,file_size,file_path
LIB-foo:1,LIB-foo:collection,newspaperIssueCModel,Issue 1,,,
LIB-foo:2,LIB-foo:collection,islandora:bookCModel,Book 2,,,
LIB-foo:3,LIB-foo:root,sp_large_image_cmodel,Map 3,image/jp2,5000,/maps/3.jp2
LIB-foo:4,LIB-foo:root,sp-audioCmodel,Song 4,,,
";

const HEADER: &str =
    "PID,filetype,file_size,institution,Collection_name,file_path,mods_path,rdf_path\n";

fn write_fixture(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn write_inputs(dir: &Path) {
    write_fixture(dir, "master.csv", MASTER);
    write_fixture(
        dir,
        "pdf.csv",
        &format!(
            "{HEADER}\
             LIB-foo:1,application/pdf,12500,LIB,LIB-foo:collection,/pdf/1.pdf,/mods/1,/rdf/1\n\
             LIB-foo:2,application/pdf,2000,LIB,LIB-foo:collection,/pdf/2.pdf,/mods/2,/rdf/2\n\
             LIB-bar:9,application/pdf,1,LIB,LIB-bar:collection,/pdf/9.pdf,/mods/9,/rdf/9\n"
        ),
    );
    write_fixture(
        dir,
        "obj.csv",
        &format!(
            "{HEADER}\
             LIB-foo:2,image/tiff,8000,LIB,LIB-foo:collection,/obj/2.tif,/mods/2,/rdf/2\n\
             LIB-foo:4,audio/mpeg,3000,LIB,LIB-foo:collection,/obj/4.mp3,/mods/4,/rdf/4\n"
        ),
    );
    write_fixture(
        dir,
        "mods.csv",
        &format!(
            "{HEADER}\
             LIB-foo:1,,,LIB,LIB-foo:collection,,/mods/1,/rdf/1\n"
        ),
    );
    write_fixture(
        dir,
        "reconcile.toml",
        r#"
master_path = "master.csv"
output_dir = "out"
collection_url_base = "https://digital.example.edu/"

[[datastream_sources]]
name = "pdf"
path = "pdf.csv"

[[datastream_sources]]
name = "obj"
path = "obj.csv"

[[datastream_sources]]
name = "mods"
path = "mods.csv"
"#,
    );
}

#[test]
fn test_merge_then_post_process() -> Result<()> {
    let temp_dir = tempdir()?;
    write_inputs(temp_dir.path());

    let config = Config::load(temp_dir.path().join("reconcile.toml"))?;
    let mut sink = CsvTableSink::new(&config.output_dir);
    let pipeline = Pipeline::new(config)?;

    let merged = pipeline.run_merge(&mut sink)?;
    assert_eq!(merged.phase, Phase::Merge);
    assert_eq!(merged.dataset, "LIB-foo");
    assert_eq!(merged.input_rows, 4);
    // 1: pdf + mods, 2: pdf + obj, 3: none, 4: obj
    assert_eq!(merged.expanded_rows, 6);
    assert!(merged.output_file.ends_with("pre-processed-full-LIB-foo-output.csv"));

    let processed = pipeline.run_post_process(&mut sink)?;
    assert_eq!(processed.input_rows, 6);
    assert_eq!(processed.output_rows, 4);
    assert_eq!(processed.dropped_duplicates, 2);

    let out = read_table(temp_dir.path().join("out").join(processed_name("LIB-foo")))?;
    assert_eq!(out.len(), 4);

    let issue: Vec<_> = out.find_by_pid("LIB-foo:1").collect();
    assert_eq!(issue.len(), 1);
    assert_eq!(issue[0].get("filetype"), Some("application/pdf"));
    assert_eq!(issue[0].get("file_size"), Some("12.5Kb"));
    assert_eq!(issue[0].get("institution"), Some("LIB"));
    assert_eq!(issue[0].get("Collection_name"), Some("LIB-foo:collection"));
    assert_eq!(
        issue[0].get("mods_path"),
        Some("https://digital.example.edu/islandora/object/LIB-foo:1/datastream/MODS/download")
    );

    // Book is not file-bearing: both fan-out rows are blanked, the first survives.
    let book: Vec<_> = out.find_by_pid("LIB-foo:2").collect();
    assert_eq!(book.len(), 1);
    assert_eq!(book[0].get("filetype"), Some(""));
    assert_eq!(book[0].get("file_path"), Some(""));
    assert_eq!(
        book[0].get("rdf_path"),
        Some("https://digital.example.edu/islandora/object/LIB-foo:2/datastream/RELS-EXT/download")
    );

    let map: Vec<_> = out.find_by_pid("LIB-foo:3").collect();
    assert_eq!(map[0].get("file_size"), Some("5Kb"));
    assert_eq!(map[0].get("title"), Some("Map 3"));

    let song: Vec<_> = out.find_by_pid("LIB-foo:4").collect();
    assert_eq!(song[0].get("file_size"), Some("3Kb"));
    assert_eq!(song[0].get("mods_path"), Some("/mods/4"));

    assert_eq!(out.find_by_pid("LIB-bar:9").count(), 0);
    Ok(())
}

#[test]
fn test_full_run_matches_two_phase_output() -> Result<()> {
    let temp_dir = tempdir()?;
    write_inputs(temp_dir.path());
    let config = Config::load(temp_dir.path().join("reconcile.toml"))?;
    let pipeline = Pipeline::new(config.clone())?;

    let mut csv_sink = CsvTableSink::new(&config.output_dir);
    pipeline.run_merge(&mut csv_sink)?;
    let two_phase = pipeline.run_post_process(&mut csv_sink)?;

    let mut memory_sink = MemorySink::new();
    let full = pipeline.run(&mut memory_sink)?;

    assert_eq!(full.phase, Phase::Full);
    assert_eq!(full.output_sha256, two_phase.output_sha256);
    assert_eq!(
        memory_sink.names().collect::<Vec<_>>(),
        vec![pre_processed_name("LIB-foo"), processed_name("LIB-foo")]
    );
    assert_eq!(memory_sink.get(&processed_name("LIB-foo")).map(|t| t.len()), Some(4));
    Ok(())
}

#[test]
fn test_rerun_is_reproducible() -> Result<()> {
    let temp_dir = tempdir()?;
    write_inputs(temp_dir.path());
    let config = Config::load(temp_dir.path().join("reconcile.toml"))?;
    let pipeline = Pipeline::new(config.clone())?;
    let mut sink = CsvTableSink::new(&config.output_dir);

    let first = pipeline.run(&mut sink)?;
    let second = pipeline.run(&mut sink)?;
    assert_eq!(first.output_sha256, second.output_sha256);
    Ok(())
}

#[test]
fn test_malformed_extract_aborts_before_output() -> Result<()> {
    let temp_dir = tempdir()?;
    write_inputs(temp_dir.path());
    write_fixture(temp_dir.path(), "obj.csv", "PID,filetype,file_size\nLIB-foo:2,tif,1\n");

    let config = Config::load(temp_dir.path().join("reconcile.toml"))?;
    let mut sink = CsvTableSink::new(&config.output_dir);
    let pipeline = Pipeline::new(config)?;

    let err = pipeline.run(&mut sink).unwrap_err();
    assert!(matches!(err, ReconcileError::Schema { .. }));
    assert!(!temp_dir.path().join("out").exists());
    Ok(())
}

#[test]
fn test_non_numeric_size_fails_the_run() -> Result<()> {
    let temp_dir = tempdir()?;
    write_inputs(temp_dir.path());
    write_fixture(
        temp_dir.path(),
        "obj.csv",
        &format!("{HEADER}LIB-foo:4,audio/mpeg,lots,LIB,LIB-foo:collection,/obj/4.mp3,/mods/4,/rdf/4\n"),
    );

    let config = Config::load(temp_dir.path().join("reconcile.toml"))?;
    let pipeline = Pipeline::new(config)?;
    let err = pipeline.run(&mut MemorySink::new()).unwrap_err();
    assert!(matches!(err, ReconcileError::DataFormat { .. }));
    Ok(())
}

#[test]
fn test_report_is_written_as_json() -> Result<()> {
    let temp_dir = tempdir()?;
    write_inputs(temp_dir.path());
    let config = Config::load(temp_dir.path().join("reconcile.toml"))?;
    let pipeline = Pipeline::new(config)?;

    let result = pipeline.run(&mut MemorySink::new())?;
    let report_path = temp_dir.path().join("reports").join("run.json");
    result.write_report(&report_path)?;

    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report_path)?)?;
    assert_eq!(report["phase"], "full");
    assert_eq!(report["output_rows"], 4);
    assert_eq!(report["dataset"], "LIB-foo");
    Ok(())
}
