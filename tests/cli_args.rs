use clap::Parser;
use islandviewer_client::cli::{check_run_inputs, fatal_message, Args, Command};

#[test]
fn run_requires_token() {
    let err = Args::try_parse_from([
        "islandviewer-client",
        "run",
        "--sequence",
        "g.gbk",
        "--gbk",
        "o.gbk",
        "--tab",
        "o.tbl",
    ])
    .unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
}

#[test]
fn accession_is_optional() {
    let args = Args::try_parse_from([
        "islandviewer-client",
        "run",
        "--token",
        "t",
        "--seq",
        "g.gbk",
        "--gbk",
        "o.gbk",
        "--tab",
        "o.tbl",
    ])
    .unwrap();
    match args.cmd {
        Command::Run { accession, .. } => assert!(accession.is_none()),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn run_sample_short_flags() {
    let args = Args::try_parse_from([
        "islandviewer-client",
        "run-sample",
        "-t",
        "tok",
        "-s",
        "s1",
        "-i",
        "in",
        "-o",
        "out",
        "-r",
        "NC_000913.3",
    ])
    .unwrap();
    match args.cmd {
        Command::RunSample {
            sample, reference, ..
        } => {
            assert_eq!(sample, "s1");
            assert_eq!(reference.as_deref(), Some("NC_000913.3"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

fn parse(argv: &[&str]) -> Command {
    let mut full = vec!["islandviewer-client"];
    full.extend_from_slice(argv);
    Args::try_parse_from(full).unwrap().cmd
}

#[test]
fn run_with_missing_sequence_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.gbk");
    let cmd = parse(&[
        "run",
        "--token",
        "t",
        "--sequence",
        missing.to_str().unwrap(),
        "--gbk",
        "o.gbk",
        "--tab",
        "o.tbl",
    ]);
    let err = check_run_inputs(&cmd).unwrap_err();
    assert!(err.to_string().contains("could not find file"), "{err:#}");
}

#[test]
fn run_with_existing_sequence_passes() {
    let dir = tempfile::tempdir().unwrap();
    let genome = dir.path().join("g.gbk");
    std::fs::write(&genome, "LOCUS x\n//\n").unwrap();
    let cmd = parse(&[
        "run",
        "--token",
        "t",
        "--sequence",
        genome.to_str().unwrap(),
        "--gbk",
        "o.gbk",
        "--tab",
        "o.tbl",
    ]);
    check_run_inputs(&cmd).unwrap();
}

#[test]
fn run_sample_with_missing_indir_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let indir = dir.path().join("nope");
    let cmd = parse(&[
        "run-sample",
        "-t",
        "tok",
        "-s",
        "s1",
        "-i",
        indir.to_str().unwrap(),
        "-o",
        dir.path().to_str().unwrap(),
    ]);
    let err = check_run_inputs(&cmd).unwrap_err();
    assert!(err.to_string().contains("input directory does not exist"), "{err:#}");
}

#[test]
fn run_sample_with_missing_genome_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cmd = parse(&[
        "run-sample",
        "-t",
        "tok",
        "-s",
        "s1",
        "-i",
        dir.path().to_str().unwrap(),
        "-o",
        dir.path().to_str().unwrap(),
    ]);
    let err = check_run_inputs(&cmd).unwrap_err();
    assert!(err.to_string().contains("s1-genome.gbk"), "{err:#}");
}

#[test]
fn other_commands_skip_input_checks() {
    check_run_inputs(&parse(&["genomes", "--token", "t"])).unwrap();
}

#[test]
fn fatal_message_includes_the_cause_chain() {
    let err = anyhow::anyhow!("connection reset").context("Error submitting genome to IslandViewer");
    assert_eq!(
        fatal_message(&err),
        "error: Error submitting genome to IslandViewer: connection reset"
    );
}
