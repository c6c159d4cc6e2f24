mod common;

use assert_cmd::Command;
use common::{LOOKUP, RATES, TestWorkspace, fixture_path, raw_table};
use predicates::str::contains;

fn bin() -> Command {
    Command::cargo_bin("sector-indicators").expect("binary exists")
}

fn path_arg(path: &std::path::Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn extract_writes_sorted_distinct_lookup() {
    let ws = TestWorkspace::new();
    let raw = ws.write(
        "raw.csv",
        &raw_table(&[
            "2020;4711;Comércio varejista;1,00;1,00;1;",
            "2020;0111;Cultivo de arroz;1,00;1,00;1;",
            "2021;4711;Comércio varejista de produtos;1,00;1,00;1;",
            "2021;;Sem código;1,00;1,00;1;",
        ]),
    );
    let output = ws.join("lookup.csv");
    bin()
        .args(["extract", "-i", path_arg(&raw), "-o", path_arg(&output)])
        .assert()
        .success();

    assert_eq!(
        ws.read("lookup.csv"),
        "classification_id,label\n0111,Cultivo de arroz\n4711,Comércio varejista\n"
    );
}

#[test]
fn extract_honours_custom_delimiter() {
    let ws = TestWorkspace::new();
    let raw = ws.write(
        "raw.csv",
        "Ano,ID CNAE,CNAE\n2020,10,Dez\n2020,9,Nove\n",
    );
    let output = ws.join("lookup.csv");
    bin()
        .args([
            "extract",
            "-i",
            path_arg(&raw),
            "-o",
            path_arg(&output),
            "--delimiter",
            "comma",
        ])
        .assert()
        .success();
    assert_eq!(
        ws.read("lookup.csv"),
        "classification_id,label\n9,Nove\n10,Dez\n"
    );
}

#[test]
fn stages_chain_through_files() {
    let ws = TestWorkspace::new();
    let enriched = ws.join("enriched.csv");
    let aggregated = ws.join("aggregated.csv");
    let normalized = ws.join("normalized.csv");

    bin()
        .args([
            "enrich",
            "-i",
            path_arg(&fixture_path("raw_sample.csv")),
            "-l",
            path_arg(&fixture_path("lookup.csv")),
            "-o",
            path_arg(&enriched),
        ])
        .assert()
        .success();
    assert_eq!(ws.rows("enriched.csv").len(), 2);

    bin()
        .args([
            "aggregate",
            "-i",
            path_arg(&enriched),
            "-r",
            path_arg(&fixture_path("rates.json")),
            "-o",
            path_arg(&aggregated),
        ])
        .assert()
        .success();
    assert_eq!(
        ws.read("aggregated.csv"),
        "year;sector;employment_count;average_wage;median_wage;employability\n\
         2020;Agropecuária;100;1500.000000;1500.000000;0.900000\n\
         2020;Comércio;900;3000.000000;3000.000000;0.900000\n"
    );

    bin()
        .args([
            "normalize",
            "-i",
            path_arg(&aggregated),
            "-o",
            path_arg(&normalized),
            "--weights",
            "1,0,0",
        ])
        .assert()
        .success();
    let rows = ws.rows("normalized.csv");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][8], "0.900000");
}

#[test]
fn run_prints_summary_table() {
    let ws = TestWorkspace::new();
    let output = ws.join("normalized.csv");
    bin()
        .args([
            "run",
            "-i",
            path_arg(&fixture_path("raw_sample.csv")),
            "-l",
            path_arg(&fixture_path("lookup.csv")),
            "-r",
            path_arg(&fixture_path("rates.json")),
            "-o",
            path_arg(&output),
            "--summary",
            "--unmatched",
            "unknown",
        ])
        .assert()
        .success()
        .stdout(contains("metric"))
        .stdout(contains("rows kept as unknown"))
        .stdout(contains("groups"));
    assert_eq!(ws.rows("normalized.csv").len(), 3);
}

#[test]
fn include_zero_wages_flag_reaches_the_aggregator() {
    let ws = TestWorkspace::new();
    let raw = ws.write(
        "raw.csv",
        &raw_table(&[
            "2020;4711;Comércio varejista;10,00;10,00;1;",
            "2020;4711;Comércio varejista;0,00;0,00;1;",
        ]),
    );
    let lookup = ws.write("lookup.csv", LOOKUP);
    let rates = ws.write("rates.json", RATES);
    let aggregated = ws.join("aggregated.csv");
    bin()
        .args([
            "run",
            "-i",
            path_arg(&raw),
            "-l",
            path_arg(&lookup),
            "-r",
            path_arg(&rates),
            "-o",
            path_arg(&ws.join("normalized.csv")),
            "--aggregated-output",
            path_arg(&aggregated),
            "--include-zero-wages",
        ])
        .assert()
        .success();
    assert_eq!(ws.rows("aggregated.csv")[0][3], "5.000000");
}

#[test]
fn missing_column_reports_error_and_exits_non_zero() {
    let ws = TestWorkspace::new();
    let raw = ws.write("raw.csv", "Ano;CNAE\n2020;Comércio\n");
    let lookup = ws.write("lookup.csv", LOOKUP);
    bin()
        .args([
            "enrich",
            "-i",
            path_arg(&raw),
            "-l",
            path_arg(&lookup),
            "-o",
            path_arg(&ws.join("enriched.csv")),
        ])
        .assert()
        .failure()
        .stderr(contains("error:"))
        .stderr(contains("classification_id"));
    assert!(!ws.join("enriched.csv").exists());
}

#[test]
fn missing_input_file_is_reported() {
    let ws = TestWorkspace::new();
    bin()
        .args([
            "aggregate",
            "-i",
            path_arg(&ws.join("absent.csv")),
            "-r",
            path_arg(&fixture_path("rates.json")),
            "-o",
            path_arg(&ws.join("aggregated.csv")),
        ])
        .assert()
        .failure()
        .stderr(contains("absent.csv"));
}

#[test]
fn invalid_weights_are_rejected_by_the_parser() {
    bin()
        .args(["normalize", "-i", "a.csv", "-o", "b.csv", "--weights", "1,-1,0"])
        .assert()
        .failure()
        .stderr(contains("weight"));
}
