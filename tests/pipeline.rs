mod common;

use common::{LOOKUP, RATES, TestWorkspace, encode_latin1, fixture_path, raw_table};
use sector_indicators::{
    config::{NumericPolicy, PipelineConfig, UnmatchedPolicy},
    io_utils,
    pipeline::{self, RunPaths},
};

const NORMALIZED_HEADER: &str = "year;sector;employment_count;average_wage;median_wage;employability;\
                                 demand_normalized;wage_median_normalized;receptivity_index";

fn run_paths(ws: &TestWorkspace, raw: &str, lookup: &str, rates: &str) -> RunPaths {
    RunPaths {
        input: ws.write("raw.csv", raw),
        delimiter: io_utils::RAW_DELIMITER,
        lookup: ws.write("lookup.csv", lookup),
        rates: ws.write("rates.json", rates),
        output: ws.join("normalized.csv"),
        enriched_output: None,
        aggregated_output: None,
    }
}

#[test]
fn three_row_table_produces_one_row_per_matched_group() {
    let ws = TestWorkspace::new();
    let paths = RunPaths {
        input: fixture_path("raw_sample.csv"),
        delimiter: io_utils::RAW_DELIMITER,
        lookup: fixture_path("lookup.csv"),
        rates: fixture_path("rates.json"),
        output: ws.join("normalized.csv"),
        enriched_output: None,
        aggregated_output: None,
    };
    let summary = pipeline::run(&paths, &PipelineConfig::default()).expect("run");

    assert_eq!(summary.join.rows_read, 3);
    assert_eq!(summary.join.matched, 2);
    assert_eq!(summary.join.unmatched_dropped, 1);
    assert_eq!(summary.groups.groups, 2);
    assert_eq!(summary.normalized_rows, 2);

    let expected = format!(
        "{NORMALIZED_HEADER}\n\
         2020;Agropecuária;100;1500.000000;1500.000000;0.900000;0.000000;0.000000;0.297000\n\
         2020;Comércio;900;3000.000000;3000.000000;0.900000;0.000000;0.000000;0.297000\n"
    );
    assert_eq!(ws.read("normalized.csv"), expected);
}

#[test]
fn unknown_policy_adds_an_unknown_group() {
    let ws = TestWorkspace::new();
    let paths = RunPaths {
        input: fixture_path("raw_sample.csv"),
        delimiter: io_utils::RAW_DELIMITER,
        lookup: fixture_path("lookup.csv"),
        rates: fixture_path("rates.json"),
        output: ws.join("normalized.csv"),
        enriched_output: None,
        aggregated_output: None,
    };
    let config = PipelineConfig {
        unmatched: UnmatchedPolicy::Unknown,
        ..PipelineConfig::default()
    };
    let summary = pipeline::run(&paths, &config).expect("run");
    assert_eq!(summary.groups.groups, 3);
    let sectors = ws
        .rows("normalized.csv")
        .into_iter()
        .map(|row| row[1].clone())
        .collect::<Vec<_>>();
    assert_eq!(sectors, vec!["Agropecuária", "Comércio", "UNKNOWN"]);
}

#[test]
fn separate_stages_match_the_single_pass_run() {
    let ws = TestWorkspace::new();
    let config = PipelineConfig::default();
    let raw = fixture_path("raw_sample.csv");
    let lookup = fixture_path("lookup.csv");
    let rates = fixture_path("rates.json");

    pipeline::enrich(&raw, io_utils::RAW_DELIMITER, &lookup, &ws.join("enriched.csv"), &config)
        .expect("enrich");
    pipeline::aggregate(&ws.join("enriched.csv"), &rates, &ws.join("aggregated.csv"), &config)
        .expect("aggregate");
    pipeline::normalize(&ws.join("aggregated.csv"), &ws.join("normalized.csv"), &config)
        .expect("normalize");

    let paths = RunPaths {
        input: raw,
        delimiter: io_utils::RAW_DELIMITER,
        lookup,
        rates,
        output: ws.join("run_normalized.csv"),
        enriched_output: Some(ws.join("run_enriched.csv")),
        aggregated_output: Some(ws.join("run_aggregated.csv")),
    };
    pipeline::run(&paths, &config).expect("run");

    assert_eq!(ws.read("enriched.csv"), ws.read("run_enriched.csv"));
    assert_eq!(ws.read("aggregated.csv"), ws.read("run_aggregated.csv"));
    assert_eq!(ws.read("normalized.csv"), ws.read("run_normalized.csv"));
}

#[test]
fn demand_is_normalized_within_each_sector_across_years() {
    let ws = TestWorkspace::new();
    let raw = raw_table(&[
        "2019;4711;Comércio varejista;50.000,00;1.000,00;50;",
        "2020;4711;Comércio varejista;150.000,00;1.500,00;100;",
        "2021;4711;Comércio varejista;300.000,00;2.000,00;150;",
        "2020;0111;Cultivo de arroz;10.000,00;1.000,00;10;",
    ]);
    let paths = run_paths(&ws, &raw, LOOKUP, RATES);
    let summary = pipeline::run(&paths, &PipelineConfig::default()).expect("run");

    let rows = ws.rows("normalized.csv");
    let commerce = rows
        .iter()
        .filter(|row| row[1] == "Comércio")
        .map(|row| (row[0].as_str(), row[6].as_str(), row[7].as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        commerce,
        vec![
            ("2019", "0.000000", "0.000000"),
            ("2020", "0.500000", "0.500000"),
            ("2021", "1.000000", "1.000000"),
        ]
    );
    let agro = rows.iter().find(|row| row[1] == "Agropecuária").unwrap();
    assert_eq!(agro[6], "0.000000");

    let commerce_2021 = rows
        .iter()
        .find(|row| row[0] == "2021" && row[1] == "Comércio")
        .unwrap();
    assert_eq!(commerce_2021[5], "", "2021 has no unemployment rate");
    assert_eq!(summary.groups.missing_rate_groups, 1);
    assert_eq!(
        summary.groups.missing_rate_years.iter().copied().collect::<Vec<_>>(),
        vec![2021]
    );
}

#[test]
fn zero_wage_policy_changes_wage_statistics() {
    let ws = TestWorkspace::new();
    let raw = raw_table(&[
        "2020;4711;Comércio varejista;10,00;10,00;1;",
        "2020;4711;Comércio varejista;20,00;20,00;1;",
        "2020;4711;Comércio varejista;0,00;0,00;1;",
    ]);
    let mut paths = run_paths(&ws, &raw, LOOKUP, RATES);
    paths.aggregated_output = Some(ws.join("aggregated.csv"));

    pipeline::run(&paths, &PipelineConfig::default()).expect("run excluding zeros");
    assert_eq!(
        ws.rows("aggregated.csv")[0][2..5],
        ["3".to_string(), "15.000000".into(), "15.000000".into()]
    );

    let config = PipelineConfig {
        include_zero_wages: true,
        ..PipelineConfig::default()
    };
    pipeline::run(&paths, &config).expect("run including zeros");
    assert_eq!(
        ws.rows("aggregated.csv")[0][2..5],
        ["3".to_string(), "10.000000".into(), "10.000000".into()]
    );
}

#[test]
fn latin1_inputs_are_decoded_and_written_as_utf8() {
    let ws = TestWorkspace::new();
    let raw = raw_table(&["2020;4711;Comércio varejista;5.000,00;2.500,00;2;"]);
    let paths = RunPaths {
        input: ws.write_bytes("raw.csv", &encode_latin1(&raw)),
        delimiter: io_utils::RAW_DELIMITER,
        lookup: ws.write_bytes("lookup.csv", &encode_latin1(LOOKUP)),
        rates: ws.write("rates.json", RATES),
        output: ws.join("normalized.csv"),
        enriched_output: Some(ws.join("enriched.csv")),
        aggregated_output: None,
    };
    let summary = pipeline::run(&paths, &PipelineConfig::default()).expect("run");
    assert_eq!(summary.join.matched, 1);
    assert!(ws.read("enriched.csv").contains("Comércio varejista"));
    assert_eq!(ws.rows("normalized.csv")[0][1], "Comércio");
}

#[test]
fn missing_required_column_fails_without_leaving_outputs() {
    let ws = TestWorkspace::new();
    let raw = "Ano;ID CNAE;Massa Salarial;Salário Médio\n2020;4711;10,00;10,00\n";
    let mut paths = run_paths(&ws, raw, LOOKUP, RATES);
    paths.enriched_output = Some(ws.join("enriched.csv"));
    paths.aggregated_output = Some(ws.join("aggregated.csv"));

    let err = pipeline::run(&paths, &PipelineConfig::default()).expect_err("missing column");
    assert!(format!("{err:#}").contains("employment_count"));
    assert_eq!(ws.entries(), vec!["lookup.csv", "rates.json", "raw.csv"]);
}

#[test]
fn strict_failure_mid_stream_discards_partial_outputs() {
    let ws = TestWorkspace::new();
    let raw = raw_table(&[
        "2020;4711;Comércio varejista;10,00;10,00;1;",
        "2020;4711;Comércio varejista;10,00;dez;1;",
    ]);
    let mut paths = run_paths(&ws, &raw, LOOKUP, RATES);
    paths.enriched_output = Some(ws.join("enriched.csv"));
    let config = PipelineConfig {
        numeric: NumericPolicy::Strict,
        ..PipelineConfig::default()
    };

    assert!(pipeline::run(&paths, &config).is_err());
    assert_eq!(ws.entries(), vec!["lookup.csv", "rates.json", "raw.csv"]);

    let summary = pipeline::run(&paths, &PipelineConfig::default()).expect("lenient run");
    assert_eq!(summary.join.unparseable_skipped, 1);
    assert_eq!(ws.rows("enriched.csv").len(), 1);
}

#[test]
fn invalid_rate_leaves_only_that_group_without_employability() {
    let ws = TestWorkspace::new();
    let raw = raw_table(&[
        "2019;4711;Comércio varejista;10,00;10,00;1;",
        "2020;4711;Comércio varejista;10,00;10,00;1;",
    ]);
    let paths = run_paths(&ws, &raw, LOOKUP, r#"{"2019": 100, "2020": 10}"#);
    let summary = pipeline::run(&paths, &PipelineConfig::default()).expect("run");
    assert_eq!(summary.groups.invalid_rate_groups, 1);

    let rows = ws.rows("normalized.csv");
    assert_eq!(rows[0][5], "");
    assert_eq!(rows[1][5], "0.900000");
}

#[test]
fn yaml_config_drives_policies() {
    let ws = TestWorkspace::new();
    let config = PipelineConfig::load(&fixture_path("pipeline.yaml")).expect("load config");
    assert_eq!(config.unmatched, UnmatchedPolicy::Unknown);
    assert_eq!(config.report_every, 0);
    assert_eq!(config.weights.employability, 0.5);

    let paths = RunPaths {
        input: fixture_path("raw_sample.csv"),
        delimiter: io_utils::RAW_DELIMITER,
        lookup: fixture_path("lookup.csv"),
        rates: fixture_path("rates.json"),
        output: ws.join("normalized.csv"),
        enriched_output: None,
        aggregated_output: None,
    };
    pipeline::run(&paths, &config).expect("run");
    let rows = ws.rows("normalized.csv");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][8], "0.450000");
}

#[test]
fn unwritable_normalized_output_finalizes_no_other_output() {
    let ws = TestWorkspace::new();
    let lookup = ws.write("lookup.csv", LOOKUP);
    let rates = ws.write("rates.json", RATES);
    let paths = RunPaths {
        input: ws.write("raw.csv", &raw_table(&["2020;4711;Comércio varejista;10,00;10,00;1;"])),
        delimiter: io_utils::RAW_DELIMITER,
        lookup,
        rates,
        output: ws.join("missing_dir").join("normalized.csv"),
        enriched_output: Some(ws.join("enriched.csv")),
        aggregated_output: Some(ws.join("aggregated.csv")),
    };

    assert!(pipeline::run(&paths, &PipelineConfig::default()).is_err());
    assert_eq!(ws.entries(), vec!["lookup.csv", "rates.json", "raw.csv"]);
}

#[test]
fn wage_sum_overflow_fails_the_run_without_panicking() {
    let ws = TestWorkspace::new();
    let huge = "79228162514264337593543950335";
    let raw = raw_table(&[
        &format!("2020;4711;Comércio varejista;1,00;{huge};1;"),
        &format!("2020;4711;Comércio varejista;1,00;{huge};1;"),
    ]);
    let mut paths = run_paths(&ws, &raw, LOOKUP, RATES);
    paths.enriched_output = Some(ws.join("enriched.csv"));

    let err = pipeline::run(&paths, &PipelineConfig::default()).expect_err("overflow");
    let message = format!("{err:#}");
    assert!(message.contains("overflowed"), "{message}");
    assert!(message.contains("(2020, Comércio)"), "{message}");
    assert_eq!(ws.entries(), vec!["lookup.csv", "rates.json", "raw.csv"]);
}
