use std::fs;
use std::path::PathBuf;

use role_scout::config::PipelineConfig;
use role_scout::features::build_feature_table;
use role_scout::loader::load_json;
use role_scout::roles::UNLABELED;
use role_scout::{DatasetSnapshot, PipelineError, PipelineWarning, run_pipeline};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn small_snapshot() -> DatasetSnapshot {
    load_json(&fixture_path("players_small.json")).expect("fixture should load")
}

fn small_config() -> PipelineConfig {
    let raw = fs::read_to_string(fixture_path("pipeline_config.json"))
        .expect("fixture file should be readable");
    serde_json::from_str(&raw).expect("config fixture should parse")
}

#[test]
fn per90_rates_are_exact_for_included_players() {
    let snap = small_snapshot();
    let cols: Vec<String> = ["Goals-PK", "Shots", "Tackles"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let table = build_feature_table(&snap, 3.0, &cols).unwrap();

    // Cole Hart (2.5) and Dani Roca (missing 90s) are filtered out.
    let names: Vec<&str> = table.meta.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Ayo Adeyemi", "Bruno Tavares", "Eli Brandt", "Ayo Adeyemi"]);

    let raw = [
        [5.0, 30.0, 8.0, 10.0],
        [1.0, 10.0, 40.0, 12.5],
        [0.0, 4.0, 20.0, 8.0],
        [2.0, 12.0, 3.0, 6.0],
    ];
    for (row, expected) in table.rows.iter().zip(raw) {
        for idx in 0..3 {
            assert!((row[idx] - expected[idx] / expected[3]).abs() < 1e-9);
        }
    }
    assert_eq!(table.meta[0].age, Some(24));
}

#[test]
fn default_schema_names_first_missing_column() {
    let err = run_pipeline(&small_snapshot(), &PipelineConfig::default()).unwrap_err();
    assert_eq!(err, PipelineError::MissingColumn("xG".to_string()));
}

#[test]
fn config_fixture_fills_embedding_defaults() {
    let config = small_config();
    assert_eq!(config.embedding.n_neighbors, 15);
    assert_eq!(config.embedding.seed, 42);
    let warnings = config.validate().expect("fixture config is valid");
    assert_eq!(warnings, vec![PipelineWarning::UnmappedClusterLabel { label: 3 }]);
}

#[test]
fn small_fixture_runs_end_to_end() {
    let artifacts = run_pipeline(&small_snapshot(), &small_config()).expect("pipeline should run");

    assert_eq!(artifacts.report.snapshot_rows, 6);
    assert_eq!(artifacts.report.included, 4);
    assert_eq!(artifacts.roles.rows.len(), 4);
    assert_eq!(artifacts.percentiles.rows.len(), 4);
    assert_eq!(artifacts.embedding.rows.len(), 4);

    let keys: Vec<&str> = artifacts.roles.rows.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "Ayo Adeyemi (Harbour City)",
            "Bruno Tavares",
            "Eli Brandt",
            "Ayo Adeyemi (Kingsport)",
        ]
    );
    assert_eq!(artifacts.roles.keys_for_name("ayo adeyemi").len(), 2);

    let labels: std::collections::BTreeSet<u32> =
        artifacts.roles.rows.iter().map(|r| r.cluster).collect();
    assert_eq!(labels, [1, 2, 3].into_iter().collect());
    for row in &artifacts.roles.rows {
        if row.cluster == 3 {
            assert_eq!(row.role, UNLABELED);
        }
    }

    assert!(artifacts.report.warnings.contains(&PipelineWarning::IdentityCollision {
        name: "Ayo Adeyemi".to_string(),
        rows: 2,
    }));
    assert!(
        artifacts
            .report
            .warnings
            .contains(&PipelineWarning::UnmappedClusterLabel { label: 3 })
    );

    // Tackles per 90: 0.8, 3.2, 2.5, 0.5.
    let tackles = |key: &str| artifacts.percentiles.value(key, "Tackles").unwrap();
    assert!((tackles("Bruno Tavares") - 100.0).abs() < 1e-9);
    assert!((tackles("Eli Brandt") - 75.0).abs() < 1e-9);
    assert!((tackles("Ayo Adeyemi (Kingsport)") - 25.0).abs() < 1e-9);
}
