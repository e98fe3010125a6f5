use std::collections::{BTreeMap, BTreeSet, HashSet};

use role_scout::config::PipelineConfig;
use role_scout::dataset::{PlayerMeta, PlayerRecord};
use role_scout::features::build_feature_table;
use role_scout::percentile::score_table;
use role_scout::synthetic::{synthetic_records, synthetic_snapshot};
use role_scout::{DatasetSnapshot, PipelineError, run_pipeline};

fn player(name: &str, nineties: f64, stats: &[(&str, f64)]) -> PlayerRecord {
    PlayerRecord {
        meta: PlayerMeta {
            name: name.to_string(),
            nationality: "ENG".to_string(),
            position: "MF".to_string(),
            team: "Club".to_string(),
            competition: "League".to_string(),
            age: Some(25),
        },
        nineties: Some(nineties),
        stats: stats.iter().map(|(k, v)| (k.to_string(), Some(*v))).collect(),
    }
}

#[test]
fn rerun_on_same_snapshot_is_identical() {
    let snapshot = synthetic_snapshot(20, 1);
    let config = PipelineConfig::default();
    let first = run_pipeline(&snapshot, &config).expect("synthetic run");
    let second = run_pipeline(&snapshot, &config).expect("synthetic run");
    assert_eq!(first.roles, second.roles);
    assert_eq!(first.embedding, second.embedding);
    assert_eq!(first, second);
}

#[test]
fn labels_partition_the_population() {
    let snapshot = synthetic_snapshot(20, 2);
    let config = PipelineConfig::default();
    let artifacts = run_pipeline(&snapshot, &config).expect("synthetic run");
    let k = config.cluster_count as u32;

    let included = artifacts.report.included;
    assert_eq!(artifacts.roles.rows.len(), included);
    assert!(artifacts.roles.rows.iter().all(|r| (1..=k).contains(&r.cluster)));

    let mut seen = HashSet::new();
    let mut total = 0;
    for label in 1..=k {
        let members = artifacts.roles.members(label);
        assert!(!members.is_empty(), "cluster {label} is empty");
        for row in members {
            assert!(seen.insert(row.key.clone()), "{} appears twice", row.key);
            total += 1;
        }
    }
    assert_eq!(total, included);
    assert_eq!(artifacts.report.cluster_sizes.values().sum::<usize>(), included);

    // All three outputs share the same keys in the same order.
    let role_keys: Vec<&str> = artifacts.roles.rows.iter().map(|r| r.key.as_str()).collect();
    let pct_keys: Vec<&str> = artifacts.percentiles.rows.iter().map(|r| r.key.as_str()).collect();
    let emb_keys: Vec<&str> = artifacts.embedding.rows.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(role_keys, pct_keys);
    assert_eq!(role_keys, emb_keys);
    for (role, point) in artifacts.roles.rows.iter().zip(&artifacts.embedding.rows) {
        assert_eq!(role.cluster, point.cluster);
    }

    for row in &artifacts.percentiles.rows {
        assert_eq!(row.values.len(), config.display_features.len());
        assert!(row.values.iter().all(|v| (0.0..=100.0).contains(v)));
    }
    assert!(artifacts.report.components >= 1);
    assert!(artifacts.report.cumulative_variance() >= config.variance_target - 1e-9);
    assert!(artifacts.report.silhouette.is_some());
}

#[test]
fn stricter_threshold_only_removes_players() {
    let records = synthetic_records(20, 3);
    let snapshot = DatasetSnapshot::from_records(&records);
    let loose = run_pipeline(&snapshot, &PipelineConfig::default()).expect("loose run");
    let strict_config = PipelineConfig {
        min_nineties: 10.0,
        ..Default::default()
    };
    let strict = run_pipeline(&snapshot, &strict_config).expect("strict run");

    assert!(strict.report.included <= loose.report.included);
    let loose_players: Vec<&PlayerMeta> = loose.roles.rows.iter().map(|r| &r.meta).collect();
    let eligible: BTreeSet<String> = records
        .iter()
        .filter(|r| r.nineties.unwrap_or(0.0) > 10.0)
        .map(|r| format!("{:?}", r.meta))
        .collect();
    for row in &strict.roles.rows {
        assert!(loose_players.contains(&&row.meta));
        assert!(eligible.contains(&format!("{:?}", row.meta)));
    }
}

#[test]
fn goals_scenario_ranks_strictly() {
    let snap = DatasetSnapshot::from_records(&[
        player("A", 3.0, &[("Goals-PK", 9.0)]),
        player("B", 3.0, &[("Goals-PK", 6.0)]),
        player("C", 3.0, &[("Goals-PK", 3.0)]),
    ]);
    // 90s of exactly 3 is not above the default threshold, so score without it.
    let table = build_feature_table(&snap, 0.0, &["Goals-PK".to_string()]).unwrap();
    let per90: Vec<f64> = table.rows.iter().map(|r| r[0]).collect();
    assert_eq!(per90, vec![3.0, 2.0, 1.0]);

    let keys: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
    let (pct, warnings) = score_table(&table, &keys);
    assert!(warnings.is_empty());
    let a = pct.value("A", "Goals-PK").unwrap();
    let b = pct.value("B", "Goals-PK").unwrap();
    let c = pct.value("C", "Goals-PK").unwrap();
    assert!((a - 100.0).abs() < 1e-9);
    assert!((b - 200.0 / 3.0).abs() < 1e-9);
    assert!((c - 100.0 / 3.0).abs() < 1e-9);
    assert!(c < b && b < a);

    assert!(
        run_pipeline(&DatasetSnapshot::from_records(&[]), &PipelineConfig::default()).is_err()
    );
}

fn circulant_config(features: &[String]) -> PipelineConfig {
    PipelineConfig {
        clustering_features: features.to_vec(),
        display_features: features.to_vec(),
        variance_target: 1.0,
        ..Default::default()
    }
}

#[test]
fn twelve_separated_players_form_twelve_singletons() {
    let features: Vec<String> = (0..12).map(|j| format!("Stat {j}")).collect();
    let records: Vec<PlayerRecord> = (0..12)
        .map(|i| {
            let stats: Vec<(&str, f64)> = features
                .iter()
                .enumerate()
                .map(|(j, f)| (f.as_str(), 10.0 * (1 + (i + j) % 12) as f64))
                .collect();
            player(&format!("Player {i}"), 10.0, &stats)
        })
        .collect();
    let snap = DatasetSnapshot::from_records(&records);
    let artifacts = run_pipeline(&snap, &circulant_config(&features)).expect("12 distinct players");

    let sizes: BTreeMap<u32, usize> = artifacts.roles.cluster_sizes();
    assert_eq!(sizes.len(), 12);
    assert!(sizes.values().all(|n| *n == 1));
    assert_eq!(sizes.keys().copied().collect::<Vec<_>>(), (1..=12).collect::<Vec<u32>>());
}

#[test]
fn fewer_players_than_clusters_is_an_error() {
    let features: Vec<String> = (0..12).map(|j| format!("Stat {j}")).collect();
    let mut records: Vec<PlayerRecord> = (0..11)
        .map(|i| {
            let stats: Vec<(&str, f64)> = features
                .iter()
                .enumerate()
                .map(|(j, f)| (f.as_str(), (i * 3 + j) as f64))
                .collect();
            player(&format!("Player {i}"), 8.0, &stats)
        })
        .collect();
    // Present in the snapshot but below the threshold.
    records.push(player("Bench", 2.0, &[("Stat 0", 1.0)]));

    let snap = DatasetSnapshot::from_records(&records);
    let err = run_pipeline(&snap, &circulant_config(&features)).unwrap_err();
    assert_eq!(
        err,
        PipelineError::PopulationTooSmall {
            found: 11,
            required: 12,
            min_nineties: 3.0,
        }
    );
}

#[test]
fn duplicate_profiles_are_a_population_error() {
    let features = vec!["Stat 0".to_string(), "Stat 1".to_string()];
    let records: Vec<PlayerRecord> = (0..14)
        .map(|i| {
            let v = if i % 2 == 0 { 5.0 } else { 9.0 };
            player(&format!("Clone {i}"), 5.0, &[("Stat 0", v), ("Stat 1", 2.0 * v)])
        })
        .collect();
    let err = run_pipeline(&DatasetSnapshot::from_records(&records), &circulant_config(&features))
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InsufficientDistinctPlayers { distinct: 2, required: 12 }
    ));
}
