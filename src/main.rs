use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use role_scout::cache::run_cached;
use role_scout::config::global_config;
use role_scout::export::{write_json, write_workbook};
use role_scout::loader::load_snapshot;
use role_scout::pipeline::PipelineArtifacts;
use role_scout::synthetic::synthetic_snapshot;

const DEMO_PLAYERS_PER_ROLE: usize = 40;
const DEMO_SEED: u64 = 7;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = global_config().clone();
    if let Some(raw) = parse_value_arg("--min-90s") {
        config.min_nineties = raw
            .trim()
            .parse::<f64>()
            .with_context(|| format!("invalid --min-90s value `{raw}`"))?;
    }

    let snapshot = if has_flag("--demo") {
        info!(per_role = DEMO_PLAYERS_PER_ROLE, "using synthetic demo population");
        synthetic_snapshot(DEMO_PLAYERS_PER_ROLE, DEMO_SEED)
    } else {
        let Some(path) = input_path() else {
            bail!("no snapshot given; pass --input PATH, set ROLE_SCOUT_DATA, or use --demo");
        };
        load_snapshot(&path)?
    };

    info!(started_at = %Utc::now().to_rfc3339(), "running role pipeline");
    let artifacts = run_cached(&snapshot, &config)?;
    print_summary(&artifacts);

    if let Some(name) = parse_value_arg("--player") {
        print_cluster_mates(&artifacts, &name);
    }
    if let Some(raw) = parse_value_arg("--compare") {
        let names: Vec<&str> = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        print_comparison(&artifacts, &names);
    }
    if let Some(path) = parse_value_arg("--out").map(PathBuf::from) {
        let report = write_workbook(&path, &artifacts)?;
        println!(
            "Wrote {} ({} roles, {} percentile rows, {} points)",
            path.display(),
            report.roles,
            report.percentiles,
            report.embedding
        );
    }
    if let Some(path) = parse_value_arg("--json").map(PathBuf::from) {
        write_json(&path, &artifacts)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_summary(artifacts: &PipelineArtifacts) {
    let report = &artifacts.report;
    println!(
        "players: {} of {} rows (90s > {})",
        report.included, report.snapshot_rows, report.min_nineties
    );
    println!(
        "components: {} (explained variance {:.3})",
        report.components,
        report.cumulative_variance()
    );
    match report.silhouette {
        Some(score) => println!("silhouette: {score:.3}"),
        None => println!("silhouette: n/a"),
    }
    for (label, role) in artifacts.roles.clusters() {
        let size = report.cluster_sizes.get(&label).copied().unwrap_or(0);
        println!("  {label:>2}  {role:<36} {size:>5}");
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
}

fn resolve_key(artifacts: &PipelineArtifacts, query: &str) -> Option<String> {
    if artifacts.roles.find(query).is_some() {
        return Some(query.to_string());
    }
    let keys = artifacts.roles.keys_for_name(query);
    match keys.as_slice() {
        [] => {
            println!("no player matches `{query}`");
            None
        }
        [key] => Some(key.to_string()),
        many => {
            println!("`{query}` is ambiguous, use one of:");
            for key in many {
                println!("  {key}");
            }
            None
        }
    }
}

fn print_cluster_mates(artifacts: &PipelineArtifacts, query: &str) {
    let Some(key) = resolve_key(artifacts, query) else {
        return;
    };
    let Some((cluster, mates)) = artifacts.roles.players_like(&key) else {
        return;
    };
    let role = mates.first().map(|row| row.role.as_str()).unwrap_or_default();
    println!("{key}: cluster {cluster} ({role}), {} players", mates.len());
    for row in mates.iter().filter(|row| row.key != key) {
        println!("  {:<36} {:<4} {}", row.key, row.meta.position, row.meta.team);
    }
}

fn print_comparison(artifacts: &PipelineArtifacts, queries: &[&str]) {
    let keys: Vec<String> = queries
        .iter()
        .filter_map(|query| resolve_key(artifacts, query))
        .collect();
    let comparison = artifacts.percentiles.compare(&keys);
    for key in &comparison.unknown {
        println!("no percentile row for `{key}`");
    }
    if comparison.series.is_empty() {
        return;
    }

    print!("{:<32}", "feature");
    for series in &comparison.series {
        print!(" {:>14}", truncate(&series.key, 14));
    }
    println!();
    for (idx, feature) in artifacts.percentiles.features.iter().enumerate() {
        print!("{feature:<32}");
        for series in &comparison.series {
            print!(" {:>14.1}", series.values[idx]);
        }
        println!();
    }
}

fn truncate(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

fn input_path() -> Option<PathBuf> {
    parse_value_arg("--input")
        .or_else(|| {
            std::env::var("ROLE_SCOUT_DATA")
                .ok()
                .filter(|s| !s.trim().is_empty())
        })
        .map(PathBuf::from)
}

fn parse_value_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix(&prefix)
            && !v.trim().is_empty()
        {
            return Some(v.to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.clone());
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
