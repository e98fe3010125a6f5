use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};
use tracing::info;

use crate::pipeline::PipelineArtifacts;

pub struct ExportReport {
    pub roles: usize,
    pub percentiles: usize,
    pub embedding: usize,
}

enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            Cell::Number(value)
        } else {
            Cell::Empty
        }
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names.iter().map(|name| Cell::from(*name)).collect()
}

pub fn write_workbook(path: &Path, artifacts: &PipelineArtifacts) -> Result<ExportReport> {
    let mut role_rows = vec![header(&[
        "Key",
        "Player Name",
        "Nationality",
        "Position",
        "Team",
        "Competition",
        "Age",
        "Cluster",
        "Role",
    ])];
    for row in &artifacts.roles.rows {
        role_rows.push(vec![
            row.key.clone().into(),
            row.meta.name.clone().into(),
            row.meta.nationality.clone().into(),
            row.meta.position.clone().into(),
            row.meta.team.clone().into(),
            row.meta.competition.clone().into(),
            row.meta.age.map(f64::from).map_or(Cell::Empty, Cell::from),
            f64::from(row.cluster).into(),
            row.role.clone().into(),
        ]);
    }

    let mut pct_header = header(&["Key", "Player Name", "Position", "Team"]);
    pct_header.extend(artifacts.percentiles.features.iter().map(|f| Cell::from(f.clone())));
    let mut pct_rows = vec![pct_header];
    for row in &artifacts.percentiles.rows {
        let mut cells: Vec<Cell> = vec![
            row.key.clone().into(),
            row.name.clone().into(),
            row.position.clone().into(),
            row.team.clone().into(),
        ];
        cells.extend(row.values.iter().map(|v| Cell::from(*v)));
        pct_rows.push(cells);
    }

    let mut embed_rows = vec![header(&["Key", "Cluster", "X", "Y"])];
    for point in &artifacts.embedding.rows {
        embed_rows.push(vec![
            point.key.clone().into(),
            f64::from(point.cluster).into(),
            point.x.into(),
            point.y.into(),
        ]);
    }

    let report = &artifacts.report;
    let mut summary_rows = vec![
        vec!["Snapshot rows".into(), (report.snapshot_rows as f64).into()],
        vec!["Included players".into(), (report.included as f64).into()],
        vec!["Minimum 90s".into(), report.min_nineties.into()],
        vec!["Components".into(), (report.components as f64).into()],
        vec!["Explained variance".into(), report.cumulative_variance().into()],
        vec![
            "Silhouette".into(),
            report.silhouette.map_or(Cell::Empty, Cell::from),
        ],
        vec!["Cache key".into(), report.cache_key.clone().into()],
        Vec::new(),
        header(&["Cluster", "Role", "Players"]),
    ];
    for (label, role) in artifacts.roles.clusters() {
        let size = report.cluster_sizes.get(&label).copied().unwrap_or(0);
        summary_rows.push(vec![
            f64::from(label).into(),
            role.into(),
            (size as f64).into(),
        ]);
    }
    if !report.warnings.is_empty() {
        summary_rows.push(Vec::new());
        summary_rows.push(header(&["Warnings"]));
        for warning in &report.warnings {
            summary_rows.push(vec![warning.to_string().into()]);
        }
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Roles")?;
        write_rows(sheet, &role_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Percentiles")?;
        write_rows(sheet, &pct_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Embedding")?;
        write_rows(sheet, &embed_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    info!(path = %path.display(), "wrote workbook");

    Ok(ExportReport {
        roles: artifacts.roles.rows.len(),
        percentiles: artifacts.percentiles.rows.len(),
        embedding: artifacts.embedding.rows.len(),
    })
}

pub fn write_json(path: &Path, artifacts: &PipelineArtifacts) -> Result<()> {
    let raw = serde_json::to_string_pretty(artifacts).context("serialize artifacts")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), "wrote artifacts json");
    Ok(())
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<Cell>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            let (r, c) = (row_idx as u32, col_idx as u16);
            let written = match value {
                Cell::Text(s) => worksheet.write_string(r, c, s).map(|_| ()),
                Cell::Number(v) => worksheet.write_number(r, c, *v).map(|_| ()),
                Cell::Empty => Ok(()),
            };
            written.with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
