use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{
    AGE, COMPETITION, META_COLUMNS, NATIONALITY, NINETIES, PLAYER_NAME, POSITION, PipelineConfig,
    TEAM,
};
use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Column {
    Text(Vec<Option<String>>),
    Numeric(Vec<Option<f64>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Text(values) => values.len(),
            Column::Numeric(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identity metadata of a player-season row. Never modified after load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerMeta {
    pub name: String,
    pub nationality: String,
    pub position: String,
    pub team: String,
    pub competition: String,
    pub age: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerRecord {
    pub meta: PlayerMeta,
    pub nineties: Option<f64>,
    pub stats: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    rows: usize,
    columns: BTreeMap<String, Column>,
}

impl DatasetSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: &[PlayerRecord]) -> Self {
        let mut stat_names: Vec<&str> = Vec::new();
        for record in records {
            for name in record.stats.keys() {
                if !stat_names.contains(&name.as_str()) {
                    stat_names.push(name);
                }
            }
        }

        let mut columns = BTreeMap::new();
        let text = |f: fn(&PlayerMeta) -> &String| {
            Column::Text(records.iter().map(|r| Some(f(&r.meta).clone())).collect())
        };
        columns.insert(PLAYER_NAME.to_string(), text(|m| &m.name));
        columns.insert(NATIONALITY.to_string(), text(|m| &m.nationality));
        columns.insert(POSITION.to_string(), text(|m| &m.position));
        columns.insert(TEAM.to_string(), text(|m| &m.team));
        columns.insert(COMPETITION.to_string(), text(|m| &m.competition));
        columns.insert(
            AGE.to_string(),
            Column::Numeric(records.iter().map(|r| r.meta.age.map(f64::from)).collect()),
        );
        columns.insert(
            NINETIES.to_string(),
            Column::Numeric(records.iter().map(|r| r.nineties).collect()),
        );
        for name in stat_names {
            let values = records
                .iter()
                .map(|r| r.stats.get(name).copied().flatten())
                .collect();
            columns.insert(name.to_string(), Column::Numeric(values));
        }

        Self {
            rows: records.len(),
            columns,
        }
    }

    pub fn insert_column(&mut self, name: &str, column: Column) -> Result<(), PipelineError> {
        if self.columns.is_empty() {
            self.rows = column.len();
        } else if column.len() != self.rows {
            return Err(PipelineError::RaggedColumn {
                column: name.to_string(),
                expected: self.rows,
                found: column.len(),
            });
        }
        self.columns.insert(name.to_string(), column);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>], PipelineError> {
        match self.columns.get(name) {
            Some(Column::Numeric(values)) => Ok(values),
            Some(Column::Text(_)) => Err(PipelineError::NonNumericColumn(name.to_string())),
            None => Err(PipelineError::MissingColumn(name.to_string())),
        }
    }

    /// Fails fast on the first absent or mistyped column the configuration
    /// depends on.
    pub fn require_columns(&self, config: &PipelineConfig) -> Result<(), PipelineError> {
        for name in META_COLUMNS {
            if !self.columns.contains_key(name) {
                return Err(PipelineError::MissingColumn(name.to_string()));
            }
        }
        self.numeric(NINETIES)?;
        for name in config.required_stat_columns() {
            self.numeric(name)?;
        }
        Ok(())
    }

    pub fn meta(&self, row: usize) -> PlayerMeta {
        PlayerMeta {
            name: self.text(PLAYER_NAME, row),
            nationality: self.text(NATIONALITY, row),
            position: self.text(POSITION, row),
            team: self.text(TEAM, row),
            competition: self.text(COMPETITION, row),
            age: self.age(row),
        }
    }

    fn text(&self, name: &str, row: usize) -> String {
        match self.columns.get(name) {
            Some(Column::Text(values)) => values.get(row).cloned().flatten().unwrap_or_default(),
            Some(Column::Numeric(values)) => values
                .get(row)
                .copied()
                .flatten()
                .map(|v| v.to_string())
                .unwrap_or_default(),
            None => String::new(),
        }
    }

    fn age(&self, row: usize) -> Option<u32> {
        match self.columns.get(AGE)? {
            Column::Numeric(values) => values
                .get(row)
                .copied()
                .flatten()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v.floor() as u32),
            // Some exports carry "years-days", e.g. "27-114".
            Column::Text(values) => {
                let raw = values.get(row)?.as_deref()?.trim();
                let years: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
                years.parse::<u32>().ok()
            }
        }
    }

    /// SHA-256 over column names, kinds and values in column-name order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.rows as u64).to_le_bytes());
        for (name, column) in &self.columns {
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            match column {
                Column::Text(values) => {
                    hasher.update([b't']);
                    for value in values {
                        match value {
                            Some(s) => {
                                hasher.update([1u8]);
                                hasher.update((s.len() as u64).to_le_bytes());
                                hasher.update(s.as_bytes());
                            }
                            None => hasher.update([0u8]),
                        }
                    }
                }
                Column::Numeric(values) => {
                    hasher.update([b'n']);
                    for value in values {
                        match value {
                            Some(v) => {
                                hasher.update([1u8]);
                                hasher.update(v.to_bits().to_le_bytes());
                            }
                            None => hasher.update([0u8]),
                        }
                    }
                }
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, nineties: f64, goals: Option<f64>) -> PlayerRecord {
        let mut stats = BTreeMap::new();
        stats.insert("Goals-PK".to_string(), goals);
        PlayerRecord {
            meta: PlayerMeta {
                name: name.to_string(),
                team: "Club".to_string(),
                age: Some(24),
                ..Default::default()
            },
            nineties: Some(nineties),
            stats,
        }
    }

    #[test]
    fn from_records_lays_out_columns() {
        let snap = DatasetSnapshot::from_records(&[
            record("A", 10.0, Some(4.0)),
            record("B", 5.0, None),
        ]);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.numeric("Goals-PK").unwrap(), &[Some(4.0), None]);
        assert_eq!(snap.meta(1).name, "B");
        assert_eq!(snap.meta(0).age, Some(24));
    }

    #[test]
    fn schema_errors_name_the_column() {
        let snap = DatasetSnapshot::from_records(&[record("A", 10.0, Some(1.0))]);
        let err = snap
            .require_columns(&PipelineConfig::default())
            .expect_err("most stat columns are absent");
        assert_eq!(err, PipelineError::MissingColumn("Shots".to_string()));

        let mut snap = DatasetSnapshot::new();
        snap.insert_column(PLAYER_NAME, Column::Text(vec![Some("A".into())]))
            .unwrap();
        assert!(matches!(
            snap.numeric(PLAYER_NAME),
            Err(PipelineError::NonNumericColumn(_))
        ));
        let ragged = snap.insert_column(NINETIES, Column::Numeric(vec![Some(1.0), Some(2.0)]));
        assert!(matches!(ragged, Err(PipelineError::RaggedColumn { .. })));
    }

    #[test]
    fn text_age_keeps_years() {
        let mut snap = DatasetSnapshot::new();
        snap.insert_column(AGE, Column::Text(vec![Some("27-114".into()), None]))
            .unwrap();
        assert_eq!(snap.meta(0).age, Some(27));
        assert_eq!(snap.meta(1).age, None);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = DatasetSnapshot::from_records(&[record("A", 10.0, Some(4.0))]);
        let b = DatasetSnapshot::from_records(&[record("A", 10.0, Some(4.0))]);
        let c = DatasetSnapshot::from_records(&[record("A", 10.0, Some(4.5))]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
