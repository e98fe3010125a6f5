use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::PlayerMeta;

pub const UNLABELED: &str = "Unlabeled";

pub const DEFAULT_ROLE_NAMES: [(u32, &str); 12] = [
    (1, "Centre Back (Defensive)"),
    (2, "Centre Back (Ball-Playing)"),
    (3, "All-Round Midfielder"),
    (4, "Inverted Fullback / Direct Passer"),
    (5, "Holding Midfielder / Destroyer"),
    (6, "Full Back (Attacking)"),
    (7, "Out-and-Out Goalscorer"),
    (8, "Target Man"),
    (9, "Hybrid Forward"),
    (10, "Wide Forward / Inside Forward"),
    (11, "No.10 / Playmaker"),
    (12, "Creative Wide Player"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRow {
    pub key: String,
    pub meta: PlayerMeta,
    pub cluster: u32,
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleTable {
    pub rows: Vec<RoleRow>,
}

impl RoleTable {
    pub fn find(&self, key: &str) -> Option<&RoleRow> {
        self.rows.iter().find(|row| row.key == key)
    }

    /// Keys whose bare player name matches, case-insensitively.
    pub fn keys_for_name(&self, name: &str) -> Vec<&str> {
        let needle = name.trim();
        self.rows
            .iter()
            .filter(|row| row.meta.name.trim().eq_ignore_ascii_case(needle))
            .map(|row| row.key.as_str())
            .collect()
    }

    pub fn members(&self, cluster: u32) -> Vec<&RoleRow> {
        self.rows.iter().filter(|row| row.cluster == cluster).collect()
    }

    /// Everyone sharing the cluster of `key`, the player included.
    pub fn players_like(&self, key: &str) -> Option<(u32, Vec<&RoleRow>)> {
        let cluster = self.find(key)?.cluster;
        Some((cluster, self.members(cluster)))
    }

    pub fn cluster_sizes(&self) -> BTreeMap<u32, usize> {
        let mut sizes = BTreeMap::new();
        for row in &self.rows {
            *sizes.entry(row.cluster).or_insert(0) += 1;
        }
        sizes
    }

    pub fn clusters(&self) -> Vec<(u32, &str)> {
        let mut out: BTreeMap<u32, &str> = BTreeMap::new();
        for row in &self.rows {
            out.entry(row.cluster).or_insert(row.role.as_str());
        }
        out.into_iter().collect()
    }
}
