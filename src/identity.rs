use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::warn;

use crate::dataset::PlayerMeta;
use crate::error::PipelineWarning;

// Widening steps tried in order for players sharing a name.
const LEVELS: usize = 4;

fn qualifiers(meta: &PlayerMeta, level: usize) -> Vec<String> {
    let age = meta.age.map(|a| a.to_string()).unwrap_or_default();
    [
        meta.team.trim().to_string(),
        age,
        meta.competition.trim().to_string(),
        meta.nationality.trim().to_string(),
    ]
    .into_iter()
    .take(level)
    .filter(|part| !part.is_empty())
    .collect()
}

fn widened(meta: &PlayerMeta, level: usize) -> String {
    let name = meta.name.trim();
    let parts = qualifiers(meta, level);
    if parts.is_empty() {
        name.to_string()
    } else {
        format!("{name} ({})", parts.join(", "))
    }
}

/// Unique display key per row. A bare name is used when it is unique;
/// otherwise the whole group is widened with team, then age, then
/// competition and nationality until its keys differ. Rows that stay
/// identical get an ordinal suffix. Rows are never merged.
pub fn player_keys(meta: &[PlayerMeta]) -> (Vec<String>, Vec<PipelineWarning>) {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, m) in meta.iter().enumerate() {
        groups.entry(m.name.trim()).or_default().push(idx);
    }

    let mut keys = vec![String::new(); meta.len()];
    let mut warnings = Vec::new();
    for (name, rows) in &groups {
        if rows.len() == 1 {
            keys[rows[0]] = name.to_string();
            continue;
        }
        warn!(name, rows = rows.len(), "player name shared by several rows");
        warnings.push(PipelineWarning::IdentityCollision {
            name: name.to_string(),
            rows: rows.len(),
        });

        let mut chosen = None;
        for level in 1..=LEVELS {
            let candidate: Vec<String> = rows.iter().map(|&r| widened(&meta[r], level)).collect();
            let unique: HashSet<&String> = candidate.iter().collect();
            chosen = Some(candidate.clone());
            if unique.len() == rows.len() {
                break;
            }
        }
        if let Some(candidate) = chosen {
            for (&row, key) in rows.iter().zip(candidate) {
                keys[row] = key;
            }
        }
    }

    // A widened key can still repeat, or clash with a literal name elsewhere.
    let mut seen: HashMap<String, usize> = HashMap::new();
    for key in keys.iter_mut() {
        let count = seen.entry(key.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            let mut ordinal = *count;
            let mut candidate = format!("{key} #{ordinal}");
            while seen.contains_key(&candidate) {
                ordinal += 1;
                candidate = format!("{key} #{ordinal}");
            }
            seen.insert(candidate.clone(), 1);
            *key = candidate;
        }
    }

    (keys, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str, team: &str, age: Option<u32>) -> PlayerMeta {
        PlayerMeta {
            name: name.into(),
            team: team.into(),
            age,
            competition: "Premier League".into(),
            nationality: "ENG".into(),
            ..Default::default()
        }
    }

    #[test]
    fn unique_names_stay_bare() {
        let (keys, warnings) = player_keys(&[
            meta("Rice", "Arsenal", Some(25)),
            meta("Saka", "Arsenal", Some(22)),
        ]);
        assert_eq!(keys, vec!["Rice", "Saka"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn collisions_widen_by_team_then_age() {
        let rows = [
            meta("Danilo", "Juventus", Some(32)),
            meta("Danilo", "Nottingham Forest", Some(23)),
            meta("Rodri", "Man City", Some(27)),
            meta("Rodri", "Man City", Some(22)),
        ];
        let (keys, warnings) = player_keys(&rows);
        assert_eq!(keys[0], "Danilo (Juventus)");
        assert_eq!(keys[1], "Danilo (Nottingham Forest)");
        assert_eq!(keys[2], "Rodri (Man City, 27)");
        assert_eq!(keys[3], "Rodri (Man City, 22)");
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn identical_rows_get_ordinals() {
        let rows = [meta("Twin", "Club", Some(20)), meta("Twin", "Club", Some(20))];
        let (keys, warnings) = player_keys(&rows);
        assert_ne!(keys[0], keys[1]);
        assert!(keys[1].ends_with("#2"));
        assert_eq!(
            warnings,
            vec![PipelineWarning::IdentityCollision { name: "Twin".into(), rows: 2 }]
        );
    }
}
