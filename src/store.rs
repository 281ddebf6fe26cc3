//! Case library and progress tracking interfaces.
//!
//! The explanation pipeline does not depend on these; they describe the
//! collaborators a front end uses to keep saved scenarios and per-user
//! completion. In-memory implementations are provided for embedding.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

/// A saved scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Empty ids are assigned on insert.
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub query: Option<String>,
}

pub trait CaseStore {
    fn load_all(&self, user: &str) -> Vec<CaseRecord>;

    /// Returns false when a case with the same id or title exists.
    fn add(&mut self, user: &str, record: CaseRecord) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressStats {
    pub total: usize,
    pub completed: usize,
    pub completion_rate: f64,
    pub by_difficulty: BTreeMap<Difficulty, Tally>,
}

pub trait ProgressStore {
    fn mark_completed(&mut self, user: &str, id: &str);

    fn stats(&self, user: &str, all: &[CaseRecord]) -> ProgressStats;
}

/// Cases keyed by user.
#[derive(Debug, Default)]
pub struct MemoryCaseStore {
    cases: HashMap<String, Vec<CaseRecord>>,
    next_id: u64,
}

impl MemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaseStore for MemoryCaseStore {
    fn load_all(&self, user: &str) -> Vec<CaseRecord> {
        self.cases.get(user).cloned().unwrap_or_default()
    }

    fn add(&mut self, user: &str, mut record: CaseRecord) -> bool {
        if record.id.is_empty() {
            self.next_id += 1;
            record.id = format!("case-{}", self.next_id);
        }
        let cases = self.cases.entry(user.to_string()).or_default();
        if cases
            .iter()
            .any(|c| c.id == record.id || c.title == record.title)
        {
            return false;
        }
        cases.push(record);
        true
    }
}

/// Completed case ids keyed by user.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    completed: HashMap<String, BTreeSet<String>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn mark_completed(&mut self, user: &str, id: &str) {
        if user.is_empty() || id.is_empty() {
            return;
        }
        self.completed
            .entry(user.to_string())
            .or_default()
            .insert(id.to_string());
    }

    fn stats(&self, user: &str, all: &[CaseRecord]) -> ProgressStats {
        let done = self.completed.get(user);
        let mut by_difficulty: BTreeMap<Difficulty, Tally> = [
            Difficulty::Beginner,
            Difficulty::Intermediate,
            Difficulty::Advanced,
        ]
        .into_iter()
        .map(|d| (d, Tally::default()))
        .collect();

        for case in all.iter().filter(|c| !c.id.is_empty()) {
            let tally = by_difficulty
                .entry(case.difficulty.unwrap_or_default())
                .or_default();
            tally.total += 1;
            if done.is_some_and(|d| d.contains(&case.id)) {
                tally.completed += 1;
            }
        }

        let total: usize = by_difficulty.values().map(|t| t.total).sum();
        let completed: usize = by_difficulty.values().map(|t| t.completed).sum();
        ProgressStats {
            total,
            completed,
            completion_rate: if total > 0 {
                completed as f64 / total as f64
            } else {
                0.0
            },
            by_difficulty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: &str, title: &str, difficulty: Option<Difficulty>) -> CaseRecord {
        CaseRecord {
            id: id.to_string(),
            title: title.to_string(),
            difficulty,
            query: None,
        }
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut store = MemoryCaseStore::new();
        assert!(store.add("alice", case("1", "SQLi", None)));
        assert!(!store.add("alice", case("1", "Other title", None)));
        assert!(!store.add("alice", case("2", "SQLi", None)));
        assert!(store.add("bob", case("1", "SQLi", None)));
        assert_eq!(store.load_all("alice").len(), 1);
        assert!(store.load_all("carol").is_empty());
    }

    #[test]
    fn test_add_assigns_missing_id() {
        let mut store = MemoryCaseStore::new();
        assert!(store.add("alice", case("", "Brute force", None)));
        assert!(!store.load_all("alice")[0].id.is_empty());
    }

    #[test]
    fn test_progress_stats() {
        let all = vec![
            case("1", "a", Some(Difficulty::Beginner)),
            case("2", "b", Some(Difficulty::Advanced)),
            case("3", "c", None),
            case("", "no id", Some(Difficulty::Beginner)),
        ];
        let mut progress = MemoryProgressStore::new();
        progress.mark_completed("alice", "1");
        progress.mark_completed("alice", "3");
        progress.mark_completed("", "2");

        let stats = progress.stats("alice", &all);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 2);
        assert!((stats.completion_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.by_difficulty[&Difficulty::Beginner], Tally { total: 1, completed: 1 });
        assert_eq!(stats.by_difficulty[&Difficulty::Intermediate], Tally { total: 1, completed: 1 });
        assert_eq!(stats.by_difficulty[&Difficulty::Advanced], Tally { total: 1, completed: 0 });
    }

    #[test]
    fn test_empty_progress() {
        let stats = MemoryProgressStore::new().stats("nobody", &[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completion_rate, 0.0);
    }
}
