//! Cluster rules and their evaluation.
//!
//! A cluster groups habits under a quota: the cluster counts as done for a
//! day once `required_count` of its habits are completed. Evaluation is pure
//! and depends only on its arguments.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Fixed cluster categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterCategory {
    Physical,
    Mental,
    Diet,
}

impl ClusterCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterCategory::Physical => "physical",
            ClusterCategory::Mental => "mental",
            ClusterCategory::Diet => "diet",
        }
    }
}

/// A named group of habits with a daily quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub category: ClusterCategory,
    pub habit_ids: BTreeSet<String>,
    pub required_count: usize,
}

impl Cluster {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: ClusterCategory,
        habit_ids: impl IntoIterator<Item = impl Into<String>>,
        required_count: usize,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            habit_ids: habit_ids.into_iter().map(Into::into).collect(),
            required_count,
        }
    }

    /// Check `required_count <= |habit_ids|`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.required_count > self.habit_ids.len() {
            return Err(ValidationError::QuotaTooLarge {
                cluster: self.id.clone(),
                required: self.required_count,
                available: self.habit_ids.len(),
            });
        }
        Ok(())
    }

    pub fn contains(&self, habit_id: &str) -> bool {
        self.habit_ids.contains(habit_id)
    }
}

/// Validate a full cluster set: every quota satisfiable, ids unique.
pub fn validate_clusters(clusters: &[Cluster]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for cluster in clusters {
        cluster.validate()?;
        if !seen.insert(cluster.id.as_str()) {
            return Err(ValidationError::DuplicateCluster(cluster.id.clone()));
        }
    }
    Ok(())
}

/// Completed-vs-required counts for one cluster on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterProgress {
    pub completed: usize,
    pub required: usize,
}

impl ClusterProgress {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.required
    }
}

/// Clusters done for a day, out of all configured clusters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverallProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
}

/// How many of the cluster's habits appear in `completed`.
fn completed_in(cluster: &Cluster, completed: &BTreeSet<String>) -> usize {
    cluster
        .habit_ids
        .iter()
        .filter(|id| completed.contains(*id))
        .count()
}

/// True iff `|habit_ids ∩ completed| >= required_count`.
pub fn is_complete(cluster: &Cluster, completed: &BTreeSet<String>) -> bool {
    completed_in(cluster, completed) >= cluster.required_count
}

pub fn progress(cluster: &Cluster, completed: &BTreeSet<String>) -> ClusterProgress {
    ClusterProgress {
        completed: completed_in(cluster, completed),
        required: cluster.required_count,
    }
}

/// True iff every cluster is complete. Vacuously true for no clusters.
pub fn all_complete(clusters: &[Cluster], completed: &BTreeSet<String>) -> bool {
    clusters.iter().all(|c| is_complete(c, completed))
}

pub fn overall_progress(clusters: &[Cluster], completed: &BTreeSet<String>) -> OverallProgress {
    let done = clusters
        .iter()
        .filter(|c| is_complete(c, completed))
        .count();
    let total = clusters.len();
    let percentage = if total == 0 {
        0.0
    } else {
        done as f64 / total as f64 * 100.0
    };
    OverallProgress {
        completed: done,
        total,
        percentage,
    }
}

/// Built-in clusters used when no configuration overrides them.
pub fn default_clusters() -> Vec<Cluster> {
    vec![
        Cluster::new(
            "physical",
            "Physical",
            ClusterCategory::Physical,
            ["workout", "walk", "stretch"],
            2,
        ),
        Cluster::new(
            "mental",
            "Mental",
            ClusterCategory::Mental,
            ["meditation", "reading", "journaling"],
            2,
        ),
        Cluster::new(
            "diet",
            "Diet",
            ClusterCategory::Diet,
            ["water", "vegetables", "no_sugar"],
            2,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn abc(required: usize) -> Cluster {
        Cluster::new("c", "C", ClusterCategory::Mental, ["a", "b", "c"], required)
    }

    #[test]
    fn quota_of_two_out_of_three() {
        let cluster = abc(2);
        assert!(is_complete(&cluster, &set(&["a", "c"])));
        assert!(!is_complete(&cluster, &set(&["a"])));
    }

    #[test]
    fn habits_outside_cluster_do_not_count() {
        let cluster = abc(2);
        assert!(!is_complete(&cluster, &set(&["a", "x", "y"])));
        assert_eq!(
            progress(&cluster, &set(&["a", "x", "y"])),
            ClusterProgress { completed: 1, required: 2 }
        );
    }

    #[test]
    fn empty_completed_only_satisfies_zero_quota() {
        assert!(!is_complete(&abc(1), &BTreeSet::new()));
        assert!(is_complete(&abc(0), &BTreeSet::new()));
    }

    #[test]
    fn validate_rejects_unreachable_quota() {
        assert_eq!(
            abc(4).validate(),
            Err(ValidationError::QuotaTooLarge {
                cluster: "c".into(),
                required: 4,
                available: 3,
            })
        );
        assert!(abc(3).validate().is_ok());
    }

    #[test]
    fn validate_clusters_rejects_duplicates() {
        let result = validate_clusters(&[abc(1), abc(2)]);
        assert_eq!(result, Err(ValidationError::DuplicateCluster("c".into())));
        assert!(validate_clusters(&default_clusters()).is_ok());
    }

    #[test]
    fn overall_progress_counts_complete_clusters() {
        let clusters = default_clusters();
        let completed = set(&["workout", "walk", "meditation"]);
        let overall = overall_progress(&clusters, &completed);
        assert_eq!(overall.completed, 1);
        assert_eq!(overall.total, 3);
        assert!((overall.percentage - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(overall_progress(&[], &completed).percentage, 0.0);
    }

    #[test]
    fn category_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ClusterCategory::Physical).unwrap(),
            "\"physical\""
        );
        assert_eq!(ClusterCategory::Diet.as_str(), "diet");
    }

    proptest! {
        #[test]
        fn is_complete_matches_intersection_size(
            members in proptest::collection::btree_set("[a-f]", 0..6),
            completed in proptest::collection::btree_set("[a-h]", 0..8),
            required in 0usize..7,
        ) {
            let cluster = Cluster {
                id: "p".into(),
                name: "P".into(),
                category: ClusterCategory::Physical,
                habit_ids: members.clone(),
                required_count: required,
            };
            let overlap = members.intersection(&completed).count();
            prop_assert_eq!(is_complete(&cluster, &completed), overlap >= required);
            prop_assert_eq!(progress(&cluster, &completed).completed, overlap);
        }
    }
}
