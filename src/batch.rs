//! Host batching for staged rolling changes.
//!
//! The planner partitions a fleet of hosts into an ordered sequence of
//! disjoint, non-empty groups; an upgrade orchestrator applies a change to
//! one group, confirms success, and proceeds to the next. Planning is pure:
//! identical input and strategy always produce identical output, so it needs
//! no locking and may run concurrently with topology mutation over a
//! caller-supplied snapshot (see [`crate::ComponentNode::host_names`] for
//! the canonical snapshot order).

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Strategy selecting how a host set is partitioned into rollout batches.
///
/// The strategy set is closed; all variants implement the same grouping
/// contract through [`group_hosts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchStrategy {
    /// Fixed number of hosts per batch; the final batch holds the remainder.
    Count {
        /// Hosts per batch, must be positive
        group_size: usize,
    },

    /// Fixed number of batches, sized as evenly as possible; earlier batches
    /// absorb the remainder. Capped at one host per batch for small fleets.
    Groups {
        /// Number of batches, must be positive
        group_count: usize,
    },

    /// Batch size as a percentage of the fleet, rounded down, at least one
    /// host per batch.
    Percent {
        /// Percentage of the fleet per batch, in `1..=100`
        percent: u8,
    },
}

impl BatchStrategy {
    fn validate(&self) -> ControlResult<()> {
        match *self {
            BatchStrategy::Count { group_size } if group_size == 0 => Err(
                ControlError::Configuration("count strategy requires a positive group size".into()),
            ),
            BatchStrategy::Groups { group_count } if group_count == 0 => Err(
                ControlError::Configuration("groups strategy requires a positive group count".into()),
            ),
            BatchStrategy::Percent { percent } if percent == 0 || percent > 100 => {
                Err(ControlError::Configuration(format!(
                    "percent strategy requires a percentage in 1..=100, got {}",
                    percent
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Partition `hosts` into an ordered sequence of disjoint, non-empty batches.
///
/// The union of the batches is exactly the input, relative host order is
/// preserved, and no batch is ever empty; an empty input yields an empty
/// sequence. Fails with [`ControlError::Configuration`] on invalid strategy
/// parameters before producing any groups.
pub fn group_hosts(hosts: &[String], strategy: &BatchStrategy) -> ControlResult<Vec<Vec<String>>> {
    strategy.validate()?;
    if hosts.is_empty() {
        return Ok(Vec::new());
    }

    let groups = match *strategy {
        BatchStrategy::Count { group_size } => chunk_by_size(hosts, group_size),
        BatchStrategy::Groups { group_count } => chunk_by_count(hosts, group_count),
        BatchStrategy::Percent { percent } => {
            let size = (hosts.len() * percent as usize / 100).max(1);
            chunk_by_size(hosts, size)
        }
    };
    Ok(groups)
}

/// Close the current group after every `group_size`-th host, but only while
/// hosts remain to be placed, so the trailing remainder group is never empty
/// and a perfectly divisible fleet produces no empty final group.
fn chunk_by_size(hosts: &[String], group_size: usize) -> Vec<Vec<String>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    for (index, host) in hosts.iter().enumerate() {
        current.push(host.clone());
        let placed = index + 1;
        if placed % group_size == 0 && placed < hosts.len() {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Split into exactly `group_count` batches (capped at the fleet size), the
/// first `len % count` batches one host larger.
fn chunk_by_count(hosts: &[String], group_count: usize) -> Vec<Vec<String>> {
    let count = group_count.min(hosts.len());
    let base = hosts.len() / count;
    let remainder = hosts.len() % count;

    let mut groups = Vec::with_capacity(count);
    let mut offset = 0;
    for index in 0..count {
        let size = if index < remainder { base + 1 } else { base };
        groups.push(hosts[offset..offset + size].to_vec());
        offset += size;
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn assert_covers_in_order(input: &[String], groups: &[Vec<String>]) {
        let flattened: Vec<String> = groups.iter().flatten().cloned().collect();
        assert_eq!(flattened, input);
        assert!(groups.iter().all(|g| !g.is_empty()));
    }

    #[test]
    fn count_groups_of_two_with_remainder() {
        let input = hosts(&["h1", "h2", "h3", "h4", "h5"]);
        let groups = group_hosts(&input, &BatchStrategy::Count { group_size: 2 }).unwrap();
        assert_eq!(
            groups,
            vec![hosts(&["h1", "h2"]), hosts(&["h3", "h4"]), hosts(&["h5"])]
        );
    }

    #[test]
    fn count_of_one_yields_singletons_in_order() {
        let input = hosts(&["h1", "h2", "h3"]);
        let groups = group_hosts(&input, &BatchStrategy::Count { group_size: 1 }).unwrap();
        assert_eq!(groups, vec![hosts(&["h1"]), hosts(&["h2"]), hosts(&["h3"])]);
    }

    #[test]
    fn count_covering_the_whole_fleet_yields_one_group() {
        let input = hosts(&["h1", "h2", "h3"]);
        for group_size in [3, 4, 100] {
            let groups = group_hosts(&input, &BatchStrategy::Count { group_size }).unwrap();
            assert_eq!(groups, vec![input.clone()]);
        }
    }

    #[test]
    fn perfectly_divisible_fleet_has_no_trailing_empty_group() {
        let input = hosts(&["h1", "h2", "h3", "h4"]);
        let groups = group_hosts(&input, &BatchStrategy::Count { group_size: 2 }).unwrap();
        assert_eq!(groups, vec![hosts(&["h1", "h2"]), hosts(&["h3", "h4"])]);
    }

    #[test]
    fn zero_group_size_is_a_configuration_error() {
        let input = hosts(&["h1"]);
        let err = group_hosts(&input, &BatchStrategy::Count { group_size: 0 }).unwrap_err();
        assert!(matches!(err, ControlError::Configuration(_)));

        // Validation precedes the empty-input short circuit.
        let err = group_hosts(&[], &BatchStrategy::Count { group_size: 0 }).unwrap_err();
        assert!(matches!(err, ControlError::Configuration(_)));
    }

    #[test]
    fn empty_input_yields_an_empty_sequence() {
        for strategy in [
            BatchStrategy::Count { group_size: 3 },
            BatchStrategy::Groups { group_count: 3 },
            BatchStrategy::Percent { percent: 20 },
        ] {
            assert!(group_hosts(&[], &strategy).unwrap().is_empty());
        }
    }

    #[test]
    fn count_properties_hold_across_sizes() {
        let input: Vec<String> = (0..23).map(|i| format!("host-{:02}", i)).collect();
        for group_size in 1..=25 {
            let groups = group_hosts(&input, &BatchStrategy::Count { group_size }).unwrap();
            assert_covers_in_order(&input, &groups);
            for group in &groups[..groups.len() - 1] {
                assert_eq!(group.len(), group_size);
            }
            assert!(groups.last().unwrap().len() <= group_size);
        }
    }

    #[test]
    fn groups_strategy_splits_evenly() {
        let input = hosts(&["h1", "h2", "h3", "h4", "h5"]);
        let groups = group_hosts(&input, &BatchStrategy::Groups { group_count: 2 }).unwrap();
        assert_eq!(groups, vec![hosts(&["h1", "h2", "h3"]), hosts(&["h4", "h5"])]);
    }

    #[test]
    fn groups_strategy_caps_at_fleet_size() {
        let input = hosts(&["h1", "h2"]);
        let groups = group_hosts(&input, &BatchStrategy::Groups { group_count: 5 }).unwrap();
        assert_eq!(groups, vec![hosts(&["h1"]), hosts(&["h2"])]);
    }

    #[test]
    fn zero_group_count_is_a_configuration_error() {
        let input = hosts(&["h1"]);
        let err = group_hosts(&input, &BatchStrategy::Groups { group_count: 0 }).unwrap_err();
        assert!(matches!(err, ControlError::Configuration(_)));
    }

    #[test]
    fn percent_strategy_sizes_from_the_fleet() {
        let input: Vec<String> = (0..10).map(|i| format!("host-{}", i)).collect();
        let groups = group_hosts(&input, &BatchStrategy::Percent { percent: 30 }).unwrap();
        assert_covers_in_order(&input, &groups);
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[3].len(), 1);
    }

    #[test]
    fn percent_strategy_never_yields_an_empty_batch() {
        let input = hosts(&["h1", "h2"]);
        let groups = group_hosts(&input, &BatchStrategy::Percent { percent: 1 }).unwrap();
        assert_eq!(groups, vec![hosts(&["h1"]), hosts(&["h2"])]);
    }

    #[test]
    fn out_of_range_percent_is_a_configuration_error() {
        let input = hosts(&["h1"]);
        for percent in [0, 101] {
            let err = group_hosts(&input, &BatchStrategy::Percent { percent }).unwrap_err();
            assert!(matches!(err, ControlError::Configuration(_)));
        }
    }

    #[test]
    fn planning_is_deterministic() {
        let input: Vec<String> = (0..17).map(|i| format!("host-{:02}", i)).collect();
        let strategy = BatchStrategy::Count { group_size: 4 };
        let first = group_hosts(&input, &strategy).unwrap();
        let second = group_hosts(&input, &strategy).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn strategy_deserializes_from_tagged_config() {
        let strategy: BatchStrategy =
            serde_json::from_str(r#"{"type":"count","group_size":3}"#).unwrap();
        assert_eq!(strategy, BatchStrategy::Count { group_size: 3 });

        let strategy: BatchStrategy =
            serde_json::from_str(r#"{"type":"percent","percent":25}"#).unwrap();
        assert_eq!(strategy, BatchStrategy::Percent { percent: 25 });
    }
}
