//! Catalog partitioning
//!
//! Splits two catalog snapshots into objects found only on the left, only on
//! the right, and on both sides. Objects are matched by comparison key, so
//! `PROD.SALES.ORDERS` and `DEV.SALES.ORDERS` are the same object.

use tablerecon_core::{CatalogSnapshot, PartitionResult};

/// Partition two snapshots by comparison key
pub fn partition(left: &CatalogSnapshot, right: &CatalogSnapshot) -> PartitionResult {
    let left_keys = left.keys();
    let right_keys = right.keys();

    let only_left = left_keys.difference(&right_keys).cloned().collect();
    let only_right = right_keys.difference(&left_keys).cloned().collect();
    let common = left_keys.intersection(&right_keys).cloned().collect();

    let result = PartitionResult {
        only_left,
        only_right,
        common,
    };

    tracing::debug!(
        left = left.container(),
        right = right.container(),
        only_left = result.only_left.len(),
        only_right = result.only_right.len(),
        common = result.common.len(),
        "Partitioned catalogs"
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use tablerecon_core::{ComparisonKey, ObjectIdentity};

    fn snapshot(container: &str, names: &[&str]) -> CatalogSnapshot {
        CatalogSnapshot::from_objects(
            container,
            names.iter().map(|name| ObjectIdentity::new(container, "SALES", *name)),
        )
    }

    fn keys(names: &[&str]) -> BTreeSet<ComparisonKey> {
        names.iter().map(|name| ComparisonKey::new("SALES", name)).collect()
    }

    #[test]
    fn test_overlapping_catalogs() {
        let left = snapshot("PROD", &["A", "B", "C"]);
        let right = snapshot("DEV", &["B", "C", "D"]);

        let result = partition(&left, &right);

        assert_eq!(result.only_left, keys(&["A"]));
        assert_eq!(result.only_right, keys(&["D"]));
        assert_eq!(result.common, keys(&["B", "C"]));
        assert!(!result.is_aligned());
    }

    #[test]
    fn test_self_comparison() {
        let left = snapshot("PROD", &["A", "B"]);

        let result = partition(&left, &left);

        assert!(result.is_aligned());
        assert_eq!(result.common, left.keys());
    }

    #[test]
    fn test_key_ignores_container_and_case() {
        let left = CatalogSnapshot::from_objects("PROD", [ObjectIdentity::new("PROD", "sales", "orders")]);
        let right = CatalogSnapshot::from_objects("dev", [ObjectIdentity::new("dev", "SALES", "Orders")]);

        let result = partition(&left, &right);
        assert_eq!(result.common, keys(&["ORDERS"]));
        assert_eq!(result.total(), 1);
    }

    #[test]
    fn test_empty_side() {
        let left = snapshot("PROD", &["A", "B"]);
        let right = CatalogSnapshot::new("DEV");

        let result = partition(&left, &right);
        assert_eq!(result.only_left, keys(&["A", "B"]));
        assert!(result.only_right.is_empty());
        assert!(result.common.is_empty());
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        // Every pair of subsets drawn from a four-object universe
        let universe = ["A", "B", "C", "D"];
        let subset = |mask: u8| -> Vec<&str> {
            universe
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, name)| *name)
                .collect()
        };

        for left_mask in 0..16u8 {
            for right_mask in 0..16u8 {
                let left = snapshot("L", &subset(left_mask));
                let right = snapshot("R", &subset(right_mask));
                let result = partition(&left, &right);

                assert!(result.only_left.is_disjoint(&result.only_right));
                assert!(result.only_left.is_disjoint(&result.common));
                assert!(result.only_right.is_disjoint(&result.common));

                let union: BTreeSet<_> = result
                    .only_left
                    .iter()
                    .chain(&result.only_right)
                    .chain(&result.common)
                    .cloned()
                    .collect();
                let expected: BTreeSet<_> = left.keys().union(&right.keys()).cloned().collect();
                assert_eq!(union, expected);
                assert_eq!(result.total(), expected.len());
            }
        }
    }
}
