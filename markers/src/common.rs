//! Cross-rotation marker reconciliation.
//!
//! Each rotation of the phantom produces its own tracked marker set, and
//! tracking can lose or spuriously gain markers per rotation. Downstream
//! 3D model alignment needs every projection to reference the same
//! physical markers, so only the tracks present in *every* rotation may
//! survive. The filter intersects marker indices across all input sets
//! and partitions any set into its shared and leftover members.

use std::collections::{HashMap, HashSet};

use crate::marker::MarkerSet;

/// Index intersection over a fixed group of marker sets.
///
/// Built once from N sets; an index is common iff at least one marker
/// carrying it appears in every one of the N inputs (duplicates within a
/// single set count once).
#[derive(Debug, Clone)]
pub struct CommonMarkerFilter {
    common_indexes: HashSet<i64>,
}

impl CommonMarkerFilter {
    /// Build the filter from the given marker sets.
    pub fn new(marker_sets: &[MarkerSet]) -> Self {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for set in marker_sets {
            let distinct: HashSet<i64> = set.markers().iter().filter_map(|m| m.index()).collect();
            for index in distinct {
                *counts.entry(index).or_insert(0) += 1;
            }
        }

        let common_indexes = counts
            .into_iter()
            .filter(|&(_, count)| count == marker_sets.len())
            .map(|(index, _)| index)
            .collect();

        Self { common_indexes }
    }

    /// Indices shared by every input set.
    pub fn common_indexes(&self) -> &HashSet<i64> {
        &self.common_indexes
    }

    /// Split a set into (common, unique) partitions.
    ///
    /// Markers whose index is shared by every input set go to `common`,
    /// the rest to `unique`, each partition keeping the input's relative
    /// order. Every output marker is an independent copy so that later
    /// transforms on one partition cannot alias the other.
    pub fn partition(&self, markers: &MarkerSet) -> (MarkerSet, MarkerSet) {
        let mut common = MarkerSet::new();
        let mut unique = MarkerSet::new();
        for m in markers {
            let is_common = m
                .index()
                .is_some_and(|index| self.common_indexes.contains(&index));
            if is_common {
                common.push(m.clone());
            } else {
                unique.push(m.clone());
            }
        }
        (common, unique)
    }
}
