//! Best operating point of a hyperparameter sweep, by area under the curve.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::aggregate::{push_csv_record, AggregatedTable, SplitGroup, TableKind};
use crate::config::SweepConfig;
use crate::dataset::DatasetLayout;
use crate::error::{EvalError, Result};
use crate::thresholds::{ScoreVector, ThresholdGrid};

/// Table produced under one hyperparameter value.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepCandidate {
    /// Hyperparameter label, e.g. `"0.85"`.
    pub label: String,
    pub table: AggregatedTable,
}

/// Winning curve of one (algorithm, split).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BestCurve {
    pub algorithm: String,
    pub curve: ScoreVector,
    pub auc: f64,
    pub hyperparameter: String,
}

/// Per-split winners, algorithms in first-seen order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SweepResult {
    pub kind: TableKind,
    pub thresholds: ThresholdGrid,
    pub illumination: Vec<BestCurve>,
    pub viewpoint: Vec<BestCurve>,
    pub overall: Vec<BestCurve>,
    /// Per-layer schedules of the winning hyperparameter values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schedules: BTreeMap<String, Vec<f64>>,
}

impl SweepResult {
    pub fn group(&self, group: SplitGroup) -> &[BestCurve] {
        match group {
            SplitGroup::Illumination => &self.illumination,
            SplitGroup::Viewpoint => &self.viewpoint,
            SplitGroup::All => &self.overall,
        }
    }

    pub fn best(&self, group: SplitGroup, algorithm: &str) -> Option<&BestCurve> {
        self.group(group).iter().find(|b| b.algorithm == algorithm)
    }

    /// Attach the schedules of hyperparameter values that won at least one
    /// (algorithm, split).
    pub fn with_schedules<'a>(
        mut self,
        schedules: impl IntoIterator<Item = (&'a str, &'a [f64])>,
    ) -> Self {
        for (label, ratios) in schedules {
            let won = SplitGroup::ALL
                .iter()
                .any(|&g| self.group(g).iter().any(|b| b.hyperparameter == label));
            if won && !ratios.is_empty() {
                self.schedules.insert(label.to_string(), ratios.to_vec());
            }
        }
        self
    }

    /// `Algorithms,Illumination All,Viewpoint All,All Results` with the
    /// winning hyperparameter label per cell.
    pub fn winners_csv(&self) -> String {
        let mut out = String::new();
        let mut header = vec!["Algorithms".to_string()];
        header.extend(SplitGroup::ALL.iter().map(|g| g.label().to_string()));
        push_csv_record(&mut out, &header);
        for best in &self.overall {
            let mut fields = vec![best.algorithm.clone()];
            for group in SplitGroup::ALL {
                let label = self
                    .best(group, &best.algorithm)
                    .map(|b| b.hyperparameter.clone())
                    .unwrap_or_default();
                fields.push(label);
            }
            push_csv_record(&mut out, &fields);
        }
        out
    }
}

/// Select, per (algorithm, split), the curve with the greatest AUC.
///
/// Only a strictly greater AUC replaces the current best, so ties keep the
/// earliest candidate. All candidates must share the table kind and grid.
pub fn select_best(candidates: &[SweepCandidate]) -> Result<SweepResult> {
    let Some(first) = candidates.first() else {
        return Err(EvalError::Config("sweep has no candidates".into()));
    };
    let kind = first.table.kind();
    let thresholds = first.table.thresholds().clone();
    for c in &candidates[1..] {
        if c.table.kind() != kind {
            return Err(EvalError::SweepMismatch(format!(
                "candidate '{}' is a {:?} table, expected {:?}",
                c.label,
                c.table.kind(),
                kind
            )));
        }
        if *c.table.thresholds() != thresholds {
            return Err(EvalError::SweepMismatch(format!(
                "candidate '{}' uses a different threshold grid",
                c.label
            )));
        }
    }

    let mut order: Vec<String> = Vec::new();
    let mut slots: HashMap<String, [Option<BestCurve>; 3]> = HashMap::new();
    for candidate in candidates {
        for row in candidate.table.rows() {
            let entry = slots.entry(row.algorithm.clone()).or_insert_with(|| {
                order.push(row.algorithm.clone());
                [None, None, None]
            });
            for (slot, (group, block)) in entry
                .iter_mut()
                .zip(SplitGroup::ALL.iter().zip(&row.blocks))
            {
                let auc = block.curve.auc();
                if slot.as_ref().map_or(true, |b| auc > b.auc) {
                    tracing::debug!(
                        algorithm = %row.algorithm,
                        split = group.label(),
                        hyperparameter = %candidate.label,
                        auc,
                        "new best curve"
                    );
                    *slot = Some(BestCurve {
                        algorithm: row.algorithm.clone(),
                        curve: block.curve.clone(),
                        auc,
                        hyperparameter: candidate.label.clone(),
                    });
                }
            }
        }
    }

    let mut groups: [Vec<BestCurve>; 3] = Default::default();
    for algorithm in &order {
        if let Some(entry) = slots.remove(algorithm) {
            for (out, best) in groups.iter_mut().zip(entry) {
                out.extend(best);
            }
        }
    }
    let [illumination, viewpoint, overall] = groups;

    Ok(SweepResult {
        kind,
        thresholds,
        illumination,
        viewpoint,
        overall,
        schedules: BTreeMap::new(),
    })
}

/// Load the `kind` table of every sweep value, in configuration order.
pub fn load_candidates(
    config: &SweepConfig,
    results_root: &Path,
    kind: TableKind,
) -> Result<Vec<SweepCandidate>> {
    config.validate()?;
    config
        .values
        .iter()
        .map(|value| {
            let dir = value.results_dir(results_root);
            let path = DatasetLayout::new("", dir).table_path(kind);
            tracing::debug!(label = %value.label, "Loading {}", path.display());
            Ok(SweepCandidate {
                label: value.label.clone(),
                table: AggregatedTable::load_csv(&path, kind)?,
            })
        })
        .collect()
}

/// Load, select, and attach the winners' layer schedules.
pub fn run_sweep(
    config: &SweepConfig,
    results_root: &Path,
    kind: TableKind,
) -> Result<SweepResult> {
    let candidates = load_candidates(config, results_root, kind)?;
    let result = select_best(&candidates)?;
    tracing::info!(
        kind = ?kind,
        n_values = candidates.len(),
        n_algorithms = result.overall.len(),
        "Sweep selected best curves"
    );
    Ok(result.with_schedules(
        config
            .values
            .iter()
            .map(|v| (v.label.as_str(), v.layer_ratios.as_slice())),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{SplitBlock, TableRow};

    fn block(curve: Vec<f64>) -> SplitBlock {
        SplitBlock {
            curve: ScoreVector(curve),
            aux: [0.0; 2],
        }
    }

    fn row(algorithm: &str, curves: [Vec<f64>; 3]) -> TableRow {
        TableRow {
            algorithm: algorithm.to_string(),
            blocks: curves.map(block),
        }
    }

    fn candidate(label: &str, rows: Vec<TableRow>) -> SweepCandidate {
        SweepCandidate {
            label: label.to_string(),
            table: AggregatedTable::new(TableKind::Mma, ThresholdGrid::default(), rows).unwrap(),
        }
    }

    fn flat(v: f64) -> Vec<f64> {
        vec![v; 10]
    }

    #[test]
    fn tie_keeps_first_seen_candidate() {
        let a = flat(0.8);
        let sweep = [
            candidate("0.8", vec![row("sift", [a.clone(), a.clone(), a.clone()])]),
            candidate("0.9", vec![row("sift", [a.clone(), a.clone(), a])]),
        ];
        let result = select_best(&sweep).unwrap();
        let best = result.best(SplitGroup::All, "sift").unwrap();
        assert_eq!(best.hyperparameter, "0.8");
        assert!((best.auc - 7.2).abs() < 1e-12);
    }

    #[test]
    fn tie_between_different_curves_keeps_first_curve() {
        let first = flat(0.5);
        let mut second = flat(0.5);
        second[0] = 0.0;
        second[9] = 1.0;
        assert_eq!(trapezoid(&first), trapezoid(&second));
        let sweep = [
            candidate("a", vec![row("x", [first.clone(), first.clone(), first.clone()])]),
            candidate("b", vec![row("x", [second.clone(), second.clone(), second])]),
        ];
        let result = select_best(&sweep).unwrap();
        assert_eq!(result.best(SplitGroup::Viewpoint, "x").unwrap().curve.values(), &first[..]);
    }

    fn trapezoid(v: &[f64]) -> f64 {
        crate::thresholds::trapezoid_auc(v)
    }

    #[test]
    fn splits_pick_winners_independently() {
        let sweep = [
            candidate("low", vec![row("orb", [flat(0.9), flat(0.1), flat(0.5)])]),
            candidate("mid", vec![row("orb", [flat(0.2), flat(0.8), flat(0.5)])]),
            candidate("high", vec![row("orb", [flat(0.3), flat(0.3), flat(0.6)])]),
        ];
        let result = select_best(&sweep).unwrap();
        assert_eq!(result.best(SplitGroup::Illumination, "orb").unwrap().hyperparameter, "low");
        assert_eq!(result.best(SplitGroup::Viewpoint, "orb").unwrap().hyperparameter, "mid");
        assert_eq!(result.best(SplitGroup::All, "orb").unwrap().hyperparameter, "high");
        assert_eq!(
            result.winners_csv(),
            "Algorithms,Illumination All,Viewpoint All,All Results\norb,low,mid,high\n"
        );
    }

    #[test]
    fn algorithms_keep_first_seen_order() {
        let sweep = [
            candidate("1", vec![row("b", [flat(0.1), flat(0.1), flat(0.1)])]),
            candidate(
                "2",
                vec![
                    row("a", [flat(0.2), flat(0.2), flat(0.2)]),
                    row("b", [flat(0.3), flat(0.3), flat(0.3)]),
                ],
            ),
        ];
        let result = select_best(&sweep).unwrap();
        let names: Vec<&str> = result.overall.iter().map(|b| b.algorithm.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(result.overall[0].hyperparameter, "2");
    }

    #[test]
    fn empty_and_mismatched_sweeps_fail() {
        assert!(matches!(select_best(&[]), Err(EvalError::Config(_))));

        let mma = candidate("a", vec![row("x", [flat(0.1), flat(0.1), flat(0.1)])]);
        let hea = SweepCandidate {
            label: "b".into(),
            table: AggregatedTable::new(TableKind::Hea, ThresholdGrid::default(), vec![]).unwrap(),
        };
        assert!(matches!(select_best(&[mma.clone(), hea]), Err(EvalError::SweepMismatch(_))));

        let coarse = SweepCandidate {
            label: "c".into(),
            table: AggregatedTable::new(TableKind::Mma, ThresholdGrid::pixels(5), vec![]).unwrap(),
        };
        assert!(matches!(select_best(&[mma, coarse]), Err(EvalError::SweepMismatch(_))));
    }

    #[test]
    fn schedules_are_kept_for_winners_only() {
        let sweep = [
            candidate("0.8", vec![row("dfm", [flat(0.9), flat(0.9), flat(0.9)])]),
            candidate("0.9", vec![row("dfm", [flat(0.1), flat(0.1), flat(0.1)])]),
        ];
        let ratios_a = [0.9, 0.9, 0.9, 0.9, 0.8];
        let ratios_b = [0.9, 0.9, 0.9, 0.9, 0.95];
        let result = select_best(&sweep)
            .unwrap()
            .with_schedules([("0.8", &ratios_a[..]), ("0.9", &ratios_b[..])]);
        assert_eq!(result.schedules.len(), 1);
        assert_eq!(result.schedules["0.8"], ratios_a);
    }

    #[test]
    fn run_sweep_reads_tables_from_value_dirs() {
        use crate::config::SweepValue;

        let dir = tempfile::tempdir().unwrap();
        let tables = [("0.8", 0.25), ("0.9", 0.5)];
        for (label, v) in tables {
            let out = dir.path().join(label);
            std::fs::create_dir_all(&out).unwrap();
            let c = candidate(label, vec![row("sift", [flat(v), flat(v), flat(v)])]);
            c.table
                .write_csv(&out.join("overall_results_mma.csv"), 2)
                .unwrap();
        }
        let config = SweepConfig {
            values: vec![
                SweepValue::from_label("0.8"),
                SweepValue {
                    layer_ratios: vec![0.9, 0.8],
                    ..SweepValue::from_label("0.9")
                },
            ],
        };
        let result = run_sweep(&config, dir.path(), TableKind::Mma).unwrap();
        let best = result.best(SplitGroup::All, "sift").unwrap();
        assert_eq!(best.hyperparameter, "0.9");
        assert_eq!(result.schedules["0.9"], vec![0.9, 0.8]);

        let missing = run_sweep(&SweepConfig::from_labels(["0.7"]), dir.path(), TableKind::Mma);
        assert!(matches!(missing, Err(EvalError::Io { .. })));
    }
}
