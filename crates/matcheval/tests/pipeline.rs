//! End-to-end evaluation over a small on-disk dataset.

use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use matcheval::{
    run_sweep, AggregatedTable, DatasetLayout, EvalConfig, EvalError, Evaluator, SplitGroup,
    SweepConfig, TableKind,
};

const POINTS: [[f64; 2]; 8] = [
    [40.0, 30.0],
    [600.0, 42.0],
    [580.0, 440.0],
    [55.0, 455.0],
    [320.0, 240.0],
    [150.0, 300.0],
    [470.0, 120.0],
    [260.0, 90.0],
];

/// (split, subscene, stem B, translation of the ground-truth homography)
const PAIRS: [(&str, &str, &str, [f64; 2]); 4] = [
    ("illumination", "i_dome", "2", [0.0, 0.0]),
    ("viewpoint", "v_wall", "2", [20.0, -10.0]),
    ("illumination", "i_dome", "3", [0.0, 0.0]),
    ("viewpoint", "v_wall", "3", [-15.0, 5.0]),
];

fn write(path: &Path, text: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn json_points(points: &[[f64; 2]]) -> String {
    let items: Vec<String> = points.iter().map(|p| format!("[{}, {}]", p[0], p[1])).collect();
    format!("[{}]", items.join(", "))
}

fn build_dataset(dir: &Path) -> PathBuf {
    let data = dir.join("hpatches");
    let mut manifest = String::new();
    for (split, scene, stem_b, t) in PAIRS {
        let base = format!("{split}/{scene}");
        manifest.push_str(&format!(
            "{base}/1.png {base}/{stem_b}.png {base}/H_1_{stem_b}\n"
        ));
        write(
            &data.join(&base).join(format!("H_1_{stem_b}")),
            &format!("1 0 {}\n0 1 {}\n0 0 1\n", t[0], t[1]),
        );
        let image = data.join(&base).join("1.png");
        if !image.exists() {
            image::GrayImage::new(640, 480).save(&image).unwrap();
        }
    }
    write(&data.join("image_pairs.txt"), &manifest);
    data
}

/// Write artifacts for `algorithm`: matches displaced by `offset` from the
/// true projection. `skip` pairs get no artifact, `empty` pairs no matches.
fn write_artifacts(
    results: &Path,
    algorithm: &str,
    offset: f64,
    skip: &[usize],
    empty: &[usize],
) {
    for (i, (split, scene, stem_b, t)) in PAIRS.iter().enumerate() {
        if skip.contains(&i) {
            continue;
        }
        let points_b: Vec<[f64; 2]> = POINTS
            .iter()
            .map(|p| [p[0] + t[0] + offset, p[1] + t[1]])
            .collect();
        let matches = if empty.contains(&i) {
            "[]".to_string()
        } else {
            let pairs: Vec<String> = (0..POINTS.len()).map(|k| format!("[{k}, {k}]")).collect();
            format!("[{}]", pairs.join(", "))
        };
        let json = format!(
            r#"{{"pointsA": {}, "pointsB": {}, "matches": {matches}}}"#,
            json_points(&POINTS),
            json_points(&points_b)
        );
        let path = results
            .join(algorithm)
            .join("outputs")
            .join(split)
            .join(scene)
            .join(format!("1_{stem_b}_matches.json"));
        write(&path, &json);
    }
}

fn config() -> EvalConfig {
    EvalConfig {
        workers: Some(3),
        ..Default::default()
    }
}

#[test]
fn evaluates_and_writes_tables() {
    let dir = tempfile::tempdir().unwrap();
    let data = build_dataset(dir.path());
    let results = dir.path().join("results");
    write_artifacts(&results, "exact", 0.0, &[], &[]);
    write_artifacts(&results, "sparse", 0.0, &[], &[2]);
    write_artifacts(&results, "broken", 0.0, &[3], &[]);

    let config = config();
    let layout = config.layout(&data, &results);
    let evaluator = Evaluator::new(config, layout.clone()).unwrap();
    let algorithms: Vec<String> = ["exact", "sparse", "broken"].map(String::from).to_vec();
    let evaluation = evaluator.evaluate(&algorithms).unwrap();

    assert_eq!(evaluation.algorithms.len(), 2);
    assert_eq!(evaluation.failures.len(), 1);
    assert_eq!(evaluation.failures[0].algorithm, "broken");
    assert!(matches!(
        evaluation.failures[0].error,
        EvalError::MissingArtifact { .. }
    ));

    let exact = &evaluation.algorithms[0];
    assert_eq!(exact.scores.len(), 4);
    assert_eq!(exact.summary.diagnostics.n_illumination, 2);
    assert_eq!(exact.summary.diagnostics.n_viewpoint, 2);
    for group in SplitGroup::ALL {
        assert_eq!(exact.summary.mma.block(group).curve.values(), &[1.0; 10]);
        assert_eq!(exact.summary.hea.block(group).curve.values(), &[1.0; 10]);
    }

    let sparse = &evaluation.algorithms[1].summary;
    assert_eq!(sparse.diagnostics.empty_match_sets, 1);
    assert_eq!(sparse.mma.block(SplitGroup::Illumination).curve.values(), &[0.5; 10]);
    assert_eq!(sparse.mma.block(SplitGroup::Viewpoint).curve.values(), &[1.0; 10]);
    assert_eq!(sparse.mma.block(SplitGroup::All).curve.values(), &[0.75; 10]);
    // #Matches: (8 + 0) / 2 for illumination.
    assert_abs_diff_eq!(sparse.mma.block(SplitGroup::Illumination).aux[1], 4.0);
    assert_eq!(sparse.hea.block(SplitGroup::Illumination).curve.values(), &[0.5; 10]);

    let written = evaluation
        .write_outputs(&layout, evaluator.config())
        .unwrap();
    assert_eq!(written.len(), 6);
    assert!(!layout.pair_rows_path("broken", TableKind::Mma).exists());

    let mma = AggregatedTable::load_csv(&layout.table_path(TableKind::Mma), TableKind::Mma)
        .unwrap();
    let names: Vec<&str> = mma.rows().iter().map(|r| r.algorithm.as_str()).collect();
    assert_eq!(names, ["exact", "sparse"]);
    let all = mma.row("sparse").unwrap().block(SplitGroup::All);
    assert_abs_diff_eq!(all.curve.values()[0], 0.75, epsilon = 1e-9);
    assert_abs_diff_eq!(all.aux[0], 8.0, epsilon = 1e-9);

    let text = std::fs::read_to_string(layout.table_path(TableKind::Hea)).unwrap();
    let header: Vec<&str> = text.lines().next().unwrap().split(',').collect();
    assert_eq!(header.len(), 37);
    assert_eq!(header[0], "Algorithms");
    assert_eq!(header[1], "Illumination All");
    assert_eq!(header[13], "Viewpoint All");
    assert_eq!(header[25], "All Results");

    let pair_rows = std::fs::read_to_string(layout.pair_rows_path("sparse", TableKind::Mma))
        .unwrap();
    assert_eq!(pair_rows.lines().count(), 5);
}

#[test]
fn interleaved_manifest_matches_sorted_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let data = build_dataset(dir.path());
    let results = dir.path().join("results");
    write_artifacts(&results, "shifted", 2.5, &[], &[1]);

    let tables = |manifest_name: &str| {
        let layout = DatasetLayout::new(&data, &results).with_manifest_name(manifest_name);
        let evaluator = Evaluator::new(config(), layout).unwrap();
        let evaluation = evaluator.evaluate(&["shifted".to_string()]).unwrap();
        let cfg = evaluator.config();
        (
            evaluation.table(TableKind::Mma, cfg).unwrap().to_csv(4),
            evaluation.table(TableKind::Hea, cfg).unwrap().to_csv(4),
        )
    };

    let manifest = std::fs::read_to_string(data.join("image_pairs.txt")).unwrap();
    let mut lines: Vec<&str> = manifest.lines().collect();
    lines.sort();
    write(&data.join("sorted_pairs.txt"), &(lines.join("\n") + "\n"));

    assert_eq!(tables("image_pairs.txt"), tables("sorted_pairs.txt"));
}

#[test]
fn sweep_selects_best_results_directory() {
    let dir = tempfile::tempdir().unwrap();
    let data = build_dataset(dir.path());
    let root = dir.path().join("sweep");
    for (label, offset) in [("0.8", 5.5), ("0.9", 0.0), ("0.95", 0.0)] {
        let results = root.join(label);
        write_artifacts(&results, "ratio", offset, &[], &[]);
        let config = config();
        let layout = config.layout(&data, &results);
        let evaluator = Evaluator::new(config, layout.clone()).unwrap();
        evaluator
            .evaluate(&["ratio".to_string()])
            .unwrap()
            .write_outputs(&layout, evaluator.config())
            .unwrap();
    }

    let sweep = SweepConfig::from_labels(["0.8", "0.9", "0.95"]);
    for kind in TableKind::ALL {
        let result = run_sweep(&sweep, &root, kind).unwrap();
        for group in SplitGroup::ALL {
            let best = result.best(group, "ratio").unwrap();
            // 0.9 and 0.95 tie; the earlier value is kept.
            assert_eq!(best.hyperparameter, "0.9");
            assert_abs_diff_eq!(best.auc, 9.0, epsilon = 1e-9);
        }
        assert_eq!(
            result.winners_csv(),
            "Algorithms,Illumination All,Viewpoint All,All Results\nratio,0.9,0.9,0.9\n"
        );
    }
}
