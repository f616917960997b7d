//! Per-split means of pair scores and the two-level CSV table layout.
//!
//! A table has one row per algorithm (insertion order) and three blocks per
//! row: illumination pairs, viewpoint pairs, all pairs. Each block holds the
//! mean curve over the grid followed by two mean auxiliary columns.
//!
//! ```text
//! Algorithms,Illumination All,,…,Viewpoint All,,…,All Results,,…
//! ,1px,…,10px,#Features,#Matches,1px,…,#Matches,1px,…,#Matches
//! sift,0.41,…
//! ```

use std::fmt::Write as _;
use std::path::Path;

use crate::dataset::{PairRecord, Split};
use crate::error::{EvalError, Result};
use crate::scoring::{MatchStatus, PairScores};
use crate::thresholds::{ScoreVector, ThresholdGrid};

/// Which curve family a table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Mma,
    Hea,
}

impl TableKind {
    pub const ALL: [TableKind; 2] = [TableKind::Mma, TableKind::Hea];

    /// Header labels of the two auxiliary columns of every block.
    pub fn aux_labels(self) -> [&'static str; 2] {
        match self {
            Self::Mma => ["#Features", "#Matches"],
            Self::Hea => ["#Matches", "#Inliers"],
        }
    }

    /// Suffix used in result file names.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Mma => "mma",
            Self::Hea => "hom",
        }
    }
}

/// Row subset a block is averaged over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitGroup {
    Illumination,
    Viewpoint,
    All,
}

impl SplitGroup {
    /// Block order of the table layout.
    pub const ALL: [SplitGroup; 3] = [
        SplitGroup::Illumination,
        SplitGroup::Viewpoint,
        SplitGroup::All,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Illumination => "Illumination All",
            Self::Viewpoint => "Viewpoint All",
            Self::All => "All Results",
        }
    }

    pub fn contains(self, split: &Split) -> bool {
        match self {
            Self::Illumination => *split == Split::Illumination,
            Self::Viewpoint => *split == Split::Viewpoint,
            Self::All => true,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Illumination => 0,
            Self::Viewpoint => 1,
            Self::All => 2,
        }
    }
}

/// Mean curve plus mean auxiliary columns over one row subset.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SplitBlock {
    pub curve: ScoreVector,
    pub aux: [f64; 2],
}

impl SplitBlock {
    pub fn zeros(grid: &ThresholdGrid) -> Self {
        Self {
            curve: grid.zeros(),
            aux: [0.0; 2],
        }
    }
}

/// Column-wise arithmetic mean; an empty input gives the all-zero block.
pub fn mean_block<'a>(
    rows: impl IntoIterator<Item = (&'a ScoreVector, [f64; 2])>,
    grid: &ThresholdGrid,
) -> SplitBlock {
    let mut curve = vec![0.0; grid.len()];
    let mut aux = [0.0; 2];
    let mut n = 0usize;
    for (c, a) in rows {
        for (acc, v) in curve.iter_mut().zip(c.values()) {
            *acc += v;
        }
        aux[0] += a[0];
        aux[1] += a[1];
        n += 1;
    }
    if n == 0 {
        return SplitBlock::zeros(grid);
    }
    let n = n as f64;
    SplitBlock {
        curve: ScoreVector(curve.into_iter().map(|v| v / n).collect()),
        aux: aux.map(|v| v / n),
    }
}

/// One table row: an algorithm and its three blocks.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TableRow {
    pub algorithm: String,
    /// Blocks in [`SplitGroup::ALL`] order.
    pub blocks: [SplitBlock; 3],
}

impl TableRow {
    pub fn block(&self, group: SplitGroup) -> &SplitBlock {
        &self.blocks[group.index()]
    }
}

/// Non-fatal conditions observed while aggregating one algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostics {
    pub n_pairs: usize,
    pub n_illumination: usize,
    pub n_viewpoint: usize,
    /// Pairs whose split label is neither illumination nor viewpoint.
    pub n_other_split: usize,
    pub empty_match_sets: usize,
    pub failed_fits: usize,
}

/// Per-split MMA and HEA blocks of one algorithm.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AlgorithmSummary {
    pub algorithm: String,
    pub mma: TableRow,
    pub hea: TableRow,
    pub diagnostics: Diagnostics,
}

impl AlgorithmSummary {
    pub fn row(&self, kind: TableKind) -> &TableRow {
        match kind {
            TableKind::Mma => &self.mma,
            TableKind::Hea => &self.hea,
        }
    }
}

/// Partition `scores` by each pair's split label and average every column.
///
/// `scores[i]` must belong to `pairs[i]`; a length mismatch is an error.
pub fn summarize_algorithm(
    algorithm: &str,
    pairs: &[PairRecord],
    scores: &[PairScores],
    grid: &ThresholdGrid,
) -> Result<AlgorithmSummary> {
    if pairs.len() != scores.len() {
        return Err(EvalError::Config(format!(
            "algorithm '{algorithm}': {} pair scores for {} manifest pairs",
            scores.len(),
            pairs.len()
        )));
    }

    let mut diagnostics = Diagnostics {
        n_pairs: scores.len(),
        ..Default::default()
    };
    for (record, s) in pairs.iter().zip(scores) {
        match record.split {
            Split::Illumination => diagnostics.n_illumination += 1,
            Split::Viewpoint => diagnostics.n_viewpoint += 1,
            Split::Other(_) => diagnostics.n_other_split += 1,
        }
        if s.mma.status == MatchStatus::EmptyMatchSet {
            diagnostics.empty_match_sets += 1;
        }
        if s.hea.failure.is_some() {
            diagnostics.failed_fits += 1;
        }
    }

    let blocks = |kind: TableKind| -> [SplitBlock; 3] {
        SplitGroup::ALL.map(|group| {
            let rows = pairs
                .iter()
                .zip(scores)
                .filter(|(r, _)| group.contains(&r.split))
                .map(|(_, s)| match kind {
                    TableKind::Mma => (&s.mma.curve, s.mma.aux()),
                    TableKind::Hea => (&s.hea.curve, s.hea.aux()),
                });
            mean_block(rows, grid)
        })
    };

    for (group, n) in [
        (SplitGroup::Illumination, diagnostics.n_illumination),
        (SplitGroup::Viewpoint, diagnostics.n_viewpoint),
        (SplitGroup::All, diagnostics.n_pairs),
    ] {
        if n == 0 {
            tracing::warn!(
                algorithm,
                block = group.label(),
                "no pairs in block; writing zeros"
            );
        }
    }
    if diagnostics.n_other_split > 0 {
        tracing::warn!(
            algorithm,
            count = diagnostics.n_other_split,
            "pairs with unknown split label count towards 'All Results' only"
        );
    }

    Ok(AlgorithmSummary {
        algorithm: algorithm.to_string(),
        mma: TableRow {
            algorithm: algorithm.to_string(),
            blocks: blocks(TableKind::Mma),
        },
        hea: TableRow {
            algorithm: algorithm.to_string(),
            blocks: blocks(TableKind::Hea),
        },
        diagnostics,
    })
}

/// Immutable table of one curve family for a set of algorithms.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AggregatedTable {
    kind: TableKind,
    thresholds: ThresholdGrid,
    rows: Vec<TableRow>,
}

impl AggregatedTable {
    /// Build a table, checking that every curve matches the grid and that
    /// algorithm names are unique.
    pub fn new(kind: TableKind, thresholds: ThresholdGrid, rows: Vec<TableRow>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if let Some(b) = row.blocks.iter().find(|b| b.curve.len() != thresholds.len()) {
                return Err(EvalError::Config(format!(
                    "row '{}' has a curve of length {}, grid has {}",
                    row.algorithm,
                    b.curve.len(),
                    thresholds.len()
                )));
            }
            if rows[..i].iter().any(|r| r.algorithm == row.algorithm) {
                return Err(EvalError::Config(format!(
                    "duplicate algorithm '{}' in table",
                    row.algorithm
                )));
            }
        }
        Ok(Self {
            kind,
            thresholds,
            rows,
        })
    }

    /// Table of `kind` from per-algorithm summaries, in the given order.
    pub fn from_summaries(
        kind: TableKind,
        thresholds: ThresholdGrid,
        summaries: &[AlgorithmSummary],
    ) -> Result<Self> {
        let rows = summaries.iter().map(|s| s.row(kind).clone()).collect();
        Self::new(kind, thresholds, rows)
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn thresholds(&self) -> &ThresholdGrid {
        &self.thresholds
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn row(&self, algorithm: &str) -> Option<&TableRow> {
        self.rows.iter().find(|r| r.algorithm == algorithm)
    }

    /// Two header rows followed by one row per algorithm, numbers with
    /// `precision` decimals.
    pub fn to_csv(&self, precision: usize) -> String {
        let k = self.thresholds.len();
        let labels = self.thresholds.labels();
        let aux = self.kind.aux_labels();

        let mut header0 = vec!["Algorithms".to_string()];
        let mut header1 = vec![String::new()];
        for group in SplitGroup::ALL {
            header0.push(group.label().to_string());
            header0.extend(std::iter::repeat(String::new()).take(k + 1));
            header1.extend(labels.iter().cloned());
            header1.extend(aux.iter().map(|s| s.to_string()));
        }

        let mut out = String::new();
        push_csv_record(&mut out, &header0);
        push_csv_record(&mut out, &header1);
        for row in &self.rows {
            let mut fields = vec![row.algorithm.clone()];
            for block in &row.blocks {
                for v in block.curve.values().iter().chain(&block.aux) {
                    fields.push(format!("{v:.precision$}"));
                }
            }
            push_csv_record(&mut out, &fields);
        }
        out
    }

    /// Read a table written by [`AggregatedTable::to_csv`]. The grid is
    /// recovered from the threshold labels; `kind` must match the auxiliary
    /// column labels. A block label may appear in any cell of its block on the
    /// first header row, as long as the block's other cells are empty.
    pub fn parse_csv(text: &str, kind: TableKind, path: &Path) -> Result<Self> {
        let err = |line: usize, msg: String| EvalError::parse(path, Some(line), msg);
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

        let (l0, header0) = lines
            .next()
            .ok_or_else(|| EvalError::parse(path, None, "empty table"))?;
        let (l1, header1) = lines
            .next()
            .ok_or_else(|| EvalError::parse(path, None, "missing second header row"))?;
        let header0 = split_csv_record(header0).map_err(|m| err(l0 + 1, m))?;
        let header1 = split_csv_record(header1).map_err(|m| err(l1 + 1, m))?;

        let n_cols = header1.len();
        if n_cols < 10 || (n_cols - 1) % 3 != 0 || header0.len() != n_cols {
            return Err(err(
                l1 + 1,
                format!("expected 1 + 3 × (k + 2) columns, got {n_cols}"),
            ));
        }
        let block_width = (n_cols - 1) / 3;
        let k = block_width - 2;
        let aux = kind.aux_labels();

        let mut thresholds = Vec::with_capacity(k);
        for (b, group) in SplitGroup::ALL.iter().enumerate() {
            let start = 1 + b * block_width;
            // The label may sit in any cell of the block's span; the rest are blank.
            let mut labels = header0[start..start + block_width]
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty());
            let found = labels.next().unwrap_or("");
            if found != group.label() || labels.any(|c| c != group.label()) {
                return Err(err(
                    l0 + 1,
                    format!("expected block label '{}', got '{found}'", group.label()),
                ));
            }
            let block = &header1[start..start + block_width];
            if block[k] != aux[0] || block[k + 1] != aux[1] {
                return Err(err(
                    l1 + 1,
                    format!(
                        "auxiliary columns '{}', '{}' do not match a {:?} table",
                        block[k],
                        block[k + 1],
                        kind
                    ),
                ));
            }
            for (i, label) in block[..k].iter().enumerate() {
                let t = ThresholdGrid::parse_label(label)
                    .ok_or_else(|| err(l1 + 1, format!("invalid threshold label '{label}'")))?;
                if b == 0 {
                    thresholds.push(t);
                } else if thresholds[i] != t {
                    return Err(err(l1 + 1, "blocks use different threshold grids".into()));
                }
            }
        }
        let grid = ThresholdGrid::new(thresholds).map_err(|e| err(l1 + 1, e.to_string()))?;

        let mut rows = Vec::new();
        for (line_no, line) in lines {
            let fields = split_csv_record(line).map_err(|m| err(line_no + 1, m))?;
            if fields.len() != n_cols {
                return Err(err(
                    line_no + 1,
                    format!("expected {n_cols} fields, got {}", fields.len()),
                ));
            }
            let values = fields[1..]
                .iter()
                .map(|f| {
                    f.trim()
                        .parse::<f64>()
                        .map_err(|_| err(line_no + 1, format!("invalid number '{f}'")))
                })
                .collect::<Result<Vec<f64>>>()?;
            let blocks = [0, 1, 2].map(|b| {
                let v = &values[b * block_width..(b + 1) * block_width];
                SplitBlock {
                    curve: ScoreVector(v[..k].to_vec()),
                    aux: [v[k], v[k + 1]],
                }
            });
            rows.push(TableRow {
                algorithm: fields[0].clone(),
                blocks,
            });
        }

        Self::new(kind, grid, rows).map_err(|e| EvalError::parse(path, None, e.to_string()))
    }

    pub fn write_csv(&self, path: &Path, precision: usize) -> Result<()> {
        std::fs::write(path, self.to_csv(precision)).map_err(|e| EvalError::io(path, e))
    }

    pub fn load_csv(path: &Path, kind: TableKind) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        Self::parse_csv(&text, kind, path)
    }
}

/// Per-pair rows of one algorithm: identification columns, curve, and the
/// two auxiliary values, in manifest order.
pub fn pair_rows_csv(
    kind: TableKind,
    grid: &ThresholdGrid,
    pairs: &[PairRecord],
    scores: &[PairScores],
) -> String {
    let mut header: Vec<String> = ["index", "split", "subscene", "image_a", "image_b"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(grid.labels());
    header.extend(kind.aux_labels().iter().map(|s| s.to_string()));

    let mut out = String::new();
    push_csv_record(&mut out, &header);
    for (record, s) in pairs.iter().zip(scores) {
        let (curve, aux) = match kind {
            TableKind::Mma => (&s.mma.curve, s.mma.aux()),
            TableKind::Hea => (&s.hea.curve, s.hea.aux()),
        };
        let mut fields = vec![
            record.index.to_string(),
            record.split.to_string(),
            record.subscene.clone(),
            record.stem_a.clone(),
            record.stem_b.clone(),
        ];
        fields.extend(curve.values().iter().chain(&aux).map(|v| v.to_string()));
        push_csv_record(&mut out, &fields);
    }
    out
}

pub(crate) fn push_csv_record(out: &mut String, fields: &[String]) {
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if f.contains([',', '"', '\n', '\r']) {
            let _ = write!(out, "\"{}\"", f.replace('"', "\"\""));
        } else {
            out.push_str(f);
        }
    }
    out.push('\n');
}

/// Split one CSV record, honouring double-quoted fields.
pub(crate) fn split_csv_record(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.trim_end_matches('\r').chars().peekable();
    let mut quoted = false;
    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            (true, '"') => quoted = false,
            (true, c) => field.push(c),
            (false, '"') if field.is_empty() => quoted = true,
            (false, ',') => fields.push(std::mem::take(&mut field)),
            (false, c) => field.push(c),
        }
    }
    if quoted {
        return Err("unterminated quoted field".into());
    }
    fields.push(field);
    Ok(fields)
}
