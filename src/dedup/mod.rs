//! Epoch-aware contiguous block matching: removes TUI redraw duplication
//! from a raw scrollback+viewport snapshot.

use std::collections::{HashMap, HashSet};

use crate::vt::{Snapshot, SnapshotLine};

/// `{ event_index, raw_line_count }`. Emitted by the orchestrator whenever
/// replay observes a primary-buffer screen clear. Boundaries are ignored
/// while the alt-screen is active (the orchestrator never records one
/// then).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochBoundary {
    pub event_index: usize,
    pub raw_line_count: usize,
}

/// The result of deduplication: a clean snapshot plus the two index-mapping
/// functions described in the component design.
#[derive(Debug)]
pub struct DedupResult {
    pub clean_snapshot: Snapshot,
    mapping: Vec<Option<usize>>,
}

impl DedupResult {
    /// Total function on `[0, raw_line_count)`. Probes forward from an
    /// undefined ("stutter") entry until it finds a defined mapping;
    /// beyond the end, returns the clean length.
    pub fn raw_to_clean(&self, raw_idx: usize) -> usize {
        self.probe(raw_idx)
    }

    /// Maps a **count** boundary (exclusive upper bound) into the clean
    /// buffer, for remapping section line ranges.
    pub fn raw_line_count_to_clean(&self, raw_count: usize) -> usize {
        if raw_count == 0 {
            return 0;
        }
        if raw_count >= self.mapping.len() {
            return self.clean_snapshot.lines.len();
        }
        self.probe(raw_count)
    }

    fn probe(&self, mut idx: usize) -> usize {
        loop {
            if idx >= self.mapping.len() {
                return self.clean_snapshot.lines.len();
            }
            if let Some(c) = self.mapping[idx] {
                return c;
            }
            idx += 1;
        }
    }
}

fn is_trivial(line: &SnapshotLine) -> bool {
    line.text().trim().is_empty()
}

/// Runs the deduplication algorithm. `min_match` is the minimum contiguous
/// block length treated as a redraw (design default 3).
pub fn dedup(raw: &Snapshot, boundaries: &[EpochBoundary], min_match: usize) -> DedupResult {
    let raw_len = raw.lines.len();

    // Zero epochs is an identity transform, not "one implicit epoch".
    if boundaries.is_empty() {
        return DedupResult {
            clean_snapshot: raw.clone(),
            mapping: (0..raw_len).map(Some).collect(),
        };
    }

    let mut mapping: Vec<Option<usize>> = vec![None; raw_len];

    // Boundaries whose raw_line_count exceeds the final line count mark an
    // evicted epoch; the orchestrator is responsible for degrading
    // affected sections to TUI mode, so here we simply do not split on
    // them (the lines fold into the surrounding epoch).
    let mut bounds: Vec<usize> = boundaries
        .iter()
        .map(|b| b.raw_line_count)
        .filter(|&n| n <= raw_len)
        .collect();
    bounds.dedup();

    let mut epochs: Vec<(usize, usize)> = Vec::new();
    let mut prev = 0usize;
    for b in bounds {
        if b > prev {
            epochs.push((prev, b));
            prev = b;
        }
    }
    if prev < raw_len {
        epochs.push((prev, raw_len));
    }

    let mut clean: Vec<SnapshotLine> = Vec::new();
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();

    for (start, end) in epochs {
        let epoch_clean_start = clean.len();
        let mut i = start;
        while i < end {
            let text = raw.lines[i].text();
            let candidates = index.get(&text).cloned().unwrap_or_default();

            let mut best_k = 0usize;
            let mut best_c = None;
            for c in candidates {
                let max_k = (end - i).min(clean.len() - c);
                let mut k = 0usize;
                while k < max_k && raw.lines[i + k].text() == clean[c + k].text() {
                    k += 1;
                }
                if k > best_k {
                    best_k = k;
                    best_c = Some(c);
                }
            }

            if best_k >= min_match.max(1) {
                let c = best_c.expect("best_k >= min_match.max(1) implies a candidate was found");
                for j in 0..best_k {
                    mapping[i + j] = Some(c + j);
                }
                i += best_k;
            } else {
                let p = clean.len();
                clean.push(raw.lines[i].clone());
                index.entry(text).or_default().push(p);
                mapping[i] = Some(p);
                i += 1;
            }
        }
        let epoch_clean_end = clean.len();
        remove_stutters(&mut clean, &mut mapping, &mut index, epoch_clean_start, epoch_clean_end);
    }

    DedupResult {
        clean_snapshot: Snapshot {
            cols: raw.cols,
            rows: raw.rows,
            lines: clean,
        },
        mapping,
    }
}

/// Drops the first `K` and the trivial lines between it and `K'` for any
/// `K, <=2 trivial lines, K'` pattern within `[start, end)` of the clean
/// buffer built so far, shifting every downstream mapping entry and
/// rebuilding the text index accordingly. `K'` survives as the sole
/// representative; `raw_to_clean` for the original `K` (and the trivial
/// lines between them) probes forward to it.
fn remove_stutters(
    clean: &mut Vec<SnapshotLine>,
    mapping: &mut [Option<usize>],
    index: &mut HashMap<String, Vec<usize>>,
    start: usize,
    end: usize,
) {
    let mut to_remove: Vec<usize> = Vec::new();
    let mut p = start;
    while p < end {
        if is_trivial(&clean[p]) {
            p += 1;
            continue;
        }
        let mut q = p + 1;
        let mut trivial_run = 0usize;
        while q < end && trivial_run < 3 && is_trivial(&clean[q]) {
            trivial_run += 1;
            q += 1;
        }
        if trivial_run <= 2 && q < end && clean[q].text() == clean[p].text() {
            to_remove.extend(p..q);
            p = q + 1;
        } else {
            p += 1;
        }
    }

    if to_remove.is_empty() {
        return;
    }

    let remove_set: HashSet<usize> = to_remove.into_iter().collect();
    let old_len = clean.len();
    let mut shift = vec![0usize; old_len];
    let mut removed_so_far = 0usize;
    for (i, slot) in shift.iter_mut().enumerate() {
        *slot = removed_so_far;
        if remove_set.contains(&i) {
            removed_so_far += 1;
        }
    }

    for m in mapping.iter_mut() {
        if let Some(old_pos) = *m {
            if remove_set.contains(&old_pos) {
                *m = None;
            } else {
                *m = Some(old_pos - shift[old_pos]);
            }
        }
    }

    let new_clean: Vec<SnapshotLine> = clean
        .iter()
        .enumerate()
        .filter(|(i, _)| !remove_set.contains(i))
        .map(|(_, l)| l.clone())
        .collect();
    *clean = new_clean;

    index.clear();
    for (pos, line) in clean.iter().enumerate() {
        index.entry(line.text()).or_default().push(pos);
    }
}
