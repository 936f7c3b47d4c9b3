// TigAsm Overlap-Graph Layout Toolkit
// 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]

//
// per tig error profile
//
// a sweep over the open/close events of intra-tig overlaps yields
// non-overlapping intervals with the mean and stddev of the observed
// error rates; zero coverage gaps are interpolated from the neighbors
//

use intervaltree::IntervalTree;

use super::overlaps::OverlapIndex;
use super::tig::Tig;
use super::tig::TigVector;

// erate statistics round trip through f32 storage; the consistency
// comparison must not fail on the last bit of that round trip
const ERATE_FUZZ: f64 = 1e-6;

#[derive(Debug, Copy, Clone)]
pub struct ProfileInterval {
    pub bgn: i32,
    pub end: i32,
    pub mean: f32,
    pub stddev: f32,
    pub depth: u32,
}

pub struct ErrorProfile {
    intervals: Vec<ProfileInterval>,
    tree: Option<IntervalTree<i32, usize>>,
}

impl ErrorProfile {
    pub fn empty() -> Self {
        ErrorProfile {
            intervals: Vec::new(),
            tree: None,
        }
    }

    pub fn build(tig: &Tig, tv: &TigVector, ovl: &OverlapIndex) -> ErrorProfile {
        // open/close events from every overlap between two reads placed
        // in this tig, projected onto tig coordinates
        let mut events = Vec::<(i32, i32, f32)>::new();
        for a in tig.reads.iter() {
            for o in ovl.overlaps_of(a.rid) {
                let (btid, bidx) = match tv.membership(o.b_id) {
                    Some(m) => m,
                    None => continue,
                };
                if btid != tig.id {
                    continue;
                }
                let b = &tig.reads[bidx as usize];
                let open = a.lo().max(b.lo());
                let close = a.hi().min(b.hi());
                if open < close {
                    events.push((open, close, o.erate));
                }
            }
        }

        if events.is_empty() {
            return ErrorProfile::empty();
        }

        let mut bounds = Vec::<i32>::with_capacity(events.len() * 2 + 2);
        bounds.push(0);
        bounds.push(tig.length);
        for &(o, c, _) in events.iter() {
            bounds.push(o);
            bounds.push(c);
        }
        bounds.sort_unstable();
        bounds.dedup();

        let mut intervals = Vec::<ProfileInterval>::with_capacity(bounds.len());
        for w in bounds.windows(2) {
            let (lo, hi) = (w[0], w[1]);
            let mut n = 0_u32;
            let mut sum = 0.0_f64;
            let mut sumsq = 0.0_f64;
            for &(o, c, e) in events.iter() {
                if o <= lo && c >= hi {
                    n += 1;
                    sum += e as f64;
                    sumsq += (e as f64) * (e as f64);
                }
            }
            let (mean, stddev) = if n > 0 {
                let m = sum / n as f64;
                let var = (sumsq / n as f64 - m * m).max(0.0);
                (m as f32, var.sqrt() as f32)
            } else {
                (0.0, 0.0)
            };
            intervals.push(ProfileInterval {
                bgn: lo,
                end: hi,
                mean,
                stddev,
                depth: n,
            });
        }

        interpolate_gaps(&mut intervals);

        let tree: IntervalTree<i32, usize> = intervals
            .iter()
            .enumerate()
            .filter(|(_, iv)| iv.bgn < iv.end)
            .map(|(i, iv)| (iv.bgn..iv.end, i))
            .collect();

        ErrorProfile {
            intervals,
            tree: Some(tree),
        }
    }

    pub fn intervals(&self) -> &[ProfileInterval] {
        &self.intervals
    }

    // fraction of [bgn, end) whose local mean + deviations * stddev covers
    // the candidate error rate; 1.0 when the tig carries no evidence yet
    pub fn consistent_fraction(&self, deviations: f64, bgn: i32, end: i32, erate: f64) -> f64 {
        let tree = match &self.tree {
            Some(t) => t,
            None => return 1.0,
        };
        let mut total = 0_i64;
        let mut ok = 0_i64;
        for el in tree.query(bgn..end) {
            let iv = &self.intervals[el.value];
            let lo = iv.bgn.max(bgn);
            let hi = iv.end.min(end);
            if lo >= hi {
                continue;
            }
            let len = (hi - lo) as i64;
            total += len;
            if iv.mean as f64 + deviations * iv.stddev as f64 + ERATE_FUZZ >= erate {
                ok += len;
            }
        }
        if total == 0 {
            return 1.0;
        }
        ok as f64 / total as f64
    }

    // the maximum allowed error rate over a span, for reporting
    pub fn max_allowed(&self, deviations: f64, bgn: i32, end: i32) -> f64 {
        let tree = match &self.tree {
            Some(t) => t,
            None => return 1.0,
        };
        let mut best = 0.0_f64;
        for el in tree.query(bgn..end) {
            let iv = &self.intervals[el.value];
            let lim = iv.mean as f64 + deviations * iv.stddev as f64;
            if lim > best {
                best = lim;
            }
        }
        best
    }
}

// zero coverage segments borrow the statistics of their neighbors
fn interpolate_gaps(intervals: &mut Vec<ProfileInterval>) {
    let n = intervals.len();
    for i in 0..n {
        if intervals[i].depth > 0 {
            continue;
        }
        let prev = intervals[..i].iter().rev().find(|iv| iv.depth > 0);
        let next = intervals[i + 1..].iter().find(|iv| iv.depth > 0);
        let (mean, stddev) = match (prev, next) {
            (Some(p), Some(q)) => ((p.mean + q.mean) / 2.0, (p.stddev + q.stddev) / 2.0),
            (Some(p), None) => (p.mean, p.stddev),
            (None, Some(q)) => (q.mean, q.stddev),
            (None, None) => (0.0, 0.0),
        };
        intervals[i].mean = mean;
        intervals[i].stddev = stddev;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::overlaps::tests::{ovl, test_catalog};
    use crate::utils::overlaps::OverlapIndex;
    use crate::utils::tig::{TigRead, TigVector};
    use crate::utils::Parameters;

    fn chain_tig() -> (TigVector, u32, OverlapIndex) {
        let cat = test_catalog(&[(1, 1000), (2, 1000), (3, 1000)]);
        let mut p = Parameters::new(1);
        p.min_ovlp_len = 50;
        let idx = OverlapIndex::build(
            vec![
                ovl(1, 2, 900, 900, false, 0.01),
                ovl(2, 3, 900, 900, false, 0.01),
            ],
            &cat,
            &p,
        )
        .unwrap();
        let mut tv = TigVector::new(3);
        let t = tv.new_tig();
        tv.add_read(t, TigRead::new(1, 0, 1000));
        tv.add_read(t, TigRead::new(2, 900, 1900));
        tv.add_read(t, TigRead::new(3, 1800, 2800));
        (tv, t, idx)
    }

    #[test]
    fn singleton_is_permissive() {
        let profile = ErrorProfile::empty();
        assert_eq!(profile.consistent_fraction(3.0, 0, 1000, 0.25), 1.0);
    }

    #[test]
    fn consistency_bounds() {
        let (tv, t, idx) = chain_tig();
        let profile = ErrorProfile::build(tv.tig(t).unwrap(), &tv, &idx);

        // candidate well below every interval mean: fully consistent
        assert!((profile.consistent_fraction(3.0, 850, 950, 0.005) - 1.0).abs() < 1e-9);
        // candidate exactly on the mean of a zero-stddev profile must
        // stay consistent despite the f32 round trip
        assert!((profile.consistent_fraction(3.0, 850, 950, 0.01) - 1.0).abs() < 1e-9);
        // candidate above mean + deviations * stddev everywhere: zero
        assert_eq!(profile.consistent_fraction(3.0, 850, 950, 0.5), 0.0);
    }

    #[test]
    fn gaps_are_interpolated() {
        let (tv, t, idx) = chain_tig();
        let profile = ErrorProfile::build(tv.tig(t).unwrap(), &tv, &idx);
        // between the two overlap regions there is no direct evidence, the
        // interpolated statistics still accept a matching error rate
        assert!((profile.consistent_fraction(3.0, 1000, 1800, 0.01) - 1.0).abs() < 1e-9);
        for iv in profile.intervals() {
            assert!(iv.bgn <= iv.end);
        }
    }
}
