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
// place a read into existing tigs using its overlaps
//
// every overlap to an already placed partner implies a position; implied
// positions are grouped per (tig, orientation), clustered by a length
// proportional slop window, and each cluster becomes one scored candidate
//

use rustc_hash::FxHashMap;

use super::overlaps::{Overlap, OverlapIndex};
use super::reads::ReadCatalog;
use super::tig::TigVector;
use super::Parameters;

#[derive(Debug, Copy, Clone, Default)]
pub struct PlaceFlags {
    pub require_full_coverage: bool,
    pub no_extension: bool,
}

#[derive(Debug, Copy, Clone)]
pub struct Placement {
    pub tig: u32,
    pub fwd: bool,
    // consensus interval in tig coordinates
    pub bgn: i32,
    pub end: i32,
    // sub-interval actually covered by corroborating overlaps
    pub ver_bgn: i32,
    pub ver_end: i32,
    // covered span on the read itself
    pub cov_bgn: i32,
    pub cov_end: i32,
    pub fcoverage: f64,
    pub erate: f64,
    pub n_olaps: u32,
}

impl Placement {
    pub fn interval(&self) -> (i32, i32) {
        if self.fwd {
            (self.bgn, self.end)
        } else {
            (self.end, self.bgn)
        }
    }
}

struct Candidate {
    lo: i32,
    hi: i32,
    ov_lo: i32,
    ov_hi: i32,
    cov_bgn: i32,
    cov_end: i32,
    erate: f32,
}

// position a read implied by one overlap to a placed partner; the four
// orientation cases collapse through the swapped view of the overlap
pub fn implied_position(o: &Overlap, p_lo: i32, p_hi: i32, p_fwd: bool) -> (i32, i32, bool) {
    let s = o.swapped();
    if p_fwd {
        (p_lo + s.a_hang, p_hi + s.b_hang, !o.flipped)
    } else {
        (p_lo - s.b_hang, p_hi - s.a_hang, o.flipped)
    }
}

pub fn place_read_using_overlaps(
    rid: u32,
    tig_filter: Option<u32>,
    flags: PlaceFlags,
    erate_limit: f64,
    tv: &TigVector,
    catalog: &ReadCatalog,
    ovl: &OverlapIndex,
    parameters: &Parameters,
) -> Vec<Placement> {
    let alen = catalog.length(rid) as i32;
    if alen == 0 {
        return Vec::new();
    }

    let mut groups = FxHashMap::<(u32, bool), Vec<Candidate>>::default();
    for o in ovl.overlaps_of(rid) {
        if o.b_id == rid {
            continue;
        }
        if o.erate as f64 > erate_limit {
            continue;
        }
        let (tid, idx) = match tv.membership(o.b_id) {
            Some(m) => m,
            None => continue,
        };
        if let Some(want) = tig_filter {
            if tid != want {
                continue;
            }
        }
        let tig = tv.tig(tid).unwrap();
        let p = &tig.reads[idx as usize];
        let (lo, hi, fwd) = implied_position(o, p.lo(), p.hi(), p.is_forward());
        if flags.no_extension && (lo < 0 || hi > tig.length) {
            continue;
        }
        let cov_bgn = o.a_hang.max(0);
        let cov_end = alen + o.b_hang.min(0);
        groups.entry((tid, fwd)).or_insert_with(Vec::new).push(Candidate {
            lo,
            hi,
            ov_lo: lo.max(p.lo()),
            ov_hi: hi.min(p.hi()),
            cov_bgn,
            cov_end,
            erate: o.erate,
        });
    }

    let slop = ((alen as f64 * parameters.place_slop_frac) as i32).max(parameters.place_slop_min);

    let mut keys: Vec<(u32, bool)> = groups.keys().cloned().collect();
    keys.sort();

    let mut placements = Vec::<Placement>::new();
    for key in keys {
        let cands = groups.get(&key).unwrap();
        let (tid, fwd) = key;
        let tig_len = tv.tig(tid).unwrap().length;

        let bgn_cluster = cluster_coords(cands.iter().map(|c| c.lo).collect(), slop);
        let end_cluster = cluster_coords(cands.iter().map(|c| c.hi).collect(), slop);

        // a cluster pair exists only where some overlap actually lands
        let mut pair_members = FxHashMap::<(u32, u32), Vec<usize>>::default();
        for (i, c) in cands.iter().enumerate() {
            let bc = *bgn_cluster.get(&c.lo).unwrap();
            let ec = *end_cluster.get(&c.hi).unwrap();
            pair_members.entry((bc, ec)).or_insert_with(Vec::new).push(i);
        }

        let mut pairs: Vec<(u32, u32)> = pair_members.keys().cloned().collect();
        pairs.sort();

        for pair in pairs {
            let members = pair_members.get(&pair).unwrap();
            let n = members.len() as i64;
            let bgn = (members.iter().map(|&i| cands[i].lo as i64).sum::<i64>() / n) as i32;
            let end = (members.iter().map(|&i| cands[i].hi as i64).sum::<i64>() / n) as i32;
            let cov_bgn = members.iter().map(|&i| cands[i].cov_bgn).min().unwrap();
            let cov_end = members.iter().map(|&i| cands[i].cov_end).max().unwrap();
            let ver_bgn = members
                .iter()
                .map(|&i| cands[i].ov_lo)
                .min()
                .unwrap()
                .max(bgn)
                .max(0);
            let ver_end = members
                .iter()
                .map(|&i| cands[i].ov_hi)
                .max()
                .unwrap()
                .min(end)
                .min(tig_len);
            let erate = members.iter().map(|&i| cands[i].erate as f64).sum::<f64>() / n as f64;
            let fcoverage = (cov_end - cov_bgn).max(0) as f64 / alen as f64;

            if flags.require_full_coverage && fcoverage < 1.0 {
                continue;
            }
            if flags.no_extension && (bgn < 0 || end > tig_len) {
                continue;
            }

            placements.push(Placement {
                tig: tid,
                fwd,
                bgn,
                end,
                ver_bgn,
                ver_end,
                cov_bgn,
                cov_end,
                fcoverage,
                erate,
                n_olaps: n as u32,
            });
        }
    }

    // deterministic candidate order: tig, orientation, coordinate
    placements.sort_by_key(|p| (p.tig, p.fwd, p.bgn, p.end));
    placements
}

// interval-merge clustering: sorted coordinates closer than the slop
// window share a cluster id
fn cluster_coords(mut coords: Vec<i32>, slop: i32) -> FxHashMap<i32, u32> {
    coords.sort_unstable();
    coords.dedup();
    let mut out = FxHashMap::<i32, u32>::default();
    let mut cluster = 0_u32;
    let mut prev: Option<i32> = None;
    for c in coords {
        if let Some(p) = prev {
            if c - p > slop {
                cluster += 1;
            }
        }
        out.insert(c, cluster);
        prev = Some(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::overlaps::tests::{ovl, test_catalog};
    use crate::utils::overlaps::OverlapIndex;
    use crate::utils::tig::{TigRead, TigVector};

    fn params() -> Parameters {
        let mut p = Parameters::new(1);
        p.min_ovlp_len = 50;
        p
    }

    // a tig 1..3 with read 4 overlapping reads 1 and 2 consistently
    fn scene() -> (TigVector, ReadCatalog, OverlapIndex) {
        let cat = test_catalog(&[(1, 1000), (2, 1000), (3, 1000), (4, 1000)]);
        let idx = OverlapIndex::build(
            vec![
                ovl(4, 1, -450, -450, false, 0.01),
                ovl(4, 2, 450, 450, false, 0.02),
            ],
            &cat,
            &params(),
        )
        .unwrap();
        let mut tv = TigVector::new(4);
        let t = tv.new_tig();
        tv.add_read(t, TigRead::new(1, 0, 1000));
        tv.add_read(t, TigRead::new(2, 900, 1900));
        tv.add_read(t, TigRead::new(3, 1800, 2800));
        (tv, cat, idx)
    }

    #[test]
    fn implied_position_cases() {
        // the partner hangs off the read's 5' end, so the read lands
        // after the partner, forward
        let o = ovl(4, 1, -900, -900, false, 0.01);
        assert_eq!(implied_position(&o, 0, 1000, true), (900, 1900, true));
        // partner reversed: mirrored, read lands before it, reversed
        assert_eq!(implied_position(&o, 900, 1900, false), (0, 1000, false));
        // flipped: the hangs read from the other strand, the read lands
        // in the same place with the opposite orientation
        let of = ovl(4, 1, 900, 900, true, 0.01);
        let (lo, hi, fwd) = implied_position(&of, 0, 1000, true);
        assert_eq!((lo, hi), (900, 1900));
        assert!(!fwd);
    }

    #[test]
    fn consistent_overlaps_form_one_placement() {
        let (tv, cat, idx) = scene();
        let pl = place_read_using_overlaps(
            4,
            None,
            PlaceFlags::default(),
            0.1,
            &tv,
            &cat,
            &idx,
            &params(),
        );
        assert_eq!(pl.len(), 1);
        let p = &pl[0];
        assert_eq!(p.tig, 1);
        assert!(p.fwd);
        // both overlaps imply ~[450, 1450)
        assert!((p.bgn - 450).abs() <= 1);
        assert!((p.end - 1450).abs() <= 1);
        assert_eq!(p.n_olaps, 2);
        assert!(p.fcoverage > 0.99);
        assert!(p.ver_bgn >= p.bgn && p.ver_end <= p.end);
    }

    #[test]
    fn placement_is_deterministic() {
        let (tv, cat, idx) = scene();
        let run = || {
            place_read_using_overlaps(
                4,
                None,
                PlaceFlags::default(),
                0.1,
                &tv,
                &cat,
                &idx,
                &params(),
            )
        };
        let a = run();
        let b = run();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!((x.tig, x.fwd, x.bgn, x.end), (y.tig, y.fwd, y.bgn, y.end));
        }
    }

    #[test]
    fn no_extension_rejects_boundary_escape() {
        let cat = test_catalog(&[(1, 1000), (4, 1000)]);
        let idx = OverlapIndex::build(
            vec![ovl(4, 1, 500, 500, false, 0.01)],
            &cat,
            &params(),
        )
        .unwrap();
        let mut tv = TigVector::new(4);
        let t = tv.new_tig();
        tv.add_read(t, TigRead::new(1, 0, 1000));
        // implied position is [-500, 500): escapes the tig start
        let pl = place_read_using_overlaps(
            4,
            None,
            PlaceFlags {
                no_extension: true,
                ..Default::default()
            },
            0.1,
            &tv,
            &cat,
            &idx,
            &params(),
        );
        assert!(pl.is_empty());
        let pl = place_read_using_overlaps(
            4,
            None,
            PlaceFlags::default(),
            0.1,
            &tv,
            &cat,
            &idx,
            &params(),
        );
        assert_eq!(pl.len(), 1);
        assert_eq!(pl[0].bgn, -500);
    }

    #[test]
    fn full_coverage_filter() {
        let (tv, cat, idx) = scene();
        // read 4's two overlaps cover it fully, filter passes
        let pl = place_read_using_overlaps(
            4,
            None,
            PlaceFlags {
                require_full_coverage: true,
                ..Default::default()
            },
            0.1,
            &tv,
            &cat,
            &idx,
            &params(),
        );
        assert_eq!(pl.len(), 1);
        // raise the error gate so only the partial first overlap survives
        let pl = place_read_using_overlaps(
            4,
            None,
            PlaceFlags {
                require_full_coverage: true,
                ..Default::default()
            },
            0.015,
            &tv,
            &cat,
            &idx,
            &params(),
        );
        assert!(pl.is_empty());
    }
}
