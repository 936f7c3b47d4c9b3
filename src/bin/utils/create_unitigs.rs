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
// cut contigs into unitigs at boundary intersections
//
// a contig's boundary read replaced onto another contig marks a junction
// there; every contig is split at the union of junctions landing on it
//

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use super::best_edges::BestEdgeGraph;
use super::contained::build_error_profiles;
use super::overlaps::OverlapIndex;
use super::placement::{place_read_using_overlaps, PlaceFlags};
use super::reads::ReadCatalog;
use super::split::split_tig;
use super::tig::TigVector;
use super::Parameters;

const MIN_CONSISTENT_FRACTION: f64 = 0.5;

pub fn create_unitigs(
    tv: &mut TigVector,
    catalog: &ReadCatalog,
    ovl: &OverlapIndex,
    g: &BestEdgeGraph,
    parameters: &Parameters,
) -> usize {
    let profiles = build_error_profiles(tv, ovl);

    let tids: Vec<u32> = tv
        .live_ids()
        .into_iter()
        .filter(|&t| tv.tig(t).unwrap().num_reads() > 1)
        .collect();

    // (target tig, junction coordinate) pairs, gathered in parallel
    // against the frozen layout
    let found: Vec<Vec<(u32, i32)>> = tids
        .par_iter()
        .map(|&tid| {
            let tig = tv.tig(tid).unwrap();
            let mut out = Vec::<(u32, i32)>::new();
            let probes = [(tig.first_read(), false), (tig.last_read(), true)];
            for &(r, at_high) in probes.iter() {
                // the read end that continues into this contig's interior
                let interior_is_3 = if at_high {
                    !r.is_forward()
                } else {
                    r.is_forward()
                };
                let placements = place_read_using_overlaps(
                    r.rid,
                    None,
                    PlaceFlags::default(),
                    parameters.max_load_erate,
                    tv,
                    catalog,
                    ovl,
                    parameters,
                );
                for p in placements {
                    if p.tig == tid && p.bgn < r.hi() && r.lo() < p.end {
                        continue;
                    }
                    if p.fcoverage < parameters.graph_cov_floor {
                        continue;
                    }
                    if (p.end - p.bgn) < parameters.min_ovlp_len as i32 {
                        continue;
                    }
                    if let Some(profile) = profiles.get(&p.tig) {
                        let f = profile.consistent_fraction(
                            parameters.deviation_tig,
                            p.ver_bgn,
                            p.ver_end,
                            p.erate,
                        );
                        if f < MIN_CONSISTENT_FRACTION {
                            continue;
                        }
                    }
                    // the junction sits at the supported boundary facing
                    // the contig interior
                    let coord = if interior_is_3 == p.fwd {
                        p.ver_end
                    } else {
                        p.ver_bgn
                    };
                    out.push((p.tig, coord));
                }
            }
            out
        })
        .collect();

    let mut per_target = FxHashMap::<u32, Vec<i32>>::default();
    for list in found {
        for (t, c) in list {
            per_target.entry(t).or_insert_with(Vec::new).push(c);
        }
    }

    let mut targets: Vec<u32> = per_target.keys().cloned().collect();
    targets.sort_unstable();

    let mut nsplit = 0_usize;
    for t in targets {
        let coords = per_target.get(&t).unwrap();
        let out = split_tig(tv, t, coords, &[]);
        if out.new_tigs.is_empty() {
            continue;
        }
        log::info!(
            "contig {} cut into {} unitigs at {:?}",
            t,
            out.new_tigs.len(),
            coords
        );
        for nt in out.new_tigs {
            strip_boundary_nonbackbone(tv, nt, g);
        }
        nsplit += 1;
    }
    tv.check_registry();
    nsplit
}

// non-backbone reads stranded at a fresh unitig's extreme ends carry no
// structural evidence and are returned to the unplaced pool
fn strip_boundary_nonbackbone(tv: &mut TigVector, tid: u32, g: &BestEdgeGraph) {
    loop {
        let victim = match tv.tig(tid) {
            Some(t) if t.num_reads() > 0 => {
                let first = t.first_read();
                let last = t.last_read();
                if !g.is_backbone(first.rid) {
                    Some(first.rid)
                } else if !g.is_backbone(last.rid) {
                    Some(last.rid)
                } else {
                    None
                }
            }
            _ => None,
        };
        match victim {
            Some(rid) => {
                tv.eject_read(rid);
                if tv.tig(tid).is_some() {
                    tv.clean_up(tid);
                }
            }
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::overlaps::tests::{ovl, test_catalog};
    use crate::utils::overlaps::{Overlap, OverlapIndex};
    use crate::utils::tig::TigRead;

    fn params() -> Parameters {
        let mut p = Parameters::new(1);
        p.min_ovlp_len = 50;
        p
    }

    #[test]
    fn boundary_intersection_cuts_the_target() {
        let ids: Vec<(u32, u32)> = (1..=7).map(|r| (r, 1000)).collect();
        let cat = test_catalog(&ids);
        let mut raw = Vec::<Overlap>::new();
        for &(a, b) in &[(1, 2), (2, 3), (3, 4), (4, 5), (6, 7)] {
            raw.push(ovl(a, b, 900, 900, false, 0.01));
            raw.push(ovl(b, a, -900, -900, false, 0.01));
        }
        // contig [6,7] branches off the middle of contig [1..5]: read 6
        // extends read 3 leftward by half a read
        raw.push(ovl(6, 3, -500, -500, false, 0.01));
        raw.push(ovl(3, 6, 500, 500, false, 0.01));
        let p = params();
        let idx = OverlapIndex::build(raw, &cat, &p).unwrap();
        let g = BestEdgeGraph::build(&cat, &idx, &p);

        let mut tv = TigVector::new(cat.max_id());
        let ta = tv.new_tig();
        for (i, rid) in (1..=5).enumerate() {
            let b = i as i32 * 900;
            tv.add_read(ta, TigRead::new(rid, b, b + 1000));
        }
        let tc = tv.new_tig();
        for (i, rid) in (6..=7).enumerate() {
            let b = i as i32 * 900;
            tv.add_read(tc, TigRead::new(rid, b, b + 1000));
        }

        let n = create_unitigs(&mut tv, &cat, &idx, &g, &p);
        assert_eq!(n, 1);
        assert!(tv.tig(ta).is_none());
        assert!(tv.tig(tc).is_some());

        // the junction at 2800 ejects straddling read 4 and the stranded
        // coverage gap boundary reads 1 and 5 are stripped
        assert!(!tv.is_placed(4));
        assert!(!tv.is_placed(1));
        assert!(!tv.is_placed(5));
        for rid in &[2, 3, 6, 7] {
            assert!(tv.is_placed(*rid), "read {} lost", rid);
        }
        let (tleft, _) = tv.membership(2).unwrap();
        let left = tv.tig(tleft).unwrap();
        assert_eq!(left.num_reads(), 2);
        assert_eq!(left.reads[0].lo(), 0);
        assert_eq!(left.source_contig, ta);
        tv.check_registry();
    }
}
