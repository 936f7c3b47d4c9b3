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
// insert contained reads into the tigs built from the backbone
//
// a contained read needs a placement covering nearly its whole length
// whose error rate agrees with the local error profile of the target tig
//

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use super::best_edges::BestEdgeGraph;
use super::error_profile::ErrorProfile;
use super::overlaps::OverlapIndex;
use super::placement::{place_read_using_overlaps, PlaceFlags, Placement};
use super::reads::ReadCatalog;
use super::tig::{TigRead, TigVector};
use super::Parameters;

// the placed span must agree with the local error profile over at least
// half of its length
const MIN_CONSISTENT_FRACTION: f64 = 0.5;

pub fn build_error_profiles(
    tv: &TigVector,
    ovl: &OverlapIndex,
) -> FxHashMap<u32, ErrorProfile> {
    tv.live_ids()
        .par_iter()
        .map(|&tid| (tid, ErrorProfile::build(tv.tig(tid).unwrap(), tv, ovl)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

pub fn place_contained_reads(
    tv: &mut TigVector,
    catalog: &ReadCatalog,
    ovl: &OverlapIndex,
    g: &BestEdgeGraph,
    parameters: &Parameters,
) -> usize {
    let profiles = build_error_profiles(tv, ovl);

    let todo: Vec<u32> = catalog
        .valid_ids()
        .filter(|&r| g.is_contained(r) && !tv.is_placed(r))
        .collect();

    // placements are computed against a snapshot and applied serially
    let chosen: Vec<(u32, Placement)> = todo
        .par_iter()
        .filter_map(|&rid| {
            best_contained_placement(rid, tv, catalog, ovl, &profiles, parameters)
                .map(|p| (rid, p))
        })
        .collect();

    let mut touched = FxHashSet::<u32>::default();
    let mut placed = 0_usize;
    for (rid, p) in chosen {
        let (bgn, end) = p.interval();
        tv.add_read(p.tig, TigRead::new(rid, bgn, end));
        touched.insert(p.tig);
        placed += 1;
    }
    for tid in touched {
        tv.sort_tig(tid);
        tv.clean_up(tid);
    }
    log::info!(
        "placed {} of {} contained reads",
        placed,
        todo.len()
    );
    tv.check_registry();
    placed
}

fn best_contained_placement(
    rid: u32,
    tv: &TigVector,
    catalog: &ReadCatalog,
    ovl: &OverlapIndex,
    profiles: &FxHashMap<u32, ErrorProfile>,
    parameters: &Parameters,
) -> Option<Placement> {
    let placements = place_read_using_overlaps(
        rid,
        None,
        PlaceFlags::default(),
        parameters.max_load_erate,
        tv,
        catalog,
        ovl,
        parameters,
    );

    let mut best: Option<Placement> = None;
    for p in placements {
        if p.fcoverage < parameters.contained_cov_floor {
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
        let better = match &best {
            None => true,
            Some(b) => {
                (p.fcoverage, -p.erate, p.n_olaps) > (b.fcoverage, -b.erate, b.n_olaps)
            }
        };
        if better {
            best = Some(p);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::overlaps::tests::{ovl, test_catalog};
    use crate::utils::overlaps::{Overlap, OverlapIndex};
    use crate::utils::populate::populate_tigs;

    fn params() -> Parameters {
        let mut p = Parameters::new(1);
        p.min_ovlp_len = 50;
        p
    }

    fn chain_with_contained(contained_erate: f32) -> (ReadCatalog, OverlapIndex, BestEdgeGraph) {
        let cat = test_catalog(&[(1, 1000), (2, 1000), (3, 1000), (4, 500)]);
        // read 4 sits inside read 2, offset 200
        let raw: Vec<Overlap> = vec![
            ovl(1, 2, 900, 900, false, 0.01),
            ovl(2, 1, -900, -900, false, 0.01),
            ovl(2, 3, 900, 900, false, 0.01),
            ovl(3, 2, -900, -900, false, 0.01),
            ovl(4, 2, -200, 300, false, contained_erate),
            ovl(2, 4, 200, -300, false, contained_erate),
        ];
        let p = params();
        let idx = OverlapIndex::build(raw, &cat, &p).unwrap();
        let g = BestEdgeGraph::build(&cat, &idx, &p);
        (cat, idx, g)
    }

    #[test]
    fn contained_read_lands_inside_its_parent() {
        let (cat, idx, g) = chain_with_contained(0.01);
        assert!(g.is_contained(4));
        let mut tv = TigVector::new(cat.max_id());
        populate_tigs(&mut tv, &cat, &g);
        let n = place_contained_reads(&mut tv, &cat, &idx, &g, &params());
        assert_eq!(n, 1);
        let (tid, _) = tv.membership(4).unwrap();
        let tig = tv.tig(tid).unwrap();
        assert_eq!(tig.num_reads(), 4);
        let r = tig.reads.iter().find(|r| r.rid == 4).unwrap();
        assert_eq!(r.span(), 500);
        // inside read 2's interval, whichever way the tig came out
        let r2 = tig.reads.iter().find(|r| r.rid == 2).unwrap();
        assert!(r.lo() >= r2.lo() && r.hi() <= r2.hi());
    }

    #[test]
    fn inconsistent_error_rate_is_rejected() {
        // 10% error against a 1% profile fails the deviation gate
        let (cat, idx, g) = chain_with_contained(0.10);
        let mut tv = TigVector::new(cat.max_id());
        populate_tigs(&mut tv, &cat, &g);
        let n = place_contained_reads(&mut tv, &cat, &idx, &g, &params());
        assert_eq!(n, 0);
        assert!(!tv.is_placed(4));
    }
}
