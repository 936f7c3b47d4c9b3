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
// boundary checks on finished tigs
//
// circular genomes close on themselves, spur tigs hang off the side of
// another tig, and dangling boundary reads with no evidence are dropped
//

use rustc_hash::FxHashSet;

use super::asm_graph::AssemblyGraph;
use super::best_edges::BestEdgeGraph;
use super::overlaps::OverlapIndex;
use super::reads::ReadCatalog;
use super::tig::{TigRead, TigVector};
use super::Parameters;

// the tig-facing end of a boundary read, in read frame
fn outward_end3(r: &TigRead, at_high_end: bool) -> bool {
    if at_high_end {
        r.is_forward()
    } else {
        !r.is_forward()
    }
}

// a tig is circular when its last read dovetails back onto its first
// with matching orientation; the junction overlap length is recorded
pub fn detect_circular(tv: &mut TigVector, catalog: &ReadCatalog, ovl: &OverlapIndex) -> usize {
    let mut n = 0_usize;
    for tid in tv.live_ids() {
        let (last_rid, first_rid, rel_flip, out3) = {
            let tig = tv.tig(tid).unwrap();
            if tig.num_reads() < 2 {
                continue;
            }
            let first = tig.first_read();
            let last = tig.last_read();
            (
                last.rid,
                first.rid,
                last.is_forward() != first.is_forward(),
                outward_end3(last, true),
            )
        };
        for o in ovl.overlaps_of(last_rid) {
            if o.b_id != first_rid || !o.is_dovetail() {
                continue;
            }
            if o.flipped != rel_flip {
                continue;
            }
            if o.a_end_is_3prime() != out3 {
                continue;
            }
            let span = o.span_on_a(catalog.length(last_rid));
            let tig = tv.tig_mut(tid).unwrap();
            tig.circular = true;
            tig.circular_length = span;
            log::info!("tig {} is circular, junction overlap {} bp", tid, span);
            n += 1;
            break;
        }
    }
    n
}

// a tig whose boundary read's best edge lands near the end of another
// tig, with nothing continuing past that end, is a spur
pub fn mark_spur_tigs(
    tv: &mut TigVector,
    g: &BestEdgeGraph,
    parameters: &Parameters,
) -> usize {
    let mut spurs = Vec::<u32>::new();
    for tid in tv.live_ids() {
        let tig = tv.tig(tid).unwrap();
        let ends = [(tig.first_read(), false), (tig.last_read(), true)];
        let is_spur = ends.iter().any(|&(r, at_high)| {
            spur_edge(r, at_high, tid, tv, g, parameters)
        });
        if is_spur {
            spurs.push(tid);
        }
    }
    for &tid in spurs.iter() {
        tv.tig_mut(tid).unwrap().spur = true;
    }
    if !spurs.is_empty() {
        log::info!("marked {} spur tigs", spurs.len());
    }
    spurs.len()
}

fn spur_edge(
    r: &TigRead,
    at_high: bool,
    tid: u32,
    tv: &TigVector,
    g: &BestEdgeGraph,
    parameters: &Parameters,
) -> bool {
    let out3 = outward_end3(r, at_high);
    let e = match g.best_edge(r.rid, out3) {
        Some(e) => e,
        None => return false,
    };
    let (ttid, tidx) = match tv.membership(e.b_id) {
        Some(m) => m,
        None => return false,
    };
    if ttid == tid {
        return false;
    }
    let target = tv.tig(ttid).unwrap();
    // the shorter side of the junction is the spur
    if tv.tig(tid).unwrap().length >= target.length {
        return false;
    }
    let t = &target.reads[tidx as usize];
    let near_low = t.lo() <= parameters.anchor_margin;
    let near_high = t.hi() >= target.length - parameters.anchor_margin;
    if !near_low && !near_high {
        return false;
    }
    // nothing continues past that boundary: the boundary read's outward
    // edge is missing or only points back at us
    let boundary = if near_high {
        target.last_read()
    } else {
        target.first_read()
    };
    match g.best_edge(boundary.rid, outward_end3(boundary, near_high)) {
        None => true,
        Some(be) => be.b_id == r.rid,
    }
}

// boundary reads with no overlap evidence at all are dangling artifacts
pub fn drop_dead_ends(tv: &mut TigVector, ovl: &OverlapIndex) -> usize {
    let mut n = 0_usize;
    for tid in tv.live_ids() {
        loop {
            let victim = {
                let tig = match tv.tig(tid) {
                    Some(t) => t,
                    None => break,
                };
                if tig.num_reads() < 2 {
                    break;
                }
                let first = tig.first_read();
                let second = &tig.reads[1];
                let last = tig.last_read();
                let prev = &tig.reads[tig.num_reads() - 2];
                if ovl.overlaps_of(first.rid).is_empty() && !ovl.overlaps_of(second.rid).is_empty()
                {
                    Some(first.rid)
                } else if ovl.overlaps_of(last.rid).is_empty()
                    && !ovl.overlaps_of(prev.rid).is_empty()
                {
                    Some(last.rid)
                } else {
                    None
                }
            };
            match victim {
                Some(rid) => {
                    log::debug!("dropping dead end read {} from tig {}", rid, tid);
                    tv.eject_read(rid);
                    if tv.tig(tid).is_some() {
                        tv.clean_up(tid);
                    }
                    n += 1;
                }
                None => break,
            }
        }
    }
    n
}

// a tig is a bubble when every one of its backbone reads also places,
// in full, into one common larger tig
pub fn mark_bubbles(tv: &mut TigVector, g: &mut BestEdgeGraph, ag: &AssemblyGraph) -> usize {
    let mut bubbles = Vec::<u32>::new();
    for tid in tv.live_ids() {
        let tig = tv.tig(tid).unwrap();
        if tig.bubble {
            continue;
        }
        let backbone: Vec<u32> = tig
            .reads
            .iter()
            .map(|r| r.rid)
            .filter(|&r| g.is_backbone(r))
            .collect();
        if backbone.is_empty() {
            continue;
        }
        let mut common: Option<FxHashSet<u32>> = None;
        for &rid in backbone.iter() {
            let targets: FxHashSet<u32> = ag
                .placements(rid)
                .iter()
                .map(|p| p.tig)
                .filter(|&t| {
                    tv.tig(t)
                        .map(|o| o.id != tid && o.length > tig.length)
                        .unwrap_or(false)
                })
                .collect();
            common = Some(match common {
                None => targets,
                Some(c) => c.intersection(&targets).cloned().collect(),
            });
            if common.as_ref().unwrap().is_empty() {
                break;
            }
        }
        if common.map_or(false, |c| !c.is_empty()) {
            bubbles.push(tid);
        }
    }
    for &tid in bubbles.iter() {
        let rids: Vec<u32> = tv.tig(tid).unwrap().reads.iter().map(|r| r.rid).collect();
        tv.tig_mut(tid).unwrap().bubble = true;
        for rid in rids {
            g.set_bubble(rid);
        }
    }
    if !bubbles.is_empty() {
        log::info!("marked {} bubble tigs", bubbles.len());
    }
    bubbles.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::overlaps::tests::{ovl, test_catalog};
    use crate::utils::overlaps::{Overlap, OverlapIndex};

    fn params() -> Parameters {
        let mut p = Parameters::new(1);
        p.min_ovlp_len = 50;
        p
    }

    fn chain_tv(rids: &[u32]) -> (TigVector, u32) {
        let mut tv = TigVector::new(*rids.iter().max().unwrap());
        let t = tv.new_tig();
        for (i, &rid) in rids.iter().enumerate() {
            let b = i as i32 * 900;
            tv.add_read(t, TigRead::new(rid, b, b + 1000));
        }
        (tv, t)
    }

    #[test]
    fn circular_tig_is_flagged_with_junction_length() {
        let cat = test_catalog(&[(1, 1000), (2, 1000), (3, 1000)]);
        let raw = vec![
            ovl(1, 2, 900, 900, false, 0.01),
            ovl(2, 3, 900, 900, false, 0.01),
            ovl(3, 1, 900, 900, false, 0.01), // wraps around
        ];
        let idx = OverlapIndex::build(raw, &cat, &params()).unwrap();
        let (mut tv, t) = chain_tv(&[1, 2, 3]);
        assert_eq!(detect_circular(&mut tv, &cat, &idx), 1);
        let tig = tv.tig(t).unwrap();
        assert!(tig.circular);
        assert_eq!(tig.circular_length, 100);
    }

    #[test]
    fn linear_tig_is_not_circular() {
        let cat = test_catalog(&[(1, 1000), (2, 1000), (3, 1000)]);
        let raw = vec![
            ovl(1, 2, 900, 900, false, 0.01),
            ovl(2, 3, 900, 900, false, 0.01),
            // wrong orientation for a wrap
            ovl(3, 1, 900, 900, true, 0.01),
        ];
        let idx = OverlapIndex::build(raw, &cat, &params()).unwrap();
        let (mut tv, t) = chain_tv(&[1, 2, 3]);
        assert_eq!(detect_circular(&mut tv, &cat, &idx), 0);
        assert!(!tv.tig(t).unwrap().circular);
    }

    #[test]
    fn hanging_tig_is_a_spur() {
        let cat = test_catalog(&[(1, 1000), (2, 1000), (3, 1000), (4, 1000), (5, 1000)]);
        let mut raw = Vec::<Overlap>::new();
        for &(a, b) in &[(1, 2), (2, 3), (4, 5)] {
            raw.push(ovl(a, b, 900, 900, false, 0.01));
            raw.push(ovl(b, a, -900, -900, false, 0.01));
        }
        // tig [4,5] hangs off the high end of tig [1,2,3]
        raw.push(ovl(4, 3, -900, -900, false, 0.01));
        raw.push(ovl(3, 4, 900, 900, false, 0.01));
        let p = params();
        let idx = OverlapIndex::build(raw, &cat, &p).unwrap();
        let g = BestEdgeGraph::build(&cat, &idx, &p);

        let mut tv = TigVector::new(cat.max_id());
        let ta = tv.new_tig();
        for (i, rid) in (1..=3).enumerate() {
            let b = i as i32 * 900;
            tv.add_read(ta, TigRead::new(rid, b, b + 1000));
        }
        let tb = tv.new_tig();
        for (i, rid) in (4..=5).enumerate() {
            let b = i as i32 * 900;
            tv.add_read(tb, TigRead::new(rid, b, b + 1000));
        }
        assert_eq!(mark_spur_tigs(&mut tv, &g, &p), 1);
        assert!(tv.tig(tb).unwrap().spur);
        assert!(!tv.tig(ta).unwrap().spur);
    }

    #[test]
    fn dead_end_read_is_dropped() {
        let cat = test_catalog(&[(1, 1000), (2, 1000), (3, 1000)]);
        // read 1 has no overlaps at all, reads 2 and 3 do
        let raw = vec![
            ovl(2, 3, 900, 900, false, 0.01),
            ovl(3, 2, -900, -900, false, 0.01),
        ];
        let idx = OverlapIndex::build(raw, &cat, &params()).unwrap();
        let (mut tv, t) = chain_tv(&[1, 2, 3]);
        assert_eq!(drop_dead_ends(&mut tv, &idx), 1);
        assert!(!tv.is_placed(1));
        let tig = tv.tig(t).unwrap();
        assert_eq!(tig.num_reads(), 2);
        assert_eq!(tig.reads[0].lo(), 0);
        tv.check_registry();
    }
}
