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
// refine read positions inside each tig
//
// greedy construction accumulates hang arithmetic error; each round replaces
// a read's interval by the median of the positions implied by its compatible
// intra-tig overlaps, until no coordinate moves more than the tolerance
//

use rayon::prelude::*;

use super::overlaps::OverlapIndex;
use super::placement::implied_position;
use super::reads::ReadCatalog;
use super::tig::{Tig, TigRead, TigVector};
use super::Parameters;

pub fn optimize_positions(
    tv: &mut TigVector,
    catalog: &ReadCatalog,
    ovl: &OverlapIndex,
    parameters: &Parameters,
) {
    let tids: Vec<u32> = tv
        .live_ids()
        .into_iter()
        .filter(|&t| tv.tig(t).unwrap().num_reads() > 1)
        .collect();

    for round in 0..parameters.optimize_rounds {
        let updates: Vec<(u32, Vec<(i32, i32)>, i32)> = tids
            .par_iter()
            .map(|&tid| {
                let tig = tv.tig(tid).unwrap();
                let mut pos = Vec::<(i32, i32)>::with_capacity(tig.num_reads());
                let mut moved = 0_i32;
                for r in tig.reads.iter() {
                    let (lo, hi) = optimized_interval(r, tig, tv, ovl);
                    moved = moved.max((lo - r.lo()).abs()).max((hi - r.hi()).abs());
                    if r.is_forward() {
                        pos.push((lo, hi));
                    } else {
                        pos.push((hi, lo));
                    }
                }
                (tid, pos, moved)
            })
            .collect();

        let mut active = 0_usize;
        for (tid, pos, moved) in updates {
            let tig = tv.tig_mut(tid).unwrap();
            let tol = (parameters.position_tolerance * tig.length as f64).max(1.0) as i32;
            if moved > tol {
                active += 1;
            }
            for (r, (b, e)) in tig.reads.iter_mut().zip(pos) {
                r.bgn = b;
                r.end = e;
            }
            tig.length = tig.compute_length();
        }
        log::debug!("position round {}: {} tigs still moving", round, active);
        if active == 0 {
            break;
        }
    }

    for &tid in tids.iter() {
        expand_short_reads(tv, tid, catalog);
        tv.clean_up(tid);
        tv.sort_tig(tid);
    }
    tv.check_registry();
}

// median of the positions implied by compatible intra-tig overlaps, with
// the current interval as one extra vote so isolated reads stay put
fn optimized_interval(a: &TigRead, tig: &Tig, tv: &TigVector, ovl: &OverlapIndex) -> (i32, i32) {
    let mut los = vec![a.lo()];
    let mut his = vec![a.hi()];
    for o in ovl.overlaps_of(a.rid) {
        let (btid, bidx) = match tv.membership(o.b_id) {
            Some(m) => m,
            None => continue,
        };
        if btid != tig.id || o.b_id == a.rid {
            continue;
        }
        let b = &tig.reads[bidx as usize];
        let (lo, hi, fwd) = implied_position(o, b.lo(), b.hi(), b.is_forward());
        // the overlap must agree with the placement it is voting on:
        // same relative orientation, intersecting intervals, and for
        // dovetails the same read order as the hangs imply
        if fwd != a.is_forward() {
            continue;
        }
        if a.lo() >= b.hi() || b.lo() >= a.hi() {
            continue;
        }
        if o.is_dovetail() {
            let implied_before = lo < b.lo();
            let current_before = (a.lo(), a.hi()) < (b.lo(), b.hi());
            if implied_before != current_before {
                continue;
            }
        }
        los.push(lo);
        his.push(hi);
    }
    (median(&mut los), median(&mut his))
}

fn median(v: &mut Vec<i32>) -> i32 {
    v.sort_unstable();
    let n = v.len();
    if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) / 2
    }
}

// median voting can shrink a read below its own length; restore the span
// symmetrically, half into the gap before the read and half at the tail,
// shifting every later read by the tail share
fn expand_short_reads(tv: &mut TigVector, tid: u32, catalog: &ReadCatalog) {
    tv.sort_tig(tid);
    let tig = tv.tig_mut(tid).unwrap();
    let mut shift = 0_i32;
    for r in tig.reads.iter_mut() {
        r.bgn += shift;
        r.end += shift;
        let short = catalog.length(r.rid) as i32 - r.span();
        if short > 0 {
            let head = short / 2;
            let tail = short - head;
            if r.is_forward() {
                r.bgn -= head;
                r.end += tail;
            } else {
                r.bgn += tail;
                r.end -= head;
            }
            shift += tail;
        }
    }
    tig.length = tig.compute_length();
}
