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
// repeat annotation and repeat driven splitting
//
// external placements landing on a tig outline its repeats; a read end
// inside a repeat whose best external overlap rivals its internal one is
// confused, and confused coordinates become split walls
//

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use super::asm_graph::AssemblyGraph;
use super::best_edges::BestEdgeGraph;
use super::contained::build_error_profiles;
use super::overlaps::OverlapIndex;
use super::reads::ReadCatalog;
use super::split::{mostly_repeat, split_tig};
use super::tig::{Tig, TigVector};
use super::Parameters;

#[derive(Debug, Copy, Clone)]
pub struct ConfusedEdge {
    pub rid: u32,
    pub coord: i32,
}

// steps: merge per source read, collapse by coordinate, discard intervals
// a single read anchors through, extend and merge the rest
pub fn annotate_repeat_regions(
    tid: u32,
    tv: &TigVector,
    ag: &AssemblyGraph,
    parameters: &Parameters,
) -> Vec<(i32, i32)> {
    let tig = tv.tig(tid).unwrap();

    let mut per_source = FxHashMap::<u32, Vec<(i32, i32)>>::default();
    for &key in ag.placements_in(tid) {
        let p = ag.placement(key);
        if p.ver_bgn < p.ver_end {
            per_source
                .entry(p.rid)
                .or_insert_with(Vec::new)
                .push((p.ver_bgn, p.ver_end));
        }
    }

    let mut raw = Vec::<(i32, i32)>::new();
    for (_, mut ivs) in per_source {
        merge_overlapping(&mut ivs, 0);
        raw.extend(ivs);
    }

    merge_overlapping(&mut raw, parameters.repeat_collapse_dist);

    let m = parameters.anchor_margin;
    raw.retain(|&(b, e)| {
        !tig.reads
            .iter()
            .any(|r| r.lo() <= b - m && e + m <= r.hi())
    });

    for r in raw.iter_mut() {
        r.0 = (r.0 - m).max(0);
        r.1 = (r.1 + m).min(tig.length);
    }
    merge_overlapping(&mut raw, 0);
    raw
}

fn merge_overlapping(ivs: &mut Vec<(i32, i32)>, gap: i32) {
    ivs.sort_unstable();
    let mut out = Vec::<(i32, i32)>::with_capacity(ivs.len());
    for &(b, e) in ivs.iter() {
        match out.last_mut() {
            Some(last) if b <= last.1 + gap => {
                last.1 = last.1.max(e);
            }
            _ => out.push((b, e)),
        }
    }
    *ivs = out;
}

pub fn find_confused_edges(
    tid: u32,
    regions: &[(i32, i32)],
    tv: &TigVector,
    catalog: &ReadCatalog,
    ovl: &OverlapIndex,
    g: &BestEdgeGraph,
    ag: &AssemblyGraph,
    parameters: &Parameters,
) -> Vec<ConfusedEdge> {
    let tig = tv.tig(tid).unwrap();
    let inside = |x: i32| regions.iter().any(|&(b, e)| b <= x && x < e);

    let mut edges = Vec::<ConfusedEdge>::new();
    for r in tig.reads.iter() {
        if !g.is_backbone(r.rid) || g.is_spur(r.rid) || g.is_bubble(r.rid) {
            continue;
        }
        let external = best_external_score(r.rid, tv, ag);
        if external <= 0.0 {
            continue;
        }
        for &(coord, before) in &[(r.lo(), true), (r.hi(), false)] {
            if !inside(coord) {
                continue;
            }
            if exempt_circular(tig, coord) {
                continue;
            }
            let internal = thickest_internal(r.rid, tid, before, tv, catalog, ovl);
            if external >= internal - parameters.confused_absolute
                && external >= internal * (1.0 - parameters.confused_percent)
            {
                edges.push(ConfusedEdge { rid: r.rid, coord });
            }
        }
    }
    edges.sort_by_key(|e| (e.coord, e.rid));
    edges
}

// thickest overlap to a tig mate entirely on one side of the read
fn thickest_internal(
    rid: u32,
    tid: u32,
    before: bool,
    tv: &TigVector,
    catalog: &ReadCatalog,
    ovl: &OverlapIndex,
) -> f64 {
    let (_, idx) = tv.membership(rid).unwrap();
    let tig = tv.tig(tid).unwrap();
    let me = &tig.reads[idx as usize];
    let mut best = 0.0_f64;
    for o in ovl.overlaps_of(rid) {
        let (btid, bidx) = match tv.membership(o.b_id) {
            Some(m) => m,
            None => continue,
        };
        if btid != tid {
            continue;
        }
        let b = &tig.reads[bidx as usize];
        let qualifies = if before {
            b.lo() < me.lo()
        } else {
            b.hi() > me.hi()
        };
        if qualifies {
            best = best.max(o.score(catalog.length(rid)));
        }
    }
    best
}

// best alternate placement into a real multi-read, non-bubble tig
fn best_external_score(rid: u32, tv: &TigVector, ag: &AssemblyGraph) -> f64 {
    let mut best = 0.0_f64;
    for p in ag.placements(rid) {
        let target = match tv.tig(p.tig) {
            Some(t) => t,
            None => continue,
        };
        if target.num_reads() < 2 || target.bubble {
            continue;
        }
        best = best.max(p.best_score());
    }
    best
}

// the circular junction is a legitimate self join, not a confusion
fn exempt_circular(tig: &Tig, coord: i32) -> bool {
    tig.circular && (coord <= tig.circular_length || coord >= tig.length - tig.circular_length)
}

// confused coordinates inside a repeat become walls; a confused edge in
// declared-unique sequence is an invariant violation
pub fn build_breakpoints(regions: &[(i32, i32)], edges: &[ConfusedEdge]) -> Vec<i32> {
    let mut coords = Vec::<i32>::with_capacity(edges.len());
    for e in edges {
        assert!(
            regions.iter().any(|&(b, en)| b <= e.coord && e.coord < en),
            "confused edge of read {} at {} falls in unique sequence",
            e.rid,
            e.coord
        );
        coords.push(e.coord);
    }
    coords.sort_unstable();
    coords.dedup();
    coords
}

// per tig plans are computed in parallel against a frozen layout, then
// applied serially so new tig ids stay deterministic
pub fn split_repeat_tigs(
    tv: &mut TigVector,
    catalog: &ReadCatalog,
    ovl: &OverlapIndex,
    g: &BestEdgeGraph,
    parameters: &Parameters,
) -> usize {
    let profiles = build_error_profiles(tv, ovl);
    // repeat detection judges alternate placements with the stricter
    // repeat deviation
    let mut rp = *parameters;
    rp.deviation_graph = parameters.deviation_repeat;
    let ag = AssemblyGraph::build(tv, catalog, ovl, g, &profiles, &rp);

    let tids: Vec<u32> = tv
        .live_ids()
        .into_iter()
        .filter(|&t| tv.tig(t).unwrap().num_reads() > 1)
        .collect();

    let plans: Vec<(u32, Vec<i32>, Vec<(i32, i32)>)> = tids
        .par_iter()
        .map(|&tid| {
            let regions = annotate_repeat_regions(tid, tv, &ag, parameters);
            if regions.is_empty() {
                return (tid, Vec::new(), regions);
            }
            let edges = find_confused_edges(tid, &regions, tv, catalog, ovl, g, &ag, parameters);
            let bps = build_breakpoints(&regions, &edges);
            (tid, bps, regions)
        })
        .collect();

    let mut nsplit = 0_usize;
    for (tid, bps, regions) in plans {
        if bps.is_empty() {
            if !regions.is_empty() {
                let t = tv.tig_mut(tid).unwrap();
                t.repeat = mostly_repeat((0, t.length), &regions);
            }
            continue;
        }
        let out = split_tig(tv, tid, &bps, &regions);
        log::info!(
            "tig {} split at {:?} into {} tigs, {} reads ejected",
            tid,
            bps,
            out.new_tigs.len(),
            out.ejected.len()
        );
        nsplit += 1;
    }
    tv.check_registry();
    nsplit
}
