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
// final layout serialization and diagnostic reports
//

use petgraph::graphmap::DiGraphMap;
use std::io::{self, Write};

use super::best_edges::BestEdgeGraph;
use super::overlaps::OverlapIndex;
use super::placement::implied_position;
use super::reads::ReadCatalog;
use super::tig::TigVector;
use super::Parameters;

// too small or too sparse to call assembled; spur tigs join them
pub fn mark_unassembled(tv: &mut TigVector, parameters: &Parameters) -> usize {
    let mut n = 0_usize;
    for tid in tv.live_ids() {
        let t = tv.tig_mut(tid).unwrap();
        if t.num_reads() < parameters.min_reads_assembled as usize
            || t.length < parameters.min_tig_length
            || t.spur
        {
            t.unassembled = true;
            n += 1;
        }
    }
    log::info!("{} tigs marked unassembled", n);
    n
}

// one T record per tig, then one R record per placed read in order
pub fn write_layout<W: Write>(w: &mut W, tv: &TigVector) -> io::Result<()> {
    for tid in tv.live_ids() {
        let t = tv.tig(tid).unwrap();
        let class = if t.unassembled { "unassembled" } else { "contig" };
        writeln!(
            w,
            "T {} {} len={} trim=0,{} reads={} repeat={} circular={} circlen={} bubble={}",
            t.id,
            class,
            t.length,
            t.length,
            t.num_reads(),
            t.repeat as u8,
            t.circular as u8,
            t.circular_length,
            t.bubble as u8
        )?;
        for r in t.reads.iter() {
            writeln!(
                w,
                "R {} parent={} hangs={},{} pos={},{}",
                r.rid, r.parent, r.a_hang, r.b_hang, r.bgn, r.end
            )?;
        }
    }
    Ok(())
}

fn n50(lengths: &mut Vec<i64>) -> (usize, i64, i64) {
    lengths.sort_unstable_by(|a, b| b.cmp(a));
    let total: i64 = lengths.iter().sum();
    let mut acc = 0_i64;
    for &l in lengths.iter() {
        acc += l;
        if acc * 2 >= total {
            return (lengths.len(), total, l);
        }
    }
    (lengths.len(), total, 0)
}

// assembled / repeat / bubble / unassembled census with N50 per class
pub fn log_size_report(tv: &TigVector) {
    let mut classes: [(&str, Vec<i64>); 4] = [
        ("contig", Vec::new()),
        ("repeat", Vec::new()),
        ("bubble", Vec::new()),
        ("unassembled", Vec::new()),
    ];
    for tid in tv.live_ids() {
        let t = tv.tig(tid).unwrap();
        let slot = if t.unassembled {
            3
        } else if t.bubble {
            2
        } else if t.repeat {
            1
        } else {
            0
        };
        classes[slot].1.push(t.length as i64);
    }
    for (name, mut lengths) in classes {
        if lengths.is_empty() {
            log::info!("{}: none", name);
            continue;
        }
        let (n, total, n50) = n50(&mut lengths);
        log::info!(
            "{}: {} tigs, {} bp total, N50 {} bp, longest {} bp",
            name,
            n,
            total,
            n50,
            lengths[0]
        );
    }
}

// how well the final layout honors the overlap relation: an intra-tig
// overlap is satisfied when the position it implies agrees with the
// actual position within the placement slop
pub fn log_overlap_satisfaction(
    tv: &TigVector,
    catalog: &ReadCatalog,
    ovl: &OverlapIndex,
    parameters: &Parameters,
) {
    let mut satisfied = 0_u64;
    let mut stressed = 0_u64;
    let mut external = 0_u64;
    let mut dangling = 0_u64;
    for rid in catalog.valid_ids() {
        let (atid, aidx) = match tv.membership(rid) {
            Some(m) => m,
            None => continue,
        };
        let a = &tv.tig(atid).unwrap().reads[aidx as usize];
        for o in ovl.overlaps_of(rid) {
            let (btid, bidx) = match tv.membership(o.b_id) {
                Some(m) => m,
                None => {
                    dangling += 1;
                    continue;
                }
            };
            if btid != atid {
                external += 1;
                continue;
            }
            let b = &tv.tig(btid).unwrap().reads[bidx as usize];
            let (lo, hi, fwd) = implied_position(o, b.lo(), b.hi(), b.is_forward());
            let slop = ((catalog.length(rid) as f64 * parameters.place_slop_frac) as i32)
                .max(parameters.place_slop_min);
            if fwd == a.is_forward()
                && (lo - a.lo()).abs() <= slop
                && (hi - a.hi()).abs() <= slop
            {
                satisfied += 1;
            } else {
                stressed += 1;
            }
        }
    }
    let intra = satisfied + stressed;
    log::info!(
        "overlap satisfaction: {}/{} intra-tig satisfied, {} cross-tig, {} to unplaced reads",
        satisfied,
        intra,
        external,
        dangling
    );
}

// graph exchange dump: one S record per tig, one L record per junction
// between tig ends implied by boundary best edges
pub fn write_graph<W: Write>(
    w: &mut W,
    tv: &TigVector,
    catalog: &ReadCatalog,
    g: &BestEdgeGraph,
) -> io::Result<()> {
    // node (tig, end), end 0 at coordinate zero and 1 at length
    let mut graph = DiGraphMap::<(u32, u8), i32>::new();
    for tid in tv.live_ids() {
        let t = tv.tig(tid).unwrap();
        let probes = [(t.first_read(), 0_u8), (t.last_read(), 1_u8)];
        for &(r, end) in probes.iter() {
            let out3 = if end == 1 {
                r.is_forward()
            } else {
                !r.is_forward()
            };
            let e = match g.best_edge(r.rid, out3) {
                Some(e) => e,
                None => continue,
            };
            let (ttid, tidx) = match tv.membership(e.b_id) {
                Some(m) => m,
                None => continue,
            };
            if ttid == tid {
                continue;
            }
            let target = tv.tig(ttid).unwrap();
            let b = &target.reads[tidx as usize];
            let tend: u8 = if b.lo() <= target.length - b.hi() { 0 } else { 1 };
            let span = catalog.length(r.rid) as i32 - e.a_hang.max(0) + e.b_hang.min(0);
            graph.add_edge((tid, end), (ttid, tend), span);
        }
    }

    for tid in tv.live_ids() {
        let t = tv.tig(tid).unwrap();
        writeln!(w, "S\ttig{:08}\t*\tLN:i:{}", t.id, t.length)?;
    }
    let mut edges: Vec<((u32, u8), (u32, u8), i32)> =
        graph.all_edges().map(|(a, b, &s)| (a, b, s)).collect();
    edges.sort();
    for ((atid, aend), (btid, bend), span) in edges {
        let same_source = {
            let a = tv.tig(atid).unwrap();
            let b = tv.tig(btid).unwrap();
            a.source_contig != 0 && a.source_contig == b.source_contig
        };
        writeln!(
            w,
            "L\ttig{:08}\t{}\ttig{:08}\t{}\t{}M\tsc:i:{}",
            atid,
            if aend == 1 { '+' } else { '-' },
            btid,
            if bend == 0 { '+' } else { '-' },
            span.max(0),
            same_source as u8
        )?;
    }
    Ok(())
}
