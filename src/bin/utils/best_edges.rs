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
// per read-end best continuing overlap and the read role classification
//
// classification is computed once after best edges are known and treated
// as immutable for the rest of a phase; only the bubble bit is set later
// when whole tigs are identified as bubbles
//

use rayon::prelude::*;

use super::overlaps::{Overlap, OverlapIndex};
use super::reads::ReadCatalog;
use super::Parameters;

#[derive(Debug, Copy, Clone)]
pub struct BestEdge {
    pub b_id: u32,
    pub a_hang: i32,
    pub b_hang: i32,
    pub flipped: bool,
    pub erate: f32,
}

impl BestEdge {
    fn from_overlap(o: &Overlap) -> Self {
        BestEdge {
            b_id: o.b_id,
            a_hang: o.a_hang,
            b_hang: o.b_hang,
            flipped: o.flipped,
            erate: o.erate,
        }
    }
}

// which end of B an edge leaving A's `from3` end enters
pub fn entry_end_is_3prime(from3: bool, flipped: bool) -> bool {
    if from3 {
        flipped
    } else {
        !flipped
    }
}

// read role bits, named accessors instead of raw masks
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ReadFlags(u8);

const F_CONTAINED: u8 = 0x01;
const F_COVERAGE_GAP: u8 = 0x02;
const F_SPUR: u8 = 0x04;
const F_BUBBLE: u8 = 0x08;

impl ReadFlags {
    pub fn contained(&self) -> bool {
        self.0 & F_CONTAINED != 0
    }
    pub fn coverage_gap(&self) -> bool {
        self.0 & F_COVERAGE_GAP != 0
    }
    pub fn spur(&self) -> bool {
        self.0 & F_SPUR != 0
    }
    pub fn bubble(&self) -> bool {
        self.0 & F_BUBBLE != 0
    }
    pub fn backbone(&self) -> bool {
        !self.contained() && !self.coverage_gap()
    }
}

pub struct BestEdgeGraph {
    best5: Vec<Option<BestEdge>>,
    best3: Vec<Option<BestEdge>>,
    flags: Vec<ReadFlags>,
}

impl BestEdgeGraph {
    pub fn build(
        catalog: &ReadCatalog,
        ovl: &OverlapIndex,
        parameters: &Parameters,
    ) -> BestEdgeGraph {
        let n = catalog.max_id() as usize + 1;

        // pass 1: containment; a read bracketed by a longer partner drops
        // out of best edge competition entirely
        let contained: Vec<bool> = (0..n as u32)
            .into_par_iter()
            .map(|rid| {
                if !catalog.is_valid(rid) {
                    return false;
                }
                ovl.overlaps_of(rid)
                    .iter()
                    .any(|o| o.a_is_contained() && catalog.is_valid(o.b_id))
            })
            .collect();

        // pass 2: per end best dovetail continuation, skipping contained
        // partners; containment overlaps never compete here
        let picks: Vec<(Option<BestEdge>, Option<BestEdge>, bool)> = (0..n as u32)
            .into_par_iter()
            .map(|rid| {
                if !catalog.is_valid(rid) || contained[rid as usize] {
                    return (None, None, false);
                }
                let mut b5: Option<(f64, BestEdge)> = None;
                let mut b3: Option<(f64, BestEdge)> = None;
                let mut any5 = false;
                let mut any3 = false;
                for o in ovl.overlaps_of(rid) {
                    if !catalog.is_valid(o.b_id) || contained[o.b_id as usize] {
                        continue;
                    }
                    if !o.is_dovetail() {
                        continue;
                    }
                    let s = o.score(catalog.length(rid));
                    if o.a_end_is_5prime() {
                        any5 = true;
                        if better(&b5, s, o.b_id) {
                            b5 = Some((s, BestEdge::from_overlap(o)));
                        }
                    } else if o.a_end_is_3prime() {
                        any3 = true;
                        if better(&b3, s, o.b_id) {
                            b3 = Some((s, BestEdge::from_overlap(o)));
                        }
                    }
                }
                let gap = !(any5 && any3);
                (b5.map(|x| x.1), b3.map(|x| x.1), gap)
            })
            .collect();

        let mut best5 = Vec::<Option<BestEdge>>::with_capacity(n);
        let mut best3 = Vec::<Option<BestEdge>>::with_capacity(n);
        let mut flags = vec![ReadFlags::default(); n];
        for (rid, (b5, b3, gap)) in picks.into_iter().enumerate() {
            best5.push(b5);
            best3.push(b3);
            if !catalog.is_valid(rid as u32) {
                continue;
            }
            if contained[rid] {
                flags[rid].0 |= F_CONTAINED;
            } else if gap {
                flags[rid].0 |= F_COVERAGE_GAP;
            }
        }

        let mut graph = BestEdgeGraph {
            best5,
            best3,
            flags,
        };
        graph.mark_spurs(catalog, parameters.spur_depth);
        graph
    }

    // a spur path hangs off the main graph and dies within a few reads;
    // seed with dead-ended reads and grow backwards a bounded number of
    // rounds
    fn mark_spurs(&mut self, catalog: &ReadCatalog, depth: u32) {
        for rid in catalog.valid_ids() {
            let f = self.flags[rid as usize];
            if f.contained() || f.coverage_gap() {
                continue;
            }
            let dead5 = self.best5[rid as usize].is_none();
            let dead3 = self.best3[rid as usize].is_none();
            if dead5 != dead3 {
                self.flags[rid as usize].0 |= F_SPUR;
            }
        }
        for _ in 1..depth {
            let mut newly = Vec::<u32>::new();
            for rid in catalog.valid_ids() {
                let f = self.flags[rid as usize];
                if f.spur() || f.contained() || f.coverage_gap() {
                    continue;
                }
                for &end3 in &[false, true] {
                    if let Some(e) = self.best_edge(rid, end3) {
                        let t = e.b_id;
                        if !self.flags[t as usize].spur() {
                            continue;
                        }
                        // only extend the spur backwards through its
                        // own continuation
                        let te = entry_end_is_3prime(end3, e.flipped);
                        let back = self.best_edge(t, te);
                        if back.map_or(true, |b| b.b_id == rid) {
                            newly.push(rid);
                        }
                    }
                }
            }
            if newly.is_empty() {
                break;
            }
            for rid in newly {
                self.flags[rid as usize].0 |= F_SPUR;
            }
        }
    }

    pub fn best_edge(&self, rid: u32, end3: bool) -> Option<&BestEdge> {
        let v = if end3 { &self.best3 } else { &self.best5 };
        v.get(rid as usize).and_then(|e| e.as_ref())
    }

    pub fn flags(&self, rid: u32) -> ReadFlags {
        self.flags[rid as usize]
    }

    pub fn is_contained(&self, rid: u32) -> bool {
        self.flags[rid as usize].contained()
    }

    pub fn is_coverage_gap(&self, rid: u32) -> bool {
        self.flags[rid as usize].coverage_gap()
    }

    pub fn is_spur(&self, rid: u32) -> bool {
        self.flags[rid as usize].spur()
    }

    pub fn is_bubble(&self, rid: u32) -> bool {
        self.flags[rid as usize].bubble()
    }

    pub fn is_backbone(&self, rid: u32) -> bool {
        self.flags[rid as usize].backbone()
    }

    pub fn set_bubble(&mut self, rid: u32) {
        self.flags[rid as usize].0 |= F_BUBBLE;
    }

    // a read may seed a tig only when every best edge it carries is
    // returned by the partner at the entered end
    pub fn is_mutual_best(&self, rid: u32) -> bool {
        for &end3 in &[false, true] {
            if let Some(e) = self.best_edge(rid, end3) {
                let te = entry_end_is_3prime(end3, e.flipped);
                match self.best_edge(e.b_id, te) {
                    Some(back) => {
                        let back_te = entry_end_is_3prime(te, back.flipped);
                        if back.b_id != rid || back_te != end3 {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }

    pub fn log_census(&self, catalog: &ReadCatalog) {
        let mut n_contained = 0_usize;
        let mut n_gap = 0_usize;
        let mut n_spur = 0_usize;
        let mut n_backbone = 0_usize;
        for rid in catalog.valid_ids() {
            let f = self.flags(rid);
            if f.contained() {
                n_contained += 1;
            }
            if f.coverage_gap() {
                n_gap += 1;
            }
            if f.spur() {
                n_spur += 1;
            }
            if f.backbone() {
                n_backbone += 1;
            }
        }
        log::info!(
            "read census: {} contained, {} coverage-gap, {} spur, {} backbone",
            n_contained,
            n_gap,
            n_spur,
            n_backbone
        );
    }
}

fn better(cur: &Option<(f64, BestEdge)>, score: f64, b_id: u32) -> bool {
    match cur {
        None => true,
        Some((s, e)) => score > *s || (score == *s && b_id < e.b_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::overlaps::tests::{ovl, test_catalog};
    use crate::utils::overlaps::OverlapIndex;

    fn index_of(raw: Vec<crate::utils::overlaps::Overlap>, cat: &ReadCatalog) -> OverlapIndex {
        let mut p = Parameters::new(1);
        p.min_ovlp_len = 10;
        OverlapIndex::build(raw, cat, &p).unwrap()
    }

    // three reads overlapping in a simple chain 1 -> 2 -> 3
    fn chain_overlaps() -> Vec<crate::utils::overlaps::Overlap> {
        vec![
            ovl(1, 2, 900, 900, false, 0.01),
            ovl(2, 1, -900, -900, false, 0.01),
            ovl(2, 3, 900, 900, false, 0.01),
            ovl(3, 2, -900, -900, false, 0.01),
        ]
    }

    #[test]
    fn chain_best_edges_are_mutual() {
        let cat = test_catalog(&[(1, 1000), (2, 1000), (3, 1000)]);
        let idx = index_of(chain_overlaps(), &cat);
        let g = BestEdgeGraph::build(&cat, &idx, &Parameters::new(1));

        let e = g.best_edge(1, true).unwrap();
        assert_eq!(e.b_id, 2);
        let e = g.best_edge(2, false).unwrap();
        assert_eq!(e.b_id, 1);
        assert!(g.best_edge(1, false).is_none());
        assert!(g.is_mutual_best(2));
        // end reads carry a dead end each, classified as coverage gaps
        assert!(g.is_coverage_gap(1));
        assert!(g.is_coverage_gap(3));
        assert!(!g.is_coverage_gap(2));
    }

    #[test]
    fn containment_never_competes_with_dovetail() {
        let cat = test_catalog(&[(1, 2000), (2, 1000), (3, 2000)]);
        // read 2 is contained in read 1; read 1 dovetails read 3
        let raw = vec![
            ovl(1, 2, 500, -500, false, 0.001), // B contained, huge span
            ovl(1, 3, 1500, 1500, false, 0.02),
            ovl(2, 1, -500, 500, false, 0.001),
            ovl(3, 1, -1500, -1500, false, 0.02),
        ];
        let idx = index_of(raw, &cat);
        let g = BestEdgeGraph::build(&cat, &idx, &Parameters::new(1));
        assert!(g.is_contained(2));
        assert!(!g.is_contained(1));
        let e = g.best_edge(1, true).unwrap();
        assert_eq!(e.b_id, 3);
        // contained reads get no edges of their own
        assert!(g.best_edge(2, false).is_none());
        assert!(g.best_edge(2, true).is_none());
    }

    #[test]
    fn higher_score_wins() {
        let cat = test_catalog(&[(1, 1000), (2, 1000), (3, 1000)]);
        let raw = vec![
            ovl(1, 2, 900, 900, false, 0.01), // span 100
            ovl(1, 3, 700, 700, false, 0.01), // span 300, better
            ovl(2, 1, -900, -900, false, 0.01),
            ovl(3, 1, -700, -700, false, 0.01),
        ];
        let idx = index_of(raw, &cat);
        let g = BestEdgeGraph::build(&cat, &idx, &Parameters::new(1));
        assert_eq!(g.best_edge(1, true).unwrap().b_id, 3);
        // 1's best is 3, so 2's edge back to 1 is not mutual
        assert!(!g.is_mutual_best(2));
        assert!(g.is_mutual_best(3));
    }
}
