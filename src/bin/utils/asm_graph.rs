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
// where else could each read go
//
// every backbone read is replaced through the placement engine and each
// credible alternate position is kept, with the thickest overlaps that
// support it; forward indexed by read and reverse indexed by target tig
//

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use super::best_edges::BestEdgeGraph;
use super::error_profile::ErrorProfile;
use super::overlaps::OverlapIndex;
use super::placement::{place_read_using_overlaps, PlaceFlags, Placement};
use super::reads::ReadCatalog;
use super::tig::TigVector;
use super::Parameters;

const MIN_CONSISTENT_FRACTION: f64 = 0.5;

#[derive(Debug, Copy, Clone)]
pub struct BestPlacement {
    pub rid: u32,
    pub tig: u32,
    pub fwd: bool,
    pub bgn: i32,
    pub end: i32,
    pub ver_bgn: i32,
    pub ver_end: i32,
    pub fcoverage: f64,
    pub erate: f64,
    // thickest supporting overlap per class; a placement is backed either
    // by a containment or by dovetails, never both
    pub olap5: f64,
    pub olap3: f64,
    pub olap_c: f64,
}

impl BestPlacement {
    pub fn best_score(&self) -> f64 {
        self.olap5.max(self.olap3).max(self.olap_c)
    }
}

pub struct AssemblyGraph {
    fwd: Vec<Vec<BestPlacement>>,
    rev: FxHashMap<u32, Vec<(u32, u32)>>, // tig -> (rid, index into fwd[rid])
}

impl AssemblyGraph {
    pub fn build(
        tv: &TigVector,
        catalog: &ReadCatalog,
        ovl: &OverlapIndex,
        g: &BestEdgeGraph,
        profiles: &FxHashMap<u32, ErrorProfile>,
        parameters: &Parameters,
    ) -> AssemblyGraph {
        let n = catalog.max_id() as usize + 1;
        let lists: Vec<Vec<BestPlacement>> = (0..n as u32)
            .into_par_iter()
            .map(|rid| {
                if !catalog.is_valid(rid)
                    || !g.is_backbone(rid)
                    || g.is_spur(rid)
                    || g.is_bubble(rid)
                {
                    return Vec::new();
                }
                let home_iv = tv.membership(rid).map(|(tid, idx)| {
                    let r = &tv.tig(tid).unwrap().reads[idx as usize];
                    (tid, r.lo(), r.hi())
                });
                place_read_using_overlaps(
                    rid,
                    None,
                    PlaceFlags::default(),
                    parameters.max_load_erate,
                    tv,
                    catalog,
                    ovl,
                    parameters,
                )
                .into_iter()
                .filter(|p| accept(p, home_iv, profiles, parameters))
                .map(|p| annotate(rid, p, tv, catalog, ovl))
                .collect()
            })
            .collect();

        let mut rev = FxHashMap::<u32, Vec<(u32, u32)>>::default();
        let mut total = 0_usize;
        for (rid, list) in lists.iter().enumerate() {
            for (i, p) in list.iter().enumerate() {
                rev.entry(p.tig)
                    .or_insert_with(Vec::new)
                    .push((rid as u32, i as u32));
                total += 1;
            }
        }
        for v in rev.values_mut() {
            v.sort();
        }
        log::info!("assembly graph: {} alternate placements", total);

        AssemblyGraph { fwd: lists, rev }
    }

    pub fn placements(&self, rid: u32) -> &[BestPlacement] {
        self.fwd
            .get(rid as usize)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    // alternate placements landing in a tig, in (read, index) order
    pub fn placements_in(&self, tid: u32) -> &[(u32, u32)] {
        self.rev.get(&tid).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn placement(&self, key: (u32, u32)) -> &BestPlacement {
        &self.fwd[key.0 as usize][key.1 as usize]
    }
}

fn accept(
    p: &Placement,
    home_iv: Option<(u32, i32, i32)>,
    profiles: &FxHashMap<u32, ErrorProfile>,
    parameters: &Parameters,
) -> bool {
    if p.fcoverage < parameters.graph_cov_floor {
        return false;
    }
    // the resting position itself is not an alternate
    if let Some((htid, hlo, hhi)) = home_iv {
        if p.tig == htid && p.bgn < hhi && hlo < p.end {
            return false;
        }
    }
    if let Some(profile) = profiles.get(&p.tig) {
        let f = profile.consistent_fraction(
            parameters.deviation_graph,
            p.ver_bgn,
            p.ver_end,
            p.erate,
        );
        if f < MIN_CONSISTENT_FRACTION {
            return false;
        }
    }
    true
}

// scan the read's overlaps into the placed span and keep the thickest
// support per class
fn annotate(
    rid: u32,
    p: Placement,
    tv: &TigVector,
    catalog: &ReadCatalog,
    ovl: &OverlapIndex,
) -> BestPlacement {
    let alen = catalog.length(rid);
    let mut t5 = 0.0_f64;
    let mut t3 = 0.0_f64;
    let mut tc = 0.0_f64;
    for o in ovl.overlaps_of(rid) {
        let (btid, bidx) = match tv.membership(o.b_id) {
            Some(m) => m,
            None => continue,
        };
        if btid != p.tig {
            continue;
        }
        let b = &tv.tig(btid).unwrap().reads[bidx as usize];
        if b.lo() >= p.end || p.bgn >= b.hi() {
            continue;
        }
        let s = o.score(alen);
        if o.is_containment() {
            tc = tc.max(s);
        } else if o.a_end_is_5prime() {
            t5 = t5.max(s);
        } else {
            t3 = t3.max(s);
        }
    }
    // both dovetail ends supported wins over containment, and a lone
    // containment wins over a one sided dovetail
    if t5 > 0.0 && t3 > 0.0 {
        tc = 0.0;
    } else if tc > 0.0 {
        t5 = 0.0;
        t3 = 0.0;
    }
    BestPlacement {
        rid,
        tig: p.tig,
        fwd: p.fwd,
        bgn: p.bgn,
        end: p.end,
        ver_bgn: p.ver_bgn,
        ver_end: p.ver_end,
        fcoverage: p.fcoverage,
        erate: p.erate,
        olap5: t5,
        olap3: t3,
        olap_c: tc,
    }
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

    #[test]
    fn alternate_placements_are_indexed_both_ways() {
        let cat = test_catalog(&[
            (1, 1000),
            (2, 1000),
            (3, 1000),
            (5, 1000),
            (6, 1000),
            (7, 1000),
        ]);
        // two chains, 1-2-3 and 7-5-6; the interior reads 2 and 5 also
        // share a half length dovetail between the tigs
        let raw = vec![
            ovl(1, 2, 900, 900, false, 0.01),
            ovl(2, 1, -900, -900, false, 0.01),
            ovl(2, 3, 900, 900, false, 0.01),
            ovl(3, 2, -900, -900, false, 0.01),
            ovl(7, 5, 900, 900, false, 0.01),
            ovl(5, 7, -900, -900, false, 0.01),
            ovl(5, 6, 900, 900, false, 0.01),
            ovl(6, 5, -900, -900, false, 0.01),
            ovl(5, 2, 500, 500, false, 0.01),
            ovl(2, 5, -500, -500, false, 0.01),
        ];
        let p = params();
        let idx = OverlapIndex::build(raw, &cat, &p).unwrap();
        let g = crate::utils::best_edges::BestEdgeGraph::build(&cat, &idx, &p);
        let mut tv = TigVector::new(cat.max_id());
        let t1 = tv.new_tig();
        tv.add_read(t1, TigRead::new(1, 0, 1000));
        tv.add_read(t1, TigRead::new(2, 900, 1900));
        tv.add_read(t1, TigRead::new(3, 1800, 2800));
        let t2 = tv.new_tig();
        tv.add_read(t2, TigRead::new(7, 0, 1000));
        tv.add_read(t2, TigRead::new(5, 900, 1900));
        tv.add_read(t2, TigRead::new(6, 1800, 2800));

        let profiles = crate::utils::contained::build_error_profiles(&tv, &idx);
        let ag = AssemblyGraph::build(&tv, &cat, &idx, &g, &profiles, &p);

        let alts = ag.placements(5);
        assert_eq!(alts.len(), 1);
        assert_eq!(alts[0].tig, t1);
        assert_eq!((alts[0].bgn, alts[0].end), (400, 1400));
        assert!((alts[0].fcoverage - 0.5).abs() < 0.01);
        // the placement is backed by a one sided dovetail, not containment
        assert!(alts[0].olap3 > 0.0);
        assert_eq!(alts[0].olap_c, 0.0);
        assert!(alts[0].best_score() > 0.0);

        assert_eq!(ag.placements_in(t1), &[(5, 0)]);
        assert_eq!(ag.placements_in(t2), &[(2, 0)]);

        // coverage gap reads at chain ends never enter the graph
        assert!(ag.placements(1).is_empty());
        assert!(ag.placements(3).is_empty());
    }
}
