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
// greedy tig construction over the best edge graph
//
// seeds are taken in decreasing length order and must be mutual best; each
// seed is walked off its 3' end, the tig is reverse complemented, and the
// walk continues off the other end of the seed
//

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use super::best_edges::{entry_end_is_3prime, BestEdgeGraph};
use super::overlaps::{Overlap, OverlapIndex};
use super::placement::implied_position;
use super::reads::ReadCatalog;
use super::tig::{TigRead, TigVector};

pub fn populate_tigs(tv: &mut TigVector, catalog: &ReadCatalog, g: &BestEdgeGraph) {
    // a seed needs at least one continuation; reads whose only coverage
    // gap is the end of their component may still seed
    let mut seeds: Vec<u32> = catalog
        .valid_ids()
        .filter(|&r| {
            !g.is_contained(r)
                && !g.is_spur(r)
                && (g.best_edge(r, false).is_some() || g.best_edge(r, true).is_some())
        })
        .collect();
    seeds.sort_by_key(|&r| (std::cmp::Reverse(catalog.length(r)), r));

    let mut n_seeded = 0_usize;
    for seed in seeds {
        if tv.is_placed(seed) || !g.is_mutual_best(seed) {
            continue;
        }
        let tid = tv.new_tig();
        tv.add_read(tid, TigRead::new(seed, 0, catalog.length(seed) as i32));
        extend(tv, g, tid, seed, true);
        // flip so the unexplored seed end faces the growing coordinate
        tv.reverse_complement(tid, false);
        extend(tv, g, tid, seed, false);
        tv.clean_up(tid);
        n_seeded += 1;
    }
    log::info!(
        "seeded {} tigs from mutual best reads, {} live",
        n_seeded,
        tv.num_live_tigs()
    );
    tv.check_registry();
}

// follow best edges outward from `rid`'s `end3` end, placing each read
// after the one before it; stops at dead ends, spurs, and already placed
// reads (the latter closes circles, detected in a later pass)
fn extend(tv: &mut TigVector, g: &BestEdgeGraph, tid: u32, mut rid: u32, mut end3: bool) {
    loop {
        let e = match g.best_edge(rid, end3) {
            Some(e) => *e,
            None => return,
        };
        let t = e.b_id;
        if tv.is_placed(t) || g.is_spur(t) {
            return;
        }
        let (p_lo, p_hi, p_fwd) = {
            let (ptid, pidx) = tv.membership(rid).unwrap();
            let p = &tv.tig(ptid).unwrap().reads[pidx as usize];
            (p.lo(), p.hi(), p.is_forward())
        };
        let o = Overlap {
            a_id: rid,
            b_id: t,
            a_hang: e.a_hang,
            b_hang: e.b_hang,
            flipped: e.flipped,
            erate: e.erate,
        };
        // the swapped view has the new read on the A side
        let (lo, hi, fwd) = implied_position(&o.swapped(), p_lo, p_hi, p_fwd);
        let mut r = if fwd {
            TigRead::new(t, lo, hi)
        } else {
            TigRead::new(t, hi, lo)
        };
        r.parent = rid;
        r.a_hang = e.a_hang;
        r.b_hang = e.b_hang;
        tv.add_read(tid, r);

        end3 = !entry_end_is_3prime(end3, e.flipped);
        rid = t;
    }
}

// every valid read left behind by seeding becomes its own tig; contained
// reads are excluded, they get a real placement later
pub fn create_singletons(tv: &mut TigVector, catalog: &ReadCatalog, g: &BestEdgeGraph) {
    let mut n = 0_usize;
    for rid in catalog.valid_ids() {
        if tv.is_placed(rid) || g.is_contained(rid) {
            continue;
        }
        let tid = tv.new_tig();
        tv.add_read(tid, TigRead::new(rid, 0, catalog.length(rid) as i32));
        n += 1;
    }
    log::info!("created {} singleton tigs", n);
}

// after contained read insertion some reads may still have no home
pub fn sweep_unplaced(tv: &mut TigVector, catalog: &ReadCatalog) {
    let mut n = 0_usize;
    for rid in catalog.valid_ids() {
        if tv.is_placed(rid) {
            continue;
        }
        let tid = tv.new_tig();
        tv.add_read(tid, TigRead::new(rid, 0, catalog.length(rid) as i32));
        n += 1;
    }
    if n > 0 {
        log::info!("swept {} leftover reads into singleton tigs", n);
    }
}

// import read lists: one tig per line, tokens `<rid>+` or `<rid>-` split
// on spaces or commas; consecutive reads must carry a corroborating
// overlap in the index or the run aborts
pub fn load_read_lists<P>(
    path: P,
    catalog: &ReadCatalog,
    ovl: &OverlapIndex,
) -> io::Result<TigVector>
where
    P: AsRef<Path>,
{
    let mut tv = TigVector::new(catalog.max_id());
    let reader = BufReader::new(File::open(path)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let tokens: Vec<&str> = line
            .split(|c| c == ' ' || c == ',')
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            continue;
        }
        let tid = tv.new_tig();
        let mut prev: Option<u32> = None;
        for tok in tokens {
            let (rid, want_fwd) = parse_read_token(tok, lineno)?;
            if !catalog.is_valid(rid) {
                return Err(bad_list_line(lineno, &format!("unknown read {}", rid)));
            }
            match prev {
                None => {
                    let len = catalog.length(rid) as i32;
                    let r = if want_fwd {
                        TigRead::new(rid, 0, len)
                    } else {
                        TigRead::new(rid, len, 0)
                    };
                    tv.add_read(tid, r);
                }
                Some(p) => {
                    let o = ovl
                        .find(p, rid)
                        .copied()
                        .or_else(|| ovl.find(rid, p).map(|o| o.swapped()))
                        .ok_or_else(|| {
                            bad_list_line(lineno, &format!("no overlap between {} and {}", p, rid))
                        })?;
                    let (p_lo, p_hi, p_fwd) = {
                        let (ptid, pidx) = tv.membership(p).unwrap();
                        let r = &tv.tig(ptid).unwrap().reads[pidx as usize];
                        (r.lo(), r.hi(), r.is_forward())
                    };
                    let (lo, hi, fwd) = implied_position(&o.swapped(), p_lo, p_hi, p_fwd);
                    if fwd != want_fwd {
                        return Err(bad_list_line(
                            lineno,
                            &format!("orientation of read {} contradicts its overlap", rid),
                        ));
                    }
                    let mut r = if fwd {
                        TigRead::new(rid, lo, hi)
                    } else {
                        TigRead::new(rid, hi, lo)
                    };
                    r.parent = p;
                    r.a_hang = o.a_hang;
                    r.b_hang = o.b_hang;
                    tv.add_read(tid, r);
                }
            }
            prev = Some(rid);
        }
        tv.clean_up(tid);
    }
    tv.check_registry();
    Ok(tv)
}

fn parse_read_token(tok: &str, lineno: usize) -> io::Result<(u32, bool)> {
    let fwd = match tok.chars().last() {
        Some('+') => true,
        Some('-') => false,
        _ => return Err(bad_list_line(lineno, &format!("bad token {:?}", tok))),
    };
    let rid: u32 = tok[..tok.len() - 1]
        .parse()
        .map_err(|_| bad_list_line(lineno, &format!("bad token {:?}", tok)))?;
    Ok((rid, fwd))
}

fn bad_list_line(lineno: usize, what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("read list line {}: {}", lineno + 1, what),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::best_edges::BestEdgeGraph;
    use crate::utils::overlaps::tests::{ovl, test_catalog};
    use crate::utils::overlaps::OverlapIndex;
    use crate::utils::Parameters;
    use std::io::Write;

    fn params() -> Parameters {
        let mut p = Parameters::new(1);
        p.min_ovlp_len = 50;
        p
    }

    #[test]
    fn chain_forms_one_tig() {
        let cat = test_catalog(&[(1, 1000), (2, 1000), (3, 1000)]);
        let idx = OverlapIndex::build(
            vec![
                ovl(1, 2, 900, 900, false, 0.01),
                ovl(2, 1, -900, -900, false, 0.01),
                ovl(2, 3, 900, 900, false, 0.01),
                ovl(3, 2, -900, -900, false, 0.01),
            ],
            &cat,
            &params(),
        )
        .unwrap();
        let g = BestEdgeGraph::build(&cat, &idx, &params());
        let mut tv = TigVector::new(cat.max_id());
        populate_tigs(&mut tv, &cat, &g);

        assert_eq!(tv.num_live_tigs(), 1);
        let tid = tv.live_ids()[0];
        let tig = tv.tig(tid).unwrap();
        assert_eq!(tig.num_reads(), 3);
        assert_eq!(tig.length, 2800);
        let mut los: Vec<i32> = tig.reads.iter().map(|r| r.lo()).collect();
        los.sort_unstable();
        assert_eq!(los, vec![0, 900, 1800]);
        assert!(tig.reads.iter().all(|r| r.span() == 1000));
    }

    #[test]
    fn components_stay_separate_and_loners_become_singletons() {
        let cat = test_catalog(&[(1, 1000), (2, 1000), (3, 1000), (4, 1000), (5, 800)]);
        // two chains, 1-2 and 3-4; read 5 has no overlaps at all
        let idx = OverlapIndex::build(
            vec![
                ovl(1, 2, 900, 900, false, 0.01),
                ovl(2, 1, -900, -900, false, 0.01),
                ovl(3, 4, 900, 900, false, 0.01),
                ovl(4, 3, -900, -900, false, 0.01),
            ],
            &cat,
            &params(),
        )
        .unwrap();
        let g = BestEdgeGraph::build(&cat, &idx, &params());
        let mut tv = TigVector::new(cat.max_id());
        populate_tigs(&mut tv, &cat, &g);
        assert_eq!(tv.num_live_tigs(), 2);
        // both two-read components seed despite their terminal coverage
        // gaps; the overlap-free read does not
        for tid in tv.live_ids() {
            assert_eq!(tv.tig(tid).unwrap().num_reads(), 2);
        }
        assert!(!tv.is_placed(5));
        create_singletons(&mut tv, &cat, &g);
        assert_eq!(tv.num_live_tigs(), 3);
        assert!(tv.is_placed(5));
        let (tid, _) = tv.membership(5).unwrap();
        assert_eq!(tv.tig(tid).unwrap().num_reads(), 1);
        tv.check_registry();
    }

    #[test]
    fn contained_reads_are_not_singletons() {
        let cat = test_catalog(&[(1, 2000), (2, 1000)]);
        let idx = OverlapIndex::build(
            vec![
                ovl(1, 2, 500, -500, false, 0.01),
                ovl(2, 1, -500, 500, false, 0.01),
            ],
            &cat,
            &params(),
        )
        .unwrap();
        let g = BestEdgeGraph::build(&cat, &idx, &params());
        let mut tv = TigVector::new(cat.max_id());
        populate_tigs(&mut tv, &cat, &g);
        create_singletons(&mut tv, &cat, &g);
        assert!(tv.is_placed(1));
        assert!(!tv.is_placed(2));
        sweep_unplaced(&mut tv, &cat);
        assert!(tv.is_placed(2));
    }

    #[test]
    fn read_list_import() {
        let path = std::env::temp_dir().join("tg_read_list_import_test.txt");
        {
            let mut f = File::create(&path).unwrap();
            writeln!(f, "1+ 2+").unwrap();
            writeln!(f, "7+").unwrap();
        }
        let cat = test_catalog(&[(1, 1000), (2, 1000), (7, 500)]);
        let idx = OverlapIndex::build(
            vec![ovl(1, 2, 900, 900, false, 0.01)],
            &cat,
            &params(),
        )
        .unwrap();
        let tv = load_read_lists(&path, &cat, &idx).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(tv.num_live_tigs(), 2);
        let (tid, i) = tv.membership(2).unwrap();
        assert_eq!(i, 1);
        let r = &tv.tig(tid).unwrap().reads[1];
        assert_eq!((r.bgn, r.end), (900, 1900));
        assert_eq!(r.parent, 1);
        assert_eq!(tv.tig(tid).unwrap().length, 1900);
        assert!(tv.membership(7).is_some());
    }

    #[test]
    fn read_list_without_overlap_aborts() {
        let path = std::env::temp_dir().join("tg_read_list_abort_test.txt");
        {
            let mut f = File::create(&path).unwrap();
            writeln!(f, "1+ 2-").unwrap();
        }
        let cat = test_catalog(&[(1, 1000), (2, 1000)]);
        let idx = OverlapIndex::build(Vec::new(), &cat, &params()).unwrap();
        let r = load_read_lists(&path, &cat, &idx);
        std::fs::remove_file(&path).unwrap();
        assert!(r.is_err());
    }
}
