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
// overlap record and the per-read overlap index
//
// the index keeps, for each read, the outgoing overlaps where that read is
// the A side, sorted by partner id; a symmetric counterpart may or may not
// be present in the source relation and is never assumed
//

use glob::glob;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::mpsc::channel;
use threadpool::ThreadPool;

use super::reads::ReadCatalog;
use super::Parameters;

#[derive(Debug, Copy, Clone)]
pub struct Overlap {
    pub a_id: u32,
    pub b_id: u32,
    pub a_hang: i32,
    pub b_hang: i32,
    pub flipped: bool,
    pub erate: f32,
}

impl Overlap {
    pub fn build_from(v: &[&str]) -> Self {
        Overlap {
            a_id: v[1].parse().unwrap(),
            b_id: v[2].parse().unwrap(),
            a_hang: v[3].parse().unwrap(),
            b_hang: v[4].parse().unwrap(),
            flipped: v[5] == "1",
            erate: v[6].parse().unwrap(),
        }
    }

    pub fn format(&self) -> String {
        format!(
            "O {} {} {} {} {} {:.4}",
            self.a_id,
            self.b_id,
            self.a_hang,
            self.b_hang,
            if self.flipped { 1 } else { 0 },
            self.erate
        )
    }

    // containment iff the hangs bracket the shorter read
    pub fn b_is_contained(&self) -> bool {
        self.a_hang >= 0 && self.b_hang <= 0
    }

    pub fn a_is_contained(&self) -> bool {
        self.a_hang <= 0 && self.b_hang >= 0
    }

    pub fn is_containment(&self) -> bool {
        self.a_is_contained() || self.b_is_contained()
    }

    pub fn is_dovetail(&self) -> bool {
        !self.is_containment()
    }

    // which end of A the overlap continues off
    pub fn a_end_is_5prime(&self) -> bool {
        self.a_hang < 0 && self.b_hang < 0
    }

    pub fn a_end_is_3prime(&self) -> bool {
        self.a_hang > 0 && self.b_hang > 0
    }

    // aligned span on the A read
    pub fn span_on_a(&self, a_len: u32) -> i32 {
        a_len as i32 - self.a_hang.max(0) + self.b_hang.min(0)
    }

    pub fn score(&self, a_len: u32) -> f64 {
        self.span_on_a(a_len).max(0) as f64 * (1.0 - self.erate as f64)
    }

    // the B-side view of the same overlap
    pub fn swapped(&self) -> Overlap {
        let (a_hang, b_hang) = if self.flipped {
            (self.b_hang, self.a_hang)
        } else {
            (-self.a_hang, -self.b_hang)
        };
        Overlap {
            a_id: self.b_id,
            b_id: self.a_id,
            a_hang,
            b_hang,
            flipped: self.flipped,
            erate: self.erate,
        }
    }
}

#[derive(Debug)]
pub struct OverlapIndex {
    store: Vec<Overlap>,
    ranges: Vec<(u32, u32)>, // per read id, (begin, end) into store
}

fn parse_ovlp_chunk<P>(filename: P) -> Vec<Overlap>
where
    P: AsRef<Path>,
{
    let mut ovlps = Vec::<Overlap>::new();
    let mut buffer = String::new();

    let file = File::open(filename);
    let _err: Result<usize, io::Error> = file.unwrap().read_to_string(&mut buffer);
    for line in buffer.split('\n') {
        let v: Vec<&str> = line.split(' ').collect();
        if v.is_empty() {
            continue;
        }
        match v[0] {
            "O" => {
                ovlps.push(Overlap::build_from(&v));
            }
            _ => (),
        }
    }
    ovlps
}

impl OverlapIndex {
    // load `<prefix>*` chunk files, filter by error rate / length, and
    // bucket per A read; fails hard when the memory budget is exceeded
    pub fn load(
        prefix: &String,
        catalog: &ReadCatalog,
        parameters: &Parameters,
    ) -> Result<OverlapIndex, io::Error> {
        let infile_pattern = [prefix.clone(), "*".to_string()].concat();

        let pool = ThreadPool::new(parameters.nthreads as usize);
        let (tx, rx) = channel();
        let mut nchunks = 0_usize;
        for entry in glob(&infile_pattern).expect("failed to read glob pattern") {
            match entry {
                Ok(path) => {
                    let tx = tx.clone();
                    pool.execute(move || {
                        tx.send(parse_ovlp_chunk(path)).expect("channel closed");
                    });
                    nchunks += 1;
                }
                Err(e) => log::warn!("overlap chunk error: {:?}", e),
            }
        }
        drop(tx);

        let mut raw = Vec::<Overlap>::new();
        for _ in 0..nchunks {
            let chunk = rx.recv().expect("overlap loader thread panicked");
            raw.extend(chunk);
        }
        pool.join();
        log::info!("loaded {} overlaps from {} chunks", raw.len(), nchunks);

        OverlapIndex::build(raw, catalog, parameters)
    }

    pub fn build(
        raw: Vec<Overlap>,
        catalog: &ReadCatalog,
        parameters: &Parameters,
    ) -> Result<OverlapIndex, io::Error> {
        let mut counts = vec![0_u32; catalog.max_id() as usize + 1];
        let mut kept = 0_u64;
        let keep = |o: &Overlap| -> bool {
            if !catalog.is_valid(o.a_id) || !catalog.is_valid(o.b_id) {
                return false;
            }
            if o.erate as f64 > parameters.max_load_erate {
                return false;
            }
            o.span_on_a(catalog.length(o.a_id)) >= parameters.min_ovlp_len as i32
        };
        for o in raw.iter() {
            if keep(o) {
                counts[o.a_id as usize] += 1;
                kept += 1;
            }
        }

        let need_mb = kept * std::mem::size_of::<Overlap>() as u64 / 1024 / 1024;
        if need_mb > parameters.ovlp_mem_budget_mb {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!(
                    "overlap memory budget exceeded: need {} MB, budget {} MB",
                    need_mb, parameters.ovlp_mem_budget_mb
                ),
            ));
        }

        let mut ranges = Vec::<(u32, u32)>::with_capacity(counts.len());
        let mut bgn = 0_u32;
        for c in counts.iter() {
            ranges.push((bgn, bgn));
            bgn += c;
        }

        let mut store = vec![
            Overlap {
                a_id: 0,
                b_id: 0,
                a_hang: 0,
                b_hang: 0,
                flipped: false,
                erate: 0.0
            };
            kept as usize
        ];
        for o in raw.into_iter() {
            if !keep(&o) {
                continue;
            }
            let r = &mut ranges[o.a_id as usize];
            store[r.1 as usize] = o;
            r.1 += 1;
        }

        // partner-id order gives exact-match lookup by binary search
        for &(b, e) in ranges.iter() {
            store[b as usize..e as usize].sort_by_key(|o| o.b_id);
        }

        log::info!(
            "overlap index: {} overlaps kept ({} MB)",
            kept,
            need_mb.max(1)
        );
        Ok(OverlapIndex { store, ranges })
    }

    pub fn overlaps_of(&self, rid: u32) -> &[Overlap] {
        if (rid as usize) >= self.ranges.len() {
            return &[];
        }
        let (b, e) = self.ranges[rid as usize];
        &self.store[b as usize..e as usize]
    }

    // the stored overlap between a and b, if the relation carries one on
    // the a side
    pub fn find(&self, a_id: u32, b_id: u32) -> Option<&Overlap> {
        let s = self.overlaps_of(a_id);
        let i = s.partition_point(|o| o.b_id < b_id);
        if i < s.len() && s[i].b_id == b_id {
            Some(&s[i])
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn test_catalog(lengths: &[(u32, u32)]) -> ReadCatalog {
        let max_id = lengths.iter().map(|&(r, _)| r).max().unwrap_or(0);
        let mut cat = ReadCatalog::new(max_id);
        for &(rid, len) in lengths {
            cat.set(rid, 0, len);
        }
        cat
    }

    pub fn ovl(a: u32, b: u32, ah: i32, bh: i32, flipped: bool, erate: f32) -> Overlap {
        Overlap {
            a_id: a,
            b_id: b,
            a_hang: ah,
            b_hang: bh,
            flipped,
            erate,
        }
    }

    #[test]
    fn hang_predicates() {
        let dove3 = ovl(1, 2, 900, 900, false, 0.01);
        assert!(dove3.is_dovetail());
        assert!(dove3.a_end_is_3prime());
        assert!(!dove3.a_end_is_5prime());
        assert_eq!(dove3.span_on_a(1000), 100);

        let dove5 = ovl(1, 2, -900, -900, false, 0.01);
        assert!(dove5.a_end_is_5prime());

        let cont = ovl(1, 2, 100, -100, false, 0.01);
        assert!(cont.is_containment());
        assert!(cont.b_is_contained());
        assert!(!cont.a_is_contained());
        assert_eq!(cont.span_on_a(1000), 800);
    }

    #[test]
    fn swapped_views() {
        let o = ovl(1, 2, 900, 900, false, 0.01);
        let s = o.swapped();
        assert_eq!(s.a_id, 2);
        assert_eq!(s.b_id, 1);
        assert_eq!(s.a_hang, -900);
        assert_eq!(s.b_hang, -900);
        assert!(s.a_end_is_5prime());

        let of = ovl(1, 2, 900, 900, true, 0.01);
        let sf = of.swapped();
        // flipped overlaps keep the same end geometry on both sides
        assert_eq!(sf.a_hang, 900);
        assert_eq!(sf.b_hang, 900);
    }

    #[test]
    fn index_build_filter_and_lookup() {
        let cat = test_catalog(&[(1, 1000), (2, 1000), (3, 1000), (4, 1000)]);
        let raw = vec![
            ovl(1, 3, 900, 900, false, 0.01),
            ovl(1, 2, 900, 900, false, 0.01),
            ovl(1, 4, 990, 990, false, 0.01), // span 10 < min length, dropped
            ovl(2, 3, 900, 900, false, 0.50), // error rate over limit, dropped
            ovl(3, 1, -900, -900, false, 0.01),
        ];
        let mut p = Parameters::new(1);
        p.min_ovlp_len = 50;
        let idx = OverlapIndex::build(raw, &cat, &p).unwrap();
        assert_eq!(idx.len(), 3);
        let o1 = idx.overlaps_of(1);
        assert_eq!(o1.len(), 2);
        assert_eq!(o1[0].b_id, 2); // sorted by partner id
        assert_eq!(o1[1].b_id, 3);
        assert!(idx.find(1, 3).is_some());
        assert!(idx.find(1, 4).is_none());
        assert!(idx.find(3, 1).is_some());
        assert!(idx.find(2, 3).is_none());
        assert!(idx.overlaps_of(4).is_empty());
    }

    #[test]
    fn memory_budget_is_enforced() {
        let cat = test_catalog(&[(1, 1000), (2, 1000)]);
        let mut p = Parameters::new(1);
        p.min_ovlp_len = 50;
        p.ovlp_mem_budget_mb = 0;
        // one overlap rounds down to 0 MB, still within a zero budget
        let one = vec![ovl(1, 2, 900, 900, false, 0.01)];
        assert!(OverlapIndex::build(one, &cat, &p).is_ok());
        // enough overlaps to cross a megabyte fail hard
        let raw: Vec<Overlap> = (0..100_000)
            .map(|_| ovl(1, 2, 900, 900, false, 0.01))
            .collect();
        let err = OverlapIndex::build(raw, &cat, &p).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::OutOfMemory);
    }
}
