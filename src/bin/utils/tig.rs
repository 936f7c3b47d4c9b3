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
// tig data model and the tig arena
//
// the arena owns every tig; the read -> (tig, index) registry is the single
// source of truth for membership and every mutation goes through it; a tig
// with zero reads becomes a deleted slot and ids are never reused
//

#[derive(Debug, Copy, Clone)]
pub struct TigRead {
    pub rid: u32,
    // signed interval in tig coordinates; bgn < end means forward
    pub bgn: i32,
    pub end: i32,
    // placement provenance, reporting only
    pub parent: u32,
    pub a_hang: i32,
    pub b_hang: i32,
}

impl TigRead {
    pub fn new(rid: u32, bgn: i32, end: i32) -> Self {
        TigRead {
            rid,
            bgn,
            end,
            parent: 0,
            a_hang: 0,
            b_hang: 0,
        }
    }

    pub fn is_forward(&self) -> bool {
        self.bgn < self.end
    }

    pub fn lo(&self) -> i32 {
        self.bgn.min(self.end)
    }

    pub fn hi(&self) -> i32 {
        self.bgn.max(self.end)
    }

    pub fn span(&self) -> i32 {
        self.hi() - self.lo()
    }
}

#[derive(Debug, Clone)]
pub struct Tig {
    pub id: u32,
    pub reads: Vec<TigRead>,
    pub length: i32,
    pub unassembled: bool,
    pub repeat: bool,
    pub bubble: bool,
    pub spur: bool,
    pub circular: bool,
    pub circular_length: i32,
    // contig id this tig was cut from, 0 when seeded directly
    pub source_contig: u32,
}

impl Tig {
    fn new(id: u32) -> Self {
        Tig {
            id,
            reads: Vec::new(),
            length: 0,
            unassembled: false,
            repeat: false,
            bubble: false,
            spur: false,
            circular: false,
            circular_length: 0,
            source_contig: 0,
        }
    }

    pub fn num_reads(&self) -> usize {
        self.reads.len()
    }

    pub fn first_read(&self) -> &TigRead {
        &self.reads[0]
    }

    pub fn last_read(&self) -> &TigRead {
        &self.reads[self.reads.len() - 1]
    }

    pub fn compute_length(&self) -> i32 {
        self.reads.iter().map(|r| r.hi()).max().unwrap_or(0)
    }

    pub fn contains_read(&self, rid: u32) -> bool {
        self.reads.iter().any(|r| r.rid == rid)
    }
}

pub struct TigVector {
    tigs: Vec<Option<Tig>>,
    // rid -> (tig id, index in tig); tig id 0 means unplaced
    read_to_tig: Vec<(u32, u32)>,
}

impl TigVector {
    pub fn new(max_read_id: u32) -> Self {
        TigVector {
            tigs: vec![None], // slot 0 stays empty, tig ids start at 1
            read_to_tig: vec![(0, 0); max_read_id as usize + 1],
        }
    }

    pub fn new_tig(&mut self) -> u32 {
        let id = self.tigs.len() as u32;
        self.tigs.push(Some(Tig::new(id)));
        id
    }

    pub fn num_slots(&self) -> usize {
        self.tigs.len()
    }

    pub fn tig(&self, tid: u32) -> Option<&Tig> {
        self.tigs.get(tid as usize).and_then(|t| t.as_ref())
    }

    pub fn tig_mut(&mut self, tid: u32) -> Option<&mut Tig> {
        self.tigs.get_mut(tid as usize).and_then(|t| t.as_mut())
    }

    pub fn live_ids(&self) -> Vec<u32> {
        (1..self.tigs.len() as u32)
            .filter(|&t| self.tigs[t as usize].is_some())
            .collect()
    }

    // (tig id, index) of a placed read
    pub fn membership(&self, rid: u32) -> Option<(u32, u32)> {
        match self.read_to_tig[rid as usize] {
            (0, _) => None,
            m => Some(m),
        }
    }

    pub fn is_placed(&self, rid: u32) -> bool {
        self.membership(rid).is_some()
    }

    pub fn add_read(&mut self, tid: u32, read: TigRead) {
        assert!(
            self.membership(read.rid).is_none(),
            "read {} already placed in tig {}",
            read.rid,
            self.read_to_tig[read.rid as usize].0
        );
        let tig = self.tigs[tid as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("tig {} is deleted", tid));
        let idx = tig.reads.len() as u32;
        tig.reads.push(read);
        if read.hi() > tig.length {
            tig.length = read.hi();
        }
        self.read_to_tig[read.rid as usize] = (tid, idx);
    }

    // remove a read from its tig and return it to the unplaced pool;
    // a tig left with zero reads is deleted in place
    pub fn eject_read(&mut self, rid: u32) -> TigRead {
        let (tid, idx) = self
            .membership(rid)
            .unwrap_or_else(|| panic!("read {} is not placed", rid));
        let tig = self.tigs[tid as usize].as_mut().unwrap();
        let read = tig.reads.remove(idx as usize);
        assert!(read.rid == rid, "registry desync on read {}", rid);
        self.read_to_tig[rid as usize] = (0, 0);
        for i in idx as usize..tig.reads.len() {
            self.read_to_tig[tig.reads[i].rid as usize] = (tid, i as u32);
        }
        if tig.reads.is_empty() {
            self.tigs[tid as usize] = None;
        } else {
            let t = self.tigs[tid as usize].as_mut().unwrap();
            t.length = t.compute_length();
        }
        read
    }

    pub fn delete_tig(&mut self, tid: u32) -> Vec<TigRead> {
        let tig = self.tigs[tid as usize]
            .take()
            .unwrap_or_else(|| panic!("tig {} is already deleted", tid));
        for r in tig.reads.iter() {
            self.read_to_tig[r.rid as usize] = (0, 0);
        }
        tig.reads
    }

    fn resync(&mut self, tid: u32) {
        let reads: Vec<(u32, u32)> = self.tigs[tid as usize]
            .as_ref()
            .unwrap()
            .reads
            .iter()
            .enumerate()
            .map(|(i, r)| (r.rid, i as u32))
            .collect();
        for (rid, i) in reads {
            self.read_to_tig[rid as usize] = (tid, i);
        }
    }

    // order reads by position, stable on the input order
    pub fn sort_tig(&mut self, tid: u32) {
        let tig = self.tigs[tid as usize].as_mut().unwrap();
        tig.reads.sort_by_key(|r| (r.lo(), r.hi()));
        self.resync(tid);
    }

    // flip every interval about the tig length; during greedy construction
    // the walk order must be preserved, so the sequence is reversed in
    // place rather than re-sorted
    pub fn reverse_complement(&mut self, tid: u32, resort: bool) {
        let tig = self.tigs[tid as usize].as_mut().unwrap();
        let len = tig.length;
        for r in tig.reads.iter_mut() {
            let b = len - r.bgn;
            let e = len - r.end;
            r.bgn = b;
            r.end = e;
        }
        if resort {
            tig.reads.sort_by_key(|r| (r.lo(), r.hi()));
        } else {
            tig.reads.reverse();
        }
        self.resync(tid);
    }

    // re-zero the minimum coordinate and recompute the tig length
    pub fn clean_up(&mut self, tid: u32) {
        let tig = self.tigs[tid as usize].as_mut().unwrap();
        let min = tig.reads.iter().map(|r| r.lo()).min().unwrap_or(0);
        if min != 0 {
            for r in tig.reads.iter_mut() {
                r.bgn -= min;
                r.end -= min;
            }
        }
        tig.length = tig.compute_length();
    }

    // every valid read in exactly one tig, registry and tig contents agree
    pub fn check_registry(&self) {
        for (rid, &(tid, idx)) in self.read_to_tig.iter().enumerate() {
            if tid == 0 {
                continue;
            }
            let tig = self.tigs[tid as usize]
                .as_ref()
                .unwrap_or_else(|| panic!("read {} registered to deleted tig {}", rid, tid));
            assert!(
                (idx as usize) < tig.reads.len() && tig.reads[idx as usize].rid == rid as u32,
                "registry desync: read {} -> tig {} index {}",
                rid,
                tid,
                idx
            );
        }
        for t in self.tigs.iter().flatten() {
            for (i, r) in t.reads.iter().enumerate() {
                assert!(
                    self.read_to_tig[r.rid as usize] == (t.id, i as u32),
                    "tig {} read {} missing from registry",
                    t.id,
                    r.rid
                );
            }
        }
    }

    pub fn num_live_tigs(&self) -> usize {
        self.tigs.iter().flatten().count()
    }
}
