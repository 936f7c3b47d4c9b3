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
// cut a tig at a set of coordinates
//
// each breakpoint is a wall no read may cross; reads between consecutive
// walls form a block and become a new tig, reads straddling a wall are
// ejected back to the unplaced pool
//

use super::tig::TigVector;

#[derive(Debug, Default)]
pub struct SplitOutcome {
    pub new_tigs: Vec<u32>,
    pub ejected: Vec<u32>,
}

pub fn split_tig(
    tv: &mut TigVector,
    tid: u32,
    coords: &[i32],
    repeat_regions: &[(i32, i32)],
) -> SplitOutcome {
    let length = tv.tig(tid).unwrap().length;
    let mut walls: Vec<i32> = coords
        .iter()
        .cloned()
        .filter(|&c| c > 0 && c < length)
        .collect();
    walls.sort_unstable();
    walls.dedup();
    if walls.is_empty() {
        return SplitOutcome::default();
    }

    let (bubble, source) = {
        let t = tv.tig(tid).unwrap();
        (t.bubble, if t.source_contig != 0 { t.source_contig } else { t.id })
    };

    walls.insert(0, 0);
    walls.push(length);

    let nblocks = walls.len() - 1;
    let mut blocks = vec![Vec::new(); nblocks];
    let mut ejected = Vec::<u32>::new();

    for r in tv.delete_tig(tid) {
        // a wall strictly inside the read means the read cannot live in
        // any block
        if walls.iter().any(|&w| r.lo() < w && w < r.hi()) {
            ejected.push(r.rid);
            continue;
        }
        let i = walls.partition_point(|&w| w <= r.lo()).saturating_sub(1);
        let i = i.min(nblocks - 1);
        blocks[i].push(r);
    }

    let mut new_tigs = Vec::<u32>::new();
    for (i, block) in blocks.into_iter().enumerate() {
        if block.is_empty() {
            continue;
        }
        let ntid = tv.new_tig();
        for r in block {
            tv.add_read(ntid, r);
        }
        tv.sort_tig(ntid);
        tv.clean_up(ntid);
        let span = (walls[i], walls[i + 1]);
        let t = tv.tig_mut(ntid).unwrap();
        t.bubble = bubble;
        t.source_contig = source;
        t.repeat = mostly_repeat(span, repeat_regions);
        new_tigs.push(ntid);
    }

    log::debug!(
        "split tig {} at {} walls into {} blocks, {} reads ejected",
        tid,
        walls.len() - 2,
        new_tigs.len(),
        ejected.len()
    );
    SplitOutcome { new_tigs, ejected }
}

// a block inherits the repeat flag when over half its span lies inside
// annotated repeat regions
pub fn mostly_repeat(span: (i32, i32), regions: &[(i32, i32)]) -> bool {
    let (lo, hi) = span;
    if hi <= lo {
        return false;
    }
    let mut covered = 0_i64;
    for &(b, e) in regions {
        let x = b.max(lo);
        let y = e.min(hi);
        if x < y {
            covered += (y - x) as i64;
        }
    }
    covered * 2 > (hi - lo) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::tig::TigRead;

    // five reads, the middle one crossing the cut at 2000
    fn scene() -> (TigVector, u32) {
        let mut tv = TigVector::new(10);
        let t = tv.new_tig();
        tv.add_read(t, TigRead::new(1, 0, 1000));
        tv.add_read(t, TigRead::new(2, 900, 1900));
        tv.add_read(t, TigRead::new(3, 1500, 2500));
        tv.add_read(t, TigRead::new(4, 2100, 3100));
        tv.add_read(t, TigRead::new(5, 3000, 4000));
        (tv, t)
    }

    #[test]
    fn straddling_read_is_ejected() {
        let (mut tv, t) = scene();
        let out = split_tig(&mut tv, t, &[2000], &[]);
        assert_eq!(out.new_tigs.len(), 2);
        assert_eq!(out.ejected, vec![3]);
        assert!(tv.tig(t).is_none());
        assert!(!tv.is_placed(3));

        let left = tv.tig(out.new_tigs[0]).unwrap();
        let right = tv.tig(out.new_tigs[1]).unwrap();
        assert_eq!(left.num_reads(), 2);
        assert_eq!(right.num_reads(), 2);
        // both blocks re-zeroed
        assert_eq!(left.reads[0].lo(), 0);
        assert_eq!(right.reads[0].lo(), 0);
        assert_eq!(right.reads[0].rid, 4);
        assert_eq!(left.source_contig, t);
        tv.check_registry();
    }

    #[test]
    fn no_walls_is_a_noop() {
        let (mut tv, t) = scene();
        let out = split_tig(&mut tv, t, &[0, 4000], &[]);
        assert!(out.new_tigs.is_empty());
        assert!(tv.tig(t).is_some());
    }

    #[test]
    fn repeat_flag_follows_majority() {
        let (mut tv, t) = scene();
        let out = split_tig(&mut tv, t, &[2000], &[(1800, 4000)]);
        assert_eq!(out.new_tigs.len(), 2);
        assert!(!tv.tig(out.new_tigs[0]).unwrap().repeat);
        assert!(tv.tig(out.new_tigs[1]).unwrap().repeat);
    }
}
