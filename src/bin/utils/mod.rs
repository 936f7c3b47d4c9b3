// TigAsm Overlap-Graph Layout Toolkit
// 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

pub mod asm_graph;
pub mod best_edges;
pub mod checks;
pub mod contained;
pub mod create_unitigs;
pub mod error_profile;
pub mod optimize;
pub mod output;
pub mod overlaps;
pub mod placement;
pub mod populate;
pub mod reads;
pub mod repeats;
pub mod split;
pub mod tig;

pub use core::mem::MaybeUninit;
pub use libc::{getrusage, rusage, RUSAGE_SELF, RUSAGE_THREAD};

#[derive(Copy, Clone)]
pub struct Parameters {
    pub nthreads: u32,

    // overlap load filters
    pub max_load_erate: f64,
    pub min_ovlp_len: u32,
    pub ovlp_mem_budget_mb: u64,

    // deviation multipliers for the error profile consistency test
    pub deviation_graph: f64,
    pub deviation_tig: f64,
    pub deviation_repeat: f64,

    // empirically tuned tolerances, kept as configuration
    pub place_slop_frac: f64,
    pub place_slop_min: i32,
    pub confused_absolute: f64,
    pub confused_percent: f64,
    pub anchor_margin: i32,
    pub repeat_collapse_dist: i32,
    pub contained_cov_floor: f64,
    pub graph_cov_floor: f64,
    pub position_tolerance: f64,
    pub optimize_rounds: u32,
    pub spur_depth: u32,

    // output classification
    pub min_reads_assembled: usize,
    pub min_tig_length: i32,
}

impl Parameters {
    pub fn new(nthreads: u32) -> Self {
        Parameters {
            nthreads,
            max_load_erate: 0.12,
            min_ovlp_len: 500,
            ovlp_mem_budget_mb: 16 * 1024,
            deviation_graph: 6.0,
            deviation_tig: 6.0,
            deviation_repeat: 3.0,
            place_slop_frac: 0.05,
            place_slop_min: 50,
            confused_absolute: 500.0,
            confused_percent: 0.20,
            anchor_margin: 500,
            repeat_collapse_dist: 500,
            contained_cov_floor: 0.99,
            graph_cov_floor: 0.50,
            position_tolerance: 0.002,
            optimize_rounds: 5,
            spur_depth: 4,
            min_reads_assembled: 2,
            min_tig_length: 1000,
        }
    }
}

#[allow(dead_code)]
pub fn log_resource(msg: &str, data: &mut rusage) -> (u64, u64, u64) {
    let _res = unsafe { getrusage(RUSAGE_SELF, data) };
    log::info!(
        "{} : (maxRSS, utime, stime): {} {} {}",
        msg,
        data.ru_maxrss,
        data.ru_utime.tv_sec,
        data.ru_stime.tv_sec
    );

    (
        data.ru_maxrss as u64,
        data.ru_utime.tv_sec as u64,
        data.ru_stime.tv_sec as u64,
    )
}
