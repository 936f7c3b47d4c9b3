// TigAsm Overlap-Graph Layout Toolkit
// 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

const VERSION_STRING: &'static str = env!("CARGO_PKG_VERSION");

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::clap_app;
use std::fs::File;
use std::io::{BufWriter, Result};
use std::time::SystemTime;
use sysinfo::SystemExt;

mod utils;
use simple_logger::SimpleLogger;
use utils::asm_graph::AssemblyGraph;
use utils::best_edges::BestEdgeGraph;
use utils::checks;
use utils::contained;
use utils::create_unitigs::create_unitigs;
use utils::optimize::optimize_positions;
use utils::output;
use utils::overlaps::OverlapIndex;
use utils::populate;
use utils::reads::ReadCatalog;
use utils::repeats::split_repeat_tigs;
use utils::tig::TigVector;
use utils::Parameters;
use utils::{getrusage, log_resource, rusage, MaybeUninit, RUSAGE_SELF};

fn main() -> Result<()> {
    let mut rdata: MaybeUninit<libc::rusage> = unsafe { MaybeUninit::uninit().assume_init() };
    let _res = unsafe { getrusage(RUSAGE_SELF, &mut rdata.assume_init_read()) };

    let matches = clap_app!(tg_asm =>
        (version: VERSION_STRING)
        (author: "Jason Chin <cschin@omnibio.ai>")
        (about: "
TigAsm overlap-graph layout toolkit
tg_asm: build tig layouts from a read index and an overlap store
LICENSE: http://creativecommons.org/licenses/by-nc-sa/4.0/")
        (@arg READIDX: +required "Path to the read index file")
        (@arg OVLPREFIX: +required "The prefix of the overlap chunk files")
        (@arg OUTPREFIX: +required "The prefix of the output files")
        (@arg NTHREADS: +takes_value "Number of threads")
        (@arg max_erate: --max_erate +takes_value "Maximum overlap error rate loaded [default: 0.12]")
        (@arg min_ovlp: --min_ovlp +takes_value "Minimum overlap length loaded [default: 500]")
        (@arg mem_mb: --mem_mb +takes_value "Overlap store memory budget in MB [default: 16384]")
        (@arg min_tig: --min_tig +takes_value "Minimum assembled tig length [default: 1000]")
        (@arg log: --log +takes_value "log level: DEBUG or INFO (default)")
    )
    .get_matches();

    let log_level = match matches.value_of("log").unwrap_or("INFO") {
        "DEBUG" => log::LevelFilter::Debug,
        _ => log::LevelFilter::Info,
    };

    SimpleLogger::new()
        .with_level(log_level)
        .with_utc_timestamps()
        .init()
        .unwrap();

    let read_idx = matches.value_of("READIDX").unwrap().to_string();
    let ovl_prefix = matches.value_of("OVLPREFIX").unwrap().to_string();
    let out_prefix = matches.value_of("OUTPREFIX").unwrap().to_string();

    let physical_cpus = num_cpus::get_physical();
    let nthreads = matches
        .value_of("NTHREADS")
        .unwrap_or(&physical_cpus.to_string())
        .parse::<u32>()
        .unwrap();

    let mut parameters = Parameters::new(nthreads);
    parameters.max_load_erate = matches
        .value_of("max_erate")
        .unwrap_or("0.12")
        .parse::<f64>()
        .unwrap();
    parameters.min_ovlp_len = matches
        .value_of("min_ovlp")
        .unwrap_or("500")
        .parse::<u32>()
        .unwrap();
    parameters.ovlp_mem_budget_mb = matches
        .value_of("mem_mb")
        .unwrap_or("16384")
        .parse::<u64>()
        .unwrap();
    parameters.min_tig_length = matches
        .value_of("min_tig")
        .unwrap_or("1000")
        .parse::<i32>()
        .unwrap();

    rayon::ThreadPoolBuilder::new()
        .num_threads(nthreads as usize)
        .build_global()
        .unwrap();

    log::info!("tg_asm {}", VERSION_STRING);
    log::info!(
        "command: {}",
        std::env::args().collect::<Vec<String>>().join(" ")
    );
    log::info!("read index: {}", read_idx);
    log::info!("overlap prefix: {}", ovl_prefix);
    log::info!("output prefix: {}", out_prefix);
    log::info!("number of threads: {}", nthreads);
    log::info!(
        "sys: number of physical CPU cores detected: {}",
        physical_cpus
    );
    let system = sysinfo::System::new_all();
    log::info!("sys: total memory: {} KB", system.total_memory());
    log::info!("sys: used memory: {} KB", system.used_memory());

    let start_wall_clock_time = SystemTime::now();

    unsafe {
        log_resource("BGN: tg_asm", &mut rdata.assume_init_mut());
    }

    unsafe {
        log_resource("BGN: loading read index", &mut rdata.assume_init_mut());
    }
    let catalog = ReadCatalog::load(&read_idx)?;
    unsafe {
        log_resource("END: loading read index", &mut rdata.assume_init_mut());
    }

    unsafe {
        log_resource("BGN: loading overlaps", &mut rdata.assume_init_mut());
    }
    let ovl = OverlapIndex::load(&ovl_prefix, &catalog, &parameters)?;
    unsafe {
        log_resource("END: loading overlaps", &mut rdata.assume_init_mut());
    }

    unsafe {
        log_resource("BGN: best edge graph", &mut rdata.assume_init_mut());
    }
    let mut g = BestEdgeGraph::build(&catalog, &ovl, &parameters);
    g.log_census(&catalog);
    unsafe {
        log_resource("END: best edge graph", &mut rdata.assume_init_mut());
    }

    unsafe {
        log_resource("BGN: greedy tig construction", &mut rdata.assume_init_mut());
    }
    let mut tv = TigVector::new(catalog.max_id());
    populate::populate_tigs(&mut tv, &catalog, &g);
    populate::create_singletons(&mut tv, &catalog, &g);
    optimize_positions(&mut tv, &catalog, &ovl, &parameters);
    unsafe {
        log_resource("END: greedy tig construction", &mut rdata.assume_init_mut());
    }

    unsafe {
        log_resource("BGN: contained read placement", &mut rdata.assume_init_mut());
    }
    contained::place_contained_reads(&mut tv, &catalog, &ovl, &g, &parameters);
    populate::sweep_unplaced(&mut tv, &catalog);
    optimize_positions(&mut tv, &catalog, &ovl, &parameters);
    unsafe {
        log_resource("END: contained read placement", &mut rdata.assume_init_mut());
    }

    unsafe {
        log_resource("BGN: boundary checks", &mut rdata.assume_init_mut());
    }
    checks::drop_dead_ends(&mut tv, &ovl);
    checks::detect_circular(&mut tv, &catalog, &ovl);
    {
        let profiles = contained::build_error_profiles(&tv, &ovl);
        let ag = AssemblyGraph::build(&tv, &catalog, &ovl, &g, &profiles, &parameters);
        checks::mark_bubbles(&mut tv, &mut g, &ag);
    }
    unsafe {
        log_resource("END: boundary checks", &mut rdata.assume_init_mut());
    }

    unsafe {
        log_resource("BGN: repeat detection", &mut rdata.assume_init_mut());
    }
    let nsplit = split_repeat_tigs(&mut tv, &catalog, &ovl, &g, &parameters);
    if nsplit > 0 {
        populate::sweep_unplaced(&mut tv, &catalog);
        optimize_positions(&mut tv, &catalog, &ovl, &parameters);
    }
    unsafe {
        log_resource("END: repeat detection", &mut rdata.assume_init_mut());
    }

    unsafe {
        log_resource("BGN: unitig creation", &mut rdata.assume_init_mut());
    }
    let ncut = create_unitigs(&mut tv, &catalog, &ovl, &g, &parameters);
    if ncut > 0 {
        populate::sweep_unplaced(&mut tv, &catalog);
        optimize_positions(&mut tv, &catalog, &ovl, &parameters);
    }
    unsafe {
        log_resource("END: unitig creation", &mut rdata.assume_init_mut());
    }

    unsafe {
        log_resource("BGN: output", &mut rdata.assume_init_mut());
    }
    checks::mark_spur_tigs(&mut tv, &g, &parameters);
    output::mark_unassembled(&mut tv, &parameters);
    output::log_size_report(&tv);
    output::log_overlap_satisfaction(&tv, &catalog, &ovl, &parameters);

    let layout_file = format!("{}_layout.dat", out_prefix);
    let mut layout_out = BufWriter::new(File::create(&layout_file)?);
    output::write_layout(&mut layout_out, &tv)?;
    log::info!("layout written to {}", layout_file);

    let graph_file = format!("{}_graph.gfa", out_prefix);
    let mut graph_out = BufWriter::new(File::create(&graph_file)?);
    output::write_graph(&mut graph_out, &tv, &catalog, &g)?;
    log::info!("graph written to {}", graph_file);
    unsafe {
        log_resource("END: output", &mut rdata.assume_init_mut());
    }

    let (_, ut, st) = unsafe { log_resource("END: tg_asm", &mut rdata.assume_init_mut()) };
    log::info!("total user cpu time: {} seconds", ut);
    log::info!("total system cpu time: {} seconds", st);
    let elapsed_time = start_wall_clock_time.elapsed().unwrap().as_secs_f32();
    log::info!("total elapse time: {} seconds", elapsed_time);
    Ok(())
}
