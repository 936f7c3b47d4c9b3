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

mod utils;
use simple_logger::SimpleLogger;
use utils::optimize::optimize_positions;
use utils::output;
use utils::overlaps::OverlapIndex;
use utils::populate;
use utils::reads::ReadCatalog;
use utils::Parameters;
use utils::{getrusage, log_resource, rusage, MaybeUninit, RUSAGE_SELF};

fn main() -> Result<()> {
    let mut rdata: MaybeUninit<libc::rusage> = unsafe { MaybeUninit::uninit().assume_init() };
    let _res = unsafe { getrusage(RUSAGE_SELF, &mut rdata.assume_init_read()) };

    let matches = clap_app!(tg_layout =>
        (version: VERSION_STRING)
        (author: "Jason Chin <cschin@omnibio.ai>")
        (about: "
TigAsm overlap-graph layout toolkit
tg_layout: rebuild tig layouts from externally curated read lists
LICENSE: http://creativecommons.org/licenses/by-nc-sa/4.0/")
        (@arg READIDX: +required "Path to the read index file")
        (@arg OVLPREFIX: +required "The prefix of the overlap chunk files")
        (@arg READLISTS: +required "Path to the read list file, one tig per line")
        (@arg OUTPREFIX: +required "The prefix of the output files")
        (@arg NTHREADS: +takes_value "Number of threads")
        (@arg max_erate: --max_erate +takes_value "Maximum overlap error rate loaded [default: 0.12]")
        (@arg min_ovlp: --min_ovlp +takes_value "Minimum overlap length loaded [default: 500]")
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
    let read_lists = matches.value_of("READLISTS").unwrap().to_string();
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

    rayon::ThreadPoolBuilder::new()
        .num_threads(nthreads as usize)
        .build_global()
        .unwrap();

    log::info!("tg_layout {}", VERSION_STRING);
    log::info!(
        "command: {}",
        std::env::args().collect::<Vec<String>>().join(" ")
    );
    log::info!("read index: {}", read_idx);
    log::info!("overlap prefix: {}", ovl_prefix);
    log::info!("read lists: {}", read_lists);
    log::info!("output prefix: {}", out_prefix);
    log::info!("number of threads: {}", nthreads);

    let start_wall_clock_time = SystemTime::now();

    unsafe {
        log_resource("BGN: tg_layout", &mut rdata.assume_init_mut());
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
        log_resource("BGN: importing read lists", &mut rdata.assume_init_mut());
    }
    let mut tv = populate::load_read_lists(&read_lists, &catalog, &ovl)?;
    optimize_positions(&mut tv, &catalog, &ovl, &parameters);
    unsafe {
        log_resource("END: importing read lists", &mut rdata.assume_init_mut());
    }

    unsafe {
        log_resource("BGN: output", &mut rdata.assume_init_mut());
    }
    output::log_size_report(&tv);
    output::log_overlap_satisfaction(&tv, &catalog, &ovl, &parameters);

    let layout_file = format!("{}_layout.dat", out_prefix);
    let mut layout_out = BufWriter::new(File::create(&layout_file)?);
    output::write_layout(&mut layout_out, &tv)?;
    log::info!("layout written to {}", layout_file);
    unsafe {
        log_resource("END: output", &mut rdata.assume_init_mut());
    }

    let (_, ut, st) = unsafe { log_resource("END: tg_layout", &mut rdata.assume_init_mut()) };
    log::info!("total user cpu time: {} seconds", ut);
    log::info!("total system cpu time: {} seconds", st);
    let elapsed_time = start_wall_clock_time.elapsed().unwrap().as_secs_f32();
    log::info!("total elapse time: {} seconds", elapsed_time);
    Ok(())
}
