//! The CLI surface (§4.6/§6): every knob the core reads, parsed once in
//! `main` and threaded down as plain data.

use clap::Parser;
use std::path::PathBuf;

/// Parses the machine's `m^n` address notation (`m*8192+n`) alongside plain
/// decimal. Used for every address-valued flag.
fn parse_address(s: &str) -> Result<u16, String> {
    if let Some((m, n)) = s.split_once('^') {
        let m: u32 = m.parse().map_err(|_| format!("invalid module in {s:?}"))?;
        let n: u32 = n.parse().map_err(|_| format!("invalid offset in {s:?}"))?;
        let addr = m * 8192 + n;
        u16::try_from(addr).map_err(|_| format!("address {s:?} overflows a 16-bit address"))
    } else {
        s.parse().map_err(|_| format!("invalid address {s:?}"))
    }
}

/// Elliott 903/920B emulator: runs a store image against reader, punch,
/// teletype, and plotter peripherals.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "e903", version, about)]
pub struct Config {
    /// Store image to load at start and persist at orderly exit.
    #[arg(long, default_value = ".store")]
    pub store: PathBuf,

    /// Paper-tape reader input.
    #[arg(long, default_value = ".reader")]
    pub reader: PathBuf,

    /// Paper-tape punch output.
    #[arg(long, default_value = ".punch")]
    pub punch: PathBuf,

    /// Teletype input.
    #[arg(long, default_value = ".ttyin")]
    pub ttyin: PathBuf,

    /// Plotter PNG output.
    #[arg(long, default_value = ".plot.png")]
    pub plot: PathBuf,

    /// Unread reader bytes at exit are spilled here.
    #[arg(long, default_value = ".save")]
    pub save: PathBuf,

    /// Dynamic-stop address is written here.
    #[arg(long, default_value = ".stop")]
    pub stop: PathBuf,

    /// SCR address to start execution at. Accepts plain decimal or `m^n`.
    #[arg(long, default_value = "8181", value_parser = parse_address)]
    pub jump: u16,

    /// Abandon the run after this many instructions.
    #[arg(long)]
    pub abandon_after: Option<u64>,

    /// Start a windowed trace once the instruction count reaches this value.
    #[arg(long)]
    pub trace_count: Option<u64>,

    /// Start a windowed trace the first time SCR reaches this address.
    #[arg(long, value_parser = parse_address)]
    pub trace_address: Option<u16>,

    /// Arm a windowed trace from the very first instruction of the run.
    #[arg(long)]
    pub trace_window: bool,

    /// Arm a one-shot instruction trace the next time this Store cell changes.
    #[arg(long, value_parser = parse_address)]
    pub monitor: Option<u16>,

    /// Verbosity bitmask: 1=summary, 2=jumps, 4=instructions, 8=I/O.
    #[arg(long, default_value_t = 0)]
    pub verbosity: u8,

    /// Plotter raster width, in steps.
    #[arg(long, default_value_t = 3600)]
    pub plot_width: u32,

    /// Plotter raster height, in steps.
    #[arg(long, default_value_t = 3600)]
    pub plot_height: u32,

    /// Plotter pen half-width, in steps.
    #[arg(long, default_value_t = 3)]
    pub pen_size: u32,

    /// Redirect log output to this file instead of stderr.
    #[arg(long)]
    pub log_to_file: Option<PathBuf>,
}
