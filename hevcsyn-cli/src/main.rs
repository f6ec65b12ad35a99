#![forbid(unsafe_code)]

mod pattern;

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use hevcsyn::{BinTrace, CabacWriter, PictureInfo, SequenceParams, SliceEncoder, SliceParams};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pattern::Pattern;

/// Encodes a synthetic intra picture into CABAC slice data.
#[derive(Parser, Debug)]
#[command(name = "hevcsyn")]
#[command(version)]
#[command(about = "H.265 syntax-element encoder driven by synthetic decision trees")]
struct Args {
    /// Output file for the slice segment data
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = 64)]
    width: u32,

    #[arg(long, default_value_t = 64)]
    height: u32,

    /// log2 of the CTB size (4..=6)
    #[arg(long, default_value_t = 4)]
    ctb: u8,

    /// log2 of the minimum coding block size
    #[arg(long, default_value_t = 3)]
    min_cb: u8,

    /// log2 of the maximum transform block size
    #[arg(long, default_value_t = 4)]
    max_tb: u8,

    #[arg(long, default_value_t = 1)]
    max_transform_depth: u8,

    #[arg(long, default_value_t = hevcsyn::params::DEFAULT_SLICE_QP)]
    qp: i32,

    #[arg(long)]
    cabac_init: bool,

    #[arg(long, value_enum, default_value_t = Pattern::Mixed)]
    pattern: Pattern,

    /// Print every bin instead of arithmetic coding them
    #[arg(long)]
    trace_bins: bool,

    /// Log every syntax element
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn sequence_params(&self) -> SequenceParams {
        SequenceParams {
            pic_width: self.width,
            pic_height: self.height,
            log2_ctb_size: self.ctb,
            log2_min_cb_size: self.min_cb,
            log2_max_tb_size: self.max_tb,
            max_transform_hierarchy_depth_intra: self.max_transform_depth,
            ..Default::default()
        }
    }

    fn slice_params(&self) -> SliceParams {
        SliceParams {
            slice_qp: self.qp,
            cabac_init_flag: self.cabac_init,
            ..Default::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "trace" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let seq = args.sequence_params();
    let slice = args.slice_params();
    seq.validate().context("invalid sequence parameters")?;
    let ctbs =
        pattern::build_picture(&seq, args.pattern).context("building decision trees")?;
    let mut pic = PictureInfo::new(&seq);

    if args.trace_bins {
        let mut enc = SliceEncoder::new(&seq, &slice, &mut pic, BinTrace::new())?;
        enc.encode_slice(&ctbs)?;
        let trace = enc.into_writer();
        let mut out = std::io::stdout().lock();
        for bin in trace.bins() {
            writeln!(out, "{bin}")?;
        }
        return Ok(());
    }

    let mut enc = SliceEncoder::new(&seq, &slice, &mut pic, CabacWriter::for_slice(&slice))?;
    enc.encode_slice(&ctbs)?;
    let stats = enc.stats();
    let data = enc.into_writer().finish_slice();

    info!(
        ctbs = stats.ctbs,
        coding_units = stats.coding_units,
        transform_units = stats.transform_units,
        bytes = data.len(),
        "slice encoded"
    );
    eprintln!(
        "Encoded {}x{} ({:?}): {} CTBs, {} CUs, {} TUs, {} residual blocks, {} bytes",
        seq.pic_width,
        seq.pic_height,
        args.pattern,
        stats.ctbs,
        stats.coding_units,
        stats.transform_units,
        stats.residual_blocks,
        data.len()
    );

    if let Some(path) = &args.output {
        File::create(path)
            .and_then(|mut f| f.write_all(&data))
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
