use std::fmt;

use crate::cabac::CabacEncoder;
use crate::contexts::{self, ContextTable};
use crate::params::SliceParams;

/// Bin-level sink the syntax layer writes through.
///
/// Implementations must preserve call order exactly: the decoder rebuilds
/// context state from bin order alone.
pub trait BinWriter {
    /// Regular bin against a context slot; adapts that slot.
    fn write_context_bit(&mut self, slot: usize, bin: bool);

    /// `value` ones followed by a zero, the zero omitted when `value == c_max`.
    fn write_bypass_tu(&mut self, value: u32, c_max: u32);

    /// `num_bits` bypass bins, MSB first.
    fn write_bypass_fl(&mut self, value: u32, num_bits: u32);

    fn write_terminate(&mut self, bin: bool);
}

/// Arithmetic-coding writer for one slice segment.
#[derive(Debug)]
pub struct CabacWriter {
    engine: CabacEncoder,
    contexts: ContextTable,
}

impl CabacWriter {
    pub fn new(contexts: ContextTable) -> Self {
        Self {
            engine: CabacEncoder::new(),
            contexts,
        }
    }

    pub fn for_slice(slice: &SliceParams) -> Self {
        Self::new(ContextTable::new(
            slice.slice_type,
            slice.cabac_init_flag,
            slice.slice_qp,
        ))
    }

    pub fn contexts(&self) -> &ContextTable {
        &self.contexts
    }

    pub fn bits_written(&self) -> usize {
        self.engine.bits_written()
    }

    /// Flushes the engine and appends rbsp_slice_segment_trailing_bits().
    /// The end_of_slice_segment_flag terminate bin must already be written.
    pub fn finish_slice(self) -> Vec<u8> {
        self.engine.finish().rbsp_trailing_bits()
    }
}

impl BinWriter for CabacWriter {
    fn write_context_bit(&mut self, slot: usize, bin: bool) {
        self.engine.encode_bin(&mut self.contexts[slot], bin);
    }

    fn write_bypass_tu(&mut self, value: u32, c_max: u32) {
        for _ in 0..value {
            self.engine.encode_bypass(true);
        }
        if value < c_max {
            self.engine.encode_bypass(false);
        }
    }

    fn write_bypass_fl(&mut self, value: u32, num_bits: u32) {
        self.engine.encode_bypass_bins(value, num_bits);
    }

    fn write_terminate(&mut self, bin: bool) {
        self.engine.encode_terminate(bin);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bin {
    Context { slot: usize, bin: bool },
    BypassTu { value: u32, c_max: u32 },
    BypassFl { value: u32, bits: u32 },
    Terminate(bool),
}

impl fmt::Display for Bin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Bin::Context { slot, bin } => write!(
                f,
                "ctx[{slot:2}] {:<24} {}",
                contexts::element_name(slot),
                bin as u8
            ),
            Bin::BypassTu { value, c_max } => write!(f, "bypass tu {value} (cmax {c_max})"),
            Bin::BypassFl { value, bits } => write!(f, "bypass fl {value} ({bits} bits)"),
            Bin::Terminate(bin) => write!(f, "terminate {}", bin as u8),
        }
    }
}

/// Records bins instead of coding them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BinTrace {
    bins: Vec<Bin>,
}

impl BinTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub fn into_bins(self) -> Vec<Bin> {
        self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Context slots touched, in write order.
    pub fn context_slots(&self) -> Vec<usize> {
        self.bins
            .iter()
            .filter_map(|b| match b {
                Bin::Context { slot, .. } => Some(*slot),
                _ => None,
            })
            .collect()
    }
}

impl BinWriter for BinTrace {
    fn write_context_bit(&mut self, slot: usize, bin: bool) {
        self.bins.push(Bin::Context { slot, bin });
    }

    fn write_bypass_tu(&mut self, value: u32, c_max: u32) {
        self.bins.push(Bin::BypassTu { value, c_max });
    }

    fn write_bypass_fl(&mut self, value: u32, num_bits: u32) {
        self.bins.push(Bin::BypassFl {
            value,
            bits: num_bits,
        });
    }

    fn write_terminate(&mut self, bin: bool) {
        self.bins.push(Bin::Terminate(bin));
    }
}
