#![forbid(unsafe_code)]

pub mod bitwriter;
pub mod cabac;
pub mod contexts;
pub mod ctu;
pub mod error;
pub mod intra;
pub mod params;
pub mod picture;
pub mod residual;
pub mod scan;
pub mod syntax;
pub mod tree;
pub mod writer;

pub use ctu::{SliceEncoder, SliceStats};
pub use error::{EncodeError, Result, Unsupported};
pub use params::{SequenceParams, SliceParams, SliceType};
pub use picture::{PictureInfo, PictureMetadata};
pub use tree::{
    CodingTree, CodingUnit, Component, IntraPredMode, IntraPredictionUnit, PartMode, PredMode,
    TbId, TransformBlock, TransformTree,
};
pub use writer::{Bin, BinTrace, BinWriter, CabacWriter};

/// Encodes the CTBs of one slice segment into CABAC-coded slice data,
/// terminated by rbsp_slice_segment_trailing_bits.
pub fn encode_slice(
    seq: &SequenceParams,
    slice: &SliceParams,
    ctbs: &[CodingTree],
) -> Result<Vec<u8>> {
    let mut pic = PictureInfo::new(seq);
    let mut enc = SliceEncoder::new(seq, slice, &mut pic, CabacWriter::for_slice(slice))?;
    enc.encode_slice(ctbs)?;
    Ok(enc.into_writer().finish_slice())
}

/// Same walk as [`encode_slice`], returning the bins instead of coding them.
pub fn trace_slice(
    seq: &SequenceParams,
    slice: &SliceParams,
    ctbs: &[CodingTree],
) -> Result<Vec<Bin>> {
    let mut pic = PictureInfo::new(seq);
    let mut enc = SliceEncoder::new(seq, slice, &mut pic, BinTrace::new())?;
    enc.encode_slice(ctbs)?;
    Ok(enc.into_writer().into_bins())
}
