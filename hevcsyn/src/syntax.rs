//! Context selection and binarisation of the individual syntax elements.
//!
//! Every `encode_*` function writes exactly the bins H.265 mandates for one
//! element; the tree walk in `ctu` decides when each is present.

use tracing::trace;

use crate::contexts::{
    CBF_CHROMA, CBF_LUMA, INTRA_CHROMA_PRED_MODE, LAST_SIG_COEFF_PREFIX_CONTEXTS, PART_MODE,
    PREV_INTRA_LUMA_PRED_FLAG, SPLIT_CU_FLAG, SPLIT_TRANSFORM_FLAG,
};
use crate::error::{EncodeError, Result, Unsupported};
use crate::intra::{ChromaCode, LumaModeCode};
use crate::tree::{Component, PartMode, PredMode};
use crate::writer::BinWriter;

pub fn split_cu_flag_context(
    avail_l: bool,
    depth_l: u8,
    avail_a: bool,
    depth_a: u8,
    ct_depth: u8,
) -> usize {
    let cond_l = avail_l && depth_l > ct_depth;
    let cond_a = avail_a && depth_a > ct_depth;
    cond_l as usize + cond_a as usize
}

pub fn split_transform_flag_context(log2_trafo_size: u8) -> Result<usize> {
    match 5i32 - log2_trafo_size as i32 {
        ctx @ 0..=2 => Ok(ctx as usize),
        _ => Err(EncodeError::out_of_range(
            "split_transform_flag context",
            5 - log2_trafo_size as i64,
        )),
    }
}

pub fn cbf_luma_context(trafo_depth: u8) -> usize {
    if trafo_depth == 0 { 1 } else { 0 }
}

pub fn cbf_chroma_context(trafo_depth: u8) -> Result<usize> {
    if trafo_depth <= 3 {
        Ok(trafo_depth as usize)
    } else {
        Err(EncodeError::out_of_range("cbf_cb/cbf_cr context", trafo_depth))
    }
}

/// `(ctxOffset, ctxShift)` for last_sig_coeff_{x,y}_prefix.
pub fn last_sig_coeff_prefix_context(
    component: Component,
    log2_trafo_size: u8,
) -> Result<(usize, u32)> {
    if !(2..=5).contains(&log2_trafo_size) {
        return Err(EncodeError::out_of_range("last_sig_coeff_prefix block size", log2_trafo_size));
    }
    let log2 = log2_trafo_size as usize;
    let (offset, shift) = match component {
        Component::Luma => (3 * (log2 - 2) + ((log2 - 1) >> 2), (log2 + 1) >> 2),
        Component::Cb | Component::Cr => (15, log2 - 2),
    };

    let last_bin = 2 * log2 - 2;
    let highest = offset + (last_bin >> shift);
    if highest >= LAST_SIG_COEFF_PREFIX_CONTEXTS {
        return Err(EncodeError::out_of_range("last_sig_coeff_prefix context", highest as i64));
    }
    Ok((offset, shift as u32))
}

pub fn encode_split_cu_flag<W: BinWriter + ?Sized>(w: &mut W, ctx: usize, split: bool) {
    trace!(ctx, "split_cu_flag = {}", split as u8);
    w.write_context_bit(SPLIT_CU_FLAG + ctx, split);
}

pub fn encode_part_mode<W: BinWriter + ?Sized>(
    w: &mut W,
    pred_mode: PredMode,
    part_mode: PartMode,
) -> Result<()> {
    if pred_mode != PredMode::Intra {
        return Err(EncodeError::Unimplemented(Unsupported::InterPrediction));
    }
    let bin = match part_mode {
        PartMode::Part2Nx2N => true,
        PartMode::PartNxN => false,
        _ => return Err(EncodeError::Unimplemented(Unsupported::PartitionMode)),
    };
    trace!("part_mode = {:?}", part_mode);
    w.write_context_bit(PART_MODE, bin);
    Ok(())
}

pub fn encode_prev_intra_luma_pred_flag<W: BinWriter + ?Sized>(w: &mut W, code: LumaModeCode) {
    let flag = code.is_mpm();
    trace!("prev_intra_luma_pred_flag = {}", flag as u8);
    w.write_context_bit(PREV_INTRA_LUMA_PRED_FLAG, flag);
}

/// mpm_idx (TU, cMax 2) or rem_intra_luma_pred_mode (FL, 5 bits).
pub fn encode_mpm_idx_or_rem<W: BinWriter + ?Sized>(w: &mut W, code: LumaModeCode) -> Result<()> {
    match code {
        LumaModeCode::MpmIdx(idx) if idx <= 2 => {
            trace!("mpm_idx = {}", idx);
            w.write_bypass_tu(idx as u32, 2);
        }
        LumaModeCode::Remainder(rem) if rem <= 31 => {
            trace!("rem_intra_luma_pred_mode = {}", rem);
            w.write_bypass_fl(rem as u32, 5);
        }
        LumaModeCode::MpmIdx(idx) => return Err(EncodeError::out_of_range("mpm_idx", idx)),
        LumaModeCode::Remainder(rem) => {
            return Err(EncodeError::out_of_range("rem_intra_luma_pred_mode", rem));
        }
    }
    Ok(())
}

pub fn encode_intra_chroma_pred_mode<W: BinWriter + ?Sized>(w: &mut W, code: ChromaCode) {
    trace!("intra_chroma_pred_mode = {}", code.value());
    if code == ChromaCode::DerivedFromLuma {
        w.write_context_bit(INTRA_CHROMA_PRED_MODE, false);
    } else {
        w.write_context_bit(INTRA_CHROMA_PRED_MODE, true);
        w.write_bypass_fl(code.value(), 2);
    }
}

pub fn encode_split_transform_flag<W: BinWriter + ?Sized>(
    w: &mut W,
    log2_trafo_size: u8,
    split: bool,
) -> Result<()> {
    let ctx = split_transform_flag_context(log2_trafo_size)?;
    trace!(ctx, "split_transform_flag = {}", split as u8);
    w.write_context_bit(SPLIT_TRANSFORM_FLAG + ctx, split);
    Ok(())
}

pub fn encode_cbf_luma<W: BinWriter + ?Sized>(w: &mut W, trafo_depth: u8, cbf: bool) {
    let ctx = cbf_luma_context(trafo_depth);
    trace!(ctx, "cbf_luma = {}", cbf as u8);
    w.write_context_bit(CBF_LUMA + ctx, cbf);
}

pub fn encode_cbf_chroma<W: BinWriter + ?Sized>(
    w: &mut W,
    trafo_depth: u8,
    cbf: bool,
) -> Result<()> {
    let ctx = cbf_chroma_context(trafo_depth)?;
    trace!(ctx, "cbf_chroma = {}", cbf as u8);
    w.write_context_bit(CBF_CHROMA + ctx, cbf);
    Ok(())
}

pub fn encode_end_of_slice_segment_flag<W: BinWriter + ?Sized>(w: &mut W, last: bool) {
    trace!("end_of_slice_segment_flag = {}", last as u8);
    w.write_terminate(last);
}
