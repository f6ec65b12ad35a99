//! Position part of residual_coding(): the last significant coefficient and
//! the coded sub-block map that coefficient-level coding starts from.

use tracing::trace;

use crate::contexts::{LAST_SIG_COEFF_X_PREFIX, LAST_SIG_COEFF_Y_PREFIX};
use crate::error::{EncodeError, Result};
use crate::scan::{ScanIdx, ScanPosition, scan_order};
use crate::syntax::last_sig_coeff_prefix_context;
use crate::tree::Component;
use crate::writer::BinWriter;

/// Last non-zero coefficient in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastSignificant {
    pub x: u8,
    pub y: u8,
    /// Index of its 4x4 sub-block in sub-block scan order.
    pub sub_block: usize,
    /// Index inside that sub-block's scan.
    pub pos: usize,
}

/// Prefix/suffix binarisation of one last-position coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSplit {
    pub prefix: u8,
    pub suffix: u8,
    pub suffix_bits: u8,
}

fn check_block(coeffs: &[i16], log2_size: u8) -> Result<()> {
    if !(2..=5).contains(&log2_size) {
        return Err(EncodeError::out_of_range("residual block size", log2_size));
    }
    if coeffs.len() != 1 << (2 * log2_size) {
        return Err(EncodeError::MalformedTree("coefficient array does not match block size"));
    }
    Ok(())
}

/// Scans sub-blocks and then positions in reverse scan order for the last
/// non-zero coefficient. Coordinates are returned unswapped.
pub fn find_last_significant(
    coeffs: &[i16],
    log2_size: u8,
    scan_idx: ScanIdx,
    component: Component,
) -> Result<LastSignificant> {
    check_block(coeffs, log2_size)?;
    let sb_scan = scan_order(log2_size - 2, scan_idx);
    let pos_scan = scan_order(2, scan_idx);

    for (i, sb) in sb_scan.iter().enumerate().rev() {
        let x0 = (sb.x as usize) << 2;
        let y0 = (sb.y as usize) << 2;
        for (c, p) in pos_scan.iter().enumerate().rev() {
            let x = x0 + p.x as usize;
            let y = y0 + p.y as usize;
            if coeffs[x + (y << log2_size)] != 0 {
                return Ok(LastSignificant {
                    x: x as u8,
                    y: y as u8,
                    sub_block: i,
                    pos: c,
                });
            }
        }
    }

    Err(EncodeError::MissingLastCoefficient {
        component,
        log2_size,
    })
}

pub fn split_last_significant_position(pos: u8) -> PositionSplit {
    if pos <= 3 {
        return PositionSplit {
            prefix: pos,
            suffix: 0,
            suffix_bits: 0,
        };
    }

    let mut rest = (pos - 4) as u32;
    let mut n_bits = 1u8;
    let mut range = 4u32;
    while rest >= range {
        n_bits += 1;
        rest -= range;
        range <<= 1;
    }

    let mut prefix = (1 + n_bits) << 1;
    if rest >= range >> 1 {
        prefix |= 1;
        rest -= range >> 1;
    }
    PositionSplit {
        prefix,
        suffix: rest as u8,
        suffix_bits: n_bits,
    }
}

/// Decoder-side reconstruction of a coordinate from its prefix and suffix (7.4.9.11).
pub fn merge_last_significant_position(prefix: u8, suffix: u8) -> u8 {
    if prefix <= 3 {
        prefix
    } else {
        let base = 1u32 << ((prefix >> 1) - 1);
        (base * (2 + (prefix & 1) as u32) + suffix as u32) as u8
    }
}

/// Truncated-unary prefix over context bins `slot_base + ctx_offset + (bin >> ctx_shift)`.
pub fn encode_last_sig_coeff_prefix<W: BinWriter + ?Sized>(
    w: &mut W,
    slot_base: usize,
    component: Component,
    log2_size: u8,
    prefix: u8,
) -> Result<()> {
    let (ctx_offset, ctx_shift) = last_sig_coeff_prefix_context(component, log2_size)?;
    let c_max = (log2_size << 1) - 1;
    if prefix > c_max {
        return Err(EncodeError::out_of_range("last_sig_coeff_prefix", prefix));
    }

    for bin_idx in 0..prefix as usize {
        w.write_context_bit(slot_base + ctx_offset + (bin_idx >> ctx_shift), true);
    }
    if prefix != c_max {
        let bin_idx = prefix as usize;
        w.write_context_bit(slot_base + ctx_offset + (bin_idx >> ctx_shift), false);
    }
    Ok(())
}

/// Which 4x4 sub-blocks will be visited by coefficient-level coding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedSubBlocks {
    width: usize,
    /// Indexed by sub-block scan position.
    coded: Vec<bool>,
    /// Raster-indexed; bit 0: the right neighbour is coded, bit 1: the one below is.
    neighbors: Vec<u8>,
}

impl CodedSubBlocks {
    pub fn is_coded(&self, scan_pos: usize) -> bool {
        self.coded.get(scan_pos).copied().unwrap_or(false)
    }

    pub fn coded_count(&self) -> usize {
        self.coded.iter().filter(|&&c| c).count()
    }

    pub fn neighbor_flags(&self, x: usize, y: usize) -> u8 {
        self.neighbors[x + y * self.width]
    }
}

fn sub_block_has_nonzero(coeffs: &[i16], stride: usize, sb: ScanPosition) -> bool {
    let x0 = (sb.x as usize) << 2;
    let y0 = (sb.y as usize) << 2;
    (0..4).any(|dy| {
        let row = (y0 + dy) * stride + x0;
        coeffs[row..row + 4].iter().any(|&c| c != 0)
    })
}

/// Walks sub-blocks from the last significant one down to DC.
pub fn seed_coded_sub_blocks(
    coeffs: &[i16],
    log2_size: u8,
    scan_idx: ScanIdx,
    last_sub_block: usize,
) -> Result<CodedSubBlocks> {
    check_block(coeffs, log2_size)?;
    let sb_scan = scan_order(log2_size - 2, scan_idx);
    if last_sub_block >= sb_scan.len() {
        return Err(EncodeError::out_of_range("last sub-block", last_sub_block as i64));
    }
    let width = 1usize << (log2_size - 2);
    let stride = 1usize << log2_size;

    let mut coded = vec![false; sb_scan.len()];
    let mut neighbors = vec![0u8; width * width];

    for i in (0..=last_sub_block).rev() {
        let s = sb_scan[i];
        let is_coded = if i == 0 || i == last_sub_block {
            true
        } else {
            sub_block_has_nonzero(coeffs, stride, s)
        };
        if !is_coded {
            continue;
        }
        coded[i] = true;

        let (sx, sy) = (s.x as usize, s.y as usize);
        if sx > 0 {
            neighbors[sx - 1 + sy * width] |= 1;
        }
        if sy > 0 {
            neighbors[sx + (sy - 1) * width] |= 2;
        }
    }

    Ok(CodedSubBlocks {
        width,
        coded,
        neighbors,
    })
}

/// Emits last_sig_coeff_{x,y}_{prefix,suffix} for one block and returns the
/// coded sub-block map for the coefficient-level stage.
pub fn encode_residual_position<W: BinWriter + ?Sized>(
    w: &mut W,
    coeffs: &[i16],
    log2_size: u8,
    component: Component,
    scan_idx: ScanIdx,
) -> Result<CodedSubBlocks> {
    let last = find_last_significant(coeffs, log2_size, scan_idx, component)?;

    let (mut last_x, mut last_y) = (last.x, last.y);
    if scan_idx == ScanIdx::Vertical {
        std::mem::swap(&mut last_x, &mut last_y);
    }

    let split_x = split_last_significant_position(last_x);
    let split_y = split_last_significant_position(last_y);
    trace!(
        ?component,
        log2_size,
        "last_sig_coeff_prefix = ({}, {})",
        split_x.prefix,
        split_y.prefix
    );

    encode_last_sig_coeff_prefix(w, LAST_SIG_COEFF_X_PREFIX, component, log2_size, split_x.prefix)?;
    encode_last_sig_coeff_prefix(w, LAST_SIG_COEFF_Y_PREFIX, component, log2_size, split_y.prefix)?;

    if last_x > 3 {
        trace!("last_sig_coeff_x_suffix = {}", split_x.suffix);
        w.write_bypass_fl(split_x.suffix as u32, split_x.suffix_bits as u32);
    }
    if last_y > 3 {
        trace!("last_sig_coeff_y_suffix = {}", split_y.suffix);
        w.write_bypass_fl(split_y.suffix as u32, split_y.suffix_bits as u32);
    }

    seed_coded_sub_blocks(coeffs, log2_size, scan_idx, last.sub_block)
}
