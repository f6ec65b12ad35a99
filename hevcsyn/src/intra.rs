//! Intra mode signalling helpers: most probable mode candidates (8.4.2),
//! MPM index / remainder mapping, chroma mode codes and intra scan selection.

use crate::error::{EncodeError, Result};
use crate::picture::PictureMetadata;
use crate::scan::ScanIdx;
use crate::tree::{Component, IntraPredMode, PredMode};

/// Value of intra_chroma_pred_mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaCode {
    PlanarOr34 = 0,
    Angular26Or34 = 1,
    Angular10Or34 = 2,
    DcOr34 = 3,
    DerivedFromLuma = 4,
}

impl ChromaCode {
    pub fn value(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for ChromaCode {
    type Error = EncodeError;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            0 => Ok(ChromaCode::PlanarOr34),
            1 => Ok(ChromaCode::Angular26Or34),
            2 => Ok(ChromaCode::Angular10Or34),
            3 => Ok(ChromaCode::DcOr34),
            4 => Ok(ChromaCode::DerivedFromLuma),
            _ => Err(EncodeError::out_of_range("intra_chroma_pred_mode", code)),
        }
    }
}

/// Maps a chroma direction to its code given the co-located luma direction.
/// Angular 34 is what the four explicit codes turn into when they collide
/// with luma, so it is coded as the code of the luma mode.
pub fn derive_chroma_code(chroma: IntraPredMode, luma: IntraPredMode) -> Result<ChromaCode> {
    if chroma == luma {
        return Ok(ChromaCode::DerivedFromLuma);
    }

    let mode = if chroma == IntraPredMode::ANGULAR_34 { luma } else { chroma };
    match mode {
        IntraPredMode::PLANAR => Ok(ChromaCode::PlanarOr34),
        IntraPredMode::ANGULAR_26 => Ok(ChromaCode::Angular26Or34),
        IntraPredMode::ANGULAR_10 => Ok(ChromaCode::Angular10Or34),
        IntraPredMode::DC => Ok(ChromaCode::DcOr34),
        _ => Err(EncodeError::out_of_range("intra_chroma_pred_mode", chroma.value())),
    }
}

/// Inverse of `derive_chroma_code` (Table 8-2 for 4:2:0).
pub fn chroma_mode_from_code(code: ChromaCode, luma: IntraPredMode) -> IntraPredMode {
    let explicit = match code {
        ChromaCode::DerivedFromLuma => return luma,
        ChromaCode::PlanarOr34 => IntraPredMode::PLANAR,
        ChromaCode::Angular26Or34 => IntraPredMode::ANGULAR_26,
        ChromaCode::Angular10Or34 => IntraPredMode::ANGULAR_10,
        ChromaCode::DcOr34 => IntraPredMode::DC,
    };
    if explicit == luma {
        IntraPredMode::ANGULAR_34
    } else {
        explicit
    }
}

/// Luma mode as coded: an index into the candidate list or a remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LumaModeCode {
    MpmIdx(u8),
    Remainder(u8),
}

impl LumaModeCode {
    /// prev_intra_luma_pred_flag
    pub fn is_mpm(self) -> bool {
        matches!(self, LumaModeCode::MpmIdx(_))
    }
}

fn candidate_from<P: PictureMetadata + ?Sized>(pic: &P, x: u32, y: u32) -> IntraPredMode {
    if pic.pred_mode(x, y) == PredMode::Intra {
        pic.intra_pred_mode(x, y)
    } else {
        IntraPredMode::DC
    }
}

/// candModeList for the prediction block at (x, y).
pub fn fill_intra_pred_mode_candidates<P: PictureMetadata + ?Sized>(
    pic: &P,
    x: u32,
    y: u32,
    avail_a: bool,
    avail_b: bool,
) -> [IntraPredMode; 3] {
    let cand_a = match x.checked_sub(1) {
        Some(xa) if avail_a => candidate_from(pic, xa, y),
        _ => IntraPredMode::DC,
    };

    // The above neighbour is not used across a CTB row boundary.
    let log2_ctb = pic.log2_ctb_size();
    let ctb_top = (y >> log2_ctb) << log2_ctb;
    let cand_b = match y.checked_sub(1) {
        Some(yb) if avail_b && yb >= ctb_top => candidate_from(pic, x, yb),
        _ => IntraPredMode::DC,
    };

    if cand_a == cand_b {
        let a = cand_a.value();
        if a < 2 {
            [IntraPredMode::PLANAR, IntraPredMode::DC, IntraPredMode::ANGULAR_26]
        } else {
            [
                cand_a,
                IntraPredMode(2 + ((a + 29) % 32)),
                IntraPredMode(2 + ((a - 2 + 1) % 32)),
            ]
        }
    } else {
        let cand_c = if cand_a != IntraPredMode::PLANAR && cand_b != IntraPredMode::PLANAR {
            IntraPredMode::PLANAR
        } else if cand_a != IntraPredMode::DC && cand_b != IntraPredMode::DC {
            IntraPredMode::DC
        } else {
            IntraPredMode::ANGULAR_26
        };
        [cand_a, cand_b, cand_c]
    }
}

pub fn find_intra_pred_mode(mode: IntraPredMode, candidates: [IntraPredMode; 3]) -> LumaModeCode {
    if let Some(idx) = candidates.iter().position(|&c| c == mode) {
        return LumaModeCode::MpmIdx(idx as u8);
    }

    let mut sorted = candidates;
    sorted.sort_unstable();
    let mut rem = mode.value();
    for cand in sorted.iter().rev() {
        if rem >= cand.value() {
            rem -= 1;
        }
    }
    LumaModeCode::Remainder(rem)
}

/// scanIdx of 7.4.9.11 for intra blocks in 4:2:0; `log2_trafo_size` is the
/// size of the block actually coded for `component`.
pub fn intra_scan_idx(log2_trafo_size: u8, mode: IntraPredMode, component: Component) -> ScanIdx {
    let applies = match component {
        Component::Luma => log2_trafo_size == 2 || log2_trafo_size == 3,
        Component::Cb | Component::Cr => log2_trafo_size == 2,
    };
    if !applies {
        return ScanIdx::Diagonal;
    }
    match mode.value() {
        6..=14 => ScanIdx::Vertical,
        22..=30 => ScanIdx::Horizontal,
        _ => ScanIdx::Diagonal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SequenceParams;
    use crate::picture::PictureInfo;
    use crate::tree::{CodingUnit, IntraPredictionUnit, TransformBlock, TransformTree};

    fn mode(m: u8) -> IntraPredMode {
        IntraPredMode::new(m).unwrap()
    }

    /// Decoder side of 8.4.2 steps 4-5.
    fn decode_luma_mode(code: LumaModeCode, candidates: [IntraPredMode; 3]) -> IntraPredMode {
        match code {
            LumaModeCode::MpmIdx(i) => candidates[i as usize],
            LumaModeCode::Remainder(rem) => {
                let mut sorted = candidates;
                sorted.sort_unstable();
                let mut m = rem;
                for c in sorted {
                    if m >= c.value() {
                        m += 1;
                    }
                }
                mode(m)
            }
        }
    }

    #[test]
    fn same_as_luma_for_every_mode() {
        for m in IntraPredMode::all() {
            assert_eq!(derive_chroma_code(m, m).unwrap(), ChromaCode::DerivedFromLuma);
        }
    }

    #[test]
    fn angular_34_substitutes_luma() {
        let code =
            derive_chroma_code(IntraPredMode::ANGULAR_34, IntraPredMode::ANGULAR_10).unwrap();
        assert_eq!(code, ChromaCode::Angular10Or34);
        assert!(derive_chroma_code(IntraPredMode::ANGULAR_34, mode(18)).is_err());
    }

    #[test]
    fn explicit_chroma_codes() {
        let luma = mode(18);
        let cases = [
            (IntraPredMode::PLANAR, ChromaCode::PlanarOr34),
            (IntraPredMode::ANGULAR_26, ChromaCode::Angular26Or34),
            (IntraPredMode::ANGULAR_10, ChromaCode::Angular10Or34),
            (IntraPredMode::DC, ChromaCode::DcOr34),
        ];
        for (chroma, code) in cases {
            assert_eq!(derive_chroma_code(chroma, luma).unwrap(), code, "{chroma:?}");
        }
    }

    #[test]
    fn non_codable_chroma_is_range_violation() {
        let err = derive_chroma_code(mode(7), mode(18)).unwrap_err();
        assert_eq!(err, EncodeError::out_of_range("intra_chroma_pred_mode", 7u8));
    }

    #[test]
    fn chroma_code_from_value() {
        assert_eq!(ChromaCode::try_from(4).unwrap(), ChromaCode::DerivedFromLuma);
        assert_eq!(ChromaCode::try_from(2).unwrap().value(), 2);
        assert!(ChromaCode::try_from(5).is_err());
    }

    #[test]
    fn chroma_code_roundtrip_for_codable_modes() {
        for luma in IntraPredMode::all() {
            for chroma in IntraPredMode::all() {
                if let Ok(code) = derive_chroma_code(chroma, luma) {
                    assert_eq!(
                        chroma_mode_from_code(code, luma),
                        chroma,
                        "luma {luma:?} chroma {chroma:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn mpm_mapping_inverts_decoder_for_all_modes() {
        let lists = [
            [IntraPredMode::PLANAR, IntraPredMode::DC, IntraPredMode::ANGULAR_26],
            [mode(18), mode(17), mode(19)],
            [mode(2), mode(33), mode(3)],
            [mode(34), IntraPredMode::PLANAR, IntraPredMode::DC],
        ];
        for cands in lists {
            for m in IntraPredMode::all() {
                let code = find_intra_pred_mode(m, cands);
                if let LumaModeCode::Remainder(r) = code {
                    assert!(r <= 31);
                }
                assert_eq!(decode_luma_mode(code, cands), m);
            }
        }
    }

    #[test]
    fn unavailable_neighbors_give_default_list() {
        let pic = PictureInfo::new(&SequenceParams::default());
        let cands = fill_intra_pred_mode_candidates(&pic, 0, 0, false, false);
        assert_eq!(cands, [IntraPredMode::PLANAR, IntraPredMode::DC, IntraPredMode::ANGULAR_26]);
    }

    #[test]
    fn equal_angular_neighbors_expand_to_adjacent_directions() {
        let mut pic = PictureInfo::new(&SequenceParams::default());
        pic.start_ctb(0, 0);
        let cu = CodingUnit::intra(
            IntraPredictionUnit::derived_chroma(mode(2)),
            TransformTree::leaf(3, TransformBlock::empty()),
        );
        pic.store_coding_unit(0, 0, 3, 1, &cu);
        pic.store_coding_unit(8, 0, 3, 1, &cu);
        pic.store_coding_unit(0, 8, 3, 1, &cu);
        let cands = fill_intra_pred_mode_candidates(&pic, 8, 8, true, true);
        assert_eq!(cands, [mode(2), mode(33), mode(3)]);
    }

    #[test]
    fn above_neighbor_in_previous_ctb_row_counts_as_dc() {
        let mut pic = PictureInfo::new(&SequenceParams::default());
        pic.start_ctb(0, 0);
        pic.start_ctb(4, 0);
        let cu = CodingUnit::intra(
            IntraPredictionUnit::derived_chroma(IntraPredMode::ANGULAR_10),
            TransformTree::leaf(4, TransformBlock::empty()),
        );
        pic.store_coding_unit(0, 0, 4, 0, &cu);
        let cands = fill_intra_pred_mode_candidates(&pic, 0, 16, false, true);
        assert_eq!(cands, [IntraPredMode::PLANAR, IntraPredMode::DC, IntraPredMode::ANGULAR_26]);
    }

    #[test]
    fn distinct_neighbors_fill_third_candidate() {
        let mut pic = PictureInfo::new(&SequenceParams::default());
        pic.start_ctb(0, 0);
        let left = CodingUnit::intra(
            IntraPredictionUnit::derived_chroma(IntraPredMode::PLANAR),
            TransformTree::leaf(3, TransformBlock::empty()),
        );
        let above = CodingUnit::intra(
            IntraPredictionUnit::derived_chroma(IntraPredMode::ANGULAR_26),
            TransformTree::leaf(3, TransformBlock::empty()),
        );
        pic.store_coding_unit(0, 8, 3, 1, &left);
        pic.store_coding_unit(8, 0, 3, 1, &above);
        let cands = fill_intra_pred_mode_candidates(&pic, 8, 8, true, true);
        assert_eq!(cands, [IntraPredMode::PLANAR, IntraPredMode::ANGULAR_26, IntraPredMode::DC]);
    }

    #[test]
    fn scan_idx_selection() {
        assert_eq!(intra_scan_idx(2, mode(10), Component::Luma), ScanIdx::Vertical);
        assert_eq!(intra_scan_idx(3, mode(26), Component::Luma), ScanIdx::Horizontal);
        assert_eq!(intra_scan_idx(4, mode(26), Component::Luma), ScanIdx::Diagonal);
        assert_eq!(intra_scan_idx(3, mode(10), Component::Cb), ScanIdx::Diagonal);
        assert_eq!(intra_scan_idx(2, mode(10), Component::Cr), ScanIdx::Vertical);
        assert_eq!(intra_scan_idx(2, IntraPredMode::PLANAR, Component::Luma), ScanIdx::Diagonal);
    }
}
