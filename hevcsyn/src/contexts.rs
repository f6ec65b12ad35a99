use std::ops::{Index, IndexMut};

use crate::cabac::ContextModel;
use crate::params::SliceType;

pub const SPLIT_CU_FLAG: usize = 0;
pub const PART_MODE: usize = 3;
pub const PREV_INTRA_LUMA_PRED_FLAG: usize = 4;
pub const INTRA_CHROMA_PRED_MODE: usize = 5;
pub const SPLIT_TRANSFORM_FLAG: usize = 6;
pub const CBF_LUMA: usize = 9;
pub const CBF_CHROMA: usize = 11;
pub const LAST_SIG_COEFF_X_PREFIX: usize = 15;
pub const LAST_SIG_COEFF_Y_PREFIX: usize = 33;

pub const LAST_SIG_COEFF_PREFIX_CONTEXTS: usize = 18;
pub const NUM_CONTEXTS: usize = LAST_SIG_COEFF_Y_PREFIX + LAST_SIG_COEFF_PREFIX_CONTEXTS;

// Tables 9-5 .. 9-37, one row per initType.
#[rustfmt::skip]
const INIT_VALUES: [[u8; NUM_CONTEXTS]; 3] = [
    [
        // split_cu_flag
        139, 141, 157,
        // part_mode
        184,
        // prev_intra_luma_pred_flag
        184,
        // intra_chroma_pred_mode
        63,
        // split_transform_flag
        153, 138, 138,
        // cbf_luma
        111, 141,
        // cbf_cb, cbf_cr
        94, 138, 182, 154,
        // last_sig_coeff_x_prefix
        110, 110, 124, 125, 140, 153, 125, 127, 140, 109, 111, 143, 127, 111, 79, 108, 123, 63,
        // last_sig_coeff_y_prefix
        110, 110, 124, 125, 140, 153, 125, 127, 140, 109, 111, 143, 127, 111, 79, 108, 123, 63,
    ],
    [
        107, 139, 126,
        154,
        154,
        152,
        124, 138, 94,
        153, 111,
        149, 107, 167, 154,
        125, 110, 94, 110, 95, 79, 125, 111, 110, 78, 110, 111, 111, 95, 94, 108, 123, 108,
        125, 110, 94, 110, 95, 79, 125, 111, 110, 78, 110, 111, 111, 95, 94, 108, 123, 108,
    ],
    [
        107, 139, 126,
        154,
        183,
        152,
        224, 167, 122,
        153, 111,
        149, 92, 167, 154,
        125, 110, 124, 110, 95, 94, 125, 111, 111, 79, 125, 126, 111, 111, 79, 108, 123, 93,
        125, 110, 124, 110, 95, 94, 125, 111, 111, 79, 125, 126, 111, 111, 79, 108, 123, 93,
    ],
];

/// initType selection of 9.3.2.2.
pub fn init_type(slice_type: SliceType, cabac_init_flag: bool) -> usize {
    match (slice_type, cabac_init_flag) {
        (SliceType::I, _) => 0,
        (SliceType::P, false) | (SliceType::B, true) => 1,
        (SliceType::P, true) | (SliceType::B, false) => 2,
    }
}

pub fn element_name(slot: usize) -> &'static str {
    match slot {
        SPLIT_CU_FLAG..PART_MODE => "split_cu_flag",
        PART_MODE => "part_mode",
        PREV_INTRA_LUMA_PRED_FLAG => "prev_intra_luma_pred_flag",
        INTRA_CHROMA_PRED_MODE => "intra_chroma_pred_mode",
        SPLIT_TRANSFORM_FLAG..CBF_LUMA => "split_transform_flag",
        CBF_LUMA..CBF_CHROMA => "cbf_luma",
        CBF_CHROMA..LAST_SIG_COEFF_X_PREFIX => "cbf_chroma",
        LAST_SIG_COEFF_X_PREFIX..LAST_SIG_COEFF_Y_PREFIX => "last_sig_coeff_x_prefix",
        LAST_SIG_COEFF_Y_PREFIX..NUM_CONTEXTS => "last_sig_coeff_y_prefix",
        _ => "unknown",
    }
}

/// Every adaptive context of one slice segment, addressed by the slot
/// constants of this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextTable {
    models: [ContextModel; NUM_CONTEXTS],
}

impl ContextTable {
    pub fn new(slice_type: SliceType, cabac_init_flag: bool, slice_qp: i32) -> Self {
        let row = &INIT_VALUES[init_type(slice_type, cabac_init_flag)];
        Self {
            models: std::array::from_fn(|slot| ContextModel::init(row[slot], slice_qp)),
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&ContextModel> {
        self.models.get(slot)
    }
}

impl Index<usize> for ContextTable {
    type Output = ContextModel;

    fn index(&self, slot: usize) -> &ContextModel {
        &self.models[slot]
    }
}

impl IndexMut<usize> for ContextTable {
    fn index_mut(&mut self, slot: usize) -> &mut ContextModel {
        &mut self.models[slot]
    }
}
