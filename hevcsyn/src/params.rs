use crate::error::{EncodeError, Result};

pub const DEFAULT_SLICE_QP: i32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceType {
    B,
    P,
    I,
}

/// The subset of SPS/PPS fields that shape slice_segment_data().
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceParams {
    pub pic_width: u32,
    pub pic_height: u32,
    pub log2_ctb_size: u8,
    pub log2_min_cb_size: u8,
    pub log2_min_tb_size: u8,
    pub log2_max_tb_size: u8,
    pub max_transform_hierarchy_depth_intra: u8,
    pub max_transform_hierarchy_depth_inter: u8,
    pub transform_skip_enabled: bool,
    pub cu_qp_delta_enabled: bool,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            pic_width: 64,
            pic_height: 64,
            log2_ctb_size: 4,
            log2_min_cb_size: 3,
            log2_min_tb_size: 2,
            log2_max_tb_size: 4,
            max_transform_hierarchy_depth_intra: 1,
            max_transform_hierarchy_depth_inter: 1,
            transform_skip_enabled: false,
            cu_qp_delta_enabled: false,
        }
    }
}

impl SequenceParams {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(EncodeError::InvalidParams(msg));

        if !(4..=6).contains(&self.log2_ctb_size) {
            return invalid(format!("log2_ctb_size {} not in 4..=6", self.log2_ctb_size));
        }
        if !(3..=self.log2_ctb_size).contains(&self.log2_min_cb_size) {
            return invalid(format!(
                "log2_min_cb_size {} not in 3..={}",
                self.log2_min_cb_size, self.log2_ctb_size
            ));
        }
        if self.log2_min_tb_size < 2 || self.log2_min_tb_size >= self.log2_min_cb_size {
            return invalid(format!(
                "log2_min_tb_size {} must be at least 2 and below log2_min_cb_size {}",
                self.log2_min_tb_size, self.log2_min_cb_size
            ));
        }
        let max_tb_limit = self.log2_ctb_size.min(5);
        if !(self.log2_min_tb_size..=max_tb_limit).contains(&self.log2_max_tb_size) {
            return invalid(format!(
                "log2_max_tb_size {} not in {}..={}",
                self.log2_max_tb_size, self.log2_min_tb_size, max_tb_limit
            ));
        }
        let depth_limit = self.log2_ctb_size - self.log2_min_tb_size;
        for (name, depth) in [
            ("max_transform_hierarchy_depth_intra", self.max_transform_hierarchy_depth_intra),
            ("max_transform_hierarchy_depth_inter", self.max_transform_hierarchy_depth_inter),
        ] {
            if depth > depth_limit {
                return invalid(format!("{name} {depth} exceeds {depth_limit}"));
            }
        }

        let min_cb = self.min_cb_size();
        if self.pic_width == 0
            || self.pic_height == 0
            || self.pic_width % min_cb != 0
            || self.pic_height % min_cb != 0
        {
            return invalid(format!(
                "picture {}x{} is not a non-empty multiple of the {min_cb}x{min_cb} min CB",
                self.pic_width, self.pic_height
            ));
        }
        if self.pic_width > 8192 || self.pic_height > 4320 {
            return invalid(format!(
                "picture {}x{} exceeds 8192x4320",
                self.pic_width, self.pic_height
            ));
        }
        Ok(())
    }

    pub fn ctb_size(&self) -> u32 {
        1 << self.log2_ctb_size
    }

    pub fn min_cb_size(&self) -> u32 {
        1 << self.log2_min_cb_size
    }

    pub fn pic_width_in_ctbs(&self) -> u32 {
        self.pic_width.div_ceil(self.ctb_size())
    }

    pub fn pic_height_in_ctbs(&self) -> u32 {
        self.pic_height.div_ceil(self.ctb_size())
    }

    pub fn pic_size_in_ctbs(&self) -> u32 {
        self.pic_width_in_ctbs() * self.pic_height_in_ctbs()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceParams {
    pub slice_type: SliceType,
    pub slice_qp: i32,
    pub cabac_init_flag: bool,
    /// First CTB of the segment, in raster scan.
    pub slice_segment_address: u32,
}

impl Default for SliceParams {
    fn default() -> Self {
        Self {
            slice_type: SliceType::I,
            slice_qp: DEFAULT_SLICE_QP,
            cabac_init_flag: false,
            slice_segment_address: 0,
        }
    }
}

impl SliceParams {
    pub fn validate(&self, seq: &SequenceParams) -> Result<()> {
        if !(0..=51).contains(&self.slice_qp) {
            return Err(EncodeError::InvalidParams(format!(
                "slice_qp {} not in 0..=51",
                self.slice_qp
            )));
        }
        if self.slice_segment_address >= seq.pic_size_in_ctbs() {
            return Err(EncodeError::InvalidParams(format!(
                "slice_segment_address {} beyond the picture's {} CTBs",
                self.slice_segment_address,
                seq.pic_size_in_ctbs()
            )));
        }
        Ok(())
    }
}
