use crate::params::SequenceParams;
use crate::tree::{CodingUnit, IntraPredMode, PartMode, PredMode};

/// Neighbour queries the syntax layer needs, plus the hook that records each
/// coding unit as it is coded so later blocks can see it.
pub trait PictureMetadata {
    fn log2_ctb_size(&self) -> u8;

    /// Whether the block at (x_n, y_n) can serve as a neighbour of the block
    /// at (x_curr, y_curr): inside the picture, already coded, same slice.
    fn neighbor_available(&self, x_curr: u32, y_curr: u32, x_n: i32, y_n: i32) -> bool;

    fn ct_depth(&self, x: u32, y: u32) -> u8;

    fn pred_mode(&self, x: u32, y: u32) -> PredMode;

    fn intra_pred_mode(&self, x: u32, y: u32) -> IntraPredMode;

    /// Marks a CTB as belonging to the slice starting at `slice_addr_rs`.
    fn start_ctb(&mut self, ctb_addr_rs: u32, slice_addr_rs: u32);

    fn store_coding_unit(
        &mut self,
        x0: u32,
        y0: u32,
        log2_cb_size: u8,
        ct_depth: u8,
        cu: &CodingUnit,
    );
}

/// Per-block values on a grid of `1 << log2_unit` square units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaGrid<T> {
    width_in_units: u32,
    height_in_units: u32,
    log2_unit: u8,
    data: Vec<T>,
}

impl<T: Copy> MetaGrid<T> {
    pub fn new(width: u32, height: u32, log2_unit: u8, init: T) -> Self {
        let width_in_units = width.div_ceil(1 << log2_unit);
        let height_in_units = height.div_ceil(1 << log2_unit);
        Self {
            width_in_units,
            height_in_units,
            log2_unit,
            data: vec![init; (width_in_units * height_in_units) as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> T {
        let ux = x >> self.log2_unit;
        let uy = y >> self.log2_unit;
        self.data[(uy * self.width_in_units + ux) as usize]
    }

    /// Fills the square block at (x, y), clipped to the grid.
    pub fn set_block(&mut self, x: u32, y: u32, log2_size: u8, value: T) {
        let units = (1u32 << log2_size.max(self.log2_unit)) >> self.log2_unit;
        let ux0 = x >> self.log2_unit;
        let uy0 = y >> self.log2_unit;
        let ux1 = (ux0 + units).min(self.width_in_units);
        let uy1 = (uy0 + units).min(self.height_in_units);
        for uy in uy0..uy1 {
            let row = (uy * self.width_in_units) as usize;
            self.data[row + ux0 as usize..row + ux1 as usize].fill(value);
        }
    }
}

/// Picture-side state for one picture: decided depths and modes on a 4x4
/// grid plus the slice each CTB belongs to.
#[derive(Debug, Clone)]
pub struct PictureInfo {
    width: u32,
    height: u32,
    log2_ctb_size: u8,
    width_in_ctbs: u32,
    ctb_slice_addr: Vec<Option<u32>>,
    ct_depth: MetaGrid<u8>,
    pred_mode: MetaGrid<PredMode>,
    intra_mode: MetaGrid<IntraPredMode>,
}

const LOG2_GRID_UNIT: u8 = 2;

impl PictureInfo {
    pub fn new(seq: &SequenceParams) -> Self {
        let (w, h) = (seq.pic_width, seq.pic_height);
        Self {
            width: w,
            height: h,
            log2_ctb_size: seq.log2_ctb_size,
            width_in_ctbs: seq.pic_width_in_ctbs(),
            ctb_slice_addr: vec![None; seq.pic_size_in_ctbs() as usize],
            ct_depth: MetaGrid::new(w, h, LOG2_GRID_UNIT, 0),
            pred_mode: MetaGrid::new(w, h, LOG2_GRID_UNIT, PredMode::Intra),
            intra_mode: MetaGrid::new(w, h, LOG2_GRID_UNIT, IntraPredMode::DC),
        }
    }

    fn ctb_addr(&self, x: u32, y: u32) -> usize {
        ((y >> self.log2_ctb_size) * self.width_in_ctbs + (x >> self.log2_ctb_size)) as usize
    }

    pub fn slice_addr_at(&self, x: u32, y: u32) -> Option<u32> {
        self.ctb_slice_addr[self.ctb_addr(x, y)]
    }
}

impl PictureMetadata for PictureInfo {
    fn log2_ctb_size(&self) -> u8 {
        self.log2_ctb_size
    }

    fn neighbor_available(&self, x_curr: u32, y_curr: u32, x_n: i32, y_n: i32) -> bool {
        if x_n < 0 || y_n < 0 {
            return false;
        }
        let (x_n, y_n) = (x_n as u32, y_n as u32);
        if x_n >= self.width || y_n >= self.height {
            return false;
        }
        match (self.slice_addr_at(x_curr, y_curr), self.slice_addr_at(x_n, y_n)) {
            (Some(curr), Some(neighbor)) => curr == neighbor,
            _ => false,
        }
    }

    fn ct_depth(&self, x: u32, y: u32) -> u8 {
        self.ct_depth.get(x, y)
    }

    fn pred_mode(&self, x: u32, y: u32) -> PredMode {
        self.pred_mode.get(x, y)
    }

    fn intra_pred_mode(&self, x: u32, y: u32) -> IntraPredMode {
        self.intra_mode.get(x, y)
    }

    fn start_ctb(&mut self, ctb_addr_rs: u32, slice_addr_rs: u32) {
        if let Some(slot) = self.ctb_slice_addr.get_mut(ctb_addr_rs as usize) {
            *slot = Some(slice_addr_rs);
        }
    }

    fn store_coding_unit(
        &mut self,
        x0: u32,
        y0: u32,
        log2_cb_size: u8,
        ct_depth: u8,
        cu: &CodingUnit,
    ) {
        self.ct_depth.set_block(x0, y0, log2_cb_size, ct_depth);
        self.pred_mode.set_block(x0, y0, log2_cb_size, cu.pred_mode);
        if !cu.is_intra() {
            return;
        }

        if cu.part_mode == PartMode::PartNxN {
            let half = 1u32 << (log2_cb_size - 1);
            for i in 0..4u32 {
                let (dx, dy) = (half * (i & 1), half * (i >> 1));
                if let Some(pu) = cu.prediction_unit_at(dx, dy, log2_cb_size) {
                    self.intra_mode.set_block(x0 + dx, y0 + dy, log2_cb_size - 1, pu.luma_mode);
                }
            }
        } else if let Some(pu) = cu.prediction_units.first() {
            self.intra_mode.set_block(x0, y0, log2_cb_size, pu.luma_mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{IntraPredictionUnit, TransformBlock, TransformTree};

    fn pic() -> PictureInfo {
        PictureInfo::new(&SequenceParams::default())
    }

    #[test]
    fn grid_block_fill_is_clipped() {
        let mut g = MetaGrid::new(20, 12, 2, 0u8);
        g.set_block(16, 8, 4, 7);
        assert_eq!(g.get(16, 8), 7);
        assert_eq!(g.get(19, 11), 7);
        assert_eq!(g.get(12, 8), 0);
    }

    #[test]
    fn neighbors_outside_picture_unavailable() {
        let mut p = pic();
        p.start_ctb(0, 0);
        assert!(!p.neighbor_available(0, 0, -1, 0));
        assert!(!p.neighbor_available(0, 0, 0, -1));
        assert!(!p.neighbor_available(60, 0, 64, 0));
    }

    #[test]
    fn uncoded_ctb_unavailable() {
        let mut p = pic();
        p.start_ctb(0, 0);
        assert!(!p.neighbor_available(0, 0, 16, 0));
        p.start_ctb(1, 0);
        assert!(p.neighbor_available(16, 0, 15, 0));
    }

    #[test]
    fn other_slice_unavailable() {
        let mut p = pic();
        p.start_ctb(0, 0);
        p.start_ctb(1, 1);
        assert!(!p.neighbor_available(16, 0, 15, 0));
    }

    #[test]
    fn nxn_store_writes_each_quadrant() {
        let mut p = pic();
        let modes = [0u8, 1, 10, 26]
            .map(|m| IntraPredictionUnit::derived_chroma(IntraPredMode::new(m).unwrap()));
        let cu = CodingUnit::intra_nxn(modes, TransformTree::leaf(3, TransformBlock::empty()));
        p.store_coding_unit(8, 8, 3, 1, &cu);
        assert_eq!(p.intra_pred_mode(8, 8), IntraPredMode::PLANAR);
        assert_eq!(p.intra_pred_mode(12, 8), IntraPredMode::DC);
        assert_eq!(p.intra_pred_mode(8, 12), IntraPredMode::ANGULAR_10);
        assert_eq!(p.intra_pred_mode(15, 15), IntraPredMode::ANGULAR_26);
        assert_eq!(p.ct_depth(15, 15), 1);
        assert_eq!(p.ct_depth(16, 16), 0);
    }
}
