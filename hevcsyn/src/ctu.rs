use tracing::{debug, trace};

use crate::error::{EncodeError, Result, Unsupported};
use crate::intra::{
    LumaModeCode, derive_chroma_code, fill_intra_pred_mode_candidates, find_intra_pred_mode,
    intra_scan_idx,
};
use crate::params::{SequenceParams, SliceParams, SliceType};
use crate::picture::PictureMetadata;
use crate::residual::encode_residual_position;
use crate::scan::ScanIdx;
use crate::syntax::{
    encode_cbf_chroma, encode_cbf_luma, encode_end_of_slice_segment_flag,
    encode_intra_chroma_pred_mode, encode_mpm_idx_or_rem, encode_part_mode,
    encode_prev_intra_luma_pred_flag, encode_split_cu_flag, encode_split_transform_flag,
    split_cu_flag_context,
};
use crate::tree::{CodingTree, CodingUnit, Component, PartMode, PredMode, TbId};
use crate::writer::BinWriter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceStats {
    pub ctbs: usize,
    pub coding_units: usize,
    pub transform_units: usize,
    pub residual_blocks: usize,
}

/// Per coding unit values the transform tree walk needs.
struct CuContext<'c> {
    cu: &'c CodingUnit,
    max_trafo_depth: u8,
    intra_split: bool,
}

/// Emits slice_segment_data() for one slice segment of an I picture.
pub struct SliceEncoder<'a, W: BinWriter, P: PictureMetadata> {
    seq: &'a SequenceParams,
    slice: &'a SliceParams,
    pic: &'a mut P,
    writer: W,
    stats: SliceStats,
}

impl<'a, W: BinWriter, P: PictureMetadata> SliceEncoder<'a, W, P> {
    pub fn new(
        seq: &'a SequenceParams,
        slice: &'a SliceParams,
        pic: &'a mut P,
        writer: W,
    ) -> Result<Self> {
        seq.validate()?;
        slice.validate(seq)?;
        if slice.slice_type != SliceType::I {
            return Err(EncodeError::Unimplemented(Unsupported::InterSlice));
        }
        Ok(Self {
            seq,
            slice,
            pic,
            writer,
            stats: SliceStats::default(),
        })
    }

    pub fn stats(&self) -> SliceStats {
        self.stats
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Codes consecutive CTBs starting at the slice segment address, each
    /// followed by end_of_slice_segment_flag.
    pub fn encode_slice(&mut self, ctbs: &[CodingTree]) -> Result<()> {
        if ctbs.is_empty() {
            return Err(EncodeError::MalformedTree("slice segment without CTBs"));
        }
        let first = self.slice.slice_segment_address;
        let available = self.seq.pic_size_in_ctbs() - first;
        if ctbs.len() > available as usize {
            return Err(EncodeError::InvalidParams(format!(
                "{} CTBs do not fit after address {first} ({available} remain)",
                ctbs.len()
            )));
        }

        debug!(first, count = ctbs.len(), "slice segment");
        for (i, tree) in ctbs.iter().enumerate() {
            self.encode_ctb(first + i as u32, tree)?;
            encode_end_of_slice_segment_flag(&mut self.writer, i + 1 == ctbs.len());
        }
        Ok(())
    }

    pub fn encode_ctb(&mut self, ctb_addr_rs: u32, tree: &CodingTree) -> Result<()> {
        let width_in_ctbs = self.seq.pic_width_in_ctbs();
        let log2_ctb = self.seq.log2_ctb_size;
        let x0 = (ctb_addr_rs % width_in_ctbs) << log2_ctb;
        let y0 = (ctb_addr_rs / width_in_ctbs) << log2_ctb;
        debug!(ctb_addr_rs, x0, y0, "ctb");

        self.pic.start_ctb(ctb_addr_rs, self.slice.slice_segment_address);
        self.encode_quadtree(tree, x0, y0, log2_ctb, 0)?;
        self.stats.ctbs += 1;
        Ok(())
    }

    fn encode_quadtree(
        &mut self,
        tree: &CodingTree,
        x0: u32,
        y0: u32,
        log2_cb_size: u8,
        ct_depth: u8,
    ) -> Result<()> {
        let size = 1u32 << log2_cb_size;
        let (width, height) = (self.seq.pic_width, self.seq.pic_height);
        let min_cb = self.seq.log2_min_cb_size;

        if x0 + size <= width && y0 + size <= height && log2_cb_size > min_cb {
            let (xl, ya) = (x0 as i32 - 1, y0 as i32 - 1);
            let avail_l = self.pic.neighbor_available(x0, y0, xl, y0 as i32);
            let avail_a = self.pic.neighbor_available(x0, y0, x0 as i32, ya);
            let depth_l = if avail_l { self.pic.ct_depth(x0 - 1, y0) } else { 0 };
            let depth_a = if avail_a { self.pic.ct_depth(x0, y0 - 1) } else { 0 };
            let ctx = split_cu_flag_context(avail_l, depth_l, avail_a, depth_a, ct_depth);
            encode_split_cu_flag(&mut self.writer, ctx, tree.is_split());
        } else {
            // Boundary-overlapping blocks must split, minimum-size blocks cannot.
            let forced = log2_cb_size > min_cb;
            if forced != tree.is_split() {
                return Err(EncodeError::ForcedSplitMismatch {
                    element: "split_cu_flag",
                    x: x0,
                    y: y0,
                    log2_size: log2_cb_size,
                    forced,
                    actual: tree.is_split(),
                });
            }
        }

        match tree {
            CodingTree::Split(children) => {
                let half = size >> 1;
                for (i, child) in children.iter().enumerate() {
                    let x = x0 + half * (i as u32 & 1);
                    let y = y0 + half * (i as u32 >> 1);
                    if x >= width || y >= height {
                        if child.is_some() {
                            return Err(EncodeError::MalformedTree(
                                "coding quadrant outside the picture",
                            ));
                        }
                        continue;
                    }
                    let child = child.as_ref().ok_or(EncodeError::MalformedTree(
                        "missing coding quadrant inside the picture",
                    ))?;
                    self.encode_quadtree(child, x, y, log2_cb_size - 1, ct_depth + 1)?;
                }
                Ok(())
            }
            CodingTree::Leaf(cu) => self.encode_coding_unit(cu, x0, y0, log2_cb_size, ct_depth),
        }
    }

    fn encode_coding_unit(
        &mut self,
        cu: &CodingUnit,
        x0: u32,
        y0: u32,
        log2_cb_size: u8,
        ct_depth: u8,
    ) -> Result<()> {
        trace!(x0, y0, log2_cb_size, "coding_unit");
        if cu.pred_mode == PredMode::Intra
            && cu.prediction_units.len() != cu.part_mode.num_prediction_units()
        {
            return Err(EncodeError::MalformedTree(
                "prediction unit count does not match part_mode",
            ));
        }

        // Recorded first so NxN units see their left and upper siblings.
        self.pic.store_coding_unit(x0, y0, log2_cb_size, ct_depth, cu);

        let mut part_mode = PartMode::Part2Nx2N;
        if cu.pred_mode != PredMode::Intra || log2_cb_size == self.seq.log2_min_cb_size {
            part_mode = cu.part_mode;
            encode_part_mode(&mut self.writer, cu.pred_mode, part_mode)?;
        } else if cu.part_mode != PartMode::Part2Nx2N {
            return Err(EncodeError::MalformedTree(
                "NxN partition above the minimum coding block size",
            ));
        }

        let intra_split = part_mode == PartMode::PartNxN;
        self.encode_intra_modes(cu, x0, y0, log2_cb_size, intra_split)?;

        let root = cu.transform_tree.root();
        let root_node = cu.transform_tree.node(root);
        if root_node.log2_size != log2_cb_size || root_node.depth != 0 {
            return Err(EncodeError::MalformedTree(
                "transform tree root does not cover the coding unit",
            ));
        }

        let max_trafo_depth = self.seq.max_transform_hierarchy_depth_intra + intra_split as u8;
        let ctx = CuContext {
            cu,
            max_trafo_depth,
            intra_split,
        };
        self.encode_transform_tree(&ctx, root, x0, y0, x0, y0, log2_cb_size, 0, 0)?;
        self.stats.coding_units += 1;
        Ok(())
    }

    fn encode_intra_modes(
        &mut self,
        cu: &CodingUnit,
        x0: u32,
        y0: u32,
        log2_cb_size: u8,
        intra_split: bool,
    ) -> Result<()> {
        let avail_a0 = self.pic.neighbor_available(x0, y0, x0 as i32 - 1, y0 as i32);
        let avail_b0 = self.pic.neighbor_available(x0, y0, x0 as i32, y0 as i32 - 1);

        let mut codes = [LumaModeCode::MpmIdx(0); 4];
        let num_pu = if intra_split { 4 } else { 1 };
        let half = 1u32 << (log2_cb_size - 1);
        for (idx, pu) in cu.prediction_units.iter().enumerate().take(num_pu) {
            let (i, j) = (idx as u32 & 1, idx as u32 >> 1);
            // Inner units always have their sibling to the left or above.
            let avail_a = avail_a0 || i > 0;
            let avail_b = avail_b0 || j > 0;
            let (x_pb, y_pb) = (x0 + i * half, y0 + j * half);
            let candidates =
                fill_intra_pred_mode_candidates(&*self.pic, x_pb, y_pb, avail_a, avail_b);
            codes[idx] = find_intra_pred_mode(pu.luma_mode, candidates);
        }

        for &code in &codes[..num_pu] {
            encode_prev_intra_luma_pred_flag(&mut self.writer, code);
        }
        for &code in &codes[..num_pu] {
            encode_mpm_idx_or_rem(&mut self.writer, code)?;
        }

        let pu0 = cu.prediction_units[0];
        let chroma = derive_chroma_code(pu0.chroma_mode, pu0.luma_mode)?;
        encode_intra_chroma_pred_mode(&mut self.writer, chroma);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_transform_tree(
        &mut self,
        ctx: &CuContext<'_>,
        id: TbId,
        x0: u32,
        y0: u32,
        x_base: u32,
        y_base: u32,
        log2_trafo_size: u8,
        trafo_depth: u8,
        blk_idx: usize,
    ) -> Result<()> {
        let tt = &ctx.cu.transform_tree;
        let node = tt.node(id);
        if node.log2_size != log2_trafo_size || node.depth != trafo_depth {
            return Err(EncodeError::MalformedTree(
                "transform node size or depth disagrees with its position",
            ));
        }
        let split = node.split_transform_flag();

        let seq = self.seq;
        if log2_trafo_size <= seq.log2_max_tb_size
            && log2_trafo_size > seq.log2_min_tb_size
            && trafo_depth < ctx.max_trafo_depth
            && !(ctx.intra_split && trafo_depth == 0)
        {
            encode_split_transform_flag(&mut self.writer, log2_trafo_size, split)?;
        } else {
            let forced =
                log2_trafo_size > seq.log2_max_tb_size || (ctx.intra_split && trafo_depth == 0);
            if forced != split {
                return Err(EncodeError::ForcedSplitMismatch {
                    element: "split_transform_flag",
                    x: x0,
                    y: y0,
                    log2_size: log2_trafo_size,
                    forced,
                    actual: split,
                });
            }
        }

        if log2_trafo_size > 2 {
            let parent = tt.parent(id);
            for component in [Component::Cb, Component::Cr] {
                let cbf = node.block.cbf(component);
                if trafo_depth == 0 || parent.is_some_and(|p| p.block.cbf(component)) {
                    encode_cbf_chroma(&mut self.writer, trafo_depth, cbf)?;
                } else if cbf {
                    return Err(EncodeError::MalformedTree(
                        "chroma cbf set below a parent without it",
                    ));
                }
            }
        }

        if let Some(children) = node.children() {
            let half = 1u32 << (log2_trafo_size - 1);
            for (i, child) in children.into_iter().enumerate() {
                let x = x0 + half * (i as u32 & 1);
                let y = y0 + half * (i as u32 >> 1);
                let (log2, depth) = (log2_trafo_size - 1, trafo_depth + 1);
                self.encode_transform_tree(ctx, child, x, y, x0, y0, log2, depth, i)?;
            }
            return Ok(());
        }

        let cbf_cb = tt.chroma_cbf(id, Component::Cb);
        let cbf_cr = tt.chroma_cbf(id, Component::Cr);
        if ctx.cu.pred_mode == PredMode::Intra || trafo_depth != 0 || cbf_cb || cbf_cr {
            encode_cbf_luma(&mut self.writer, trafo_depth, node.block.cbf_luma);
        } else if !node.block.cbf_luma {
            return Err(EncodeError::MalformedTree("inferred cbf_luma without a luma residual"));
        }

        self.encode_transform_unit(ctx, id, x0, y0, x_base, y_base, log2_trafo_size, blk_idx)
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_transform_unit(
        &mut self,
        ctx: &CuContext<'_>,
        id: TbId,
        x0: u32,
        y0: u32,
        x_base: u32,
        y_base: u32,
        log2_trafo_size: u8,
        blk_idx: usize,
    ) -> Result<()> {
        let tt = &ctx.cu.transform_tree;
        let block = &tt.node(id).block;
        let cbf_cb = tt.chroma_cbf(id, Component::Cb);
        let cbf_cr = tt.chroma_cbf(id, Component::Cr);
        self.stats.transform_units += 1;

        if !(block.cbf_luma || cbf_cb || cbf_cr) {
            return Ok(());
        }
        if self.seq.cu_qp_delta_enabled {
            return Err(EncodeError::Unimplemented(Unsupported::CuQpDelta));
        }

        if block.cbf_luma {
            let luma = block.coefficients(Component::Luma);
            self.encode_residual(ctx, luma, x0, y0, log2_trafo_size, Component::Luma)?;
        }

        if log2_trafo_size > 2 {
            for component in [Component::Cb, Component::Cr] {
                if block.cbf(component) {
                    let coeffs = block.coefficients(component);
                    self.encode_residual(ctx, coeffs, x0, y0, log2_trafo_size - 1, component)?;
                }
            }
        } else if blk_idx == 3 {
            // 4x4 chroma of the whole 8x8 parent, carried by the last sibling.
            for (component, cbf) in [(Component::Cb, cbf_cb), (Component::Cr, cbf_cr)] {
                if cbf {
                    let coeffs = block.coefficients(component);
                    self.encode_residual(ctx, coeffs, x_base, y_base, log2_trafo_size, component)?;
                }
            }
        }
        Ok(())
    }

    fn encode_residual(
        &mut self,
        ctx: &CuContext<'_>,
        coeffs: &[i16],
        x0: u32,
        y0: u32,
        log2_trafo_size: u8,
        component: Component,
    ) -> Result<()> {
        if self.seq.transform_skip_enabled && log2_trafo_size <= 2 {
            return Err(EncodeError::Unimplemented(Unsupported::TransformSkip));
        }

        let scan_idx = if ctx.cu.pred_mode == PredMode::Intra {
            let mode = match component {
                Component::Luma => self.pic.intra_pred_mode(x0, y0),
                Component::Cb | Component::Cr => ctx.cu.prediction_units[0].chroma_mode,
            };
            intra_scan_idx(log2_trafo_size, mode, component)
        } else {
            ScanIdx::Diagonal
        };

        let coded = encode_residual_position(
            &mut self.writer,
            coeffs,
            log2_trafo_size,
            component,
            scan_idx,
        )?;
        trace!(?component, ?scan_idx, coded_sub_blocks = coded.coded_count(), "residual_coding");
        self.stats.residual_blocks += 1;
        Ok(())
    }
}
