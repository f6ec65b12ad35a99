//! Synthetic intra decision trees for exercising the encoder without an
//! analysis stage in front of it.

use clap::ValueEnum;
use hevcsyn::{
    CodingTree, CodingUnit, IntraPredMode, IntraPredictionUnit, Result, SequenceParams, TbId,
    TransformBlock, TransformTree,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Pattern {
    /// Largest coding units the picture allows, DC prediction, no residual.
    Flat,
    /// Minimum-size NxN units everywhere.
    Nxn,
    /// Checkerboard of split depths with luma and chroma residual.
    Mixed,
}

/// One `CodingTree` per CTB of the picture, in raster order.
pub fn build_picture(seq: &SequenceParams, pattern: Pattern) -> Result<Vec<CodingTree>> {
    let width_in_ctbs = seq.pic_width_in_ctbs();
    (0..seq.pic_size_in_ctbs())
        .map(|addr| {
            let x0 = (addr % width_in_ctbs) << seq.log2_ctb_size;
            let y0 = (addr / width_in_ctbs) << seq.log2_ctb_size;
            build_node(seq, pattern, x0, y0, seq.log2_ctb_size)
        })
        .collect()
}

fn wants_split(pattern: Pattern, x0: u32, y0: u32, log2: u8) -> bool {
    match pattern {
        Pattern::Flat => false,
        Pattern::Nxn => true,
        Pattern::Mixed => ((x0 >> log2) + (y0 >> log2)) % 2 == 0,
    }
}

fn build_node(
    seq: &SequenceParams,
    pattern: Pattern,
    x0: u32,
    y0: u32,
    log2: u8,
) -> Result<CodingTree> {
    let size = 1u32 << log2;
    let inside = x0 + size <= seq.pic_width && y0 + size <= seq.pic_height;
    let split = log2 > seq.log2_min_cb_size && (!inside || wants_split(pattern, x0, y0, log2));
    if !split {
        return build_cu(seq, pattern, x0, y0, log2).map(CodingTree::leaf);
    }

    let half = size >> 1;
    let mut children: [Option<CodingTree>; 4] = Default::default();
    for (i, slot) in children.iter_mut().enumerate() {
        let x = x0 + half * (i as u32 & 1);
        let y = y0 + half * (i as u32 >> 1);
        if x < seq.pic_width && y < seq.pic_height {
            *slot = Some(build_node(seq, pattern, x, y, log2 - 1)?);
        }
    }
    Ok(CodingTree::split(children))
}

fn mode_at(x: u32, y: u32) -> IntraPredMode {
    let m = ((x >> 2) * 7 + (y >> 2) * 3) % u32::from(IntraPredMode::COUNT);
    IntraPredMode::new(m as u8).unwrap_or_default()
}

/// Residual placement for the leaves of one coding unit.
#[derive(Debug, Clone, Copy)]
struct Content {
    residual: bool,
    chroma: bool,
    seed: u32,
}

fn build_cu(
    seq: &SequenceParams,
    pattern: Pattern,
    x0: u32,
    y0: u32,
    log2: u8,
) -> Result<CodingUnit> {
    let at_min = log2 == seq.log2_min_cb_size;
    let nxn = at_min
        && match pattern {
            Pattern::Flat => false,
            Pattern::Nxn => true,
            Pattern::Mixed => (x0 >> log2) % 2 == 1,
        };
    let content = Content {
        residual: pattern == Pattern::Mixed,
        chroma: pattern == Pattern::Mixed && (y0 >> log2) % 2 == 0,
        seed: x0 * 31 + y0 * 17,
    };

    let transform_tree = build_transform_tree(seq, log2, nxn, content)?;
    if nxn {
        let half = 1u32 << (log2 - 1);
        let pus = std::array::from_fn(|i| {
            let mode = mode_at(x0 + half * (i as u32 & 1), y0 + half * (i as u32 >> 1));
            IntraPredictionUnit::derived_chroma(mode)
        });
        return Ok(CodingUnit::intra_nxn(pus, transform_tree));
    }

    let mode = match pattern {
        Pattern::Flat => IntraPredMode::DC,
        _ => mode_at(x0, y0),
    };
    // Planar chroma under a non-planar luma exercises the explicit chroma codes.
    let chroma = if content.chroma && mode != IntraPredMode::PLANAR {
        IntraPredMode::PLANAR
    } else {
        mode
    };
    Ok(CodingUnit::intra(IntraPredictionUnit::new(mode, chroma), transform_tree))
}

fn build_transform_tree(
    seq: &SequenceParams,
    log2: u8,
    intra_split: bool,
    content: Content,
) -> Result<TransformTree> {
    let mut tt = TransformTree::leaf(log2, leaf_block(log2, 0, content));
    let root = tt.root();
    split_forced(&mut tt, root, seq, intra_split, content)?;
    Ok(tt)
}

/// Splits only where the syntax leaves no choice.
fn split_forced(
    tt: &mut TransformTree,
    id: TbId,
    seq: &SequenceParams,
    intra_split: bool,
    content: Content,
) -> Result<()> {
    let (log2, depth) = {
        let node = tt.node(id);
        (node.log2_size, node.depth)
    };
    if !(log2 > seq.log2_max_tb_size || (intra_split && depth == 0)) {
        return Ok(());
    }

    tt.node_mut(id).block = TransformBlock::chroma_flags(content.chroma, false);
    let children = std::array::from_fn(|i| leaf_block(log2 - 1, i, content));
    for child in tt.split(id, children)? {
        split_forced(tt, child, seq, intra_split, content)?;
    }
    Ok(())
}

fn leaf_block(log2: u8, blk_idx: usize, content: Content) -> TransformBlock {
    if !content.residual {
        return TransformBlock::empty();
    }
    let n = 1usize << (2 * log2);
    let mut luma = vec![0i16; n];
    luma[0] = 8;
    luma[(content.seed as usize + blk_idx * 5) % n] = -2;

    let carries_chroma = content.chroma && (log2 > 2 || blk_idx == 3);
    let cb = if carries_chroma {
        let chroma_log2 = if log2 > 2 { log2 - 1 } else { 2 };
        let mut cb = vec![0i16; 1 << (2 * chroma_log2)];
        let idx = content.seed as usize % cb.len();
        cb[idx] = 1;
        cb
    } else {
        Vec::new()
    };
    TransformBlock::from_coefficients(luma, cb, Vec::new())
}
