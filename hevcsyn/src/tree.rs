//! Decision trees consumed by the slice encoder.
//!
//! A `CodingTree` is the coding quadtree of one CTB. Each leaf owns a
//! `CodingUnit` whose transform tree is an arena of nodes addressed by
//! `TbId`, with parent links for the chroma cbf inheritance of 4x4 blocks.

use crate::error::{EncodeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Luma = 0,
    Cb = 1,
    Cr = 2,
}

impl Component {
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredMode {
    Intra,
    Inter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartMode {
    Part2Nx2N,
    Part2NxN,
    PartNx2N,
    PartNxN,
    Part2NxnU,
    Part2NxnD,
    PartnLx2N,
    PartnRx2N,
}

impl PartMode {
    pub fn num_prediction_units(self) -> usize {
        match self {
            PartMode::Part2Nx2N => 1,
            PartMode::PartNxN => 4,
            _ => 2,
        }
    }
}

/// One of the 35 intra prediction directions: 0 planar, 1 DC, 2..=34 angular.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntraPredMode(pub(crate) u8);

impl IntraPredMode {
    pub const PLANAR: Self = Self(0);
    pub const DC: Self = Self(1);
    pub const ANGULAR_10: Self = Self(10);
    pub const ANGULAR_26: Self = Self(26);
    pub const ANGULAR_34: Self = Self(34);

    pub const COUNT: u8 = 35;

    pub fn new(mode: u8) -> Option<Self> {
        (mode < Self::COUNT).then_some(Self(mode))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).map(Self)
    }
}

impl Default for IntraPredMode {
    fn default() -> Self {
        Self::DC
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntraPredictionUnit {
    pub luma_mode: IntraPredMode,
    /// The chroma direction actually used; equal to `luma_mode` for the
    /// derived-from-luma case.
    pub chroma_mode: IntraPredMode,
}

impl IntraPredictionUnit {
    pub fn new(luma_mode: IntraPredMode, chroma_mode: IntraPredMode) -> Self {
        Self {
            luma_mode,
            chroma_mode,
        }
    }

    pub fn derived_chroma(luma_mode: IntraPredMode) -> Self {
        Self::new(luma_mode, luma_mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TbId(usize);

impl TbId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Flags and residual of one transform block node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformBlock {
    pub cbf_luma: bool,
    pub cbf_cb: bool,
    pub cbf_cr: bool,
    /// Row-major coefficients per component; empty when the component is absent.
    pub coefficients: [Vec<i16>; 3],
}

impl TransformBlock {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a block whose cbfs follow the coefficient content.
    pub fn from_coefficients(luma: Vec<i16>, cb: Vec<i16>, cr: Vec<i16>) -> Self {
        let nonzero = |c: &[i16]| c.iter().any(|&v| v != 0);
        Self {
            cbf_luma: nonzero(&luma),
            cbf_cb: nonzero(&cb),
            cbf_cr: nonzero(&cr),
            coefficients: [luma, cb, cr],
        }
    }

    pub fn with_luma(luma: Vec<i16>) -> Self {
        Self::from_coefficients(luma, Vec::new(), Vec::new())
    }

    /// Chroma cbfs for a split node, which carries no residual of its own.
    pub fn chroma_flags(cbf_cb: bool, cbf_cr: bool) -> Self {
        Self {
            cbf_cb,
            cbf_cr,
            ..Self::default()
        }
    }

    pub fn cbf(&self, component: Component) -> bool {
        match component {
            Component::Luma => self.cbf_luma,
            Component::Cb => self.cbf_cb,
            Component::Cr => self.cbf_cr,
        }
    }

    pub fn coefficients(&self, component: Component) -> &[i16] {
        &self.coefficients[component.index()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformNode {
    pub block: TransformBlock,
    pub log2_size: u8,
    pub depth: u8,
    parent: Option<TbId>,
    children: Option<[TbId; 4]>,
}

impl TransformNode {
    pub fn split_transform_flag(&self) -> bool {
        self.children.is_some()
    }

    pub fn parent(&self) -> Option<TbId> {
        self.parent
    }

    pub fn children(&self) -> Option<[TbId; 4]> {
        self.children
    }
}

/// Arena-backed transform tree of one coding unit, root at `TbId(0)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformTree {
    nodes: Vec<TransformNode>,
}

impl TransformTree {
    pub fn leaf(log2_size: u8, block: TransformBlock) -> Self {
        Self {
            nodes: vec![TransformNode {
                block,
                log2_size,
                depth: 0,
                parent: None,
                children: None,
            }],
        }
    }

    pub fn root(&self) -> TbId {
        TbId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: TbId) -> &TransformNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: TbId) -> &mut TransformNode {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: TbId) -> Option<&TransformNode> {
        self.nodes[id.0].parent.map(|p| &self.nodes[p.0])
    }

    /// Turns a leaf into a split node with four children in Z order.
    pub fn split(&mut self, id: TbId, children: [TransformBlock; 4]) -> Result<[TbId; 4]> {
        let node = self
            .nodes
            .get(id.0)
            .ok_or(EncodeError::MalformedTree("transform node id out of range"))?;
        if node.children.is_some() {
            return Err(EncodeError::MalformedTree("transform node split twice"));
        }
        if node.log2_size <= 2 {
            return Err(EncodeError::MalformedTree("4x4 transform block cannot split"));
        }
        let (log2_size, depth) = (node.log2_size - 1, node.depth + 1);

        let first = self.nodes.len();
        let ids = [TbId(first), TbId(first + 1), TbId(first + 2), TbId(first + 3)];
        self.nodes.extend(children.into_iter().map(|block| TransformNode {
            block,
            log2_size,
            depth,
            parent: Some(id),
            children: None,
        }));
        self.nodes[id.0].children = Some(ids);
        Ok(ids)
    }

    /// Chroma cbf in effect at a node: 4x4 luma nodes use their parent's.
    pub fn chroma_cbf(&self, id: TbId, component: Component) -> bool {
        let node = &self.nodes[id.0];
        match (node.log2_size, self.parent(id)) {
            (2, Some(parent)) => parent.block.cbf(component),
            _ => node.block.cbf(component),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodingUnit {
    pub pred_mode: PredMode,
    pub part_mode: PartMode,
    /// One unit for 2Nx2N, four in Z order for NxN.
    pub prediction_units: Vec<IntraPredictionUnit>,
    pub transform_tree: TransformTree,
}

impl CodingUnit {
    pub fn intra(pu: IntraPredictionUnit, transform_tree: TransformTree) -> Self {
        Self {
            pred_mode: PredMode::Intra,
            part_mode: PartMode::Part2Nx2N,
            prediction_units: vec![pu],
            transform_tree,
        }
    }

    pub fn intra_nxn(pus: [IntraPredictionUnit; 4], transform_tree: TransformTree) -> Self {
        Self {
            pred_mode: PredMode::Intra,
            part_mode: PartMode::PartNxN,
            prediction_units: pus.to_vec(),
            transform_tree,
        }
    }

    pub fn is_intra(&self) -> bool {
        self.pred_mode == PredMode::Intra
    }

    /// Intra unit covering the luma sample at offset (dx, dy) inside a CU of
    /// the given size.
    pub fn prediction_unit_at(
        &self,
        dx: u32,
        dy: u32,
        log2_cb_size: u8,
    ) -> Option<&IntraPredictionUnit> {
        let idx = if self.part_mode == PartMode::PartNxN {
            let half = 1u32 << (log2_cb_size - 1);
            usize::from(dx >= half) + 2 * usize::from(dy >= half)
        } else {
            0
        };
        self.prediction_units.get(idx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodingTree {
    /// Four quadrants in Z order; `None` for quadrants outside the picture.
    Split(Box<[Option<CodingTree>; 4]>),
    Leaf(CodingUnit),
}

impl CodingTree {
    pub fn split(children: [Option<CodingTree>; 4]) -> Self {
        CodingTree::Split(Box::new(children))
    }

    pub fn split_all(children: [CodingTree; 4]) -> Self {
        CodingTree::Split(Box::new(children.map(Some)))
    }

    pub fn leaf(cu: CodingUnit) -> Self {
        CodingTree::Leaf(cu)
    }

    pub fn is_split(&self) -> bool {
        matches!(self, CodingTree::Split(_))
    }

    pub fn num_coding_units(&self) -> usize {
        match self {
            CodingTree::Leaf(_) => 1,
            CodingTree::Split(children) => children
                .iter()
                .flatten()
                .map(CodingTree::num_coding_units)
                .sum(),
        }
    }
}
