//! Coefficient scan orders of 6.5.3 - 6.5.5 for block sizes 1x1 through 32x32.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanPosition {
    pub x: u8,
    pub y: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanIdx {
    Diagonal = 0,
    Horizontal = 1,
    Vertical = 2,
}

const ORIGIN: ScanPosition = ScanPosition { x: 0, y: 0 };

const fn build_diagonal<const N: usize>(blk: usize) -> [ScanPosition; N] {
    let mut out = [ORIGIN; N];
    let mut i = 0;
    let mut x: isize = 0;
    let mut y: isize = 0;
    while i < N {
        while y >= 0 {
            if x < blk as isize && y < blk as isize {
                out[i] = ScanPosition {
                    x: x as u8,
                    y: y as u8,
                };
                i += 1;
            }
            y -= 1;
            x += 1;
        }
        y = x;
        x = 0;
    }
    out
}

const fn build_horizontal<const N: usize>(blk: usize) -> [ScanPosition; N] {
    let mut out = [ORIGIN; N];
    let mut i = 0;
    while i < N {
        out[i] = ScanPosition {
            x: (i % blk) as u8,
            y: (i / blk) as u8,
        };
        i += 1;
    }
    out
}

const fn build_vertical<const N: usize>(blk: usize) -> [ScanPosition; N] {
    let mut out = [ORIGIN; N];
    let mut i = 0;
    while i < N {
        out[i] = ScanPosition {
            x: (i / blk) as u8,
            y: (i % blk) as u8,
        };
        i += 1;
    }
    out
}

const fn build_all<const N: usize>(blk: usize) -> [[ScanPosition; N]; 3] {
    [
        build_diagonal::<N>(blk),
        build_horizontal::<N>(blk),
        build_vertical::<N>(blk),
    ]
}

static SCAN_1X1: [[ScanPosition; 1]; 3] = build_all::<1>(1);
static SCAN_2X2: [[ScanPosition; 4]; 3] = build_all::<4>(2);
static SCAN_4X4: [[ScanPosition; 16]; 3] = build_all::<16>(4);
static SCAN_8X8: [[ScanPosition; 64]; 3] = build_all::<64>(8);
static SCAN_16X16: [[ScanPosition; 256]; 3] = build_all::<256>(16);
static SCAN_32X32: [[ScanPosition; 1024]; 3] = build_all::<1024>(32);

#[rustfmt::skip]
static SCAN_TABLES: [[&[ScanPosition]; 3]; 6] = [
    [&SCAN_1X1[0], &SCAN_1X1[1], &SCAN_1X1[2]],
    [&SCAN_2X2[0], &SCAN_2X2[1], &SCAN_2X2[2]],
    [&SCAN_4X4[0], &SCAN_4X4[1], &SCAN_4X4[2]],
    [&SCAN_8X8[0], &SCAN_8X8[1], &SCAN_8X8[2]],
    [&SCAN_16X16[0], &SCAN_16X16[1], &SCAN_16X16[2]],
    [&SCAN_32X32[0], &SCAN_32X32[1], &SCAN_32X32[2]],
];

/// `ScanOrder[log2_size][scan_idx]`; `log2_size` must be at most 5.
pub fn scan_order(log2_size: u8, scan_idx: ScanIdx) -> &'static [ScanPosition] {
    SCAN_TABLES[log2_size as usize][scan_idx as usize]
}
