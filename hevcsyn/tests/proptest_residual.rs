//! Property-based tests for last-position coding and intra mode mapping.

use hevcsyn::contexts::{LAST_SIG_COEFF_X_PREFIX, NUM_CONTEXTS};
use hevcsyn::intra::{LumaModeCode, find_intra_pred_mode};
use hevcsyn::residual::{
    encode_residual_position, find_last_significant, merge_last_significant_position,
    split_last_significant_position,
};
use hevcsyn::scan::{ScanIdx, scan_order};
use hevcsyn::{BinTrace, Component, IntraPredMode};
use proptest::prelude::*;

fn scan_idx_strategy() -> impl Strategy<Value = ScanIdx> {
    prop_oneof![
        Just(ScanIdx::Diagonal),
        Just(ScanIdx::Horizontal),
        Just(ScanIdx::Vertical),
    ]
}

fn component_strategy() -> impl Strategy<Value = Component> {
    prop_oneof![Just(Component::Luma), Just(Component::Cb), Just(Component::Cr)]
}

/// A block of the given size with a handful of non-zero coefficients.
fn sparse_block() -> impl Strategy<Value = (u8, Vec<i16>)> {
    (2u8..=5).prop_flat_map(|log2| {
        let n = 1usize << (2 * log2);
        (
            Just(log2),
            prop::collection::vec((0..n, -64i16..=64), 1..6).prop_map(move |entries| {
                let mut coeffs = vec![0i16; n];
                for (i, v) in entries {
                    coeffs[i] = if v == 0 { 1 } else { v };
                }
                coeffs
            }),
        )
    })
}

/// Full coefficient scan: sub-blocks in order, 4x4 positions within each.
fn full_scan(log2: u8, scan_idx: ScanIdx) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for sb in scan_order(log2 - 2, scan_idx) {
        for p in scan_order(2, scan_idx) {
            out.push(((sb.x as usize) * 4 + p.x as usize, (sb.y as usize) * 4 + p.y as usize));
        }
    }
    out
}

proptest! {
    #[test]
    fn split_and_merge_invert(pos in 0u8..32) {
        let split = split_last_significant_position(pos);
        prop_assert!(split.prefix <= 9);
        prop_assert!(u32::from(split.suffix) < (1u32 << split.suffix_bits));
        prop_assert_eq!(merge_last_significant_position(split.prefix, split.suffix), pos);
    }

    #[test]
    fn last_significant_is_last_in_scan(
        (log2, coeffs) in sparse_block(),
        scan_idx in scan_idx_strategy(),
    ) {
        let last = find_last_significant(&coeffs, log2, scan_idx, Component::Luma).unwrap();
        let stride = 1usize << log2;
        let order = full_scan(log2, scan_idx);
        let at = order
            .iter()
            .position(|&(x, y)| x == last.x as usize && y == last.y as usize)
            .unwrap();

        prop_assert_ne!(coeffs[last.x as usize + last.y as usize * stride], 0);
        prop_assert_eq!(at, last.sub_block * 16 + last.pos);
        for &(x, y) in &order[at + 1..] {
            prop_assert_eq!(coeffs[x + y * stride], 0);
        }
    }

    #[test]
    fn position_bins_stay_in_prefix_contexts(
        (log2, coeffs) in sparse_block(),
        scan_idx in scan_idx_strategy(),
        component in component_strategy(),
    ) {
        let mut trace = BinTrace::new();
        let coded =
            encode_residual_position(&mut trace, &coeffs, log2, component, scan_idx).unwrap();
        for slot in trace.context_slots() {
            prop_assert!((LAST_SIG_COEFF_X_PREFIX..NUM_CONTEXTS).contains(&slot));
        }
        prop_assert!(coded.is_coded(0));
        prop_assert!(coded.coded_count() >= 1);
    }

    #[test]
    fn luma_mode_code_in_range(mode in 0u8..35, a in 0u8..35, b in 0u8..35, c in 0u8..35) {
        prop_assume!(a != b && b != c && a != c);
        let cands = [a, b, c].map(|m| IntraPredMode::new(m).unwrap());
        let code = find_intra_pred_mode(IntraPredMode::new(mode).unwrap(), cands);
        match code {
            LumaModeCode::MpmIdx(i) => prop_assert_eq!(cands[i as usize].value(), mode),
            LumaModeCode::Remainder(r) => {
                prop_assert!(r <= 31);
                prop_assert!(!cands.iter().any(|m| m.value() == mode));
            }
        }
    }
}
