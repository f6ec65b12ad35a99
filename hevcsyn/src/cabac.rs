//! H.265 binary arithmetic coding engine (9.3.4.3) and adaptive context state.
//!
//! The engine keeps the interval in a 32-bit `low` register and defers bytes
//! that could still receive a carry (runs of 0xFF), so output is produced a
//! byte at a time instead of through per-bit outstanding counters.

use crate::bitwriter::BitWriter;

#[rustfmt::skip]
const NEXT_STATE_MPS: [u8; 64] = [
     1,  2,  3,  4,  5,  6,  7,  8,  9, 10, 11, 12, 13, 14, 15, 16,
    17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32,
    33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48,
    49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 62, 62, 63,
];

#[rustfmt::skip]
const NEXT_STATE_LPS: [u8; 64] = [
     0,  0,  1,  2,  2,  4,  4,  5,  6,  7,  8,  9,  9, 11, 11, 12,
    13, 13, 15, 15, 16, 16, 18, 18, 19, 19, 21, 21, 22, 22, 23, 24,
    24, 25, 26, 26, 27, 27, 28, 29, 29, 30, 30, 30, 31, 32, 32, 33,
    33, 33, 34, 34, 35, 35, 35, 36, 36, 36, 37, 37, 37, 38, 38, 63,
];

#[rustfmt::skip]
const RANGE_TAB_LPS: [[u8; 4]; 64] = [
    [128, 176, 208, 240], [128, 167, 197, 227], [128, 158, 187, 216], [123, 150, 178, 205],
    [116, 142, 169, 195], [111, 135, 160, 185], [105, 128, 152, 175], [100, 122, 144, 166],
    [ 95, 116, 137, 158], [ 90, 110, 130, 150], [ 85, 104, 123, 142], [ 81,  99, 117, 135],
    [ 77,  94, 111, 128], [ 73,  89, 105, 122], [ 69,  85, 100, 116], [ 66,  80,  95, 110],
    [ 62,  76,  90, 104], [ 59,  72,  86,  99], [ 56,  69,  81,  94], [ 53,  65,  77,  89],
    [ 51,  62,  73,  85], [ 48,  59,  69,  80], [ 46,  56,  66,  76], [ 43,  53,  63,  72],
    [ 41,  50,  59,  69], [ 39,  48,  56,  65], [ 37,  45,  54,  62], [ 35,  43,  51,  59],
    [ 33,  41,  48,  56], [ 32,  39,  46,  53], [ 30,  37,  43,  50], [ 29,  35,  41,  48],
    [ 27,  33,  39,  45], [ 26,  31,  37,  43], [ 24,  30,  35,  41], [ 23,  28,  33,  39],
    [ 22,  27,  32,  37], [ 21,  26,  30,  35], [ 20,  24,  29,  33], [ 19,  23,  27,  31],
    [ 18,  22,  26,  30], [ 17,  21,  25,  28], [ 16,  20,  23,  27], [ 15,  19,  22,  25],
    [ 14,  18,  21,  24], [ 14,  17,  20,  23], [ 13,  16,  19,  22], [ 12,  15,  18,  21],
    [ 12,  14,  17,  20], [ 11,  14,  16,  19], [ 11,  13,  15,  18], [ 10,  12,  15,  17],
    [ 10,  12,  14,  16], [  9,  11,  13,  15], [  9,  11,  12,  14], [  8,  10,  12,  14],
    [  8,   9,  11,  13], [  7,   9,  11,  12], [  7,   9,  10,  12], [  7,   8,  10,  11],
    [  6,   8,   9,  11], [  6,   7,   9,  10], [  6,   7,   8,   9], [  2,   2,   2,   2],
];

/// Adaptive probability state of one context slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextModel {
    state: u8,
    mps: bool,
}

impl ContextModel {
    /// Initialization from a table `initValue` at the given slice QP (9.3.2.2).
    pub fn init(init_value: u8, qp: i32) -> Self {
        let slope_idx = (init_value >> 4) as i32;
        let offset_idx = (init_value & 0x0F) as i32;
        let m = slope_idx * 5 - 45;
        let n = (offset_idx << 3) - 16;
        let pre_ctx_state = (((m * qp.clamp(0, 51)) >> 4) + n).clamp(1, 126);

        if pre_ctx_state <= 63 {
            Self {
                state: (63 - pre_ctx_state) as u8,
                mps: false,
            }
        } else {
            Self {
                state: (pre_ctx_state - 64) as u8,
                mps: true,
            }
        }
    }

    pub fn state(&self) -> u8 {
        self.state
    }

    pub fn mps(&self) -> bool {
        self.mps
    }

    pub fn update(&mut self, bin: bool) {
        if bin == self.mps {
            self.state = NEXT_STATE_MPS[self.state as usize];
        } else {
            if self.state == 0 {
                self.mps = !self.mps;
            }
            self.state = NEXT_STATE_LPS[self.state as usize];
        }
    }
}

impl Default for ContextModel {
    /// Equiprobable state (pStateIdx 0, valMps 1), the result of `init(154, _)`.
    fn default() -> Self {
        Self::init(154, 26)
    }
}

#[derive(Debug)]
pub struct CabacEncoder {
    low: u32,
    range: u32,
    bits_left: i32,
    buffered_byte: u32,
    num_buffered_bytes: u32,
    out: BitWriter,
}

impl CabacEncoder {
    pub fn new() -> Self {
        Self {
            low: 0,
            range: 510,
            bits_left: 23,
            buffered_byte: 0xFF,
            num_buffered_bytes: 0,
            out: BitWriter::with_capacity(4096),
        }
    }

    pub fn encode_bin(&mut self, model: &mut ContextModel, bin: bool) {
        let q_range_idx = ((self.range >> 6) & 3) as usize;
        let lps = RANGE_TAB_LPS[model.state as usize][q_range_idx] as u32;
        self.range -= lps;

        if bin != model.mps {
            let num_bits = lps.leading_zeros() as i32 - 23;
            self.low = (self.low + self.range) << num_bits;
            self.range = lps << num_bits;
            self.bits_left -= num_bits;
            model.update(bin);
        } else {
            model.update(bin);
            if self.range >= 256 {
                return;
            }
            self.low <<= 1;
            self.range <<= 1;
            self.bits_left -= 1;
        }

        self.test_and_write_out();
    }

    pub fn encode_bypass(&mut self, bin: bool) {
        self.low <<= 1;
        if bin {
            self.low += self.range;
        }
        self.bits_left -= 1;
        self.test_and_write_out();
    }

    pub fn encode_bypass_bins(&mut self, value: u32, num_bins: u32) {
        for i in (0..num_bins).rev() {
            self.encode_bypass((value >> i) & 1 == 1);
        }
    }

    pub fn encode_terminate(&mut self, bin: bool) {
        self.range -= 2;
        if bin {
            self.low += self.range;
            self.low <<= 7;
            self.range = 2 << 7;
            self.bits_left -= 7;
        } else if self.range >= 256 {
            return;
        } else {
            self.low <<= 1;
            self.range <<= 1;
            self.bits_left -= 1;
        }
        self.test_and_write_out();
    }

    /// Bits produced so far, counting bytes still held back for carry resolution.
    pub fn bits_written(&self) -> usize {
        self.out.bits_written()
            + 8 * self.num_buffered_bytes as usize
            + (23 - self.bits_left) as usize
    }

    fn test_and_write_out(&mut self) {
        if self.bits_left < 12 {
            self.write_out();
        }
    }

    fn write_out(&mut self) {
        let lead_byte = self.low >> (24 - self.bits_left);
        self.bits_left += 8;
        self.low &= 0xFFFF_FFFF >> self.bits_left;

        if lead_byte == 0xFF {
            self.num_buffered_bytes += 1;
        } else if self.num_buffered_bytes > 0 {
            let carry = lead_byte >> 8;
            let byte = self.buffered_byte + carry;
            self.buffered_byte = lead_byte & 0xFF;
            self.out.write_bits(byte, 8);

            let byte = (0xFF + carry) & 0xFF;
            while self.num_buffered_bytes > 1 {
                self.out.write_bits(byte, 8);
                self.num_buffered_bytes -= 1;
            }
        } else {
            self.num_buffered_bytes = 1;
            self.buffered_byte = lead_byte;
        }
    }

    /// Flushes the interval; the caller appends rbsp trailing bits.
    pub fn finish(mut self) -> BitWriter {
        let carry_shift = (32 - self.bits_left) as u32;
        if (self.low >> carry_shift) != 0 {
            self.out.write_bits(self.buffered_byte + 1, 8);
            while self.num_buffered_bytes > 1 {
                self.out.write_bits(0x00, 8);
                self.num_buffered_bytes -= 1;
            }
            self.low -= 1 << carry_shift;
        } else {
            if self.num_buffered_bytes > 0 {
                self.out.write_bits(self.buffered_byte, 8);
            }
            while self.num_buffered_bytes > 1 {
                self.out.write_bits(0xFF, 8);
                self.num_buffered_bytes -= 1;
            }
        }
        self.out.write_bits(self.low >> 8, (24 - self.bits_left) as u32);
        self.out
    }
}

impl Default for CabacEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Straight transcription of the 9.3.4.3 decoding process, used to check
    /// that the encoder's output decodes to the bins that went in.
    pub(crate) struct ReferenceDecoder<'a> {
        data: &'a [u8],
        pos: usize,
        range: u32,
        offset: u32,
    }

    impl<'a> ReferenceDecoder<'a> {
        pub(crate) fn new(data: &'a [u8]) -> Self {
            let mut dec = Self {
                data,
                pos: 0,
                range: 510,
                offset: 0,
            };
            for _ in 0..9 {
                dec.offset = (dec.offset << 1) | dec.read_bit();
            }
            dec
        }

        fn read_bit(&mut self) -> u32 {
            let byte = self.data.get(self.pos / 8).copied().unwrap_or(0);
            let bit = (byte >> (7 - (self.pos % 8))) & 1;
            self.pos += 1;
            bit as u32
        }

        fn renormalize(&mut self) {
            while self.range < 256 {
                self.range <<= 1;
                self.offset = (self.offset << 1) | self.read_bit();
            }
        }

        pub(crate) fn decode_bin(&mut self, model: &mut ContextModel) -> bool {
            let q_range_idx = ((self.range >> 6) & 3) as usize;
            let lps = RANGE_TAB_LPS[model.state as usize][q_range_idx] as u32;
            self.range -= lps;
            let bin = if self.offset >= self.range {
                self.offset -= self.range;
                self.range = lps;
                !model.mps
            } else {
                model.mps
            };
            model.update(bin);
            self.renormalize();
            bin
        }

        pub(crate) fn decode_bypass(&mut self) -> bool {
            self.offset = (self.offset << 1) | self.read_bit();
            if self.offset >= self.range {
                self.offset -= self.range;
                true
            } else {
                false
            }
        }

        pub(crate) fn decode_bypass_bins(&mut self, n: u32) -> u32 {
            (0..n).fold(0, |acc, _| (acc << 1) | self.decode_bypass() as u32)
        }

        pub(crate) fn decode_terminate(&mut self) -> bool {
            self.range -= 2;
            if self.offset >= self.range {
                true
            } else {
                self.renormalize();
                false
            }
        }
    }

    fn finish_slice(enc: CabacEncoder) -> Vec<u8> {
        enc.finish().rbsp_trailing_bits()
    }

    #[test]
    fn init_equiprobable_value() {
        for qp in [0, 26, 51] {
            let ctx = ContextModel::init(154, qp);
            assert_eq!((ctx.state(), ctx.mps()), (0, true));
        }
        assert_eq!(ContextModel::default(), ContextModel::init(154, 26));
    }

    #[test]
    fn init_states_stay_below_63_for_all_qps() {
        for init_value in 0..=255u8 {
            for qp in 0..=51 {
                let ctx = ContextModel::init(init_value, qp);
                assert!(ctx.state() <= 62, "init={init_value} qp={qp}");
            }
        }
    }

    #[test]
    fn lps_at_state_zero_flips_mps() {
        let mut ctx = ContextModel::init(64, 0);
        while ctx.state() != 0 {
            ctx.update(!ctx.mps());
        }
        let mps = ctx.mps();
        ctx.update(!mps);
        assert_eq!(ctx.mps(), !mps);
        assert_eq!(ctx.state(), 0);
    }

    #[test]
    fn mps_saturates_at_62() {
        let mut ctx = ContextModel::init(154, 26);
        for _ in 0..200 {
            ctx.update(ctx.mps());
        }
        assert_eq!(ctx.state(), 62);
    }

    #[test]
    fn empty_slice_still_flushes_terminate() {
        let mut enc = CabacEncoder::new();
        enc.encode_terminate(true);
        let bytes = finish_slice(enc);
        assert!(!bytes.is_empty());
        let mut dec = ReferenceDecoder::new(&bytes);
        assert!(dec.decode_terminate());
    }

    #[test]
    fn roundtrip_context_bins() {
        let bins = [true, false, true, true, false, false, true, false, false, false, true];
        let mut enc = CabacEncoder::new();
        let mut model_enc = ContextModel::init(139, 30);
        for &b in &bins {
            enc.encode_bin(&mut model_enc, b);
        }
        enc.encode_terminate(true);
        let bytes = finish_slice(enc);

        let mut dec = ReferenceDecoder::new(&bytes);
        let mut model_dec = ContextModel::init(139, 30);
        for (i, &expected) in bins.iter().enumerate() {
            assert_eq!(dec.decode_bin(&mut model_dec), expected, "bin {i}");
        }
        assert!(dec.decode_terminate());
        assert_eq!(model_enc, model_dec);
    }

    #[test]
    fn roundtrip_bypass_bins() {
        let values = [(0u32, 1u32), (3, 2), (17, 5), (0x1F, 5), (0, 0), (0xABC, 12)];
        let mut enc = CabacEncoder::new();
        for &(v, n) in &values {
            enc.encode_bypass_bins(v, n);
        }
        enc.encode_terminate(true);
        let bytes = finish_slice(enc);

        let mut dec = ReferenceDecoder::new(&bytes);
        for &(v, n) in &values {
            assert_eq!(dec.decode_bypass_bins(n), v);
        }
        assert!(dec.decode_terminate());
    }

    #[test]
    fn roundtrip_long_skewed_run_exercises_carry() {
        let mut enc = CabacEncoder::new();
        let mut model = ContextModel::init(200, 40);
        let mut expected = Vec::new();
        for i in 0..5000u32 {
            let b = i % 97 == 0 || i % 13 == 5;
            expected.push(b);
            enc.encode_bin(&mut model, b);
            if i % 7 == 0 {
                enc.encode_bypass(i % 3 == 0);
            }
        }
        enc.encode_terminate(true);
        let bytes = finish_slice(enc);

        let mut dec = ReferenceDecoder::new(&bytes);
        let mut model = ContextModel::init(200, 40);
        for (i, &b) in expected.iter().enumerate() {
            assert_eq!(dec.decode_bin(&mut model), b, "bin {i}");
            if i % 7 == 0 {
                assert_eq!(dec.decode_bypass(), i % 3 == 0, "bypass after {i}");
            }
        }
        assert!(dec.decode_terminate());
    }

    #[test]
    fn roundtrip_mixed_operations() {
        let mut enc = CabacEncoder::new();
        let mut a = ContextModel::init(111, 26);
        let mut b = ContextModel::init(94, 26);

        enc.encode_bin(&mut a, false);
        enc.encode_bypass_bins(2, 2);
        enc.encode_bin(&mut b, true);
        enc.encode_terminate(false);
        enc.encode_bin(&mut a, true);
        enc.encode_bypass_bins(21, 5);
        enc.encode_terminate(false);
        enc.encode_bin(&mut b, false);
        enc.encode_terminate(true);
        let bytes = finish_slice(enc);

        let mut dec = ReferenceDecoder::new(&bytes);
        let mut a2 = ContextModel::init(111, 26);
        let mut b2 = ContextModel::init(94, 26);
        assert!(!dec.decode_bin(&mut a2));
        assert_eq!(dec.decode_bypass_bins(2), 2);
        assert!(dec.decode_bin(&mut b2));
        assert!(!dec.decode_terminate());
        assert!(dec.decode_bin(&mut a2));
        assert_eq!(dec.decode_bypass_bins(5), 21);
        assert!(!dec.decode_terminate());
        assert!(!dec.decode_bin(&mut b2));
        assert!(dec.decode_terminate());
        assert_eq!((a, b), (a2, b2));
    }

    #[test]
    fn bits_written_grows_with_input() {
        let mut enc = CabacEncoder::new();
        let before = enc.bits_written();
        enc.encode_bypass_bins(0x5555, 16);
        assert!(enc.bits_written() >= before + 16);
    }
}
