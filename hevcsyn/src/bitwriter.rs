/// MSB-first bit sink behind the CABAC engine.
#[derive(Debug, Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    current_byte: u8,
    bits_in_current: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.current_byte = (self.current_byte << 1) | (bit as u8);
        self.bits_in_current += 1;
        if self.bits_in_current == 8 {
            self.buf.push(self.current_byte);
            self.current_byte = 0;
            self.bits_in_current = 0;
        }
    }

    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32);
        if n == 8 && self.bits_in_current == 0 {
            self.buf.push(value as u8);
            return;
        }
        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    pub fn bits_written(&self) -> usize {
        self.buf.len() * 8 + self.bits_in_current as usize
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.bits_in_current == 0
    }

    pub fn byte_align(&mut self) {
        if self.bits_in_current > 0 {
            self.current_byte <<= 8 - self.bits_in_current;
            self.buf.push(self.current_byte);
            self.current_byte = 0;
            self.bits_in_current = 0;
        }
    }

    pub fn finalize(mut self) -> Vec<u8> {
        self.byte_align();
        self.buf
    }

    /// rbsp_trailing_bits(): a stop bit followed by zero alignment.
    pub fn rbsp_trailing_bits(mut self) -> Vec<u8> {
        self.write_bit(true);
        self.byte_align();
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bit_true() {
        let mut w = BitWriter::new();
        w.write_bit(true);
        assert_eq!(w.finalize(), vec![0x80]);
    }

    #[test]
    fn write_3_bits() {
        let mut w = BitWriter::new();
        w.write_bits(0b101, 3);
        assert_eq!(w.finalize(), vec![0xA0]);
    }

    #[test]
    fn aligned_byte_fast_path_matches_bitwise() {
        let mut fast = BitWriter::new();
        fast.write_bits(0xC3, 8);
        let mut slow = BitWriter::new();
        slow.write_bit(true);
        slow.write_bits(0x43, 7);
        assert_eq!(fast.finalize(), slow.finalize());
    }

    #[test]
    fn write_across_byte_boundary() {
        let mut w = BitWriter::new();
        w.write_bits(0b11111, 5);
        w.write_bits(0b11111, 5);
        assert_eq!(w.bits_written(), 10);
        assert_eq!(w.finalize(), vec![0xFF, 0xC0]);
    }

    #[test]
    fn zero_width_write_is_noop() {
        let mut w = BitWriter::new();
        w.write_bits(0xFFFF, 0);
        assert!(w.is_byte_aligned());
        assert_eq!(w.finalize(), Vec::<u8>::new());
    }

    #[test]
    fn trailing_bits_on_aligned_stream_adds_0x80() {
        let mut w = BitWriter::new();
        w.write_bits(0xAB, 8);
        assert_eq!(w.rbsp_trailing_bits(), vec![0xAB, 0x80]);
    }

    #[test]
    fn trailing_bits_mid_byte() {
        let mut w = BitWriter::new();
        w.write_bits(0b110, 3);
        assert_eq!(w.rbsp_trailing_bits(), vec![0b1101_0000]);
    }

    #[test]
    fn write_24_bits() {
        let mut w = BitWriter::with_capacity(4);
        w.write_bits(0x00CAFE, 24);
        assert_eq!(w.finalize(), vec![0x00, 0xCA, 0xFE]);
    }
}
