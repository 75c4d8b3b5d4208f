use blockwise_hashes::HasherBase;

pub trait HasherExtensions {
    /// Writes the len as u64 little endian bytes
    fn write_len(&mut self, len: usize) -> &mut Self;

    fn write_u8(&mut self, v: u8) -> &mut Self;

    fn write_u32(&mut self, v: u32) -> &mut Self;

    /// Writes the IEEE-754 bit pattern, so `0.0` and `-0.0` hash differently
    fn write_f64(&mut self, v: f64) -> &mut Self;

    /// Writes the number of elements followed by each element
    fn write_var_array<D: AsRef<[u8]>>(&mut self, arr: &[D]) -> &mut Self;
}

impl<T: HasherBase> HasherExtensions for T {
    #[inline(always)]
    fn write_len(&mut self, len: usize) -> &mut Self {
        self.update((len as u64).to_le_bytes())
    }

    #[inline(always)]
    fn write_u8(&mut self, v: u8) -> &mut Self {
        self.update(v.to_le_bytes())
    }

    #[inline(always)]
    fn write_u32(&mut self, v: u32) -> &mut Self {
        self.update(v.to_le_bytes())
    }

    #[inline(always)]
    fn write_f64(&mut self, v: f64) -> &mut Self {
        self.update(v.to_bits().to_le_bytes())
    }

    #[inline(always)]
    fn write_var_array<D: AsRef<[u8]>>(&mut self, arr: &[D]) -> &mut Self {
        self.write_len(arr.len());
        for d in arr {
            self.update(d);
        }
        self
    }
}
