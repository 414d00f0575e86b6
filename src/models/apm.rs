use crate::{u16, u32, usize};

const MAP_POINTS: usize = 33;
const SPAN: u32 = 65533; // input range 1..=65534

/// Adaptive probability map (SSE stage): per context, a 33-point
/// piecewise-linear map over `[1, 65534]` that starts as the identity
/// and bends toward observed bits.
pub struct Apm {
    entries: Vec<u16>,
    ctx_mask: usize,
    last: usize, // lower interpolation neighbour of the last map() call
}

impl Apm {
    pub fn new(context_bits: u32) -> Self {
        let contexts = 1usize << context_bits;
        let mut entries = Vec::with_capacity(contexts * MAP_POINTS);
        for _ in 0..contexts {
            for j in 0..MAP_POINTS {
                entries.push(u16!(1 + u32!(j) * SPAN / (MAP_POINTS as u32 - 1)));
            }
        }
        Self { entries, ctx_mask: contexts - 1, last: 0 }
    }

    /// Refines `pred` through the map of `ctx` and remembers the two
    /// entries it interpolated, for the following `update`.
    pub fn map(&mut self, ctx: usize, pred: u16) -> u16 {
        debug_assert!((1..=65534).contains(&pred));
        let scaled = (u32::from(pred) - 1) * (MAP_POINTS as u32 - 1);
        let mut idx = usize!(scaled / SPAN);
        let mut frac = scaled % SPAN;
        if idx == MAP_POINTS - 1 {
            idx -= 1;
            frac = SPAN;
        }
        let base = (ctx & self.ctx_mask) * MAP_POINTS + idx;
        self.last = base;

        let lo = u64::from(self.entries[base]);
        let hi = u64::from(self.entries[base + 1]);
        let mixed = (lo * u64::from(SPAN - frac) + hi * u64::from(frac) + u64::from(SPAN / 2))
            / u64::from(SPAN);
        u16!(mixed.clamp(1, 65534))
    }

    /// Pulls both neighbours of the last mapping toward the outcome.
    pub fn update(&mut self, bit: u8) {
        let target: i32 = if bit == 1 { 65534 } else { 1 };
        for i in [self.last, self.last + 1] {
            let e = i32::from(self.entries[i]);
            self.entries[i] = u16!((e + (target - e) / 32).clamp(1, 65534));
        }
    }

    /// Read-only view of the raw map entries, for convergence checks.
    pub fn entries(&self) -> &[u16] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_as_identity() {
        let mut apm = Apm::new(4);
        for ctx in 0..16 {
            for pred in [1u16, 100, 9000, 32768, 50000, 65534] {
                let mapped = apm.map(ctx, pred);
                assert!(
                    (i32::from(mapped) - i32::from(pred)).abs() <= 1,
                    "identity off at ctx {} pred {}: {}",
                    ctx,
                    pred,
                    mapped
                );
            }
        }
    }

    #[test]
    fn learns_per_context() {
        let mut apm = Apm::new(1);
        for _ in 0..500 {
            apm.map(0, 32768);
            apm.update(1);
        }
        // context 0 now maps mid predictions upward; context 1 untouched
        assert!(apm.map(0, 32768) > 40000);
        assert!((i32::from(apm.map(1, 32768)) - 32768).abs() <= 1);
    }

    #[test]
    fn output_stays_in_range() {
        let mut apm = Apm::new(2);
        for _ in 0..2000 {
            apm.map(3, 65534);
            apm.update(0);
        }
        let mapped = apm.map(3, 65534);
        assert!((1..=65534).contains(&mapped));
    }
}
