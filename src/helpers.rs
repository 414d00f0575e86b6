pub fn histogram(buf: &[u8]) -> Vec<u32> {
    let mut res = vec![0; 256];
    for &byte in buf {
        res[usize::from(byte)] += 1;
    }
    res
}

/// Shannon entropy of the byte histogram, in bits per byte.
pub fn entropy(buf: &[u8]) -> f64 {
    if buf.is_empty() {
        return 0.0;
    }
    let total = buf.len() as f64;
    histogram(buf)
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = f64::from(c) / total;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_counts() {
        let h = histogram(b"aabc");
        assert_eq!(h[usize::from(b'a')], 2);
        assert_eq!(h[usize::from(b'b')], 1);
        assert_eq!(h[usize::from(b'c')], 1);
        assert_eq!(h.iter().sum::<u32>(), 4);
    }

    #[test]
    fn entropy_bounds() {
        assert_eq!(entropy(&[0x42].repeat(100)), 0.0);
        let all: Vec<u8> = (0..=255).collect();
        assert!((entropy(&all) - 8.0).abs() < 1e-9);
    }
}
