//! Iterative radix-2 FFT over a minimal complex type.
//!
//! Only power-of-two lengths are supported; callers zero-pad with
//! [`padded_len`].

use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const ZERO: Self = Self { re: 0.0, im: 0.0 };

    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    fn from_angle(theta: f64) -> Self {
        let (sin, cos) = theta.sin_cos();
        Self::new(cos, sin)
    }

    const fn conj(self) -> Self {
        Self::new(self.re, -self.im)
    }

    fn norm_sqr(self) -> f64 {
        self.re.mul_add(self.re, self.im * self.im)
    }

    /// `scalar / self`
    pub fn recip_scaled(self, scalar: f64) -> Self {
        let denom = self.norm_sqr();
        let c = self.conj();
        Self::new(scalar * c.re / denom, scalar * c.im / denom)
    }
}

impl Add for Complex {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re.mul_add(rhs.re, -(self.im * rhs.im)),
            self.re.mul_add(rhs.im, self.im * rhs.re),
        )
    }
}

/// Smallest power of two holding `n` samples.
pub(crate) const fn padded_len(n: usize) -> usize {
    n.next_power_of_two()
}

/// Signed DFT bin index in numpy `fftfreq` order.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn signed_bin(k: usize, n: usize) -> f64 {
    if k <= (n - 1) / 2 {
        k as f64
    } else {
        k as f64 - n as f64
    }
}

/// In-place forward (`inverse == false`) or normalised inverse transform.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn transform(buf: &mut [Complex], inverse: bool) {
    let n = buf.len();
    debug_assert!(n.is_power_of_two(), "FFT length must be a power of two");
    if n < 2 {
        return;
    }

    // bit-reversal permutation
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            buf.swap(i, j);
        }
    }

    let sign = if inverse { 1.0 } else { -1.0 };
    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let step = sign * 2.0 * PI / len as f64;
        for start in (0..n).step_by(len) {
            for k in 0..half {
                let w = Complex::from_angle(step * k as f64);
                let u = buf[start + k];
                let v = buf[start + k + half] * w;
                buf[start + k] = u + v;
                buf[start + k + half] = u - v;
            }
        }
        len <<= 1;
    }

    if inverse {
        let scale = 1.0 / n as f64;
        for c in buf.iter_mut() {
            c.re *= scale;
            c.im *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_inverse_identity() {
        let signal = [0.3, -1.2, 2.5, 0.0, 4.1, -0.7, 0.9, 1.1];
        let mut buf: Vec<Complex> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
        transform(&mut buf, false);
        transform(&mut buf, true);
        for (c, x) in buf.iter().zip(signal) {
            assert!((c.re - x).abs() < 1e-12);
            assert!(c.im.abs() < 1e-12);
        }
    }

    #[test]
    fn test_impulse_has_flat_spectrum() {
        let mut buf = vec![Complex::ZERO; 16];
        buf[0] = Complex::new(1.0, 0.0);
        transform(&mut buf, false);
        for c in &buf {
            assert!((c.re - 1.0).abs() < 1e-12);
            assert!(c.im.abs() < 1e-12);
        }
    }

    #[test]
    fn test_signed_bins_match_fftfreq() {
        let bins: Vec<f64> = (0..8).map(|k| signed_bin(k, 8)).collect();
        assert_eq!(bins, vec![0.0, 1.0, 2.0, 3.0, -4.0, -3.0, -2.0, -1.0]);
        assert_eq!(padded_len(1000), 1024);
        assert_eq!(padded_len(1024), 1024);
    }
}
