//! Registry of named, reversible 1-D lift/inverse wavelet kernels composed
//! into in-place 2-D transforms (spec §2/§4.7). The kernels themselves are
//! an external-collaborator contract (spec §1 lists "wavelet lift/inverse
//! kernels" as out of scope for reimplementation of the underlying
//! geophysics); what belongs to this crate is the dispatch table and the
//! 2-D composition rule ("horizontal then vertical" for the inverse, per
//! spec §4.7), matching the teacher's preference (design note in spec §9)
//! for representing small closed sets of variants as plain function pairs
//! in a static dispatch table rather than trait objects.

use crate::errors::{Result, WaveletTreeError};

/// A named 1-D lifting kernel: `forward` decomposes into (approximation,
/// detail) interleaved in place; `inverse` is its exact left inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    Haar,
    Cdf53,
}

impl KernelKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "haar" => Ok(Self::Haar),
            "cdf53" | "cdf5/3" | "cdf-5-3" => Ok(Self::Cdf53),
            other => Err(WaveletTreeError::UnknownKernel(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Haar => "haar",
            Self::Cdf53 => "cdf53",
        }
    }

    /// One level of the 1-D forward lifting transform, in place. `buf` is
    /// split into the first half (approximation) and second half (detail).
    pub fn forward_1d(&self, buf: &mut [f64]) -> Result<()> {
        check_pow2(self.name(), buf.len())?;
        match self {
            Self::Haar => haar_forward(buf),
            Self::Cdf53 => cdf53_forward(buf),
        }
        Ok(())
    }

    /// Exact inverse of [`Self::forward_1d`].
    pub fn inverse_1d(&self, buf: &mut [f64]) -> Result<()> {
        check_pow2(self.name(), buf.len())?;
        match self {
            Self::Haar => haar_inverse(buf),
            Self::Cdf53 => cdf53_inverse(buf),
        }
        Ok(())
    }
}

fn check_pow2(name: &'static str, len: usize) -> Result<()> {
    if len == 0 || (len & (len - 1)) != 0 {
        return Err(WaveletTreeError::NonPowerOfTwoLength { name, len });
    }
    Ok(())
}

/// Composes two named 1-D kernels (horizontal, vertical) into full 2-D
/// forward/inverse transforms over a row-major `w x h` dense array,
/// recursing one pyramid level at a time down to a 1x1 approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kernel2D {
    pub horizontal: KernelKind,
    pub vertical: KernelKind,
}

impl Kernel2D {
    pub fn new(horizontal: &str, vertical: &str) -> Result<Self> {
        Ok(Self {
            horizontal: KernelKind::parse(horizontal)?,
            vertical: KernelKind::parse(vertical)?,
        })
    }

    /// Full multi-level inverse transform: for each pyramid level from
    /// coarsest to finest, apply the inverse kernel to every active row,
    /// then to every active column (horizontal before vertical, matching
    /// the sampler's forward ordering so `forward(inverse(x)) == x`).
    pub fn inverse_2d(&self, img: &mut [f64], w: usize, h: usize) -> Result<()> {
        assert_eq!(img.len(), w * h);
        let levels = usize::max(w, h).trailing_zeros();
        let mut cur_w = 1usize;
        let mut cur_h = 1usize;
        for _ in 0..levels {
            let next_w = (cur_w * 2).min(w);
            let next_h = (cur_h * 2).min(h);
            if next_w > cur_w {
                self.inverse_rows(img, w, next_h, next_w, &self.horizontal)?;
            }
            if next_h > cur_h {
                self.inverse_cols(img, w, next_w, next_h, &self.vertical)?;
            }
            cur_w = next_w;
            cur_h = next_h;
        }
        Ok(())
    }

    /// Forward counterpart of [`Self::inverse_2d`], used by tests to check
    /// kernel idempotence and available to callers building synthetic
    /// coefficient sets from a dense image.
    pub fn forward_2d(&self, img: &mut [f64], w: usize, h: usize) -> Result<()> {
        assert_eq!(img.len(), w * h);
        let levels = usize::max(w, h).trailing_zeros();
        // Levels must be undone in the reverse order they were applied.
        let mut sizes = Vec::with_capacity(levels as usize + 1);
        let mut cur_w = 1usize;
        let mut cur_h = 1usize;
        sizes.push((cur_w, cur_h));
        for _ in 0..levels {
            cur_w = (cur_w * 2).min(w);
            cur_h = (cur_h * 2).min(h);
            sizes.push((cur_w, cur_h));
        }
        for level in (1..sizes.len()).rev() {
            let (prev_w, prev_h) = sizes[level - 1];
            let (next_w, next_h) = sizes[level];
            if next_h > prev_h {
                self.forward_cols(img, w, next_w, next_h, &self.vertical)?;
            }
            if next_w > prev_w {
                self.forward_rows(img, w, next_h, next_w, &self.horizontal)?;
            }
        }
        Ok(())
    }

    fn inverse_rows(
        &self,
        img: &mut [f64],
        stride: usize,
        active_h: usize,
        active_w: usize,
        k: &KernelKind,
    ) -> Result<()> {
        let mut row = vec![0.0; active_w];
        for j in 0..active_h {
            for (i, slot) in row.iter_mut().enumerate() {
                *slot = img[j * stride + i];
            }
            k.inverse_1d(&mut row)?;
            for (i, &v) in row.iter().enumerate() {
                img[j * stride + i] = v;
            }
        }
        Ok(())
    }

    fn forward_rows(
        &self,
        img: &mut [f64],
        stride: usize,
        active_h: usize,
        active_w: usize,
        k: &KernelKind,
    ) -> Result<()> {
        let mut row = vec![0.0; active_w];
        for j in 0..active_h {
            for (i, slot) in row.iter_mut().enumerate() {
                *slot = img[j * stride + i];
            }
            k.forward_1d(&mut row)?;
            for (i, &v) in row.iter().enumerate() {
                img[j * stride + i] = v;
            }
        }
        Ok(())
    }

    fn inverse_cols(
        &self,
        img: &mut [f64],
        stride: usize,
        active_w: usize,
        active_h: usize,
        k: &KernelKind,
    ) -> Result<()> {
        let mut col = vec![0.0; active_h];
        for i in 0..active_w {
            for (j, slot) in col.iter_mut().enumerate() {
                *slot = img[j * stride + i];
            }
            k.inverse_1d(&mut col)?;
            for (j, &v) in col.iter().enumerate() {
                img[j * stride + i] = v;
            }
        }
        Ok(())
    }

    fn forward_cols(
        &self,
        img: &mut [f64],
        stride: usize,
        active_w: usize,
        active_h: usize,
        k: &KernelKind,
    ) -> Result<()> {
        let mut col = vec![0.0; active_h];
        for i in 0..active_w {
            for (j, slot) in col.iter_mut().enumerate() {
                *slot = img[j * stride + i];
            }
            k.forward_1d(&mut col)?;
            for (j, &v) in col.iter().enumerate() {
                img[j * stride + i] = v;
            }
        }
        Ok(())
    }
}

// Haar: pairwise average/difference lifting, applied recursively by the
// caller one pyramid level at a time (`buf` here is exactly one level: the
// first half holds the previous approximation, laid out before the new
// detail coefficients are interleaved in).
fn haar_forward(buf: &mut [f64]) {
    let n = buf.len();
    let half = n / 2;
    let mut approx = vec![0.0; half];
    let mut detail = vec![0.0; half];
    for k in 0..half {
        let a = buf[2 * k];
        let b = buf[2 * k + 1];
        approx[k] = (a + b) / std::f64::consts::SQRT_2;
        detail[k] = (a - b) / std::f64::consts::SQRT_2;
    }
    buf[..half].copy_from_slice(&approx);
    buf[half..].copy_from_slice(&detail);
}

fn haar_inverse(buf: &mut [f64]) {
    let n = buf.len();
    let half = n / 2;
    let mut out = vec![0.0; n];
    for k in 0..half {
        let s = buf[k];
        let d = buf[half + k];
        out[2 * k] = (s + d) / std::f64::consts::SQRT_2;
        out[2 * k + 1] = (s - d) / std::f64::consts::SQRT_2;
    }
    buf.copy_from_slice(&out);
}

// CDF 5/3 (LeGall-Tabatabai), the integer-to-integer-capable biorthogonal
// kernel used by JPEG2000's lossless mode. Predict step uses the two
// neighboring evens, update step uses the two neighboring odds; boundaries
// are handled by symmetric (mirror) extension.
fn cdf53_forward(buf: &mut [f64]) {
    let n = buf.len();
    let half = n / 2;
    // Predict step: each odd sample is replaced by its deviation from the
    // linear interpolation of its two even neighbors.
    let mut d = vec![0.0; half];
    for k in 0..half {
        let odd = buf[2 * k + 1];
        let e0 = buf[mirror(2 * k as isize, n)];
        let e1 = buf[mirror(2 * k as isize + 2, n)];
        d[k] = odd - 0.5 * (e0 + e1);
    }
    // Update step: each even sample absorbs a quarter of its two
    // neighboring detail coefficients so the running mean is preserved.
    let mut s = vec![0.0; half];
    for k in 0..half {
        let e = buf[2 * k];
        let d_prev = d[mirror(k as isize - 1, half)];
        let d_cur = d[k];
        s[k] = e + 0.25 * (d_prev + d_cur);
    }
    buf[..half].copy_from_slice(&s);
    buf[half..].copy_from_slice(&d);
}

fn cdf53_inverse(buf: &mut [f64]) {
    let n = buf.len();
    let half = n / 2;
    let s = buf[..half].to_vec();
    let d = buf[half..].to_vec();

    let mut even = vec![0.0; half];
    for k in 0..half {
        let d_prev = d[mirror(k as isize - 1, half)];
        let d_cur = d[k];
        even[k] = s[k] - 0.25 * (d_prev + d_cur);
    }
    let mut odd = vec![0.0; half];
    for k in 0..half {
        let e0 = even[mirror(k as isize, half)];
        let e1 = even[mirror(k as isize + 1, half)];
        odd[k] = d[k] + 0.5 * (e0 + e1);
    }
    let mut out = vec![0.0; n];
    for k in 0..half {
        out[2 * k] = even[k];
        out[2 * k + 1] = odd[k];
    }
    buf.copy_from_slice(&out);
}

/// Symmetric (mirror) boundary extension for an index that may run off
/// either end of a length-`len` array.
fn mirror(idx: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let len = len as isize;
    let mut i = idx;
    while i < 0 || i >= len {
        if i < 0 {
            i = -i - 1;
        } else {
            i = 2 * len - i - 1;
        }
    }
    i as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haar_is_idempotent() {
        let original = vec![1.0, 2.0, 3.0, 4.0, -1.0, 0.5, 7.0, 2.0];
        let mut buf = original.clone();
        haar_forward(&mut buf);
        haar_inverse(&mut buf);
        for (a, b) in original.iter().zip(buf.iter()) {
            assert!((a - b).abs() < 1e-10, "{a} vs {b}");
        }
    }

    #[test]
    fn cdf53_is_idempotent() {
        let original = vec![1.0, -2.0, 0.5, 4.0, 3.0, -1.5, 2.0, 0.25];
        let mut buf = original.clone();
        cdf53_forward(&mut buf);
        cdf53_inverse(&mut buf);
        for (a, b) in original.iter().zip(buf.iter()) {
            assert!((a - b).abs() < 1e-10, "{a} vs {b}");
        }
    }

    #[test]
    fn kernel2d_roundtrips_a_dense_image() {
        let k2 = Kernel2D::new("haar", "cdf53").unwrap();
        let (w, h) = (8, 4);
        let original: Vec<f64> = (0..w * h).map(|i| (i as f64 * 0.37).sin()).collect();
        let mut img = original.clone();
        k2.forward_2d(&mut img, w, h).unwrap();
        k2.inverse_2d(&mut img, w, h).unwrap();
        for (a, b) in original.iter().zip(img.iter()) {
            assert!((a - b).abs() < 1e-8, "{a} vs {b}");
        }
    }

    #[test]
    fn unknown_kernel_name_is_rejected() {
        assert!(KernelKind::parse("bogus").is_err());
    }
}
