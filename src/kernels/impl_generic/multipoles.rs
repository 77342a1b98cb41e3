//! Newtonian-order multipoles of the orbital motion.
//!
//! ```text
//! h_lm = nu n_lm c_{l+e}(nu) x^{(l+e)/2} Y^{l-e,-m}(pi/2, phi),    e = (l + m) mod 2
//! ```
//!
//! with `x = omega^{2/3}`. Mass-type multipoles (`e = 0`) and current-type
//! multipoles (`e = 1`) differ only in the normalisation `n_lm`.

use std::f64::consts::PI;

use numr::dtype::Complex128;
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

use crate::constants::{PARAM_DIM, STATE_DIM};
use crate::error::{WaveformError, WaveformResult};
use crate::kernels::traits::KernelBuffer;
use crate::modes::ModeSet;
use crate::ragged::ValidLengths;

use super::hamiltonian::{BinaryParams, orbital_frequency};
use super::read_block;

fn factorial(n: i32) -> f64 {
    (2..=n).fold(1.0, |acc, k| acc * k as f64)
}

fn double_factorial(n: i32) -> f64 {
    let mut acc = 1.0;
    let mut k = n;
    while k > 1 {
        acc *= k as f64;
        k -= 2;
    }
    acc
}

/// `i^k` as (re, im).
fn i_pow(k: i32) -> (f64, f64) {
    match k.rem_euclid(4) {
        0 => (1.0, 0.0),
        1 => (0.0, 1.0),
        2 => (-1.0, 0.0),
        _ => (0.0, -1.0),
    }
}

fn sign(k: i32) -> f64 {
    if k.rem_euclid(2) == 0 { 1.0 } else { -1.0 }
}

/// Constant part of one mode: the normalisation times the angular factor of
/// `Y^{l-e,-m}(pi/2, 0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ModeCoefficient {
    pub ell: i32,
    pub mm: i32,
    pub parity: i32,
    pub re: f64,
    pub im: f64,
}

impl ModeCoefficient {
    pub(crate) fn new(ell: i32, mm: i32) -> Self {
        let parity = (ell + mm).rem_euclid(2);
        let l = ell as f64;
        let m = mm as f64;
        let ml = m.powi(ell);

        // n_lm = (i m)^l * prefactor, times -i for current-type modes
        let (ip_re, ip_im) = i_pow(ell + parity);
        let magnitude = if parity == 0 {
            8.0 * PI / double_factorial(2 * ell + 1)
                * ((l + 1.0) * (l + 2.0) / (l * (l - 1.0))).sqrt()
        } else {
            -16.0 * PI / double_factorial(2 * ell + 1)
                * ((2.0 * l + 1.0) * (l + 2.0) * (l * l - m * m)
                    / ((2.0 * l - 1.0) * (l + 1.0) * l * (l - 1.0)))
                    .sqrt()
        };

        // Y^{l',-m}(pi/2, 0) = (-1)^m K P_l'^m(0)
        let lp = ell - parity;
        let norm = ((2 * lp + 1) as f64 / (4.0 * PI) * factorial(lp - mm) / factorial(lp + mm)).sqrt();
        let legendre = sign((lp + mm) / 2) * double_factorial(lp + mm - 1) / double_factorial(lp - mm);
        let angular = sign(mm) * norm * legendre;

        let scale = ml * magnitude * angular;
        Self {
            ell,
            mm,
            parity,
            re: scale * ip_re,
            im: scale * ip_im,
        }
    }

    /// Mass-ratio dependence `c_k = X2^{k-1} + (-1)^k X1^{k-1}`.
    pub(crate) fn mass_factor(&self, params: &BinaryParams) -> f64 {
        let k = self.ell + self.parity;
        params.x2.powi(k - 1) + sign(k) * params.x1.powi(k - 1)
    }

    /// Evaluate at orbital phase `phi` and velocity parameter `v = omega^{1/3}`.
    pub(crate) fn evaluate(&self, amplitude: f64, v: f64, phi: f64) -> Complex128 {
        let a = amplitude * v.powi(self.ell + self.parity);
        let (s, c) = (-(self.mm as f64) * phi).sin_cos();
        Complex128::new(
            a * (self.re * c - self.im * s),
            a * (self.re * s + self.im * c),
        )
    }
}

/// Fill `out` (`[N, n_modes, T]`) with the requested modes along each
/// trajectory. Samples past a binary's valid length stay zero.
pub fn evaluate_modes_impl<R, C>(
    _client: &C,
    out: &mut KernelBuffer<Complex128>,
    states: &Tensor<R>,
    params: &Tensor<R>,
    lengths: &ValidLengths,
    modes: &ModeSet,
) -> WaveformResult<()>
where
    R: Runtime,
    C: RuntimeClient<R>,
{
    let shape = states.shape().to_vec();
    let n = lengths.batch_size();
    let t_len = lengths.max_len();
    if shape != [n, STATE_DIM, t_len] {
        return Err(WaveformError::invalid_input(format!(
            "evaluate_modes: states {:?}, expected [{}, {}, {}]",
            shape, n, STATE_DIM, t_len
        )));
    }
    let (block, n_params) = read_block(params, PARAM_DIM, "evaluate_modes: params")?;
    let n_modes = modes.len();
    if n_params != n || out.len() != n * n_modes * t_len {
        return Err(WaveformError::invalid_input(format!(
            "evaluate_modes: batch mismatch (states {}, params {}, out {} for {} modes)",
            n,
            n_params,
            out.len(),
            n_modes
        )));
    }

    let data: Vec<f64> = states.contiguous().to_vec();
    let coefficients: Vec<ModeCoefficient> = modes
        .iter()
        .map(|(ell, mm)| ModeCoefficient::new(ell, mm))
        .collect();
    let out = out.as_mut_slice();

    for b in 0..n {
        let (binary, _) = BinaryParams::from_block(&block, n, b);
        let nu = binary.nu();
        let base = b * STATE_DIM * t_len;
        let amplitudes: Vec<f64> = coefficients
            .iter()
            .map(|c| nu * c.mass_factor(&binary))
            .collect();

        for j in 0..lengths.get(b) {
            let r = data[base + j];
            let phi = data[base + t_len + j];
            let pr = data[base + 2 * t_len + j];
            let pphi = data[base + 3 * t_len + j];
            let v = orbital_frequency(&binary, r, pr, pphi).cbrt();

            for (k, coefficient) in coefficients.iter().enumerate() {
                out[(b * n_modes + k) * t_len + j] = coefficient.evaluate(amplitudes[k], v, phi);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(z: Complex128) -> f64 {
        z.re.hypot(z.im)
    }

    #[test]
    fn test_leading_quadrupole() {
        // h22 = -8 sqrt(pi/5) nu x e^{-2i phi} for equal masses
        let params = BinaryParams::from_masses(5.0, 5.0, 0.0, 0.0);
        let c = ModeCoefficient::new(2, 2);
        let amplitude = params.nu() * c.mass_factor(&params);
        let v: f64 = 0.3;
        let h = c.evaluate(amplitude, v, 0.0);

        let expected = -8.0 * (PI / 5.0).sqrt() * 0.25 * v * v;
        assert!((h.re - expected).abs() < 1e-14);
        assert!(h.im.abs() < 1e-14);

        // Rotating the orbit by phi multiplies by e^{-2i phi}
        let phi = 0.7;
        let rotated = c.evaluate(amplitude, v, phi);
        assert!((rotated.re - expected * (2.0 * phi).cos()).abs() < 1e-14);
        assert!((rotated.im + expected * (2.0 * phi).sin()).abs() < 1e-14);
    }

    #[test]
    fn test_current_quadrupole() {
        // h21 = -(8i/3) sqrt(pi/5) nu delta v^3 e^{-i phi}, delta = X1 - X2
        let params = BinaryParams::from_masses(8.0, 2.0, 0.0, 0.0);
        let c = ModeCoefficient::new(2, 1);
        assert_eq!(c.parity, 1);
        let amplitude = params.nu() * c.mass_factor(&params);
        let v: f64 = 0.25;
        let h = c.evaluate(amplitude, v, 0.0);

        let delta = params.x1 - params.x2;
        let expected_im = -8.0 / 3.0 * (PI / 5.0).sqrt() * params.nu() * delta * v.powi(3);
        assert!(h.re.abs() < 1e-14);
        assert!((h.im - expected_im).abs() < 1e-14);
    }

    #[test]
    fn test_odd_modes_vanish_for_equal_masses() {
        let params = BinaryParams::from_masses(5.0, 5.0, 0.0, 0.0);
        for (ell, mm) in [(2, 1), (3, 3), (3, 1), (5, 5)] {
            let c = ModeCoefficient::new(ell, mm);
            assert!(c.mass_factor(&params).abs() < 1e-15, "({}, {})", ell, mm);
        }
    }

    #[test]
    fn test_higher_modes_suppressed_at_low_velocity() {
        let params = BinaryParams::from_masses(8.0, 2.0, 0.0, 0.0);
        let v = 0.2;
        let h22 = {
            let c = ModeCoefficient::new(2, 2);
            abs(c.evaluate(params.nu() * c.mass_factor(&params), v, 0.3))
        };
        for (ell, mm) in [(3, 3), (4, 4), (5, 5), (6, 6)] {
            let c = ModeCoefficient::new(ell, mm);
            let h = abs(c.evaluate(params.nu() * c.mass_factor(&params), v, 0.3));
            assert!(h < h22, "({}, {})", ell, mm);
            assert!(h > 0.0);
        }
    }
}
