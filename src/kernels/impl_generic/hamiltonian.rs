//! Conservative dynamics: effective-one-body Hamiltonian for aligned spins.
//!
//! All quantities are in units of the total mass M (G = c = 1). Momenta are
//! per unit reduced mass: `pr = P_r / mu`, `pphi = P_phi / (mu M)`.
//!
//! ```text
//! A(u)   = 1 - 2u + 2 nu u^3
//! D(u)   = 1 - 6 nu u^2
//! H_orb  = sqrt(A (1 + pphi^2 u^2 + (A / D) pr^2))
//! H_SO   = u^3 pphi (2 S + 3/2 S*)
//! H_eff  = H_orb + H_SO
//! H_real = sqrt(1 + 2 nu (H_eff - 1)) / nu
//! ```

use crate::constants::PARAM_DIM;

/// Mass fractions and aligned spins of one binary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryParams {
    /// m1 / M
    pub x1: f64,
    /// m2 / M
    pub x2: f64,
    pub chi1: f64,
    pub chi2: f64,
}

impl BinaryParams {
    /// Build from absolute masses.
    pub fn from_masses(m1: f64, m2: f64, chi1: f64, chi2: f64) -> Self {
        let mt = m1 + m2;
        Self {
            x1: m1 / mt,
            x2: m2 / mt,
            chi1,
            chi2,
        }
    }

    /// Read binary `index` out of a flattened `[PARAM_DIM, n]` parameter block.
    ///
    /// Returns the parameters and the target orbital frequency in the last row.
    pub fn from_block(block: &[f64], n: usize, index: usize) -> (Self, f64) {
        debug_assert_eq!(block.len(), PARAM_DIM * n);
        let params = Self {
            x1: block[index],
            x2: block[n + index],
            chi1: block[2 * n + index],
            chi2: block[3 * n + index],
        };
        (params, block[4 * n + index])
    }

    /// Symmetric mass ratio.
    #[inline]
    pub fn nu(&self) -> f64 {
        self.x1 * self.x2
    }

    /// Spin-orbit gyro-gravitomagnetic combination `2 S + 3/2 S*`.
    #[inline]
    pub fn spin_orbit(&self) -> f64 {
        let s = self.x1 * self.x1 * self.chi1 + self.x2 * self.x2 * self.chi2;
        let s_star = self.x1 * self.x2 * (self.chi1 + self.chi2);
        2.0 * s + 1.5 * s_star
    }
}

/// Real Hamiltonian and its phase-space gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partials {
    pub h: f64,
    pub dh_dr: f64,
    pub dh_dpr: f64,
    pub dh_dpphi: f64,
}

/// Evaluate the Hamiltonian and its analytic partial derivatives.
///
/// Returns NaN components when the point lies inside the effective horizon.
pub fn hamiltonian(params: &BinaryParams, r: f64, pr: f64, pphi: f64) -> Partials {
    let nu = params.nu();
    let sigma = params.spin_orbit();
    let u = 1.0 / r;
    let u2 = u * u;
    let u3 = u2 * u;

    let a = 1.0 - 2.0 * u + 2.0 * nu * u3;
    let a_u = -2.0 + 6.0 * nu * u2;
    let d = 1.0 - 6.0 * nu * u2;
    let d_u = -12.0 * nu * u;

    let pr2 = pr * pr;
    let q = pphi * pphi * u2 + a * pr2 / d;
    let q_u = 2.0 * pphi * pphi * u + pr2 * (a_u * d - a * d_u) / (d * d);

    let h_orb = (a * (1.0 + q)).sqrt();
    let h_eff = h_orb + u3 * pphi * sigma;
    let w = (1.0 + 2.0 * nu * (h_eff - 1.0)).sqrt();

    let dheff_du = (a_u * (1.0 + q) + a * q_u) / (2.0 * h_orb) + 3.0 * u2 * pphi * sigma;
    let dheff_dr = -u2 * dheff_du;
    let dheff_dpr = a * a * pr / (d * h_orb);
    let dheff_dpphi = a * pphi * u2 / h_orb + u3 * sigma;

    Partials {
        h: w / nu,
        dh_dr: dheff_dr / w,
        dh_dpr: dheff_dpr / w,
        dh_dpphi: dheff_dpphi / w,
    }
}

/// Orbital angular frequency `dphi/dt = dH/dpphi`.
#[inline]
pub fn orbital_frequency(params: &BinaryParams, r: f64, pr: f64, pphi: f64) -> f64 {
    hamiltonian(params, r, pr, pphi).dh_dpphi
}

/// Residual of the quasi-circular conditions at `pr = 0`:
/// `[dH/dr, dH/dpphi - omega0]`.
pub fn circular_residual(params: &BinaryParams, omega0: f64, r: f64, pphi: f64) -> [f64; 2] {
    let p = hamiltonian(params, r, 0.0, pphi);
    [p.dh_dr, p.dh_dpphi - omega0]
}

/// Slope of the circular-orbit angular momentum, `dpphi/dr`, by implicit
/// differentiation of `dH/dr(r, pphi) = 0` with central differences.
pub fn circular_pphi_slope(params: &BinaryParams, r: f64, pphi: f64, eps: f64) -> f64 {
    let hr = eps * r.abs().max(1.0);
    let hp = eps * pphi.abs().max(1.0);

    let f = |r: f64, pphi: f64| hamiltonian(params, r, 0.0, pphi).dh_dr;

    let df_dr = (f(r + hr, pphi) - f(r - hr, pphi)) / (2.0 * hr);
    let df_dpphi = (f(r, pphi + hp) - f(r, pphi - hp)) / (2.0 * hp);

    -df_dr / df_dpphi
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equal_mass() -> BinaryParams {
        BinaryParams::from_masses(5.0, 5.0, 0.0, 0.0)
    }

    #[test]
    fn test_mass_fractions() {
        let p = BinaryParams::from_masses(8.0, 2.0, 0.6, 0.05);
        assert!((p.x1 - 0.8).abs() < 1e-15);
        assert!((p.x2 - 0.2).abs() < 1e-15);
        assert!((p.nu() - 0.16).abs() < 1e-15);
    }

    #[test]
    fn test_newtonian_limit_of_circular_orbit() {
        // Far from merger pphi ~ sqrt(r) and omega ~ r^{-3/2}
        let p = equal_mass();
        let r: f64 = 1.0e4;
        let pphi = r.sqrt();
        let partials = hamiltonian(&p, r, 0.0, pphi);

        assert!((partials.dh_dpphi * r.powf(1.5) - 1.0).abs() < 1e-3);
        // Radial force nearly balanced
        assert!(partials.dh_dr.abs() < 1e-3 / (r * r));
    }

    #[test]
    fn test_analytic_gradient_matches_finite_differences() {
        let p = BinaryParams::from_masses(8.0, 2.0, 0.6, -0.3);
        let (r, pr, pphi) = (9.0, -2e-3, 3.6);
        let exact = hamiltonian(&p, r, pr, pphi);

        let h = 1e-6;
        let fd_r = (hamiltonian(&p, r + h, pr, pphi).h - hamiltonian(&p, r - h, pr, pphi).h)
            / (2.0 * h);
        let fd_pr = (hamiltonian(&p, r, pr + h, pphi).h - hamiltonian(&p, r, pr - h, pphi).h)
            / (2.0 * h);
        let fd_pphi = (hamiltonian(&p, r, pr, pphi + h).h - hamiltonian(&p, r, pr, pphi - h).h)
            / (2.0 * h);

        assert!((exact.dh_dr - fd_r).abs() < 1e-7);
        assert!((exact.dh_dpr - fd_pr).abs() < 1e-7);
        assert!((exact.dh_dpphi - fd_pphi).abs() < 1e-7);
    }

    #[test]
    fn test_circular_slope_positive_outside_isco() {
        let p = equal_mass();
        let r: f64 = 20.0;
        // Schwarzschild-like estimate is close enough to sit on the stable branch
        let pphi = r / (r - 3.0).sqrt();
        assert!(circular_pphi_slope(&p, r, pphi, 1e-6) > 0.0);
    }

    #[test]
    fn test_aligned_spin_raises_frequency_at_fixed_orbit() {
        let plain = BinaryParams::from_masses(5.0, 5.0, 0.0, 0.0);
        let spun = BinaryParams::from_masses(5.0, 5.0, 0.5, 0.5);
        let (r, pphi) = (10.0, 3.8);
        assert!(orbital_frequency(&spun, r, 0.0, pphi) > orbital_frequency(&plain, r, 0.0, pphi));
    }
}
