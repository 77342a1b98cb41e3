//! Generic kernel implementations shared by every backend.
//!
//! The model equations are evaluated per binary on the host; inputs are read
//! back once per kernel call and results are uploaded through a
//! [`KernelBuffer`](crate::kernels::KernelBuffer).

mod dopri;
mod flux;
mod hamiltonian;
mod multipoles;
mod roots;

pub use dopri::{equations_of_motion, integrate_impl};
pub use flux::{energy_flux, radiation_reaction};
pub use hamiltonian::{
    BinaryParams, Partials, circular_pphi_slope, circular_residual, hamiltonian,
    orbital_frequency,
};
pub use multipoles::evaluate_modes_impl;
pub use roots::{root_find_2d_impl, root_find_scalar_impl};

use numr::runtime::Runtime;
use numr::tensor::Tensor;

use crate::error::{WaveformError, WaveformResult};

/// Read a `[rows, N]` block to the host, returning the data and `N`.
pub(crate) fn read_block<R: Runtime>(
    tensor: &Tensor<R>,
    rows: usize,
    what: &str,
) -> WaveformResult<(Vec<f64>, usize)> {
    let shape = tensor.shape();
    if shape.len() != 2 || shape[0] != rows || shape[1] == 0 {
        return Err(WaveformError::invalid_input(format!(
            "{}: expected shape [{}, N], got {:?}",
            what, rows, shape
        )));
    }
    let n = shape[1];
    let data: Vec<f64> = tensor.contiguous().to_vec();
    Ok((data, n))
}
