//! Registry of the (l, m) multipoles the model can produce.
//!
//! The (l, 0) memory modes are reserved and never offered, and l = 6 only
//! carries its even-m harmonics.

use crate::error::{WaveformError, WaveformResult};

/// Every mode the multipole kernels know how to evaluate, in output order.
pub const ALLOWED_MODES: [(i32, i32); 17] = [
    (2, 1),
    (2, 2),
    (3, 1),
    (3, 2),
    (3, 3),
    (4, 1),
    (4, 2),
    (4, 3),
    (4, 4),
    (5, 1),
    (5, 2),
    (5, 3),
    (5, 4),
    (5, 5),
    (6, 2),
    (6, 4),
    (6, 6),
];

/// Ordered, duplicate-free set of validated modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSet {
    ells: Vec<i32>,
    mms: Vec<i32>,
}

impl ModeSet {
    /// The full registry in canonical order.
    pub fn all() -> Self {
        Self {
            ells: ALLOWED_MODES.iter().map(|&(l, _)| l).collect(),
            mms: ALLOWED_MODES.iter().map(|&(_, m)| m).collect(),
        }
    }

    /// Validate a requested mode list.
    ///
    /// `None` resolves to the full registry. An explicit list keeps the
    /// caller's order.
    ///
    /// # Errors
    /// * `InvalidMode` for the first pair outside the registry
    /// * `DuplicateMode` if a pair is repeated
    /// * `InvalidInput` for an explicit empty list
    pub fn validate(modes: Option<&[(i32, i32)]>) -> WaveformResult<Self> {
        let Some(modes) = modes else {
            return Ok(Self::all());
        };

        if modes.is_empty() {
            return Err(WaveformError::invalid_input(
                "ModeSet::validate: mode list is empty",
            ));
        }

        let mut ells = Vec::with_capacity(modes.len());
        let mut mms = Vec::with_capacity(modes.len());

        for &(ell, mm) in modes {
            if !is_allowed(ell, mm) {
                return Err(WaveformError::InvalidMode {
                    ell,
                    mm,
                    allowed: allowed_list(),
                });
            }
            if ells.iter().zip(&mms).any(|(&l, &m)| l == ell && m == mm) {
                return Err(WaveformError::DuplicateMode { ell, mm });
            }
            ells.push(ell);
            mms.push(mm);
        }

        Ok(Self { ells, mms })
    }

    pub fn ells(&self) -> &[i32] {
        &self.ells
    }

    pub fn mms(&self) -> &[i32] {
        &self.mms
    }

    pub fn len(&self) -> usize {
        self.ells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ells.is_empty()
    }

    /// Iterate over (l, m) pairs in output order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.ells.iter().copied().zip(self.mms.iter().copied())
    }
}

/// Check a single pair against the registry.
pub fn is_allowed(ell: i32, mm: i32) -> bool {
    ALLOWED_MODES.contains(&(ell, mm))
}

fn allowed_list() -> String {
    let pairs: Vec<String> = ALLOWED_MODES
        .iter()
        .map(|(l, m)| format!("({}, {})", l, m))
        .collect();
    format!("[{}]", pairs.join(", "))
}
