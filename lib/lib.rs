//! Measurement of entanglement, local magnetization, and multi-site
//! correlation functions on matrix product states of spin-1/2 chains.
//!
//! The state is held as an [`MPS`] of named-index [`tensor::Tensor`]s over a
//! [`SiteSet`]. Every measurement in [`observables`] either re-centers the
//! orthogonality center itself or checks that it lies inside the window it
//! contracts.
//!
//! ```
//! use mps_observables::{ MPS, SiteSet, observables };
//!
//! let sites = SiteSet::spin_half(6);
//! let mut psi = MPS::from_states(&sites, ["Up"; 6])?;
//! let sz = observables::sz(&mut psi, &sites, 2)?;
//! assert!((sz - 0.5).abs() < 1e-12);
//! assert_eq!(observables::bond_dim(&psi, 2)?, 1);
//! # Ok::<(), mps_observables::mps::MPSError>(())
//! ```

use num_complex::{ ComplexFloat, Complex };
use num_traits::{ Float, Zero };

pub mod index;
pub mod tensor;
pub mod svd;
pub mod siteset;
pub mod mps;
pub mod observables;

pub use index::{ Index, IndexKind };
pub use mps::MPS;
pub use siteset::{ SiteSet, SiteType, SpinHalf };

/// Extension trait for [`ComplexFloat`].
pub trait ComplexFloatExt: ComplexFloat {
    /// Return the imaginary unit, *i*.
    fn i() -> Self;

    /// Convert from `Self::Real`.
    ///
    /// The result has imaginary part equal to zero.
    fn from_re(x: Self::Real) -> Self;
}

impl<T> ComplexFloatExt for Complex<T>
where
    Complex<T>: ComplexFloat<Real = T>,
    T: Zero + Float,
{
    fn i() -> Self { Complex::i() }

    fn from_re(x: Self::Real) -> Self {
        Self { re: x, im: <Self::Real as Zero>::zero() }
    }
}
