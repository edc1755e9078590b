//! Local Hilbert spaces and on-site operators.
//!
//! Operator matrices are stored with element `[a, b]` equal to ⟨a|O|b⟩. The
//! tensor returned by [`SiteSet::op`] carries indices `[s', s]` in that order,
//! so contracting it with a ket over `s` applies the operator and leaves the
//! primed index in place of `s`.

use ndarray as nd;
use num_complex::{ ComplexFloat, Complex64 as C64 };
use num_traits::{ One, Zero };
use once_cell::sync::Lazy;
use thiserror::Error;
use crate::{
    ComplexFloatExt,
    index::Index,
    tensor::{ Tensor, TensorError },
};

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("unknown operator name {0:?}")]
    UnknownOperator(String),

    #[error("unknown state name {0:?}")]
    UnknownState(String),

    #[error("site {site} is out of range for a chain of {n} sites")]
    SiteOutOfBounds { site: usize, n: usize },

    #[error(transparent)]
    Tensor(#[from] TensorError),
}
use SiteError::*;
pub type SiteResult<T> = Result<T, SiteError>;

fn half<A>() -> A
where A: ComplexFloat + ComplexFloatExt
{
    A::from_re(A::Real::one() / (A::Real::one() + A::Real::one()))
}

/// Make the 2×2 identity.
pub fn make_id<A>() -> nd::Array2<A>
where A: ComplexFloat + ComplexFloatExt
{
    nd::array![
        [A::one(),  A::zero()],
        [A::zero(), A::one() ],
    ]
}

/// Lazy-static version of [`make_id`] for a [`Complex64`][C64] element type.
pub static IDMAT: Lazy<nd::Array2<C64>> = Lazy::new(make_id);

/// Make the spin-1/2 *z* operator, diag(1/2, −1/2) in the (↑, ↓) basis.
pub fn make_sz<A>() -> nd::Array2<A>
where A: ComplexFloat + ComplexFloatExt
{
    let h: A = half();
    nd::array![
        [h,         A::zero()],
        [A::zero(), -h       ],
    ]
}

/// Lazy-static version of [`make_sz`] for a [`Complex64`][C64] element type.
pub static SZMAT: Lazy<nd::Array2<C64>> = Lazy::new(make_sz);

/// Make the raising operator, taking ↓ to ↑.
pub fn make_sp<A>() -> nd::Array2<A>
where A: ComplexFloat + ComplexFloatExt
{
    nd::array![
        [A::zero(), A::one() ],
        [A::zero(), A::zero()],
    ]
}

/// Lazy-static version of [`make_sp`] for a [`Complex64`][C64] element type.
pub static SPMAT: Lazy<nd::Array2<C64>> = Lazy::new(make_sp);

/// Make the lowering operator, taking ↑ to ↓.
pub fn make_sm<A>() -> nd::Array2<A>
where A: ComplexFloat + ComplexFloatExt
{
    nd::array![
        [A::zero(), A::zero()],
        [A::one(),  A::zero()],
    ]
}

/// Lazy-static version of [`make_sm`] for a [`Complex64`][C64] element type.
pub static SMMAT: Lazy<nd::Array2<C64>> = Lazy::new(make_sm);

/// Make the spin-1/2 *x* operator.
pub fn make_sx<A>() -> nd::Array2<A>
where A: ComplexFloat + ComplexFloatExt
{
    let h: A = half();
    nd::array![
        [A::zero(), h        ],
        [h,         A::zero()],
    ]
}

/// Lazy-static version of [`make_sx`] for a [`Complex64`][C64] element type.
pub static SXMAT: Lazy<nd::Array2<C64>> = Lazy::new(make_sx);

/// Make the spin-1/2 *y* operator.
pub fn make_sy<A>() -> nd::Array2<A>
where A: ComplexFloat + ComplexFloatExt
{
    let ih: A = A::i() * half();
    nd::array![
        [A::zero(), -ih      ],
        [ih,        A::zero()],
    ]
}

/// Lazy-static version of [`make_sy`] for a [`Complex64`][C64] element type.
pub static SYMAT: Lazy<nd::Array2<C64>> = Lazy::new(make_sy);

/// Make the projector onto ↑.
pub fn make_proj_up<A>() -> nd::Array2<A>
where A: ComplexFloat + ComplexFloatExt
{
    nd::array![
        [A::one(),  A::zero()],
        [A::zero(), A::zero()],
    ]
}

/// Lazy-static version of [`make_proj_up`] for a [`Complex64`][C64] element
/// type.
pub static PROJUPMAT: Lazy<nd::Array2<C64>> = Lazy::new(make_proj_up);

/// Make the projector onto ↓.
pub fn make_proj_dn<A>() -> nd::Array2<A>
where A: ComplexFloat + ComplexFloatExt
{
    nd::array![
        [A::zero(), A::zero()],
        [A::zero(), A::one() ],
    ]
}

/// Lazy-static version of [`make_proj_dn`] for a [`Complex64`][C64] element
/// type.
pub static PROJDNMAT: Lazy<nd::Array2<C64>> = Lazy::new(make_proj_dn);

/// Describes the local Hilbert space of one site.
pub trait SiteType {
    /// Return the dimension of the local Hilbert space.
    fn dim(&self) -> usize;

    /// Return the matrix of a named operator, or `None` if the name is not
    /// recognized.
    fn op(&self, name: &str) -> Option<nd::Array2<C64>>;

    /// Return the basis position of a named state, or `None` if the name is
    /// not recognized.
    fn state(&self, name: &str) -> Option<usize>;
}

/// A spin-1/2 degree of freedom with basis order (↑, ↓).
///
/// Recognized operators are `Id`, `Sz`, `S+` (or `Sp`), `S-` (or `Sm`),
/// `Sx`, `Sy`, `projUp`, and `projDn`. Recognized states are `Up` (or `↑`)
/// and `Dn` (or `↓`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SpinHalf;

impl SiteType for SpinHalf {
    fn dim(&self) -> usize { 2 }

    fn op(&self, name: &str) -> Option<nd::Array2<C64>> {
        let mat: &Lazy<nd::Array2<C64>>
            = match name {
                "Id" => &IDMAT,
                "Sz" => &SZMAT,
                "S+" | "Sp" => &SPMAT,
                "S-" | "Sm" => &SMMAT,
                "Sx" => &SXMAT,
                "Sy" => &SYMAT,
                "projUp" => &PROJUPMAT,
                "projDn" => &PROJDNMAT,
                _ => { return None; },
            };
        Some(Lazy::force(mat).clone())
    }

    fn state(&self, name: &str) -> Option<usize> {
        match name {
            "Up" | "↑" => Some(0),
            "Dn" | "↓" => Some(1),
            _ => None,
        }
    }
}

/// The physical indices of a chain of identical sites.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteSet<S = SpinHalf> {
    site_type: S,
    indices: Vec<Index>,
}

impl SiteSet<SpinHalf> {
    /// Create a chain of `n` spin-1/2 sites.
    pub fn spin_half(n: usize) -> Self { Self::new(n, SpinHalf) }
}

impl<S> SiteSet<S>
where S: SiteType
{
    /// Create a chain of `n` sites of the given type, each with a fresh
    /// physical index.
    pub fn new(n: usize, site_type: S) -> Self {
        let indices: Vec<Index>
            = (0..n).map(|k| Index::site(k, site_type.dim())).collect();
        Self { site_type, indices }
    }

    /// Return the number of sites.
    pub fn len(&self) -> usize { self.indices.len() }

    pub fn is_empty(&self) -> bool { self.indices.is_empty() }

    pub fn site_type(&self) -> &S { &self.site_type }

    /// Return the physical index of site `k`.
    pub fn index(&self, k: usize) -> SiteResult<&Index> {
        self.indices.get(k)
            .ok_or(SiteOutOfBounds { site: k, n: self.indices.len() })
    }

    pub fn indices(&self) -> &[Index] { &self.indices }

    /// Return the named operator at site `k` as a tensor with indices
    /// `[s_k', s_k]`.
    pub fn op(&self, name: &str, k: usize) -> SiteResult<Tensor<Index, C64>> {
        let s = *self.index(k)?;
        let mat: nd::Array2<C64>
            = self.site_type.op(name)
            .ok_or_else(|| UnknownOperator(name.to_string()))?;
        Ok(Tensor::from_array(vec![s.prime(), s], mat.into_dyn())?)
    }

    /// Return the basis position of the named state at site `k`.
    pub fn state(&self, name: &str, k: usize) -> SiteResult<usize> {
        self.index(k)?;
        self.site_type.state(name).ok_or_else(|| UnknownState(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comm(a: &nd::Array2<C64>, b: &nd::Array2<C64>) -> nd::Array2<C64> {
        a.dot(b) - b.dot(a)
    }

    #[test]
    fn spin_algebra() {
        let i = C64::i();
        // [S+, S-] = 2 Sz
        assert_eq!(comm(&SPMAT, &SMMAT), SZMAT.mapv(|z| 2.0 * z));
        // [Sx, Sy] = i Sz
        assert_eq!(comm(&SXMAT, &SYMAT), SZMAT.mapv(|z| i * z));
        // S+ = Sx + i Sy
        assert_eq!(&*SXMAT + &SYMAT.mapv(|z| i * z), *SPMAT);
        assert_eq!(&*PROJUPMAT + &*PROJDNMAT, *IDMAT);
    }

    #[test]
    fn raising_acts_on_down() {
        let sites = SiteSet::spin_half(3);
        let s = *sites.index(1).unwrap();
        let dn = sites.state("Dn", 1).unwrap();
        let ket = Tensor::new([s], |k| if k[0] == dn { C64::one() } else { C64::zero() })
            .unwrap();
        let raised = ket.contract(sites.op("S+", 1).unwrap()).unwrap();
        let data = raised.array_in(&[s.prime()]).unwrap();
        assert_eq!(data[[sites.state("Up", 1).unwrap()]], C64::one());
        assert_eq!(data[[dn]], C64::zero());
    }

    #[test]
    fn aliases_and_errors() {
        let sites = SiteSet::spin_half(2);
        assert_eq!(sites.len(), 2);
        assert!(!sites.is_empty() && SiteSet::spin_half(0).is_empty());
        assert_eq!(sites.site_type(), &SpinHalf);
        assert_eq!(SpinHalf.op("Sp"), SpinHalf.op("S+"));
        assert_eq!(SpinHalf.op("Sm"), SpinHalf.op("S-"));
        assert_eq!(sites.state("↓", 0).unwrap(), 1);
        assert!(matches!(sites.op("Sq", 0), Err(UnknownOperator(_))));
        assert!(matches!(sites.state("Left", 0), Err(UnknownState(_))));
        assert!(matches!(sites.op("Sz", 2), Err(SiteOutOfBounds { site: 2, n: 2 })));
    }
}
