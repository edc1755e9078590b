//! Runtime-identified tensor indices for matrix product states.
//!
//! An [`Index`] is identified by a random [`DynId`] drawn at creation, so two
//! indices of equal dimension and kind are still distinct unless one was
//! copied from the other. Priming produces a copy that compares unequal to
//! the original, which is how bra tensors are kept from contracting with the
//! physical indices of their ket.

use std::fmt;
use rand::Rng;
use crate::tensor::Idx;

/// Random identifier of an [`Index`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DynId(u64);

impl DynId {
    /// Draw a fresh identifier.
    pub fn new() -> Self { Self(rand::thread_rng().gen()) }
}

impl Default for DynId {
    fn default() -> Self { Self::new() }
}

/// Role of an index in a chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKind {
    /// Physical index of the given site.
    Site(usize),
    /// Bond index linking sites `b` and `b + 1`.
    Link(usize),
}

/// A tensor index with a unique identity, a dimension, a kind, and a prime
/// level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Index {
    id: DynId,
    dim: usize,
    kind: IndexKind,
    plev: u32,
}

impl Index {
    fn new(kind: IndexKind, dim: usize) -> Self {
        Self { id: DynId::new(), dim, kind, plev: 0 }
    }

    /// Create a new physical index for site `k`.
    pub fn site(k: usize, dim: usize) -> Self { Self::new(IndexKind::Site(k), dim) }

    /// Create a new bond index for bond `b`.
    pub fn link(b: usize, dim: usize) -> Self { Self::new(IndexKind::Link(b), dim) }

    pub fn id(&self) -> DynId { self.id }

    #[inline]
    pub fn dim(&self) -> usize { self.dim }

    pub fn kind(&self) -> IndexKind { self.kind }

    /// Return the prime level.
    pub fn plev(&self) -> u32 { self.plev }

    pub fn is_site(&self) -> bool { matches!(self.kind, IndexKind::Site(_)) }

    pub fn is_link(&self) -> bool { matches!(self.kind, IndexKind::Link(_)) }

    /// Return a copy with the prime level raised by one.
    #[inline]
    pub fn prime(self) -> Self { Self { plev: self.plev + 1, ..self } }

    /// Return a copy with the prime level reset to zero.
    #[inline]
    pub fn noprime(self) -> Self { Self { plev: 0, ..self } }

    /// Return `true` if `other` is `self` up to prime level.
    pub fn same_as(&self, other: &Self) -> bool {
        self.id == other.id && self.dim == other.dim && self.kind == other.kind
    }
}

impl Idx for Index {
    fn dim(&self) -> usize { self.dim }

    fn label(&self) -> String {
        let primes = "'".repeat(self.plev as usize);
        match self.kind {
            IndexKind::Site(k) => format!("s{}{}", k, primes),
            IndexKind::Link(b) => format!("l{}{}", b, primes),
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(dim={})", self.label(), self.dim)
    }
}
