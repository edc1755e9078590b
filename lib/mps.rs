//! Matrix product states in mixed canonical form.
//!
//! The state is stored as one tensor per site, connected by bond ("link")
//! indices:
//!
//! ```text
//!       .-link 0-.       .-link 1-.      .-link n-2-.
//!       V        V       V        V      V          V
//!     A[0] ---------- A[1] ---------- ... ---------- A[n-1]
//!      |               |                               |
//!      | <- site 0     | <- site 1                     | <- site n-1
//! ```
//!
//! Boundary tensors have rank 2 and interior tensors have rank 3 with
//! indices ordered as `[link k-1, site k, link k]`. When the orthogonality
//! center is known to sit at site `c`, every tensor left of `c` is
//! left-orthonormal and every tensor right of `c` is right-orthonormal, so
//! that expectation values local to a window around `c` reduce to
//! contractions over that window alone.

use std::fmt;
use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use thiserror::Error;
use crate::{
    index::Index,
    siteset::{ SiteError, SiteSet, SiteType },
    svd::{ self, SvdError, SvdOptions },
    tensor::{ Tensor, TensorError },
};

#[derive(Debug, Error)]
pub enum MPSError {
    /// Returned when attempting to create a new MPS for a state of less than 1
    /// particle.
    #[error("error in MPS creation: cannot create for an empty system")]
    EmptySystem,

    /// Returned when the number of given states or amplitudes does not match
    /// the chain.
    #[error("error in MPS creation: expected {expected} entries but got {got}")]
    StateIncompatibleShape { expected: usize, got: usize },

    /// Returned when attempting to create a new MPS from a state vector with
    /// zero (or non-finite) norm.
    #[error("error in MPS creation: state vector cannot be normalized")]
    ZeroNorm,

    #[error("site {site} is out of range for a chain of {n} sites")]
    SiteOutOfBounds { site: usize, n: usize },

    #[error("bond {bond} is out of range for a chain of {n} sites")]
    BondOutOfBounds { bond: usize, n: usize },

    /// Returned when a windowed contraction is requested while the
    /// orthogonality center is unknown or outside the window.
    #[error("orthogonality center {center:?} is not within sites {lo}..={hi}")]
    NotCanonical { center: Option<usize>, lo: usize, hi: usize },

    #[error("invalid operator string: {0}")]
    InvalidOperatorString(String),

    /// Returned when an operator is requested from a site set whose physical
    /// index at the given site is not the state's.
    #[error("site set does not match the state at site {0}")]
    SiteSetMismatch(usize),

    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error(transparent)]
    Svd(#[from] SvdError),

    #[error(transparent)]
    Site(#[from] SiteError),
}
use MPSError::*;
pub type MPSResult<T> = Result<T, MPSError>;

/// A matrix product state over a chain of sites.
#[derive(Clone, Debug)]
pub struct MPS {
    n: usize,
    data: Vec<Tensor<Index, C64>>,
    sites: Vec<Index>,
    links: Vec<Index>, // links[b] joins data[b] and data[b + 1]
    center: Option<usize>,
    cutoff: f64,
}

// indices of the tensor at site k, and the axis of its physical index
fn local_indices(sites: &[Index], links: &[Index], k: usize) -> (Vec<Index>, usize) {
    let left = k.checked_sub(1).and_then(|b| links.get(b)).copied();
    let right = links.get(k).copied();
    let site_axis = usize::from(left.is_some());
    let idxs: Vec<Index>
        = left.into_iter()
        .chain([sites[k]])
        .chain(right)
        .collect();
    (idxs, site_axis)
}

impl MPS {
    /// Create a product state from one state name per site, e.g. `"Up"` or
    /// `"Dn"` for [`SpinHalf`][crate::SpinHalf] sites.
    ///
    /// Every link has dimension 1 and the orthogonality center is placed at
    /// site 0.
    pub fn from_states<S, I, N>(sites: &SiteSet<S>, states: I) -> MPSResult<Self>
    where
        S: SiteType,
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let n = sites.len();
        if n == 0 { return Err(EmptySystem); }
        let names: Vec<N> = states.into_iter().collect();
        if names.len() != n {
            return Err(StateIncompatibleShape { expected: n, got: names.len() });
        }
        let site_idxs: Vec<Index> = sites.indices().to_vec();
        let links: Vec<Index>
            = (0..n - 1).map(|b| Index::link(b, 1)).collect();
        let data: Vec<Tensor<Index, C64>>
            = names.iter().enumerate()
            .map(|(k, name)| -> MPSResult<Tensor<Index, C64>> {
                let state = sites.state(name.as_ref(), k)?;
                let (idxs, site_axis) = local_indices(&site_idxs, &links, k);
                let tens = Tensor::new(idxs, |c| {
                    if c[site_axis] == state { C64::one() } else { C64::zero() }
                })?;
                Ok(tens)
            })
            .collect::<MPSResult<_>>()?;
        Ok(Self { n, data, sites: site_idxs, links, center: Some(0), cutoff: 0.0 })
    }

    /// Create an MPS by factorizing a full state vector.
    ///
    /// Amplitudes are read in row-major order with site 0 as the most
    /// significant digit, and are normalized first. Successive SVDs discard
    /// singular values at or below `cutoff` (default 0). The result is
    /// left-canonical with its orthogonality center at site `n - 1`.
    pub fn from_vector<S, I>(sites: &SiteSet<S>, state: I, cutoff: Option<f64>)
        -> MPSResult<Self>
    where
        S: SiteType,
        I: IntoIterator<Item = C64>,
    {
        let n = sites.len();
        if n == 0 { return Err(EmptySystem); }
        let dims: Vec<usize>
            = sites.indices().iter().map(|idx| idx.dim()).collect();
        let total: usize = dims.iter().product();
        let mut amps: Vec<C64> = state.into_iter().collect();
        if amps.len() != total {
            return Err(StateIncompatibleShape { expected: total, got: amps.len() });
        }
        let norm: f64 = amps.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
        if !norm.is_normal() { return Err(ZeroNorm); }
        amps.iter_mut().for_each(|a| { *a /= norm; });

        let cutoff = cutoff.unwrap_or(0.0);
        let opts = SvdOptions::default().with_cutoff(cutoff);
        let site_idxs: Vec<Index> = sites.indices().to_vec();
        let full: nd::ArrayD<C64>
            = nd::ArrayD::from_shape_vec(dims, amps)
            .map_err(TensorError::from)?;
        let mut rest = Tensor::from_array(site_idxs.clone(), full)?;
        let mut data: Vec<Tensor<Index, C64>> = Vec::with_capacity(n);
        let mut links: Vec<Index> = Vec::with_capacity(n - 1);
        for (k, s) in site_idxs.iter().enumerate().take(n - 1) {
            let rows: Vec<Index>
                = links.last().into_iter().copied().chain([*s]).collect();
            let factor = svd::svd(&rest, &rows, k, opts)?;
            let bond = factor.bond;
            let (u, svh) = factor.absorb_right()?;
            data.push(u);
            links.push(bond);
            rest = svh;
        }
        data.push(rest);
        log::debug!(
            "factorized a {}-site state vector with bond dimensions {:?}",
            n, links.iter().map(|l| l.dim()).collect::<Vec<_>>(),
        );
        Ok(Self { n, data, sites: site_idxs, links, center: Some(n - 1), cutoff })
    }

    /// Set the singular value cutoff used when moving the orthogonality
    /// center.
    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Return the number of sites.
    #[inline]
    pub fn n(&self) -> usize { self.n }

    /// Return the site of the orthogonality center, if known.
    #[inline]
    pub fn center(&self) -> Option<usize> { self.center }

    #[inline]
    pub fn cutoff(&self) -> f64 { self.cutoff }

    /// Return the tensor at site `k`.
    pub fn site(&self, k: usize) -> MPSResult<&Tensor<Index, C64>> {
        self.data.get(k).ok_or(SiteOutOfBounds { site: k, n: self.n })
    }

    /// Return a mutable reference to the tensor at site `k`.
    ///
    /// The orthogonality center is forgotten, since the caller may break the
    /// gauge. The tensor's indices must be left in place.
    pub fn site_mut(&mut self, k: usize) -> MPSResult<&mut Tensor<Index, C64>> {
        let n = self.n;
        let tens = self.data.get_mut(k).ok_or(SiteOutOfBounds { site: k, n })?;
        self.center = None;
        Ok(tens)
    }

    /// Return the physical index of site `k`.
    pub fn site_index(&self, k: usize) -> MPSResult<&Index> {
        self.sites.get(k).ok_or(SiteOutOfBounds { site: k, n: self.n })
    }

    /// Return the index of bond `b`, which joins sites `b` and `b + 1`.
    pub fn link_index(&self, b: usize) -> MPSResult<&Index> {
        self.links.get(b).ok_or(BondOutOfBounds { bond: b, n: self.n })
    }

    /// Return the dimensions of all bonds, from left to right.
    pub fn bond_dims(&self) -> Vec<usize> {
        self.links.iter().map(|l| l.dim()).collect()
    }

    fn svd_opts(&self) -> SvdOptions { SvdOptions::default().with_cutoff(self.cutoff) }

    // make site b left-orthonormal, pushing the remainder into site b + 1
    fn orthogonalize_left(&mut self, b: usize) -> MPSResult<()> {
        let link = self.links[b];
        let rows: Vec<Index>
            = self.data[b].indices()
            .filter(|idx| **idx != link)
            .copied()
            .collect();
        let factor = svd::svd(&self.data[b], &rows, b, self.svd_opts())?;
        let bond = factor.bond;
        let (u, svh) = factor.absorb_right()?;
        let next = svh.contract(self.data[b + 1].clone())?;
        self.data[b] = u;
        self.data[b + 1] = next;
        self.links[b] = bond;
        Ok(())
    }

    // make site b right-orthonormal, pushing the remainder into site b - 1
    fn orthogonalize_right(&mut self, b: usize) -> MPSResult<()> {
        let link = self.links[b - 1];
        let factor = svd::svd(&self.data[b], &[link], b - 1, self.svd_opts())?;
        let bond = factor.bond;
        let (us, vh) = factor.absorb_left()?;
        let prev = self.data[b - 1].clone().contract(us)?;
        self.data[b - 1] = prev;
        self.data[b] = vh;
        self.links[b - 1] = bond;
        Ok(())
    }

    /// Move the orthogonality center to site `k`.
    ///
    /// Afterward every tensor left of `k` is left-orthonormal, every tensor
    /// right of `k` is right-orthonormal, and [`center`][Self::center]
    /// returns `Some(k)`. The physical state is unchanged apart from singular
    /// values at or below the cutoff, which are dropped.
    ///
    /// Only bonds between the old and new centers are refactored if the old
    /// center is known; otherwise every bond is swept from both ends. Each
    /// refactored bond receives a fresh link index whose dimension is the
    /// number of kept singular values.
    pub fn position(&mut self, k: usize) -> MPSResult<&mut Self> {
        if k >= self.n { return Err(SiteOutOfBounds { site: k, n: self.n }); }
        match self.center {
            Some(c) if c == k => { },
            Some(c) if c < k => {
                for b in c..k { self.orthogonalize_left(b)?; }
            },
            Some(c) => {
                for b in (k + 1..=c).rev() { self.orthogonalize_right(b)?; }
            },
            None => {
                for b in 0..k { self.orthogonalize_left(b)?; }
                for b in (k + 1..self.n).rev() { self.orthogonalize_right(b)?; }
            },
        }
        if self.center != Some(k) {
            log::debug!("moved orthogonality center from {:?} to {}", self.center, k);
        }
        self.center = Some(k);
        Ok(self)
    }

    /// Contract the chain into a full state vector, with site 0 as the most
    /// significant digit.
    pub fn contract(&self) -> MPSResult<nd::Array1<C64>> {
        let mut acc = Tensor::new_scalar(C64::one());
        for tens in self.data.iter() {
            acc = acc.contract(tens.clone())?;
        }
        let arr = acc.array_in(&self.sites)?;
        let len = arr.len();
        Ok(arr.into_shape(len).map_err(TensorError::from)?)
    }

    /// Return the norm ⟨ψ|ψ⟩^(1/2), computed by a left-to-right transfer
    /// contraction.
    pub fn norm(&self) -> MPSResult<f64> {
        let mut env = Tensor::new_scalar(C64::one());
        for tens in self.data.iter() {
            env = env.contract(tens.clone())?;
            env = env.contract(tens.clone().prime_links()?.dag())?;
        }
        Ok(env.scalar()?.re.sqrt())
    }
}

impl fmt::Display for MPS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, tens) in self.data.iter().enumerate() {
            let marker = if self.center == Some(k) { "*" } else { " " };
            let idxs: String = tens.indices().map(|idx| idx.to_string()).join(" ");
            write!(f, "{}[{}] {{ {} }}", marker, k, idxs)?;
            if k < self.n - 1 { writeln!(f)?; }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{ Rng, SeedableRng, rngs::StdRng };

    fn random_state(n: usize, seed: u64) -> Vec<C64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..1_usize << n)
            .map(|_| C64::new(rng.gen::<f64>() - 0.5, rng.gen::<f64>() - 0.5))
            .collect()
    }

    fn assert_close(a: &nd::Array1<C64>, b: &nd::Array1<C64>) {
        assert_eq!(a.len(), b.len());
        a.iter().zip(b).for_each(|(x, y)| assert!((x - y).norm() < 1e-10));
    }

    // contract A with its conjugate over everything but `open`
    fn gram(tens: &Tensor<Index, C64>, open: Index) -> nd::Array2<C64> {
        let bra = tens.clone().prime_index(&open).unwrap().dag();
        let g = tens.clone().contract(bra).unwrap();
        g.array_in(&[open, open.prime()]).unwrap()
            .into_dimensionality::<nd::Ix2>().unwrap()
    }

    fn assert_identity(g: &nd::Array2<C64>) {
        for ((j, k), x) in g.indexed_iter() {
            let expected = if j == k { C64::one() } else { C64::zero() };
            assert!((x - expected).norm() < 1e-10);
        }
    }

    fn assert_canonical(mps: &MPS) {
        let c = mps.center().unwrap();
        for k in 0..c { assert_identity(&gram(&mps.data[k], mps.links[k])); }
        for k in c + 1..mps.n() { assert_identity(&gram(&mps.data[k], mps.links[k - 1])); }
    }

    #[test]
    fn product_state() {
        let sites = SiteSet::spin_half(4);
        let mps = MPS::from_states(&sites, ["Up", "Dn", "Dn", "Up"]).unwrap();
        assert_eq!(mps.n(), 4);
        assert_eq!(mps.bond_dims(), vec![1, 1, 1]);
        assert_eq!(mps.site(0).unwrap().rank(), 2);
        assert_eq!(mps.site(1).unwrap().rank(), 3);
        assert_eq!(mps.site(3).unwrap().rank(), 2);
        let psi = mps.contract().unwrap();
        // |0110> in binary
        psi.iter().enumerate().for_each(|(k, a)| {
            let expected = if k == 0b0110 { C64::one() } else { C64::zero() };
            assert_eq!(*a, expected);
        });
        assert!((mps.norm().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn single_site_chain() {
        let sites = SiteSet::spin_half(1);
        let mut mps = MPS::from_states(&sites, ["Dn"]).unwrap();
        assert_eq!(mps.site(0).unwrap().rank(), 1);
        assert!(mps.bond_dims().is_empty());
        mps.position(0).unwrap();
        assert_eq!(mps.contract().unwrap().to_vec(), vec![C64::zero(), C64::one()]);
    }

    #[test]
    fn vector_round_trip() {
        let n = 6;
        let sites = SiteSet::spin_half(n);
        let amps = random_state(n, 10546);
        let norm: f64 = amps.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
        let expected: nd::Array1<C64> = amps.iter().map(|a| *a / norm).collect();
        let mps = MPS::from_vector(&sites, amps, None).unwrap();
        assert_eq!(mps.center(), Some(n - 1));
        assert_eq!(mps.bond_dims(), vec![2, 4, 8, 4, 2]);
        assert_canonical(&mps);
        assert_close(&mps.contract().unwrap(), &expected);
    }

    #[test]
    fn position_preserves_state() {
        let n = 7;
        let sites = SiteSet::spin_half(n);
        let mut mps = MPS::from_vector(&sites, random_state(n, 2718), None).unwrap();
        let before = mps.contract().unwrap();
        for k in [0, 3, 6, 2, 2, 5] {
            mps.position(k).unwrap();
            assert_eq!(mps.center(), Some(k));
            assert_canonical(&mps);
            assert_close(&mps.contract().unwrap(), &before);
        }
        assert!((mps.norm().unwrap() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn unknown_center_sweeps_both_ways() {
        let n = 5;
        let sites = SiteSet::spin_half(n);
        let mut mps = MPS::from_vector(&sites, random_state(n, 31), None).unwrap();
        mps.site_mut(4).unwrap().scale_index(&sites.indices()[4], &[2.0, 2.0]).unwrap();
        assert_eq!(mps.center(), None);
        let before = mps.contract().unwrap();
        mps.position(2).unwrap();
        assert_canonical(&mps);
        assert_close(&mps.contract().unwrap(), &before);
        assert!((mps.norm().unwrap() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn cutoff_compresses_bonds() {
        // GHZ state on 5 sites has Schmidt rank 2 across every bond
        let n = 5;
        let sites = SiteSet::spin_half(n);
        let mut amps = vec![C64::zero(); 1 << n];
        amps[0] = C64::one();
        amps[(1 << n) - 1] = C64::one();
        let mut mps = MPS::from_vector(&sites, amps, Some(1e-12)).unwrap();
        assert_eq!(mps.bond_dims(), vec![2, 2, 2, 2]);
        mps.position(0).unwrap();
        assert_eq!(mps.bond_dims(), vec![2, 2, 2, 2]);
    }

    #[test]
    fn cutoff_applies_when_moving_center() {
        let sites = SiteSet::spin_half(2);
        let amps = vec![C64::one(), C64::zero(), C64::zero(), C64::new(1e-13, 0.0)];
        let mps = MPS::from_vector(&sites, amps, None).unwrap();
        assert_eq!(mps.bond_dims(), vec![2]);
        let mut mps = mps.with_cutoff(1e-12);
        assert_eq!(mps.cutoff(), 1e-12);
        mps.position(0).unwrap();
        assert_eq!(mps.bond_dims(), vec![1]);
        assert!((mps.norm().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sixteen_site_vector() {
        let n = 16;
        let sites = SiteSet::spin_half(n);
        let amps = random_state(n, 65536);
        let norm: f64 = amps.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
        let expected: nd::Array1<C64> = amps.iter().map(|a| *a / norm).collect();
        let mps = MPS::from_vector(&sites, amps, None).unwrap();
        let dims: Vec<usize>
            = (0..n - 1).map(|b| (1_usize << (b + 1)).min(1 << (n - 1 - b))).collect();
        assert_eq!(mps.bond_dims(), dims);
        assert_eq!(mps.site(0).unwrap().shape(), vec![2, 2]);
        assert_eq!(mps.site(n - 1).unwrap().shape(), vec![2, 2]);
        assert_close(&mps.contract().unwrap(), &expected);
    }

    #[test]
    fn creation_errors() {
        let empty = SiteSet::spin_half(0);
        assert!(matches!(MPS::from_states(&empty, Vec::<&str>::new()), Err(EmptySystem)));
        let sites = SiteSet::spin_half(3);
        assert!(matches!(
            MPS::from_states(&sites, ["Up", "Up"]),
            Err(StateIncompatibleShape { expected: 3, got: 2 }),
        ));
        assert!(matches!(
            MPS::from_states(&sites, ["Up", "Left", "Up"]),
            Err(Site(SiteError::UnknownState(_))),
        ));
        assert!(matches!(
            MPS::from_vector(&sites, vec![C64::zero(); 8], None),
            Err(ZeroNorm),
        ));
        assert!(matches!(
            MPS::from_vector(&sites, vec![C64::one(); 7], None),
            Err(StateIncompatibleShape { expected: 8, got: 7 }),
        ));
        let mut mps = MPS::from_states(&sites, ["Up"; 3]).unwrap();
        assert!(matches!(mps.position(3), Err(SiteOutOfBounds { site: 3, n: 3 })));
        assert!(matches!(mps.link_index(2), Err(BondOutOfBounds { bond: 2, n: 3 })));
    }
}
