//! Truncated singular value decomposition of named-index tensors.

use ndarray as nd;
use ndarray_linalg::{ JobSvd, SVDDCInto, error::LinalgError };
use num_complex::Complex64 as C64;
use thiserror::Error;
use crate::{
    index::Index,
    tensor::{ Tensor, TensorError },
};

#[derive(Debug, Error)]
pub enum SvdError {
    /// Returned when LAPACK does not produce the requested singular vectors.
    #[error("error in SVD: singular vectors were not computed")]
    MissingVectors,

    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error("error in SVD: {0}")]
    Linalg(#[from] LinalgError),
}
pub type SvdResult<T> = Result<T, SvdError>;

/// Truncation settings for a single factorization.
///
/// Singular values that are not normal floats or that are at most `cutoff`
/// are discarded, and at most `max_dim` values are kept. At least one value
/// is always kept.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SvdOptions {
    pub max_dim: Option<usize>,
    pub cutoff: f64,
}

impl Default for SvdOptions {
    fn default() -> Self { Self { max_dim: None, cutoff: 0.0 } }
}

impl SvdOptions {
    pub fn with_max_dim(self, max_dim: usize) -> Self {
        Self { max_dim: Some(max_dim), ..self }
    }

    pub fn with_cutoff(self, cutoff: f64) -> Self { Self { cutoff, ..self } }
}

/// Result of [`svd`].
///
/// `u` and `vh` share the new bond index `bond`, so that `u · diag(s) · vh`
/// reproduces the factorized tensor up to truncation.
#[derive(Clone, Debug)]
pub struct Svd {
    pub u: Tensor<Index, C64>,
    /// Kept singular values, in descending order.
    pub s: Vec<f64>,
    pub vh: Tensor<Index, C64>,
    pub bond: Index,
    /// Sum of the squares of the discarded singular values.
    pub truncerr: f64,
}

impl Svd {
    /// Return the number of kept singular values.
    pub fn rank(&self) -> usize { self.s.len() }

    /// Return the squared kept singular values.
    pub fn eigs(&self) -> Vec<f64> { self.s.iter().map(|sk| sk * sk).collect() }

    /// Return `(u · diag(s), vh)`.
    pub fn absorb_left(self) -> SvdResult<(Tensor<Index, C64>, Tensor<Index, C64>)> {
        let Self { mut u, s, vh, bond, .. } = self;
        u.scale_index(&bond, &s)?;
        Ok((u, vh))
    }

    /// Return `(u, diag(s) · vh)`.
    pub fn absorb_right(self) -> SvdResult<(Tensor<Index, C64>, Tensor<Index, C64>)> {
        let Self { u, s, mut vh, bond, .. } = self;
        vh.scale_index(&bond, &s)?;
        Ok((u, vh))
    }
}

/// Factorize `tens` across the partition of its indices into `rows` and the
/// remainder.
///
/// Only the thin factors are computed, so an `m × n` matrix yields `u` of
/// at most `m × min(m, n)` and `vh` of at most `min(m, n) × n`.
///
/// The new bond index is `Index::link(bond_label, rank)`. `u` carries `rows`
/// followed by the bond, and `vh` carries the bond followed by the remaining
/// indices of `tens` in their original order.
pub fn svd(
    tens: &Tensor<Index, C64>,
    rows: &[Index],
    bond_label: usize,
    opts: SvdOptions,
) -> SvdResult<Svd>
{
    let (mat, row_idxs, col_idxs) = tens.matrix(rows)?;
    let (Some(u), s, Some(vh)) = mat.svddc_into(JobSvd::Some)?
        else { return Err(SvdError::MissingVectors); };
    let rank: usize
        = s.iter()
        .take_while(|sk| sk.is_normal() && **sk > opts.cutoff)
        .count()
        .min(opts.max_dim.unwrap_or(usize::MAX))
        .max(1);
    let truncerr: f64 = s.iter().skip(rank).map(|sk| sk * sk).sum();
    log::trace!(
        "svd {}x{}: kept {} of {} singular values",
        u.nrows(), vh.ncols(), rank, s.len(),
    );

    let bond = Index::link(bond_label, rank);
    let u_shape: Vec<usize>
        = row_idxs.iter().map(|idx| idx.dim())
        .chain([rank])
        .collect();
    let u_data: nd::ArrayD<C64>
        = u.slice(nd::s![.., ..rank])
        .as_standard_layout()
        .into_owned()
        .into_shape(u_shape)
        .map_err(TensorError::from)?;
    let vh_shape: Vec<usize>
        = [rank].into_iter()
        .chain(col_idxs.iter().map(|idx| idx.dim()))
        .collect();
    let vh_data: nd::ArrayD<C64>
        = vh.slice(nd::s![..rank, ..])
        .as_standard_layout()
        .into_owned()
        .into_shape(vh_shape)
        .map_err(TensorError::from)?;

    let u_idxs: Vec<Index> = row_idxs.into_iter().chain([bond]).collect();
    let vh_idxs: Vec<Index> = [bond].into_iter().chain(col_idxs).collect();
    Ok(Svd {
        u: Tensor::from_array(u_idxs, u_data)?,
        s: s.iter().take(rank).copied().collect(),
        vh: Tensor::from_array(vh_idxs, vh_data)?,
        bond,
        truncerr,
    })
}
