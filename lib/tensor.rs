//! Dense tensors whose axes are labeled by [`Idx`] values.
//!
//! Contraction is by index identity: two tensors are summed over every index
//! they hold in common, and the remaining indices of both are kept on the
//! result. Internally each contraction permutes the common axes together,
//! fuses both operands into matrices, and performs one matrix product.

use std::{ fmt, ops::Range };
use itertools::Itertools;
use ndarray::{ self as nd, Dimension, LinalgScalar };
use num_complex::ComplexFloat;
use thiserror::Error;
use crate::{ ComplexFloatExt, index::Index };

#[derive(Debug, Error)]
pub enum TensorError {
    /// Returned when a tensor would hold the same index on two axes.
    #[error("error in tensor creation: duplicate index {0}")]
    DuplicateIndex(String),

    /// Returned when a tensor is given an index of dimension zero.
    #[error("error in tensor creation: index {0} has dimension zero")]
    ZeroDimIndex(String),

    /// Returned when array data does not match the dimensions of its indices.
    #[error("error in tensor creation: expected shape {expected:?} but got {got:?}")]
    IncompatibleShape { expected: Vec<usize>, got: Vec<usize> },

    /// Returned when an index relabeling changes an index dimension.
    #[error("error in index mapping: dimension of {0} changed")]
    DimensionChange(String),

    /// Returned when a named index is not held by the tensor.
    #[error("missing index {0}")]
    MissingIndex(String),

    /// Returned when a scalar is requested from a tensor of nonzero rank.
    #[error("expected a scalar but the tensor has rank {0}")]
    NotScalar(usize),

    /// Returned when per-slice weights do not match an index dimension.
    #[error("got {got} weights for an index of dimension {dim}")]
    WeightLength { got: usize, dim: usize },

    #[error("array shape error: {0}")]
    Shape(#[from] nd::ShapeError),
}
use TensorError::*;
pub type TensorResult<T> = Result<T, TensorError>;

/// Describes a tensor index.
///
/// Implementors are compared with `Eq` to decide which axes of two tensors
/// are contracted, so equality should mean identity rather than equal
/// dimension. See [`Index`] for the runtime-identified implementation used by
/// matrix product states.
pub trait Idx: Clone + Eq + fmt::Debug {
    /// Return the number of values the index can take.
    fn dim(&self) -> usize;

    /// Return an identifying label for the index. This method is used only for
    /// printing purposes.
    fn label(&self) -> String;

    /// Return an iterator over all possible index values. The default
    /// implementation returns `0..self.dim()`.
    fn iter(&self) -> Range<usize> { 0..self.dim() }
}

/// A dense tensor with named indices.
///
/// A `Tensor<T, A>` is either a rank-0 scalar or an array of elements of type
/// `A` with one index of type `T` per axis. Index order matters only for
/// construction and raw data access; contraction finds common indices by
/// identity.
#[derive(Clone, PartialEq)]
pub struct Tensor<T, A>(TensorData<T, A>);

impl<T, A> fmt::Debug for Tensor<T, A>
where
    T: fmt::Debug,
    A: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(")?;
        match &self.0 {
            TensorData::Scalar(a) => {
                write!(f, "{:?}, rank=0", a)?;
            },
            TensorData::Tensor(idxs, a) => {
                writeln!(f)?;
                writeln!(f, "{:?},\nrank={}, indices={:?}", a, idxs.len(), idxs)?;
            },
        }
        write!(f, ")")
    }
}

impl<T, A> fmt::Display for Tensor<T, A>
where
    T: Idx,
    A: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            TensorData::Scalar(a) => write!(f, "{} {{ }}", a),
            TensorData::Tensor(idxs, a) => {
                let labels: String
                    = idxs.iter().map(|idx| idx.label()).join(", ");
                write!(f, "{} {{ {} }}", a, labels)
            },
        }
    }
}

#[derive(Clone, PartialEq)]
enum TensorData<T, A> {
    Scalar(A),
    Tensor(Vec<T>, nd::ArrayD<A>),
}

/// Iterator type over the indices of a given [`Tensor`].
///
/// The iterator item type is `&T`.
pub struct Indices<'a, T>(IndicesData<'a, T>);

enum IndicesData<'a, T> {
    Scalar,
    Tensor(std::slice::Iter<'a, T>),
}

impl<'a, T> Iterator for Indices<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.0 {
            IndicesData::Scalar => None,
            IndicesData::Tensor(iter) => iter.next(),
        }
    }
}

fn check_indices<T>(idxs: &[T]) -> TensorResult<()>
where T: Idx
{
    for (k, idx) in idxs.iter().enumerate() {
        if idx.dim() == 0 { return Err(ZeroDimIndex(idx.label())); }
        if idxs[..k].contains(idx) { return Err(DuplicateIndex(idx.label())); }
    }
    Ok(())
}

fn position_of<T>(idxs: &[T], index: &T) -> TensorResult<usize>
where T: Idx
{
    idxs.iter().position(|idx| idx == index)
        .ok_or_else(|| MissingIndex(index.label()))
}

// permute axes, then fuse into a row-major matrix
fn fuse<A>(data: nd::ArrayD<A>, perm: Vec<usize>, shape: (usize, usize))
    -> TensorResult<nd::Array2<A>>
where A: Clone
{
    let permuted = data.permuted_axes(perm);
    let fused: nd::Array2<A>
        = permuted.as_standard_layout()
        .into_owned()
        .into_shape(shape)?;
    Ok(fused)
}

impl<T, A> TensorData<T, A>
where T: Idx
{
    fn new<I, F>(indices: I, mut elems: F) -> TensorResult<Self>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&[usize]) -> A,
    {
        let indices: Vec<T> = indices.into_iter().collect();
        if indices.is_empty() {
            Ok(Self::Scalar(elems(&[])))
        } else {
            check_indices(&indices)?;
            let shape: Vec<usize>
                = indices.iter().map(|idx| idx.dim()).collect();
            let data: nd::ArrayD<A>
                = nd::ArrayD::from_shape_fn(shape, |k| elems(k.slice()));
            Ok(Self::Tensor(indices, data))
        }
    }

    fn from_array(indices: Vec<T>, data: nd::ArrayD<A>) -> TensorResult<Self>
    where A: Clone
    {
        let expected: Vec<usize>
            = indices.iter().map(|idx| idx.dim()).collect();
        if indices.is_empty() {
            return match data.iter().next() {
                Some(a) if data.len() == 1 => Ok(Self::Scalar(a.clone())),
                _ => Err(IncompatibleShape { expected, got: data.shape().to_vec() }),
            };
        }
        check_indices(&indices)?;
        if data.shape() != expected.as_slice() {
            return Err(IncompatibleShape { expected, got: data.shape().to_vec() });
        }
        Ok(Self::Tensor(indices, data))
    }

    fn rank(&self) -> usize {
        match self {
            Self::Scalar(_) => 0,
            Self::Tensor(idxs, _) => idxs.len(),
        }
    }

    fn indices(&self) -> Indices<'_, T> {
        match self {
            Self::Scalar(_) => Indices(IndicesData::Scalar),
            Self::Tensor(idxs, _) => Indices(IndicesData::Tensor(idxs.iter())),
        }
    }

    fn map_indices<F>(self, mut map: F) -> TensorResult<Self>
    where F: FnMut(T) -> T
    {
        match self {
            Self::Scalar(a) => Ok(Self::Scalar(a)),
            Self::Tensor(idxs, data) => {
                let mapped: Vec<T>
                    = idxs.into_iter()
                    .map(|idx| {
                        let dim = idx.dim();
                        let new = map(idx);
                        if new.dim() == dim {
                            Ok(new)
                        } else {
                            Err(DimensionChange(new.label()))
                        }
                    })
                    .collect::<TensorResult<_>>()?;
                check_indices(&mapped)?;
                Ok(Self::Tensor(mapped, data))
            },
        }
    }

    fn contract(self, other: Self) -> TensorResult<Self>
    where A: LinalgScalar
    {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => Ok(Self::Scalar(a * b)),
            (Self::Scalar(a), Self::Tensor(idxs, b)) => {
                Ok(Self::Tensor(idxs, b.mapv(|bk| a * bk)))
            },
            (Self::Tensor(idxs, a), Self::Scalar(b)) => {
                Ok(Self::Tensor(idxs, a.mapv(|ak| ak * b)))
            },
            (Self::Tensor(idxs_a, a), Self::Tensor(idxs_b, b)) => {
                // axis positions of the common indices in each operand
                let (common_a, common_b): (Vec<usize>, Vec<usize>)
                    = idxs_a.iter().enumerate()
                    .filter_map(|(k_a, idx)| {
                        idxs_b.iter().position(|jdx| jdx == idx)
                            .map(|k_b| (k_a, k_b))
                    })
                    .unzip();
                let free_a: Vec<usize>
                    = (0..idxs_a.len()).filter(|k| !common_a.contains(k)).collect();
                let free_b: Vec<usize>
                    = (0..idxs_b.len()).filter(|k| !common_b.contains(k)).collect();
                let dim_over = |idxs: &[T], axes: &[usize]| -> usize {
                    axes.iter().map(|k| idxs[*k].dim()).product()
                };
                let m = dim_over(&idxs_a, &free_a);
                let s = dim_over(&idxs_a, &common_a);
                let n = dim_over(&idxs_b, &free_b);

                let perm_a: Vec<usize>
                    = free_a.iter().chain(common_a.iter()).copied().collect();
                let perm_b: Vec<usize>
                    = common_b.iter().chain(free_b.iter()).copied().collect();
                let mat_a = fuse(a, perm_a, (m, s))?;
                let mat_b = fuse(b, perm_b, (s, n))?;
                let prod: nd::Array2<A> = mat_a.dot(&mat_b);

                let new_idxs: Vec<T>
                    = free_a.iter().map(|k| idxs_a[*k].clone())
                    .chain(free_b.iter().map(|k| idxs_b[*k].clone()))
                    .collect();
                if new_idxs.is_empty() {
                    Ok(Self::Scalar(prod[[0, 0]]))
                } else {
                    let shape: Vec<usize>
                        = new_idxs.iter().map(|idx| idx.dim()).collect();
                    let data: nd::ArrayD<A>
                        = prod.as_standard_layout()
                        .into_owned()
                        .into_shape(shape)?;
                    Ok(Self::Tensor(new_idxs, data))
                }
            },
        }
    }
}

impl<T, A> Tensor<T, A>
where T: Idx
{
    /// Create a new tensor using a function over given indices.
    ///
    /// Fails if any index is repeated or has dimension zero.
    pub fn new<I, F>(indices: I, elems: F) -> TensorResult<Self>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&[usize]) -> A,
    {
        TensorData::new(indices, elems).map(Self)
    }

    /// Create a new rank-0 (scalar) tensor.
    pub fn new_scalar(val: A) -> Self { Self(TensorData::Scalar(val)) }

    /// Create a new tensor from an array whose axes correspond, in order, to
    /// `indices`.
    pub fn from_array(indices: Vec<T>, data: nd::ArrayD<A>) -> TensorResult<Self>
    where A: Clone
    {
        TensorData::from_array(indices, data).map(Self)
    }

    /// Return `true` if `self` has rank 0.
    pub fn is_scalar(&self) -> bool { matches!(self.0, TensorData::Scalar(_)) }

    /// Return `true` if `self` has the given index.
    pub fn has_index(&self, index: &T) -> bool {
        match &self.0 {
            TensorData::Scalar(_) => false,
            TensorData::Tensor(idxs, _) => idxs.contains(index),
        }
    }

    /// Return the rank of `self`.
    pub fn rank(&self) -> usize { self.0.rank() }

    /// Return the shape (dimensions of each index) of `self` in a vector.
    ///
    /// If `self` is a scalar, the returned vector is empty.
    pub fn shape(&self) -> Vec<usize> {
        self.indices().map(|idx| idx.dim()).collect()
    }

    /// Return an iterator over all indices.
    ///
    /// If `self` is a scalar, the iterator is empty.
    pub fn indices(&self) -> Indices<'_, T> { self.0.indices() }

    /// Relabel every index of `self`.
    ///
    /// Fails if a mapped index changes dimension or if two indices become
    /// equal.
    pub fn map_indices<F>(self, map: F) -> TensorResult<Self>
    where F: FnMut(T) -> T
    {
        self.0.map_indices(map).map(Self)
    }

    /// Contract `self` with `other` over all common indices, consuming both.
    ///
    /// The result holds the non-common indices of `self`, in their original
    /// order, followed by those of `other`. Tensors with no common indices
    /// produce their outer product; contracting every index produces a
    /// scalar.
    pub fn contract(self, other: Self) -> TensorResult<Self>
    where A: LinalgScalar
    {
        let (Tensor(lhs), Tensor(rhs)) = (self, other);
        lhs.contract(rhs).map(Self)
    }

    /// Return the value of a rank-0 tensor.
    pub fn scalar(&self) -> TensorResult<A>
    where A: Copy
    {
        match &self.0 {
            TensorData::Scalar(a) => Ok(*a),
            TensorData::Tensor(idxs, _) => Err(NotScalar(idxs.len())),
        }
    }

    /// Fuse `rows` and then the remaining indices into a matrix.
    ///
    /// Both groups are fused in row-major order. Returns the matrix along with
    /// the row and column indices in the order they were fused.
    pub fn matrix(&self, rows: &[T]) -> TensorResult<(nd::Array2<A>, Vec<T>, Vec<T>)>
    where A: Clone
    {
        match &self.0 {
            TensorData::Scalar(a) => {
                if let Some(idx) = rows.first() {
                    return Err(MissingIndex(idx.label()));
                }
                Ok((nd::array![[a.clone()]], Vec::new(), Vec::new()))
            },
            TensorData::Tensor(idxs, data) => {
                let row_pos: Vec<usize>
                    = rows.iter()
                    .map(|idx| position_of(idxs, idx))
                    .collect::<TensorResult<_>>()?;
                let col_pos: Vec<usize>
                    = (0..idxs.len()).filter(|k| !row_pos.contains(k)).collect();
                let m: usize = row_pos.iter().map(|k| idxs[*k].dim()).product();
                let n: usize = col_pos.iter().map(|k| idxs[*k].dim()).product();
                let row_idxs: Vec<T>
                    = row_pos.iter().map(|k| idxs[*k].clone()).collect();
                let col_idxs: Vec<T>
                    = col_pos.iter().map(|k| idxs[*k].clone()).collect();
                let perm: Vec<usize>
                    = row_pos.into_iter().chain(col_pos).collect();
                let mat = fuse(data.clone(), perm, (m, n))?;
                Ok((mat, row_idxs, col_idxs))
            },
        }
    }

    /// Return the underlying data with axes arranged in the order of
    /// `order`, which must name every index of `self` exactly once.
    pub fn array_in(&self, order: &[T]) -> TensorResult<nd::ArrayD<A>>
    where A: Clone
    {
        if order.len() != self.rank() {
            return Err(IncompatibleShape {
                expected: self.shape(),
                got: order.iter().map(|idx| idx.dim()).collect(),
            });
        }
        check_indices(order)?;
        match &self.0 {
            TensorData::Scalar(a) => Ok(nd::arr0(a.clone()).into_dyn()),
            TensorData::Tensor(idxs, data) => {
                let perm: Vec<usize>
                    = order.iter()
                    .map(|idx| position_of(idxs, idx))
                    .collect::<TensorResult<_>>()?;
                Ok(data.clone().permuted_axes(perm).as_standard_layout().into_owned())
            },
        }
    }
}

impl<T, A> Tensor<T, A>
where
    T: Idx,
    A: ComplexFloat,
{
    /// Return the element-wise complex conjugate of `self`.
    pub fn conj(self) -> Self {
        match self.0 {
            TensorData::Scalar(a) => Self(TensorData::Scalar(a.conj())),
            TensorData::Tensor(idxs, data)
                => Self(TensorData::Tensor(idxs, data.mapv(|a| a.conj()))),
        }
    }

    /// Hermitian conjugate. Dense indices carry no direction, so this is
    /// [`conj`][Self::conj].
    pub fn dag(self) -> Self { self.conj() }

    /// Multiply every slice of `self` along `index` by the corresponding real
    /// weight.
    pub fn scale_index(&mut self, index: &T, weights: &[A::Real]) -> TensorResult<()>
    where A: ComplexFloatExt
    {
        match &mut self.0 {
            TensorData::Scalar(_) => Err(MissingIndex(index.label())),
            TensorData::Tensor(idxs, data) => {
                let ax = position_of(idxs, index)?;
                let dim = idxs[ax].dim();
                if weights.len() != dim {
                    return Err(WeightLength { got: weights.len(), dim });
                }
                data.axis_iter_mut(nd::Axis(ax))
                    .zip(weights)
                    .for_each(|(mut slice, w)| {
                        let w = A::from_re(*w);
                        slice.mapv_inplace(|a| a * w);
                    });
                Ok(())
            },
        }
    }
}

impl<A> Tensor<Index, A> {
    /// Prime every index for which `pred` returns `true`.
    pub fn prime_if<P>(self, pred: P) -> TensorResult<Self>
    where P: Fn(&Index) -> bool
    {
        self.map_indices(|idx| if pred(&idx) { idx.prime() } else { idx })
    }

    /// Prime every physical index.
    pub fn prime_sites(self) -> TensorResult<Self> { self.prime_if(Index::is_site) }

    /// Prime every bond index.
    pub fn prime_links(self) -> TensorResult<Self> { self.prime_if(Index::is_link) }

    /// Prime a single index.
    pub fn prime_index(self, target: &Index) -> TensorResult<Self> {
        self.prime_if(|idx| idx == target)
    }
}
