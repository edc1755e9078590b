//! Entanglement and correlation measurements on an [`MPS`].
//!
//! Functions that take `&mut MPS` move the orthogonality center themselves
//! before contracting. The raw correlators ([`operator_string`],
//! [`correlation`], [`sz_correlation`], [`correlations_5site`]) take `&MPS`
//! and contract only the sites between their first and last operators, so
//! they require the center to already lie in that window and fail with
//! [`MPSError::NotCanonical`] otherwise.
//!
//! Sites are numbered from 0, and bond `b` joins sites `b` and `b + 1`.

use num_complex::Complex64 as C64;
use crate::{
    index::Index,
    mps::{ MPS, MPSError, MPSResult },
    siteset::{ SiteSet, SiteType },
    svd::{ self, SvdOptions },
    tensor::Tensor,
};

/// Squared Schmidt values at or below this are left out of [`entropy`].
pub const PROB_THRESHOLD: f64 = 1e-15;

/// Result of [`entropy`].
#[derive(Clone, Debug, PartialEq)]
pub struct Entanglement {
    /// `Σ −pʳ · r · ln p` over the squared Schmidt values `p` above
    /// [`PROB_THRESHOLD`].
    pub entropy: f64,
    /// One slot per singular value kept by the decomposition. The squared
    /// Schmidt values above [`PROB_THRESHOLD`] fill the front in descending
    /// order and the remaining slots are zero.
    pub sing_vals: Vec<f64>,
}

/// Compute the entanglement entropy across bond `b`.
///
/// The orthogonality center is moved to site `b`, the two-site wavefunction
/// on sites `b` and `b + 1` is formed, and its SVD (bounded by the current
/// dimension of bond `b`) gives the Schmidt values. For `r = 1` the entropy
/// is the von Neumann entropy.
///
/// The decomposition keeps every singular value that is a normal float, with
/// no relative-weight cutoff, so `sing_vals` may hold more slots than there
/// are Schmidt values above [`PROB_THRESHOLD`]. Those extra slots are zero and
/// do not contribute to `entropy`.
pub fn entropy(psi: &mut MPS, b: usize, r: f64) -> MPSResult<Entanglement> {
    let max_dim = bond_dim(psi, b)?;
    psi.position(b)?;
    let link = *psi.link_index(b)?;
    let left = psi.site(b)?.clone();
    let rows: Vec<Index>
        = left.indices()
        .filter(|idx| **idx != link)
        .copied()
        .collect();
    let wf = left.contract(psi.site(b + 1)?.clone())?;
    let factor = svd::svd(&wf, &rows, b, SvdOptions::default().with_max_dim(max_dim))?;
    let eigs = factor.eigs();

    let mut sing_vals: Vec<f64> = vec![0.0; eigs.len()];
    let mut entropy: f64 = 0.0;
    sing_vals.iter_mut()
        .zip(eigs.iter().filter(|p| **p > PROB_THRESHOLD))
        .for_each(|(slot, p)| {
            *slot = *p;
            entropy += -p.powf(r) * r * p.ln();
        });
    log::debug!(
        "bond {}: kept {} Schmidt values, largest {:e}, smallest {:e}, Tr(p) = {}",
        b,
        eigs.len(),
        eigs.first().copied().unwrap_or(0.0),
        eigs.last().copied().unwrap_or(0.0),
        eigs.iter().sum::<f64>(),
    );
    Ok(Entanglement { entropy, sing_vals })
}

/// Return the dimension of bond `b`.
pub fn bond_dim(psi: &MPS, b: usize) -> MPSResult<usize> {
    Ok(psi.link_index(b)?.dim())
}

/// Compute ⟨S^z⟩ at site `i`, moving the orthogonality center there.
pub fn sz<S>(psi: &mut MPS, sites: &SiteSet<S>, i: usize) -> MPSResult<f64>
where S: SiteType
{
    psi.position(i)?;
    let ket = psi.site(i)?.clone();
    let bra = ket.clone().prime_sites()?.dag();
    let val: C64
        = ket.contract(local_op(psi, sites, "Sz", i)?)?
        .contract(bra)?
        .scalar()?;
    Ok(val.re)
}

/// Compute the entanglement entropy at every bond.
pub fn entropy_profile(psi: &mut MPS, r: f64) -> MPSResult<Vec<f64>> {
    (0..psi.n().saturating_sub(1))
        .map(|b| entropy(psi, b, r).map(|ent| ent.entropy))
        .collect()
}

/// Compute ⟨S^z⟩ at every site.
pub fn sz_profile<S>(psi: &mut MPS, sites: &SiteSet<S>) -> MPSResult<Vec<f64>>
where S: SiteType
{
    (0..psi.n()).map(|i| sz(psi, sites, i)).collect()
}

// fetch an operator, checking that the site set belongs to the state
fn local_op<S>(psi: &MPS, sites: &SiteSet<S>, name: &str, k: usize)
    -> MPSResult<Tensor<Index, C64>>
where S: SiteType
{
    if sites.index(k)? != psi.site_index(k)? {
        return Err(MPSError::SiteSetMismatch(k));
    }
    Ok(sites.op(name, k)?)
}

fn check_window(psi: &MPS, last: usize) -> MPSResult<()> {
    if last >= psi.n() {
        Err(MPSError::SiteOutOfBounds { site: last, n: psi.n() })
    } else {
        Ok(())
    }
}

/// Compute ⟨ψ| O₁ O₂ ⋯ |ψ⟩ for operators placed on strictly increasing sites.
///
/// `ops` lists `(site, operator name)` pairs, at least two of them. Sites
/// between the first and last that carry no operator are contracted
/// transparently, with only their bond indices primed on the bra side. The
/// first site's left bond and the last site's right bond are contracted
/// directly between ket and bra, which is exact only when the orthogonality
/// center lies within the window; this is checked.
pub fn operator_string<S>(psi: &MPS, sites: &SiteSet<S>, ops: &[(usize, &str)])
    -> MPSResult<C64>
where S: SiteType
{
    let (Some(&(first, op_first)), Some(&(last, op_last)))
        = (ops.first(), ops.last())
        else {
            return Err(MPSError::InvalidOperatorString(
                "no operators given".to_string()));
        };
    if ops.len() < 2 {
        return Err(MPSError::InvalidOperatorString(
            "at least two operators are required".to_string()));
    }
    if !ops.windows(2).all(|w| w[0].0 < w[1].0) {
        return Err(MPSError::InvalidOperatorString(
            format!("sites must be strictly increasing: {:?}", ops)));
    }
    check_window(psi, last)?;
    match psi.center() {
        Some(c) if (first..=last).contains(&c) => { },
        center => {
            return Err(MPSError::NotCanonical { center, lo: first, hi: last });
        },
    }
    log::trace!("contracting operator string {:?}", ops);
    let op_at = |k: usize| {
        ops.iter().find(|(site, _)| *site == k).map(|(_, name)| *name)
    };

    let ir = *psi.link_index(first)?;
    let tens = psi.site(first)?;
    let mut ket
        = tens.clone()
        .contract(local_op(psi, sites, op_first, first)?)?;
    ket = ket.contract(tens.clone().prime_sites()?.prime_index(&ir)?.dag())?;

    for k in first + 1..last {
        let tens = psi.site(k)?;
        ket = ket.contract(tens.clone())?;
        let bra
            = match op_at(k) {
                Some(name) => {
                    ket = ket.contract(local_op(psi, sites, name, k)?)?;
                    tens.clone().prime_sites()?.prime_links()?
                },
                None => tens.clone().prime_links()?,
            };
        ket = ket.contract(bra.dag())?;
    }

    let il = *psi.link_index(last - 1)?;
    let tens = psi.site(last)?;
    ket = ket.contract(tens.clone())?
        .contract(local_op(psi, sites, op_last, last)?)?;
    ket = ket.contract(tens.clone().prime_sites()?.prime_index(&il)?.dag())?;
    Ok(ket.scalar()?)
}

/// Compute ⟨ψ| op1(i) op2(j) |ψ⟩ for `i < j`.
///
/// The orthogonality center must lie in `i..=j`.
pub fn correlation<S>(
    psi: &MPS,
    sites: &SiteSet<S>,
    op1: &str,
    op2: &str,
    i: usize,
    j: usize,
) -> MPSResult<C64>
where S: SiteType
{
    operator_string(psi, sites, &[(i, op1), (j, op2)])
}

/// Compute ⟨ψ| op1(i) S^z(i+2) op2(i+4) |ψ⟩.
///
/// The orthogonality center must lie in `i..=i+4`.
pub fn sz_correlation<S>(
    psi: &MPS,
    sites: &SiteSet<S>,
    op1: &str,
    op2: &str,
    i: usize,
) -> MPSResult<C64>
where S: SiteType
{
    operator_string(psi, sites, &[(i, op1), (i + 2, "Sz"), (i + 4, op2)])
}

/// Compute the local energy density at site `i`.
///
/// This combines a hopping term between sites `i` and `i + 4` with the same
/// hopping dressed by S^z at `i + 2`:
/// `0.5 · (2 Re(4 · 0.5 · C) + 2 Re(−8 · 0.5 · Z))`, where
/// `C = ⟨S⁺(i) S⁻(i+4)⟩` and `Z = ⟨S⁺(i) S^z(i+2) S⁻(i+4)⟩`.
pub fn energy<S>(psi: &mut MPS, sites: &SiteSet<S>, i: usize) -> MPSResult<f64>
where S: SiteType
{
    check_window(psi, i + 4)?;
    psi.position(i)?;
    let kin = 2.0 * (4.0 * 0.5 * correlation(psi, sites, "S+", "S-", i, i + 4)?).re;
    let pot = 2.0 * (-8.0 * 0.5 * sz_correlation(psi, sites, "S+", "S-", i)?).re;
    Ok(0.5 * (kin + pot))
}

/// Compute the first conserved-charge density at site `i` from the imaginary
/// parts of the same correlators as [`energy`], with the operator order
/// reversed.
pub fn q1_minus<S>(psi: &mut MPS, sites: &SiteSet<S>, i: usize) -> MPSResult<f64>
where S: SiteType
{
    check_window(psi, i + 4)?;
    psi.position(i)?;
    let q_kin = 2.0 * (4.0 * 0.5 * correlation(psi, sites, "S-", "S+", i, i + 4)?).im;
    let q_pot = 2.0 * (-8.0 * 0.5 * sz_correlation(psi, sites, "S-", "S+", i)?).im;
    Ok(-0.5 * (q_kin + q_pot))
}

/// Compute ⟨S⁻(i+2) S⁻(i+4) S⁺(i+6) S⁺(i+8)⟩, moving the orthogonality center
/// to `i + 2`.
pub fn kkdd<S>(psi: &mut MPS, sites: &SiteSet<S>, i: usize) -> MPSResult<C64>
where S: SiteType
{
    check_window(psi, i + 8)?;
    psi.position(i + 2)?;
    operator_string(
        psi,
        sites,
        &[(i + 2, "S-"), (i + 4, "S-"), (i + 6, "S+"), (i + 8, "S+")],
    )
}

/// Compute the five-operator correlator with `ops` placed at `i`, `i + 2`,
/// `i + 4`, `i + 6`, and `i + 8`.
///
/// The orthogonality center must lie in `i..=i+8`.
pub fn correlations_5site<S>(
    psi: &MPS,
    sites: &SiteSet<S>,
    ops: [&str; 5],
    i: usize,
) -> MPSResult<C64>
where S: SiteType
{
    let placed: Vec<(usize, &str)>
        = ops.iter().enumerate()
        .map(|(k, name)| (i + 2 * k, *name))
        .collect();
    operator_string(psi, sites, &placed)
}

/// Compute the complex second conserved-charge density at site `i`.
///
/// This is `0.25 · (kkdd + zk + zzzk − zzk1 − zzk2)`, where the last four
/// terms are 5-site correlators of S⁺ at `i` and S⁻ at `i + 8`, with
/// (Id, Sz, Id), (Sz, Sz, Sz), (Sz, Sz, Id), and (Id, Sz, Sz) in between,
/// weighted by `2 · 0.5` times 8, 32, 16, and 16.
pub fn q2<S>(psi: &mut MPS, sites: &SiteSet<S>, i: usize) -> MPSResult<C64>
where S: SiteType
{
    let kkdd = kkdd(psi, sites, i)?;
    psi.position(i)?;
    let zk
        = 2.0 * 0.5 * 8.0
        * correlations_5site(psi, sites, ["S+", "Id", "Sz", "Id", "S-"], i)?;
    let zzzk
        = 2.0 * 0.5 * 32.0
        * correlations_5site(psi, sites, ["S+", "Sz", "Sz", "Sz", "S-"], i)?;
    let zzk1
        = 2.0 * 0.5 * 16.0
        * correlations_5site(psi, sites, ["S+", "Sz", "Sz", "Id", "S-"], i)?;
    let zzk2
        = 2.0 * 0.5 * 16.0
        * correlations_5site(psi, sites, ["S+", "Id", "Sz", "Sz", "S-"], i)?;
    Ok(0.25 * (kkdd + zk + zzzk - zzk1 - zzk2))
}

/// Return `−Re q2(i)`.
pub fn q2_plus<S>(psi: &mut MPS, sites: &SiteSet<S>, i: usize) -> MPSResult<f64>
where S: SiteType
{
    Ok(-q2(psi, sites, i)?.re)
}

/// Return `Im q2(i)`.
pub fn q2_minus<S>(psi: &mut MPS, sites: &SiteSet<S>, i: usize) -> MPSResult<f64>
where S: SiteType
{
    Ok(q2(psi, sites, i)?.im)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use num_traits::Zero;

    fn bell(a: f64, b: f64) -> (SiteSet, MPS) {
        let sites = SiteSet::spin_half(2);
        let amps = vec![C64::new(a, 0.0), C64::zero(), C64::zero(), C64::new(b, 0.0)];
        let psi = MPS::from_vector(&sites, amps, None).unwrap();
        (sites, psi)
    }

    #[test]
    fn two_site_entropy() {
        let (_, mut psi) = bell(0.6, 0.8);
        let ent = entropy(&mut psi, 0, 1.0).unwrap();
        let expected = -(0.36 * 0.36_f64.ln() + 0.64 * 0.64_f64.ln());
        assert_approx_eq!(f64, ent.entropy, expected, epsilon = 1e-12);
        assert_eq!(ent.sing_vals.len(), 2);
        assert_approx_eq!(f64, ent.sing_vals[0], 0.64, epsilon = 1e-12);
        assert_approx_eq!(f64, ent.sing_vals[1], 0.36, epsilon = 1e-12);
    }

    #[test]
    fn renyi_weight() {
        let (_, mut psi) = bell(0.6, 0.8);
        let ent = entropy(&mut psi, 0, 2.0).unwrap();
        let term = |p: f64| -p.powf(2.0) * 2.0 * p.ln();
        assert_approx_eq!(f64, ent.entropy, term(0.36) + term(0.64), epsilon = 1e-12);
    }

    // a small r makes each omitted or included term visible in the sum
    fn weighted(ps: &[f64], r: f64) -> f64 {
        ps.iter().map(|p| -p.powf(r) * r * p.ln()).sum()
    }

    #[test]
    fn tiny_weight_is_cut() {
        // Schmidt values 1 and 1e-9: p = 1e-18 survives the decomposition but
        // not the threshold
        let (_, mut psi) = bell(1.0, 1e-9);
        assert_eq!(bond_dim(&psi, 0).unwrap(), 2);
        let ent = entropy(&mut psi, 0, 0.1).unwrap();
        assert_eq!(ent.sing_vals.len(), bond_dim(&psi, 0).unwrap());
        assert_approx_eq!(f64, ent.sing_vals[0], 1.0, epsilon = 1e-12);
        assert_eq!(ent.sing_vals[1], 0.0);
        assert_approx_eq!(f64, ent.entropy, 0.0, epsilon = 1e-12);
        assert!(weighted(&[1e-18], 0.1) > 0.05);
    }

    #[test]
    fn small_weight_is_kept() {
        // p = 1e-14 lies above the threshold
        let (_, mut psi) = bell(1.0, 1e-7);
        let ent = entropy(&mut psi, 0, 0.1).unwrap();
        assert_eq!(ent.sing_vals.len(), bond_dim(&psi, 0).unwrap());
        assert_eq!(ent.sing_vals.len(), 2);
        assert_approx_eq!(f64, ent.sing_vals[1], 1e-14, epsilon = 1e-20);
        assert_approx_eq!(f64, ent.entropy, weighted(&[1.0, 1e-14], 0.1), epsilon = 1e-9);
        assert!(ent.entropy > 0.1);
    }

    #[test]
    fn product_state_keeps_one_value() {
        let sites = SiteSet::spin_half(3);
        let mut psi = MPS::from_states(&sites, ["Up", "Dn", "Up"]).unwrap();
        let ent = entropy(&mut psi, 1, 1.0).unwrap();
        assert_eq!(ent.sing_vals.len(), 1);
        assert_approx_eq!(f64, ent.sing_vals[0], 1.0, epsilon = 1e-12);
        assert_approx_eq!(f64, ent.entropy, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn neel_magnetization() {
        let sites = SiteSet::spin_half(6);
        let mut psi
            = MPS::from_states(&sites, ["Up", "Dn", "Up", "Dn", "Up", "Dn"]).unwrap();
        let mz = sz_profile(&mut psi, &sites).unwrap();
        for (k, m) in mz.into_iter().enumerate() {
            let expected = if k % 2 == 0 { 0.5 } else { -0.5 };
            assert_approx_eq!(f64, m, expected, epsilon = 1e-12);
        }
        assert_eq!(psi.center(), Some(5));
    }

    #[test]
    fn raw_correlators_check_gauge() {
        let sites = SiteSet::spin_half(10);
        let mut psi = MPS::from_states(&sites, ["Up"; 10]).unwrap();
        psi.position(9).unwrap();
        assert!(matches!(
            correlation(&psi, &sites, "S+", "S-", 0, 4),
            Err(MPSError::NotCanonical { center: Some(9), lo: 0, hi: 4 }),
        ));
        psi.position(2).unwrap();
        let c = correlation(&psi, &sites, "Sz", "Sz", 0, 4).unwrap();
        assert_approx_eq!(f64, c.re, 0.25, epsilon = 1e-12);
        assert!(matches!(
            operator_string(&psi, &sites, &[(3, "Sz"), (1, "Sz")]),
            Err(MPSError::InvalidOperatorString(_)),
        ));
        assert!(matches!(
            operator_string(&psi, &sites, &[(2, "Sz")]),
            Err(MPSError::InvalidOperatorString(_)),
        ));
        assert!(matches!(
            correlation(&psi, &sites, "Sq", "Sz", 1, 3),
            Err(MPSError::Site(_)),
        ));
    }

    #[test]
    fn windows_out_of_range() {
        let sites = SiteSet::spin_half(8);
        let mut psi = MPS::from_states(&sites, ["Up"; 8]).unwrap();
        assert!(matches!(energy(&mut psi, &sites, 4), Err(MPSError::SiteOutOfBounds { site: 8, n: 8 })));
        assert!(matches!(kkdd(&mut psi, &sites, 0), Err(MPSError::SiteOutOfBounds { site: 8, n: 8 })));
        assert!(matches!(entropy(&mut psi, 7, 1.0), Err(MPSError::BondOutOfBounds { bond: 7, n: 8 })));
        assert_eq!(psi.center(), Some(0));
        assert!(energy(&mut psi, &sites, 3).is_ok());
    }

    #[test]
    fn foreign_site_set_is_rejected() {
        let sites = SiteSet::spin_half(5);
        let other = SiteSet::spin_half(5);
        let mut psi = MPS::from_states(&sites, ["Up"; 5]).unwrap();
        assert!(matches!(sz(&mut psi, &other, 1), Err(MPSError::SiteSetMismatch(1))));
    }
}
