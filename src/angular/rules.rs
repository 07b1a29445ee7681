use std::f64::consts::PI;

use glam::DVec3;

use crate::error::{TransportError, TransportResult};

/// Gauss–Legendre nodes and weights on `[-1, 1]`, nodes in ascending order.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    for i in 0..n.div_ceil(2) {
        // Tricomi initial guess, then Newton on P_n
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = 1.0;
        for _ in 0..100 {
            let (p, d) = legendre_with_derivative(n, x);
            dp = d;
            let step = p / d;
            x -= step;
            if step.abs() < 1e-15 {
                break;
            }
        }
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        nodes[i] = -x;
        nodes[n - 1 - i] = x;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    (nodes, weights)
}

/// `(P_n(x), P_n'(x))` by the three-term recurrence.
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    let (mut p0, mut p1) = (1.0, x);
    for j in 2..=n {
        let j = j as f64;
        let p2 = ((2.0 * j - 1.0) * x * p1 - (j - 1.0) * p0) / j;
        p0 = p1;
        p1 = p2;
    }
    if n == 0 {
        return (1.0, 0.0);
    }
    let d = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, d)
}

/// Slab rule: directions along x, weights summing to 2.
pub fn slab_rule(order: usize) -> TransportResult<(Vec<DVec3>, Vec<f64>)> {
    check_order(order)?;
    let (mu, w) = gauss_legendre(order);
    let directions = mu.iter().map(|&m| DVec3::new(m, 0.0, 0.0)).collect();
    Ok((directions, w))
}

/// Gauss–Legendre polar × Chebyshev azimuthal product rule on the unit
/// sphere: `order` polar cosines, `2 * order` azimuths at half-offset angles,
/// weights summing to 4π.
///
/// The half offset keeps the azimuthal set closed under reflection through
/// the x and y coordinate planes; the symmetric polar set handles z.
pub fn product_rule(order: usize) -> TransportResult<(Vec<DVec3>, Vec<f64>)> {
    check_order(order)?;
    let (mu, wp) = gauss_legendre(order);
    let n_azi = 2 * order;
    let dphi = 2.0 * PI / n_azi as f64;

    let mut directions = Vec::with_capacity(order * n_azi);
    let mut weights = Vec::with_capacity(order * n_azi);
    for (&m, &w) in mu.iter().zip(&wp) {
        let sin_theta = (1.0 - m * m).sqrt();
        for j in 0..n_azi {
            let phi = (j as f64 + 0.5) * dphi;
            directions.push(DVec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), m));
            weights.push(w * dphi);
        }
    }
    Ok((directions, weights))
}

fn check_order(order: usize) -> TransportResult<()> {
    if order < 2 || order % 2 != 0 {
        return Err(TransportError::config(format!(
            "angular quadrature order must be even and at least 2, got {order}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauss_legendre_integrates_polynomials() {
        let (x, w) = gauss_legendre(4);
        let sum: f64 = w.iter().sum();
        assert!((sum - 2.0).abs() < 1e-13);
        // exact up to degree 7
        let x6: f64 = x.iter().zip(&w).map(|(x, w)| w * x.powi(6)).sum();
        assert!((x6 - 2.0 / 7.0).abs() < 1e-13);
        assert!(x.windows(2).all(|p| p[0] < p[1]));
    }

    #[test]
    fn two_point_rule_matches_closed_form() {
        let (x, w) = gauss_legendre(2);
        let mu = 1.0 / 3f64.sqrt();
        assert!((x[0] + mu).abs() < 1e-14 && (x[1] - mu).abs() < 1e-14);
        assert!((w[0] - 1.0).abs() < 1e-14 && (w[1] - 1.0).abs() < 1e-14);
    }

    #[test]
    fn product_rule_covers_the_sphere() {
        let (dirs, w) = product_rule(4).unwrap();
        assert_eq!(dirs.len(), 32);
        let total: f64 = w.iter().sum();
        assert!((total - 4.0 * PI).abs() < 1e-12);
        for d in &dirs {
            assert!((d.length() - 1.0).abs() < 1e-12);
        }
        // first angular moment vanishes
        let mean: DVec3 = dirs.iter().zip(&w).map(|(d, w)| *d * *w).sum();
        assert!(mean.length() < 1e-12);
    }

    #[test]
    fn odd_order_is_rejected() {
        assert!(slab_rule(3).is_err());
        assert!(product_rule(0).is_err());
    }
}
