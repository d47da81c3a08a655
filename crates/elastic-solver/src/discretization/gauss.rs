//! Gauss–Legendre rules on [-1, 1].

/// A 1D Gauss point: natural coordinate ξ and weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussPoint {
    pub xi: f64,
    pub weight: f64,
}

/// `n`-point Gauss–Legendre rule, exact for polynomials of degree 2n − 1.
///
/// # Panics
/// If `n` is not 1, 2 or 3.
pub fn gauss_1d(n: usize) -> Vec<GaussPoint> {
    let point = |xi, weight| GaussPoint { xi, weight };
    match n {
        1 => vec![point(0.0, 2.0)],
        2 => {
            let a = 1.0 / 3.0_f64.sqrt();
            vec![point(-a, 1.0), point(a, 1.0)]
        }
        3 => {
            let a = (3.0_f64 / 5.0).sqrt();
            vec![
                point(-a, 5.0 / 9.0),
                point(0.0, 8.0 / 9.0),
                point(a, 5.0 / 9.0),
            ]
        }
        _ => panic!("unsupported Gauss rule with {n} points"),
    }
}
