//! Piecewise-linear lookup over frequency-sorted tables.
//!
//! Both the calibration table and device loss tables share the same policy:
//! exact matches return the stored value untouched, interior points are
//! interpolated between the bracketing pair, and anything outside the stored
//! span is clamped to the nearest edge and flagged as out of range.

use interp::{interp, InterpMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Exact(usize),
    Within,
    Below,
    Above,
}

/// Where `x` falls relative to the ascending abscissae `xs`
pub fn locate(xs: &[f64], x: f64) -> Position {
    let idx = xs.partition_point(|&v| v < x);
    if idx < xs.len() && xs[idx] == x {
        Position::Exact(idx)
    } else if idx == 0 {
        Position::Below
    } else if idx == xs.len() {
        Position::Above
    } else {
        Position::Within
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolated {
    pub value: f64,
    pub in_range: bool,
}

/// Linear interpolation with edge clamping. `xs` must be ascending, unique and
/// hold at least two entries; `ys` must be the same length.
pub fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> Interpolated {
    debug_assert!(xs.len() >= 2 && xs.len() == ys.len());
    match locate(xs, x) {
        Position::Exact(i) => Interpolated {
            value: ys[i],
            in_range: true,
        },
        Position::Below => Interpolated {
            value: ys[0],
            in_range: false,
        },
        Position::Above => Interpolated {
            value: ys[ys.len() - 1],
            in_range: false,
        },
        Position::Within => Interpolated {
            value: interp(xs, ys, x, &InterpMode::FirstLast),
            in_range: true,
        },
    }
}
