//! Breakpoint tables with linear (1-D) and bilinear (2-D) interpolation.
//!
//! Both tables clamp queries to the outer breakpoints rather than
//! extrapolating, so a lookup never leaves the calibrated envelope.

fn validate_sorted(xs: &[f64], what: &str) -> eyre::Result<()> {
    if xs.len() < 2 {
        eyre::bail!("{what} needs at least two breakpoints, got {}", xs.len());
    }
    for w in xs.windows(2) {
        if !(w[0].is_finite() && w[1].is_finite()) {
            eyre::bail!("{what} breakpoints must be finite");
        }
        if w[1] <= w[0] {
            eyre::bail!("{what} breakpoints must be strictly increasing");
        }
    }
    Ok(())
}

/// Index `i` of the interval `[xs[i], xs[i+1]]` holding `x` (already clamped).
#[inline]
fn find_interval(xs: &[f64], x: f64) -> usize {
    let n = xs.len();
    // partition_point returns the first index with xs[i] > x
    let upper = xs.partition_point(|&v| v <= x);
    upper.saturating_sub(1).min(n - 2)
}

/// 1-D linear interpolant, clamped at the table edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Table1 {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl Table1 {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> eyre::Result<Self> {
        validate_sorted(&xs, "table x")?;
        if xs.len() != ys.len() {
            eyre::bail!(
                "table has {} breakpoints but {} values",
                xs.len(),
                ys.len()
            );
        }
        if ys.iter().any(|v| !v.is_finite()) {
            eyre::bail!("table values must be finite");
        }
        Ok(Self { xs, ys })
    }

    pub fn interp(&self, x: f64) -> f64 {
        let n = self.xs.len();
        let x = x.clamp(self.xs[0], self.xs[n - 1]);
        let i = find_interval(&self.xs, x);
        let t = (x - self.xs[i]) / (self.xs[i + 1] - self.xs[i]);
        self.ys[i] + t * (self.ys[i + 1] - self.ys[i])
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }
}

/// Bilinear interpolant on a rectangular grid, clamped at the table edges.
///
/// Values are supplied row-major: `rows[iy][ix]` is the value at
/// `(xs[ix], ys[iy])`, one row per y breakpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Table2 {
    xs: Vec<f64>,
    ys: Vec<f64>,
    // zs[iy * nx + ix]
    zs: Vec<f64>,
}

impl Table2 {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>, rows: Vec<Vec<f64>>) -> eyre::Result<Self> {
        validate_sorted(&xs, "table x")?;
        validate_sorted(&ys, "table y")?;
        if rows.len() != ys.len() {
            eyre::bail!(
                "table has {} y breakpoints but {} rows",
                ys.len(),
                rows.len()
            );
        }
        let mut zs = Vec::with_capacity(xs.len() * ys.len());
        for (iy, row) in rows.into_iter().enumerate() {
            if row.len() != xs.len() {
                eyre::bail!(
                    "table row {iy} has {} values, expected {}",
                    row.len(),
                    xs.len()
                );
            }
            if row.iter().any(|v| !v.is_finite()) {
                eyre::bail!("table row {iy} has a non-finite value");
            }
            zs.extend(row);
        }
        Ok(Self { xs, ys, zs })
    }

    #[inline]
    fn z(&self, ix: usize, iy: usize) -> f64 {
        self.zs[iy * self.xs.len() + ix]
    }

    pub fn interp(&self, x: f64, y: f64) -> f64 {
        let nx = self.xs.len();
        let ny = self.ys.len();
        let x = x.clamp(self.xs[0], self.xs[nx - 1]);
        let y = y.clamp(self.ys[0], self.ys[ny - 1]);
        let ix = find_interval(&self.xs, x);
        let iy = find_interval(&self.ys, y);
        let tx = (x - self.xs[ix]) / (self.xs[ix + 1] - self.xs[ix]);
        let ty = (y - self.ys[iy]) / (self.ys[iy + 1] - self.ys[iy]);
        let z00 = self.z(ix, iy);
        let z10 = self.z(ix + 1, iy);
        let z01 = self.z(ix, iy + 1);
        let z11 = self.z(ix + 1, iy + 1);
        (1.0 - tx) * (1.0 - ty) * z00
            + tx * (1.0 - ty) * z10
            + (1.0 - tx) * ty * z01
            + tx * ty * z11
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table1_interpolates_and_clamps() {
        let t = Table1::new(vec![0.0, 1.0, 2.0], vec![0.0, 10.0, 30.0]).unwrap();
        assert!((t.interp(0.5) - 5.0).abs() < 1e-12);
        assert!((t.interp(1.5) - 20.0).abs() < 1e-12);
        assert_eq!(t.interp(-3.0), 0.0);
        assert_eq!(t.interp(9.0), 30.0);
        assert_eq!(t.interp(2.0), 30.0);
    }

    #[test]
    fn table2_is_exact_on_planes_and_clamps() {
        // z = x + 10 y
        let t = Table2::new(
            vec![0.0, 1.0, 2.0],
            vec![0.0, 1.0],
            vec![vec![0.0, 1.0, 2.0], vec![10.0, 11.0, 12.0]],
        )
        .unwrap();
        assert!((t.interp(0.5, 0.5) - 5.5).abs() < 1e-12);
        assert!((t.interp(1.25, 0.75) - 8.75).abs() < 1e-12);
        assert!((t.interp(5.0, 5.0) - 12.0).abs() < 1e-12);
        assert!((t.interp(-1.0, -1.0) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_unsorted_and_ragged() {
        assert!(Table1::new(vec![0.0, 0.0], vec![1.0, 2.0]).is_err());
        assert!(Table1::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(
            Table2::new(
                vec![0.0, 1.0],
                vec![0.0, 1.0],
                vec![vec![0.0, 1.0], vec![0.0]]
            )
            .is_err()
        );
    }
}
