//! Synthetic integrands with known integral ratios.
//!
//! They validate the engine end to end; none of them models a molecule.
//! Configurations are plain coordinate vectors.

use std::sync::Arc;

use mayer_core::Integrand;

/// Isotropic Gaussian `exp(-|x|²/2σ²)`.
///
/// Two clusters of widths `σ0` and `σ1` in `d` dimensions integrate to the
/// ratio `(σ1/σ0)^d`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianCluster {
    sigma: f64,
}

impl GaussianCluster {
    /// Cluster of width `sigma`.
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }

    /// Width of the cluster.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl Integrand<Vec<f64>> for GaussianCluster {
    fn value(&self, configuration: &Vec<f64>, _temperature: f64) -> f64 {
        let r2: f64 = configuration.iter().map(|x| x * x).sum();
        (-r2 / (2.0 * self.sigma * self.sigma)).exp()
    }

    fn name(&self) -> &str {
        "gaussian"
    }
}

/// Another integrand multiplied by a constant factor.
pub struct ScaledIntegrand<C> {
    inner: Arc<dyn Integrand<C>>,
    factor: f64,
}

impl<C> ScaledIntegrand<C> {
    /// `factor · inner`.
    pub fn new(inner: Arc<dyn Integrand<C>>, factor: f64) -> Self {
        Self { inner, factor }
    }
}

impl<C> Integrand<C> for ScaledIntegrand<C> {
    fn value(&self, configuration: &C, temperature: f64) -> f64 {
        self.factor * self.inner.value(configuration, temperature)
    }

    fn name(&self) -> &str {
        "scaled"
    }
}

/// `a + b·u` for a first coordinate `u ∈ [0, 1]`, zero elsewhere.
///
/// Integrates to `a + b/2` over the unit box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxedLinear {
    intercept: f64,
    slope: f64,
}

impl BoxedLinear {
    /// Line with the given intercept and slope.
    pub fn new(intercept: f64, slope: f64) -> Self {
        Self { intercept, slope }
    }

    /// Integral over the unit box.
    pub fn integral(&self) -> f64 {
        self.intercept + 0.5 * self.slope
    }
}

impl Integrand<Vec<f64>> for BoxedLinear {
    fn value(&self, configuration: &Vec<f64>, _temperature: f64) -> f64 {
        match configuration.first() {
            Some(&u) if (0.0..=1.0).contains(&u) => self.intercept + self.slope * u,
            _ => 0.0,
        }
    }

    fn name(&self) -> &str {
        "boxed-linear"
    }
}

/// Gaussian modulated by `Π cos(k·x_i)`, a signed integrand.
///
/// Relative to the plain Gaussian of the same width the signed integral is
/// `exp(-k²σ²/2)` per dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CosineModulated {
    sigma: f64,
    wavenumber: f64,
}

impl CosineModulated {
    /// Gaussian of width `sigma` times `cos(wavenumber·x)` per coordinate.
    pub fn new(sigma: f64, wavenumber: f64) -> Self {
        Self { sigma, wavenumber }
    }

    /// Signed integral relative to the unmodulated Gaussian in `dimensions`.
    pub fn damping(&self, dimensions: usize) -> f64 {
        let k = self.wavenumber * self.sigma;
        (-0.5 * k * k * dimensions as f64).exp()
    }
}

impl Integrand<Vec<f64>> for CosineModulated {
    fn value(&self, configuration: &Vec<f64>, temperature: f64) -> f64 {
        let envelope = GaussianCluster::new(self.sigma).value(configuration, temperature);
        let modulation: f64 = configuration
            .iter()
            .map(|x| (self.wavenumber * x).cos())
            .product();
        envelope * modulation
    }

    fn name(&self) -> &str {
        "cosine-modulated"
    }
}

/// Integrand that vanishes everywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zero;

impl<C> Integrand<C> for Zero {
    fn value(&self, _configuration: &C, _temperature: f64) -> f64 {
        0.0
    }

    fn name(&self) -> &str {
        "zero"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_linear_is_zero_outside_the_box() {
        let line = BoxedLinear::new(0.9, 0.2);
        assert_eq!(line.value(&vec![-0.1], 1.0), 0.0);
        assert_eq!(line.value(&vec![1.5], 1.0), 0.0);
        assert!((line.value(&vec![0.5], 1.0) - 1.0).abs() < 1e-12);
        assert!((line.integral() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn scaled_multiplies_inner_value() {
        let inner: Arc<dyn Integrand<Vec<f64>>> = Arc::new(GaussianCluster::new(1.0));
        let scaled = ScaledIntegrand::new(inner.clone(), 1e3);
        let x = vec![0.3, -0.2];
        assert!((scaled.value(&x, 1.0) - 1e3 * inner.value(&x, 1.0)).abs() < 1e-9);
    }

    #[test]
    fn cosine_changes_sign() {
        let wave = CosineModulated::new(1.0, 1.0);
        assert!(wave.value(&vec![0.0], 1.0) > 0.0);
        assert!(wave.value(&vec![2.0], 1.0) < 0.0);
        assert!((wave.damping(1) - (-0.5f64).exp()).abs() < 1e-12);
    }
}
