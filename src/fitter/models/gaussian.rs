use nalgebra::DVector;
use varpro::model::builder::SeparableModelBuilder;
use varpro::solvers::levmar::{LevMarProblemBuilder, LevMarSolver};

use crate::fitter::peak_fit::FitError;

/// sigma to full width at half maximum
pub const FWHM_FACTOR: f64 = 2.3548;

#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct Value {
    pub value: f64,
    pub uncertainty: f64,
}

impl Value {
    pub fn new(value: f64, uncertainty: f64) -> Self {
        Self { value, uncertainty }
    }

    fn from_variance(value: f64, variance: f64) -> Self {
        Self {
            value,
            uncertainty: variance.abs().sqrt(),
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct GaussianComponent {
    pub amplitude: Value,
    pub center: Value,
    pub sigma: Value,
    pub fwhm: Value,
    pub area: Value,
}

impl GaussianComponent {
    pub fn new(amplitude: Value, center: Value, sigma: Value) -> Self {
        // the model only sees sigma squared, the solver may settle on either sign
        let sigma = Value::new(sigma.value.abs(), sigma.uncertainty);

        let fwhm = Value::new(FWHM_FACTOR * sigma.value, FWHM_FACTOR * sigma.uncertainty);

        let two_pi_sqrt = (2.0 * std::f64::consts::PI).sqrt();
        let area = Value::new(
            amplitude.value * sigma.value * two_pi_sqrt,
            ((sigma.value * two_pi_sqrt * amplitude.uncertainty).powi(2)
                + (amplitude.value * two_pi_sqrt * sigma.uncertainty).powi(2))
            .sqrt(),
        );

        GaussianComponent {
            amplitude,
            center,
            sigma,
            fwhm,
            area,
        }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        if self.sigma.value == 0.0 {
            return 0.0;
        }
        self.amplitude.value
            * (-((x - self.center.value).powi(2)) / (2.0 * self.sigma.value.powi(2))).exp()
    }
}

/// Sum of Gaussian components. An empty model evaluates to zero everywhere.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct CompositeModel {
    pub components: Vec<GaussianComponent>,
}

impl CompositeModel {
    pub fn new(components: Vec<GaussianComponent>) -> Self {
        Self { components }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.components.iter().map(|c| c.evaluate(x)).sum()
    }

    pub fn curve(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&x| self.evaluate(x)).collect()
    }
}

/// Starting point of one component. The amplitude only matters for the
/// reported seed, the solver treats amplitudes as linear coefficients.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussianSeed {
    pub center: f64,
    pub amplitude: f64,
    pub sigma: f64,
}

fn gaussian(x: &DVector<f64>, mean: f64, sigma: f64) -> DVector<f64> {
    x.map(|x_val| (-((x_val - mean).powi(2)) / (2.0 * sigma.powi(2))).exp())
}

fn gaussian_pd_mean(x: &DVector<f64>, mean: f64, sigma: f64) -> DVector<f64> {
    x.map(|x_val| {
        (x_val - mean) / sigma.powi(2)
            * (-((x_val - mean).powi(2)) / (2.0 * sigma.powi(2))).exp()
    })
}

fn gaussian_pd_std_dev(x: &DVector<f64>, mean: f64, sigma: f64) -> DVector<f64> {
    x.map(|x_val| {
        let exponent = -((x_val - mean).powi(2)) / (2.0 * sigma.powi(2));
        (x_val - mean).powi(2) / sigma.powi(3) * exponent.exp()
    })
}

pub struct GaussianFitter<'a> {
    x: &'a [f64],
    y: &'a [f64],
}

impl<'a> GaussianFitter<'a> {
    pub fn new(x: &'a [f64], y: &'a [f64]) -> Result<Self, FitError> {
        if x.len() != y.len() {
            return Err(FitError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(FitError::NonFiniteData);
        }
        Ok(Self { x, y })
    }

    /// Jointly fits one Gaussian per seed, every center and sigma free.
    pub fn fit(&self, seeds: &[GaussianSeed]) -> Result<Vec<GaussianComponent>, FitError> {
        if seeds.is_empty() {
            return Ok(Vec::new());
        }
        if self.x.len() < 3 * seeds.len() {
            return Err(FitError::NotEnoughPoints {
                points: self.x.len(),
                components: seeds.len(),
            });
        }

        let mut parameter_names: Vec<String> = Vec::with_capacity(2 * seeds.len());
        let mut initial_guesses: Vec<f64> = Vec::with_capacity(2 * seeds.len());
        for (index, seed) in seeds.iter().enumerate() {
            parameter_names.push(format!("mean{index}"));
            initial_guesses.push(seed.center);
            parameter_names.push(format!("sigma{index}"));
            initial_guesses.push(seed.sigma);
        }

        let x_data = DVector::from_column_slice(self.x);
        let y_data = DVector::from_column_slice(self.y);

        let mut builder_proxy = SeparableModelBuilder::<f64>::new(parameter_names)
            .initial_parameters(initial_guesses)
            .independent_variable(x_data)
            .function(&["mean0", "sigma0"], gaussian)
            .partial_deriv("mean0", gaussian_pd_mean)
            .partial_deriv("sigma0", gaussian_pd_std_dev);

        for i in 1..seeds.len() {
            builder_proxy = builder_proxy
                .function([format!("mean{i}"), format!("sigma{i}")], gaussian)
                .partial_deriv(format!("mean{i}"), gaussian_pd_mean)
                .partial_deriv(format!("sigma{i}"), gaussian_pd_std_dev);
        }

        let model = builder_proxy
            .build()
            .map_err(|e| FitError::Model(format!("{e:?}")))?;

        let problem = LevMarProblemBuilder::new(model)
            .observations(y_data)
            .build()
            .map_err(|e| FitError::Model(format!("{e:?}")))?;

        let (fit_result, fit_statistics) = LevMarSolver::default()
            .fit_with_statistics(problem)
            .map_err(|failed| {
                FitError::NoConvergence(format!("{:?}", failed.minimization_report.termination))
            })?;

        let nonlinear_parameters = fit_result.nonlinear_parameters();
        let nonlinear_variances = fit_statistics.nonlinear_parameters_variance();
        let linear_coefficients = fit_result
            .linear_coefficients()
            .ok_or_else(|| FitError::NoConvergence("no linear coefficients".to_owned()))?;
        let linear_variances = fit_statistics.linear_coefficients_variance();

        let components: Vec<GaussianComponent> = linear_coefficients
            .iter()
            .enumerate()
            .map(|(i, &amplitude)| {
                GaussianComponent::new(
                    Value::from_variance(amplitude, linear_variances[i]),
                    Value::from_variance(nonlinear_parameters[2 * i], nonlinear_variances[2 * i]),
                    Value::from_variance(
                        nonlinear_parameters[2 * i + 1],
                        nonlinear_variances[2 * i + 1],
                    ),
                )
            })
            .collect();

        if components
            .iter()
            .any(|c| !c.center.value.is_finite() || !c.sigma.value.is_finite())
        {
            return Err(FitError::NoConvergence(
                "non-finite center or sigma".to_owned(),
            ));
        }

        Ok(components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn grid(n: usize, low: f64, high: f64) -> Vec<f64> {
        let step = (high - low) / (n - 1) as f64;
        (0..n).map(|i| low + i as f64 * step).collect()
    }

    #[test]
    fn test_component_derived_values() {
        let component = GaussianComponent::new(
            Value::new(2.0, 0.0),
            Value::new(1.0, 0.0),
            Value::new(-0.5, 0.1),
        );
        assert_eq!(component.sigma.value, 0.5);
        assert_abs_diff_eq!(component.fwhm.value, 1.1774, epsilon = 1e-12);
        assert_abs_diff_eq!(component.evaluate(1.0), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            component.area.value,
            2.0 * 0.5 * (2.0 * std::f64::consts::PI).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_empty_composite_is_flat() {
        let model = CompositeModel::default();
        assert!(model.components.is_empty());
        assert_eq!(model.curve(&[0.0, 1.0, 2.0]), vec![0.0; 3]);
    }

    #[test]
    fn test_fit_recovers_single_gaussian() {
        let x = grid(201, -1.0, 1.0);
        let truth = GaussianComponent::new(
            Value::new(5.0, 0.0),
            Value::new(0.1, 0.0),
            Value::new(0.08, 0.0),
        );
        let y: Vec<f64> = x.iter().map(|&x| truth.evaluate(x)).collect();

        let fitter = GaussianFitter::new(&x, &y).unwrap();
        let components = fitter
            .fit(&[GaussianSeed {
                center: 0.1,
                amplitude: 5.0,
                sigma: 0.1,
            }])
            .unwrap();

        assert_eq!(components.len(), 1);
        assert_abs_diff_eq!(components[0].center.value, 0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(components[0].sigma.value, 0.08, epsilon = 1e-6);
        assert_abs_diff_eq!(components[0].amplitude.value, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            GaussianFitter::new(&[0.0, 1.0], &[1.0]),
            Err(FitError::LengthMismatch { x: 2, y: 1 })
        ));
        assert!(matches!(
            GaussianFitter::new(&[0.0, 1.0], &[1.0, f64::INFINITY]),
            Err(FitError::NonFiniteData)
        ));
    }
}
