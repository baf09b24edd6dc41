
use crate::errors::{KmerError, Result};
use crate::sparse_matrix::SparseMatrix;

/// stores the fixed constants of the posterior
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelParameters {
    /// Standard deviation `sigma` of the zero-mean normal prior on each log-odds
    pub prior_scale: f64,
    /// Weight `epsilon` of the uniform floor mixed into the predicted k-mer distribution
    pub floor: f64
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            prior_scale: 2.0,
            floor: 1e-6
        }
    }
}

/// Log density and gradient at one point, sharing intermediate values
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub log_density: f64,
    pub gradient: Vec<f64>
}

/// Numerically stable softmax, `theta_i = exp(beta_i - max(beta)) / sum_j exp(beta_j - max(beta))`.
/// # Arguments
/// * `beta` - unconstrained log-odds
/// # Examples
/// ```rust
/// use kmers::multinomial_model::softmax;
/// let theta = softmax(&[0.0, 0.0, 0.0, 0.0]);
/// assert_eq!(theta, vec![0.25; 4]);
/// //large values do not overflow
/// let theta = softmax(&[1000.0, 1000.0]);
/// assert_eq!(theta, vec![0.5, 0.5]);
/// ```
pub fn softmax(beta: &[f64]) -> Vec<f64> {
    let max = beta.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut ret: Vec<f64> = beta.iter().map(|&b| (b - max).exp()).collect();
    let total: f64 = ret.iter().sum();
    for t in ret.iter_mut() {
        *t /= total;
    }
    ret
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Posterior for isoform proportions given observed k-mer counts:
///
/// `p(y, beta | X) = multinomial(y | eps + (1 - eps) * X * softmax(beta)) * normal(beta | 0, sigma)`
///
/// * `X`: `M x N` design matrix with simplex columns (k-mers by isoforms)
/// * `y`: length-`M` observed k-mer counts
/// * `beta`: length-`N` log-odds of the isoform proportions
///
/// The model only borrows its data, so a single instance can be evaluated concurrently from several threads.
pub struct MultinomialSoftmaxModel<'a> {
    x: &'a SparseMatrix,
    y: &'a [f64],
    params: ModelParameters
}

impl<'a> MultinomialSoftmaxModel<'a> {
    /// Creates a model with the default prior scale (`sigma = 2`) and floor (`1e-6`).
    /// # Arguments
    /// * `x` - the design matrix
    /// * `y` - the observed counts, one per row of `x`
    /// # Errors
    /// `DimensionMismatch` if `y.len() != x.rows()`.
    /// # Examples
    /// ```rust
    /// use kmers::multinomial_model::MultinomialSoftmaxModel;
    /// use kmers::sparse_matrix::SparseMatrix;
    /// let x = SparseMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 1.0)]).unwrap();
    /// assert!(MultinomialSoftmaxModel::new(&x, &[3.0, 1.0]).is_ok());
    /// assert!(MultinomialSoftmaxModel::new(&x, &[3.0]).is_err());
    /// ```
    pub fn new(x: &'a SparseMatrix, y: &'a [f64]) -> Result<Self> {
        Self::with_parameters(x, y, ModelParameters::default())
    }

    /// Creates a model with explicit constants.
    pub fn with_parameters(x: &'a SparseMatrix, y: &'a [f64], params: ModelParameters) -> Result<Self> {
        if x.rows() != y.len() {
            return Err(KmerError::DimensionMismatch { what: "count vector length", expected: x.rows(), found: y.len() });
        }
        Ok(Self { x, y, params })
    }

    /// The number of isoforms, i.e. the expected length of `beta`
    #[inline]
    pub fn num_params(&self) -> usize {
        self.x.cols()
    }

    #[inline]
    pub fn parameters(&self) -> &ModelParameters {
        &self.params
    }

    fn check_beta(&self, beta: &[f64]) -> Result<()> {
        if beta.len() != self.x.cols() {
            return Err(KmerError::DimensionMismatch { what: "beta length", expected: self.x.cols(), found: beta.len() });
        }
        Ok(())
    }

    /// `eps + (1 - eps) * X * theta`, strictly positive wherever `eps > 0`
    fn floored_prediction(&self, theta: &[f64]) -> Vec<f64> {
        let eps = self.params.floor;
        let mut p = self.x.mul_vec(theta);
        for v in p.iter_mut() {
            *v = eps + (1.0 - eps) * *v;
        }
        p
    }

    fn log_likelihood(&self, p: &[f64]) -> f64 {
        self.y.iter()
            .zip(p.iter())
            .filter(|&(&y, _)| y != 0.0)
            .map(|(&y, &p)| y * p.ln())
            .sum()
    }

    fn log_prior(&self, beta: &[f64]) -> f64 {
        let sigma2 = self.params.prior_scale * self.params.prior_scale;
        -0.5 / sigma2 * dot(beta, beta)
    }

    /// Gradient of the whole log posterior given the shared intermediates.
    fn gradient(&self, beta: &[f64], theta: &[f64], p: &[f64]) -> Vec<f64> {
        //d/dtheta of y . log(p') is (1 - eps) X^T (y / p')
        let scale = 1.0 - self.params.floor;
        let r: Vec<f64> = self.y.iter()
            .zip(p.iter())
            .map(|(&y, &p)| if y == 0.0 { 0.0 } else { scale * y / p })
            .collect();
        let s = self.x.mul_transpose_vec(&r);

        //softmax Jacobian: theta .* s - (theta . s) theta
        let theta_s = dot(theta, &s);
        let inv_sigma2 = 1.0 / (self.params.prior_scale * self.params.prior_scale);
        theta.iter()
            .zip(s.iter())
            .zip(beta.iter())
            .map(|((&t, &s), &b)| t * s - theta_s * t - inv_sigma2 * b)
            .collect()
    }

    /// Log posterior density (up to a constant) at `beta`.
    /// # Arguments
    /// * `beta` - log-odds, one per column of the design matrix
    /// # Examples
    /// ```rust
    /// use kmers::multinomial_model::MultinomialSoftmaxModel;
    /// use kmers::sparse_matrix::SparseMatrix;
    /// let x = SparseMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 1.0)]).unwrap();
    /// let y = [1.0, 1.0];
    /// let model = MultinomialSoftmaxModel::new(&x, &y).unwrap();
    /// let expected = 2.0 * (1e-6 + (1.0 - 1e-6) * 0.5f64).ln();
    /// assert!((model.log_density(&[0.0, 0.0]).unwrap() - expected).abs() < 1e-12);
    /// ```
    pub fn log_density(&self, beta: &[f64]) -> Result<f64> {
        self.check_beta(beta)?;
        let theta = softmax(beta);
        let p = self.floored_prediction(&theta);
        Ok(self.log_likelihood(&p) + self.log_prior(beta))
    }

    /// Gradient of `log_density` with respect to `beta`.
    /// # Arguments
    /// * `beta` - log-odds, one per column of the design matrix
    pub fn grad_log_density(&self, beta: &[f64]) -> Result<Vec<f64>> {
        self.check_beta(beta)?;
        let theta = softmax(beta);
        let p = self.floored_prediction(&theta);
        Ok(self.gradient(beta, &theta, &p))
    }

    /// Log density and gradient together, computing the softmax and the prediction once.
    /// # Arguments
    /// * `beta` - log-odds, one per column of the design matrix
    pub fn evaluate(&self, beta: &[f64]) -> Result<Evaluation> {
        self.check_beta(beta)?;
        let theta = softmax(beta);
        let p = self.floored_prediction(&theta);
        Ok(Evaluation {
            log_density: self.log_likelihood(&p) + self.log_prior(beta),
            gradient: self.gradient(beta, &theta, &p)
        })
    }
}
