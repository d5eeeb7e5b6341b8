//! Psi-marginal adaptive procedure.
//!
//! Keeps a posterior over psychometric-function parameters (threshold,
//! slope, guess rate, lapse rate) on a discrete grid and, before each trial,
//! picks the stimulus level whose outcome is expected to leave the lowest
//! posterior entropy. With marginalization enabled the guess and lapse rates
//! are summed out before scoring, so only threshold and slope drive the
//! choice of stimulus.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use tracing::{debug, trace, warn};

use crate::config::{ConfigError, PsiConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsychometricFunction {
    CumulativeGaussian,
    #[default]
    Gumbel,
    Weibull,
}

impl PsychometricFunction {
    /// Unscaled probability `F(x; threshold, slope)`.
    pub fn probability(&self, x: f64, threshold: f64, slope: f64) -> f64 {
        match self {
            PsychometricFunction::CumulativeGaussian => {
                let z = (x - threshold) / slope;
                0.5 * erfc(-z / std::f64::consts::SQRT_2)
            }
            PsychometricFunction::Gumbel => 1.0 - (-(10f64.powf(slope * (x - threshold)))).exp(),
            PsychometricFunction::Weibull => {
                if threshold <= 0.0 {
                    return if x > 0.0 { 1.0 } else { 0.0 };
                }
                1.0 - (-(x / threshold).powf(slope)).exp()
            }
        }
    }

    /// Probability of a correct response once guessing and lapses are
    /// accounted for.
    pub fn response_probability(
        &self,
        x: f64,
        threshold: f64,
        slope: f64,
        guess: f64,
        lapse: f64,
    ) -> f64 {
        guess + (1.0 - guess - lapse) * self.probability(x, threshold, slope)
    }
}

/// Prior distribution over one parameter's grid. Weights are unnormalized;
/// the joint prior is normalized after the product is taken.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prior {
    #[default]
    Uniform,
    Normal {
        mean: f64,
        sd: f64,
    },
    /// `x^(shape - 1) * e^(-x)`.
    Gamma {
        shape: f64,
    },
    /// `x^(alpha - 1) * (1 - x)^(beta - 1)`.
    Beta {
        alpha: f64,
        beta: f64,
    },
}

impl Prior {
    pub fn weights(&self, grid: &[f64]) -> Vec<f64> {
        grid.iter()
            .map(|&x| match *self {
                Prior::Uniform => 1.0 / grid.len() as f64,
                Prior::Normal { mean, sd } => {
                    let var = sd * sd;
                    (-(x - mean).powi(2) / (2.0 * var)).exp()
                        / (2.0 * std::f64::consts::PI * var).sqrt()
                }
                Prior::Gamma { shape } => x.powf(shape - 1.0) * (-x).exp(),
                Prior::Beta { alpha, beta } => {
                    x.powf(alpha - 1.0) * (1.0 - x).powf(beta - 1.0)
                }
            })
            .map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Estimate {
    pub mean: f64,
    pub sd: f64,
}

/// Posterior means and standard deviations per parameter.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PsiEstimates {
    pub threshold: Estimate,
    pub slope: Estimate,
    pub guess: Estimate,
    pub lapse: Estimate,
}

#[derive(Debug, Clone, Copy)]
struct Hypothesis {
    threshold: f64,
    slope: f64,
    guess: f64,
    lapse: f64,
    /// Index into the threshold x slope plane.
    core: usize,
}

#[derive(Debug, Clone)]
pub struct Psi {
    levels: Vec<f64>,
    hypotheses: Vec<Hypothesis>,
    /// Row-major `[hypothesis][level]` table of correct-response probabilities.
    likelihood: Vec<f64>,
    prior: Vec<f64>,
    pdf: Vec<f64>,
    marginalize: bool,
    core_len: usize,
    guess_tied_to_lapse: bool,
    current: usize,
    trial: usize,
    history: Vec<(f64, bool)>,
    estimates: Option<PsiEstimates>,
    scratch: Vec<f64>,
}

impl Psi {
    pub fn new(config: &PsiConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let threshold_w = config.threshold_prior.weights(&config.threshold);
        let slope_w = config.slope_prior.weights(&config.slope);
        let guess_w = config.guess_prior.weights(&config.guess_rate);
        let lapse_w = config.lapse_prior.weights(&config.lapse_rate);

        // Identical guess and lapse grids with identical priors describe the
        // same distribution; one dimension is enough.
        let guess_tied_to_lapse =
            config.guess_rate == config.lapse_rate && config.guess_prior == config.lapse_prior;
        let guesses: Vec<(Option<usize>, f64)> = if guess_tied_to_lapse {
            vec![(None, 1.0)]
        } else {
            (0..config.guess_rate.len()).map(|k| (Some(k), guess_w[k])).collect()
        };

        let n_slope = config.slope.len();
        let mut hypotheses = Vec::new();
        let mut prior = Vec::new();
        for (i, &threshold) in config.threshold.iter().enumerate() {
            for (j, &slope) in config.slope.iter().enumerate() {
                for &(guess_idx, guess_weight) in &guesses {
                    for (l, &lapse) in config.lapse_rate.iter().enumerate() {
                        let guess = guess_idx.map_or(lapse, |k| config.guess_rate[k]);
                        hypotheses.push(Hypothesis {
                            threshold,
                            slope,
                            guess,
                            lapse,
                            core: i * n_slope + j,
                        });
                        prior.push(threshold_w[i] * slope_w[j] * guess_weight * lapse_w[l]);
                    }
                }
            }
        }

        let total: f64 = prior.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(ConfigError::DegeneratePrior);
        }
        prior.iter_mut().for_each(|p| *p /= total);

        let levels = config.stim_levels.clone();
        let mut likelihood = Vec::with_capacity(hypotheses.len() * levels.len());
        for h in &hypotheses {
            for &x in &levels {
                let p = config
                    .function
                    .response_probability(x, h.threshold, h.slope, h.guess, h.lapse);
                likelihood.push(if p.is_finite() { p.clamp(0.0, 1.0) } else { h.guess });
            }
        }

        debug!(
            hypotheses = hypotheses.len(),
            levels = levels.len(),
            guess_tied_to_lapse,
            "Psi grid built"
        );

        let core_len = config.threshold.len() * n_slope;
        let mut psi = Self {
            levels,
            pdf: prior.clone(),
            prior,
            hypotheses,
            likelihood,
            marginalize: config.marginalize,
            core_len,
            guess_tied_to_lapse,
            current: 0,
            trial: 0,
            history: Vec::new(),
            estimates: None,
            scratch: vec![0.0; core_len],
        };
        psi.select_next();
        Ok(psi)
    }

    /// Stimulus level to present on the upcoming trial.
    pub fn current_level(&self) -> f64 {
        self.levels[self.current]
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Number of levels selected so far, including the upcoming one.
    pub fn trial(&self) -> usize {
        self.trial
    }

    pub fn history(&self) -> &[(f64, bool)] {
        &self.history
    }

    pub fn estimates(&self) -> Option<&PsiEstimates> {
        self.estimates.as_ref()
    }

    pub fn guess_tied_to_lapse(&self) -> bool {
        self.guess_tied_to_lapse
    }

    /// Records the outcome at the current level and selects the next one.
    pub fn add_data(&mut self, correct: bool) {
        let n_levels = self.levels.len();
        let x = self.current;
        self.history.push((self.levels[x], correct));

        let mut total = 0.0;
        for (h, p) in self.pdf.iter_mut().enumerate() {
            let l = self.likelihood[h * n_levels + x];
            *p *= if correct { l } else { 1.0 - l };
            total += *p;
        }
        if total.is_finite() && total > 0.0 {
            self.pdf.iter_mut().for_each(|p| *p /= total);
        } else {
            warn!(level = self.levels[x], correct, "posterior collapsed; restoring prior");
            self.pdf.copy_from_slice(&self.prior);
        }

        let estimates = self.compute_estimates();
        debug!(
            level = self.levels[x],
            correct,
            threshold = estimates.threshold.mean,
            threshold_sd = estimates.threshold.sd,
            slope = estimates.slope.mean,
            "Psi posterior updated"
        );
        self.estimates = Some(estimates);
        self.select_next();
    }

    fn compute_estimates(&self) -> PsiEstimates {
        let fields: [fn(&Hypothesis) -> f64; 4] = [
            |h| h.threshold,
            |h| h.slope,
            |h| h.guess,
            |h| h.lapse,
        ];
        let [threshold, slope, guess, lapse] = fields.map(|field| {
            let mean: f64 = self
                .hypotheses
                .iter()
                .zip(&self.pdf)
                .map(|(h, p)| field(h) * p)
                .sum();
            let var: f64 = self
                .hypotheses
                .iter()
                .zip(&self.pdf)
                .map(|(h, p)| (field(h) - mean).powi(2) * p)
                .sum();
            Estimate {
                mean,
                sd: var.sqrt(),
            }
        });
        PsiEstimates {
            threshold,
            slope,
            guess,
            lapse,
        }
    }

    fn select_next(&mut self) {
        let n_levels = self.levels.len();
        let mut best: Option<(f64, usize)> = None;

        for x in 0..n_levels {
            let mut p_success = 0.0;
            for (h, p) in self.pdf.iter().enumerate() {
                p_success += self.likelihood[h * n_levels + x] * p;
            }
            let p_failure = (1.0 - p_success).max(0.0);

            let h_success = self.posterior_entropy(x, true, p_success);
            let h_failure = self.posterior_entropy(x, false, p_failure);
            let expected = h_success * p_success + h_failure * p_failure;
            trace!(level = self.levels[x], expected, "expected entropy");

            if expected.is_finite() && best.is_none_or(|(e, _)| expected < e) {
                best = Some((expected, x));
            }
        }

        self.current = best.map_or(0, |(_, x)| x);
        self.trial += 1;
    }

    /// Entropy of the posterior after observing `success` at level `x`.
    fn posterior_entropy(&mut self, x: usize, success: bool, evidence: f64) -> f64 {
        if evidence <= 0.0 {
            return 0.0;
        }
        let n_levels = self.levels.len();
        let joint = |h: usize, p: f64, likelihood: &[f64]| {
            let l = likelihood[h * n_levels + x];
            (if success { l } else { 1.0 - l }) * p / evidence
        };

        if self.marginalize {
            self.scratch.iter_mut().for_each(|v| *v = 0.0);
            for (h, p) in self.pdf.iter().enumerate() {
                self.scratch[self.hypotheses[h].core] += joint(h, *p, &self.likelihood);
            }
            entropy(&self.scratch)
        } else {
            -self
                .pdf
                .iter()
                .enumerate()
                .map(|(h, p)| joint(h, *p, &self.likelihood))
                .filter(|q| *q > 0.0)
                .map(|q| q * q.ln())
                .sum::<f64>()
        }
    }

    /// Size of the threshold x slope plane.
    pub fn core_len(&self) -> usize {
        self.core_len
    }
}

/// Shannon entropy with `0 * ln 0 = 0`.
fn entropy(p: &[f64]) -> f64 {
    -p.iter().filter(|q| **q > 0.0).map(|q| q * q.ln()).sum::<f64>()
}
