//! Bounded derivative-free search over the free variables.
//!
//! Two population strategies are available:
//!
//! - a compact real-coded genetic algorithm (binary tournament selection,
//!   blend crossover, Gaussian mutation, bound clipping, global elitism);
//! - differential evolution (best/1/bin with dithered mutation factor).
//!
//! Either one falls back to uniform random search if it faults. The
//! fallback itself never fails.
//!
//! References:
//! - Storn, R., Price, K. "Differential Evolution - A Simple and Efficient
//!   Heuristic for Global Optimization over Continuous Spaces" (1997)

use crate::error::{CoreError, CoreResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use tracing::{debug, warn};

/// Which search produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Genetic,
    Differential,
    Random,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Genetic => "genetic",
            Strategy::Differential => "differential",
            Strategy::Random => "random",
        };
        f.write_str(name)
    }
}

impl FromStr for Strategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "genetic" | "ga" => Ok(Strategy::Genetic),
            "differential" | "de" => Ok(Strategy::Differential),
            "random" => Ok(Strategy::Random),
            other => Err(CoreError::Config(format!(
                "unknown strategy '{}' (use genetic, differential or random)",
                other
            ))),
        }
    }
}

/// Individual in the population
#[derive(Clone, Debug)]
pub struct Individual {
    /// Free-variable values
    pub x: Vec<f64>,
    /// Loss (lower is better); +inf until evaluated
    pub fitness: f64,
}

impl Individual {
    pub fn new(x: Vec<f64>) -> Self {
        Self {
            x,
            fitness: f64::INFINITY,
        }
    }
}

/// Outcome of a search run.
#[derive(Clone, Debug, Serialize)]
pub struct SearchResult {
    pub best: Vec<f64>,
    pub best_score: f64,
    /// Best-known loss after each generation (non-increasing)
    pub history: Vec<f64>,
    pub evaluations: usize,
    pub strategy: Strategy,
    /// Set when the primary strategy faulted and random search took over
    pub fallback_reason: Option<String>,
}

/// Everything needed to run [`minimize`].
#[derive(Clone, Debug, PartialEq)]
pub struct SearchSettings {
    pub strategy: Strategy,
    pub pop_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub fallback_samples: usize,
    pub de_popsize: usize,
    pub de_maxiter: usize,
    pub de_recombination: f64,
    pub de_mutation: (f64, f64),
    pub seed: Option<u64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::Genetic,
            pop_size: 50,
            generations: 40,
            mutation_rate: 0.1,
            fallback_samples: 500,
            de_popsize: 10,
            de_maxiter: 20,
            de_recombination: 0.7,
            de_mutation: (0.5, 1.0),
            seed: None,
        }
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Rejects empty, non-finite or inverted bounds.
pub fn validate_bounds(bounds: &[(f64, f64)]) -> CoreResult<()> {
    if bounds.is_empty() {
        return Err(CoreError::Optimizer("no free variables to optimize".into()));
    }
    for (index, &(lower, upper)) in bounds.iter().enumerate() {
        if !(lower.is_finite() && upper.is_finite()) || lower > upper {
            return Err(CoreError::InvalidBounds { index, lower, upper });
        }
    }
    Ok(())
}

/// Loss with NaN demoted to +inf so comparisons stay total.
fn score<F>(objective: &F, x: &[f64]) -> CoreResult<f64>
where
    F: Fn(&[f64]) -> CoreResult<f64>,
{
    let s = objective(x)?;
    Ok(if s.is_nan() { f64::INFINITY } else { s })
}

/// Genetic algorithm configuration
#[derive(Clone, Debug)]
pub struct GeneticConfig {
    /// Population size (at least 2)
    pub pop_size: usize,
    /// Number of generations
    pub generations: usize,
    /// Mutation probability (per gene)
    pub mutation_rate: f64,
    /// Variable bounds: [(min, max), ...]
    pub bounds: Vec<(f64, f64)>,
    /// Seed for reproducibility; entropy when absent
    pub seed: Option<u64>,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            pop_size: 50,
            generations: 40,
            mutation_rate: 0.1,
            bounds: Vec::new(),
            seed: None,
        }
    }
}

/// Real-coded genetic algorithm with global elitism
pub struct GeneticAlgorithm {
    config: GeneticConfig,
    population: Vec<Individual>,
    rng: StdRng,
    evaluations: usize,
}

impl GeneticAlgorithm {
    pub fn new(config: GeneticConfig) -> Self {
        Self {
            rng: make_rng(config.seed),
            config,
            population: Vec::new(),
            evaluations: 0,
        }
    }

    /// Uniform random population within bounds
    pub fn initialize_population(&mut self) {
        let n = self.config.pop_size;
        self.population = (0..n)
            .map(|_| {
                let x = self
                    .config
                    .bounds
                    .iter()
                    .map(|&(lo, hi)| lo + (hi - lo) * self.rng.gen::<f64>())
                    .collect();
                Individual::new(x)
            })
            .collect();
    }

    /// Evaluate every individual
    pub fn evaluate<F>(&mut self, objective: &F) -> CoreResult<()>
    where
        F: Fn(&[f64]) -> CoreResult<f64>,
    {
        for ind in self.population.iter_mut() {
            ind.fitness = score(objective, &ind.x)?;
            self.evaluations += 1;
        }
        Ok(())
    }

    /// Binary tournament over two independent permutations.
    ///
    /// Ties go to the individual drawn from the first permutation.
    fn tournament_select(&mut self) -> Vec<Vec<f64>> {
        let n = self.population.len();
        let mut first: Vec<usize> = (0..n).collect();
        let mut second: Vec<usize> = (0..n).collect();
        first.shuffle(&mut self.rng);
        second.shuffle(&mut self.rng);

        first
            .iter()
            .zip(&second)
            .map(|(&a, &b)| {
                let winner = if self.population[a].fitness <= self.population[b].fitness {
                    a
                } else {
                    b
                };
                self.population[winner].x.clone()
            })
            .collect()
    }

    /// Blend crossover of the shuffled pool, first half against second half.
    ///
    /// Each pair yields two complementary children. With an odd pool the
    /// last parent passes through unchanged.
    fn blend_crossover(&mut self, mut parents: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
        parents.shuffle(&mut self.rng);
        let half = parents.len() / 2;
        let d = self.config.bounds.len();

        for k in 0..half {
            for j in 0..d {
                let alpha: f64 = self.rng.gen();
                let p1 = parents[k][j];
                let p2 = parents[half + k][j];
                parents[k][j] = alpha * p1 + (1.0 - alpha) * p2;
                parents[half + k][j] = (1.0 - alpha) * p1 + alpha * p2;
            }
        }
        parents
    }

    /// Gaussian mutation with sigma at 10% of each bound range
    fn gaussian_mutation(&mut self, offspring: &mut [Vec<f64>]) {
        for x in offspring.iter_mut() {
            for (j, v) in x.iter_mut().enumerate() {
                if self.rng.gen::<f64>() >= self.config.mutation_rate {
                    continue;
                }
                let (lo, hi) = self.config.bounds[j];
                let noise: f64 = self.rng.sample(StandardNormal);
                *v += noise * 0.1 * (hi - lo);
            }
        }
    }

    /// Clip every coordinate back into its bounds
    fn repair(&self, offspring: &mut [Vec<f64>]) {
        for x in offspring.iter_mut() {
            for (v, &(lo, hi)) in x.iter_mut().zip(&self.config.bounds) {
                *v = v.clamp(lo, hi);
            }
        }
    }

    /// Run optimization
    pub fn optimize<F>(&mut self, objective: &F) -> CoreResult<SearchResult>
    where
        F: Fn(&[f64]) -> CoreResult<f64>,
    {
        validate_bounds(&self.config.bounds)?;
        if self.config.pop_size < 2 {
            return Err(CoreError::Optimizer(format!(
                "population size must be at least 2, got {}",
                self.config.pop_size
            )));
        }

        self.initialize_population();
        let mut best: Option<Individual> = None;
        let mut history = Vec::with_capacity(self.config.generations);

        for gen in 0..self.config.generations {
            self.evaluate(objective)?;

            if let Some(leader) = self
                .population
                .iter()
                .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
            {
                if leader.fitness < best.as_ref().map_or(f64::INFINITY, |b| b.fitness) {
                    best = Some(leader.clone());
                }
            }
            let elite = best.clone().ok_or_else(|| {
                CoreError::Optimizer(format!("no finite candidate in generation {}", gen))
            })?;
            history.push(elite.fitness);
            debug!(generation = gen, best = elite.fitness, "genetic generation");

            let parents = self.tournament_select();
            let mut offspring = self.blend_crossover(parents);
            self.gaussian_mutation(&mut offspring);
            self.repair(&mut offspring);
            offspring[0] = elite.x;

            self.population = offspring.into_iter().map(Individual::new).collect();
        }

        let best = best.ok_or_else(|| CoreError::Optimizer("no generations were run".into()))?;
        Ok(SearchResult {
            best: best.x,
            best_score: best.fitness,
            history,
            evaluations: self.evaluations,
            strategy: Strategy::Genetic,
            fallback_reason: None,
        })
    }

    /// Get current population
    pub fn get_population(&self) -> &[Individual] {
        &self.population
    }
}

/// Differential evolution configuration
#[derive(Clone, Debug)]
pub struct DifferentialConfig {
    /// Population multiplier per free variable
    pub popsize: usize,
    /// Number of generations
    pub maxiter: usize,
    /// Crossover probability
    pub recombination: f64,
    /// Mutation factor dither range
    pub mutation: (f64, f64),
    pub bounds: Vec<(f64, f64)>,
    pub seed: Option<u64>,
}

impl Default for DifferentialConfig {
    fn default() -> Self {
        Self {
            popsize: 10,
            maxiter: 20,
            recombination: 0.7,
            mutation: (0.5, 1.0),
            bounds: Vec::new(),
            seed: None,
        }
    }
}

/// Differential evolution, best/1/bin with immediate replacement
pub struct DifferentialEvolution {
    config: DifferentialConfig,
    population: Vec<Individual>,
    rng: StdRng,
    evaluations: usize,
}

impl DifferentialEvolution {
    pub fn new(config: DifferentialConfig) -> Self {
        Self {
            rng: make_rng(config.seed),
            config,
            population: Vec::new(),
            evaluations: 0,
        }
    }

    /// Latin hypercube initialization: one sample per stratum per dimension
    fn initialize_population(&mut self, n: usize) {
        let d = self.config.bounds.len();

        let mut strata: Vec<Vec<usize>> = (0..d).map(|_| (0..n).collect()).collect();
        for dim in strata.iter_mut() {
            dim.shuffle(&mut self.rng);
        }

        self.population = (0..n)
            .map(|i| {
                let x = (0..d)
                    .map(|j| {
                        let (lo, hi) = self.config.bounds[j];
                        let u = (strata[j][i] as f64 + self.rng.gen::<f64>()) / n as f64;
                        lo + u * (hi - lo)
                    })
                    .collect();
                Individual::new(x)
            })
            .collect();
    }

    /// Two distinct indices, both different from `exclude`
    fn pick_pair(&mut self, n: usize, exclude: usize) -> (usize, usize) {
        let mut r1 = self.rng.gen_range(0..n);
        while r1 == exclude {
            r1 = self.rng.gen_range(0..n);
        }
        let mut r2 = self.rng.gen_range(0..n);
        while r2 == exclude || r2 == r1 {
            r2 = self.rng.gen_range(0..n);
        }
        (r1, r2)
    }

    pub fn optimize<F>(&mut self, objective: &F) -> CoreResult<SearchResult>
    where
        F: Fn(&[f64]) -> CoreResult<f64>,
    {
        validate_bounds(&self.config.bounds)?;
        let d = self.config.bounds.len();
        let n = (self.config.popsize * d).max(5);
        let (f_lo, f_hi) = self.config.mutation;

        self.initialize_population(n);
        for ind in self.population.iter_mut() {
            ind.fitness = score(objective, &ind.x)?;
            self.evaluations += 1;
        }

        let mut best_idx = 0;
        for (i, ind) in self.population.iter().enumerate() {
            if ind.fitness < self.population[best_idx].fitness {
                best_idx = i;
            }
        }
        let mut history = Vec::with_capacity(self.config.maxiter + 1);
        history.push(self.population[best_idx].fitness);

        for gen in 0..self.config.maxiter {
            let factor = if f_hi > f_lo {
                self.rng.gen_range(f_lo..f_hi)
            } else {
                f_lo
            };

            for i in 0..n {
                let (r1, r2) = self.pick_pair(n, i);
                let j_rand = self.rng.gen_range(0..d);
                let mut trial = self.population[i].x.clone();
                for j in 0..d {
                    if j == j_rand || self.rng.gen::<f64>() < self.config.recombination {
                        let (lo, hi) = self.config.bounds[j];
                        let mutant = self.population[best_idx].x[j]
                            + factor * (self.population[r1].x[j] - self.population[r2].x[j]);
                        trial[j] = mutant.clamp(lo, hi);
                    }
                }

                let s = score(objective, &trial)?;
                self.evaluations += 1;
                if s <= self.population[i].fitness {
                    self.population[i] = Individual { x: trial, fitness: s };
                    if s < self.population[best_idx].fitness {
                        best_idx = i;
                    }
                }
            }

            history.push(self.population[best_idx].fitness);
            debug!(
                generation = gen,
                best = self.population[best_idx].fitness,
                "differential generation"
            );
        }

        let best = &self.population[best_idx];
        if !best.fitness.is_finite() {
            return Err(CoreError::Optimizer("no finite candidate found".into()));
        }
        Ok(SearchResult {
            best: best.x.clone(),
            best_score: best.fitness,
            history,
            evaluations: self.evaluations,
            strategy: Strategy::Differential,
            fallback_reason: None,
        })
    }
}

/// Uniform random search. Never fails: evaluation errors count as +inf and
/// the bound midpoint is returned if no sample scores finite.
pub fn random_search<F>(
    objective: &F,
    bounds: &[(f64, f64)],
    samples: usize,
    seed: Option<u64>,
) -> SearchResult
where
    F: Fn(&[f64]) -> CoreResult<f64>,
{
    let mut rng = make_rng(seed);
    let mut best: Vec<f64> = bounds.iter().map(|&(lo, hi)| (lo + hi) / 2.0).collect();
    let mut best_score = f64::INFINITY;
    let mut history = Vec::with_capacity(samples);

    for _ in 0..samples {
        let x: Vec<f64> = bounds
            .iter()
            .map(|&(lo, hi)| {
                let v = lo + (hi - lo) * rng.gen::<f64>();
                v.max(lo).min(hi)
            })
            .collect();
        let s = match objective(&x) {
            Ok(s) if !s.is_nan() => s,
            _ => f64::INFINITY,
        };
        if s < best_score {
            best_score = s;
            best = x;
        }
        history.push(best_score);
    }

    SearchResult {
        best,
        best_score,
        history,
        evaluations: samples,
        strategy: Strategy::Random,
        fallback_reason: None,
    }
}

/// Runs the configured strategy, falling back to random search on a fault.
/// A panic inside the primary strategy counts as a fault.
pub fn minimize<F>(objective: &F, bounds: &[(f64, f64)], settings: &SearchSettings) -> SearchResult
where
    F: Fn(&[f64]) -> CoreResult<f64>,
{
    if settings.strategy == Strategy::Random {
        return random_search(objective, bounds, settings.fallback_samples, settings.seed);
    }

    let primary =
        panic::catch_unwind(AssertUnwindSafe(|| run_primary(objective, bounds, settings)))
            .unwrap_or_else(|payload| Err(CoreError::from_panic(payload)));

    match primary {
        Ok(result) => result,
        Err(e) => {
            warn!(
                strategy = %settings.strategy,
                error = %e,
                "search failed, using random search instead"
            );
            let mut result =
                random_search(objective, bounds, settings.fallback_samples, settings.seed);
            result.fallback_reason = Some(e.to_string());
            result
        }
    }
}

fn run_primary<F>(
    objective: &F,
    bounds: &[(f64, f64)],
    settings: &SearchSettings,
) -> CoreResult<SearchResult>
where
    F: Fn(&[f64]) -> CoreResult<f64>,
{
    match settings.strategy {
        Strategy::Genetic => GeneticAlgorithm::new(GeneticConfig {
            pop_size: settings.pop_size,
            generations: settings.generations,
            mutation_rate: settings.mutation_rate,
            bounds: bounds.to_vec(),
            seed: settings.seed,
        })
        .optimize(objective),
        Strategy::Differential => DifferentialEvolution::new(DifferentialConfig {
            popsize: settings.de_popsize,
            maxiter: settings.de_maxiter,
            recombination: settings.de_recombination,
            mutation: settings.de_mutation,
            bounds: bounds.to_vec(),
            seed: settings.seed,
        })
        .optimize(objective),
        Strategy::Random => Ok(random_search(
            objective,
            bounds,
            settings.fallback_samples,
            settings.seed,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn sphere(x: &[f64]) -> CoreResult<f64> {
        Ok(x.iter().map(|v| (v - 1.0) * (v - 1.0)).sum())
    }

    #[test]
    fn test_ga_initialization() {
        let config = GeneticConfig {
            pop_size: 20,
            bounds: vec![(0.0, 1.0), (-5.0, 5.0)],
            seed: Some(7),
            ..Default::default()
        };
        let mut ga = GeneticAlgorithm::new(config.clone());
        ga.initialize_population();

        let pop = ga.get_population();
        assert_eq!(pop.len(), config.pop_size);
        for ind in pop {
            assert!(ind.x[0] >= 0.0 && ind.x[0] <= 1.0);
            assert!(ind.x[1] >= -5.0 && ind.x[1] <= 5.0);
        }
    }

    #[test]
    fn test_ga_converges_on_sphere() {
        let config = GeneticConfig {
            bounds: vec![(-5.0, 5.0), (-5.0, 5.0)],
            seed: Some(42),
            ..Default::default()
        };
        let result = GeneticAlgorithm::new(config).optimize(&sphere).unwrap();
        assert!(result.best_score < 0.05, "best score {}", result.best_score);
        assert_eq!(result.history.len(), 40);
        assert_eq!(result.evaluations, 50 * 40);
    }

    #[test]
    fn test_ga_elitism_monotone_and_in_bounds() {
        let bounds = vec![(0.0, 2.0), (10.0, 20.0), (-1.0, -0.5)];
        let seen = RefCell::new(Vec::new());
        let objective = |x: &[f64]| -> CoreResult<f64> {
            seen.borrow_mut().push(x.to_vec());
            Ok((x[0] * 3.0).sin() + x[1].cos() + x[2] * x[2])
        };
        let config = GeneticConfig {
            pop_size: 16,
            generations: 25,
            mutation_rate: 0.5,
            bounds: bounds.clone(),
            seed: Some(3),
        };
        let result = GeneticAlgorithm::new(config).optimize(&objective).unwrap();

        for w in result.history.windows(2) {
            assert!(w[1] <= w[0], "history increased: {:?}", w);
        }
        for x in seen.borrow().iter() {
            for (v, &(lo, hi)) in x.iter().zip(&bounds) {
                assert!(*v >= lo && *v <= hi, "{} outside [{}, {}]", v, lo, hi);
            }
        }
    }

    #[test]
    fn test_ga_degenerate_bounds() {
        let config = GeneticConfig {
            pop_size: 6,
            generations: 3,
            bounds: vec![(2.0, 2.0)],
            seed: Some(1),
            ..Default::default()
        };
        let result = GeneticAlgorithm::new(config).optimize(&sphere).unwrap();
        assert_eq!(result.best, vec![2.0]);
    }

    #[test]
    fn test_ga_rejects_bad_setup() {
        let bad_bounds = GeneticConfig {
            bounds: vec![(1.0, 0.0)],
            ..Default::default()
        };
        assert!(matches!(
            GeneticAlgorithm::new(bad_bounds).optimize(&sphere),
            Err(CoreError::InvalidBounds { index: 0, .. })
        ));

        let tiny = GeneticConfig {
            pop_size: 1,
            bounds: vec![(0.0, 1.0)],
            ..Default::default()
        };
        assert!(GeneticAlgorithm::new(tiny).optimize(&sphere).is_err());
    }

    #[test]
    fn test_ga_all_infinite_is_a_fault() {
        let config = GeneticConfig {
            pop_size: 4,
            generations: 2,
            bounds: vec![(0.0, 1.0)],
            seed: Some(5),
            ..Default::default()
        };
        let objective = |_: &[f64]| -> CoreResult<f64> { Ok(f64::NAN) };
        assert!(GeneticAlgorithm::new(config).optimize(&objective).is_err());
    }

    #[test]
    fn test_de_converges_on_sphere() {
        let config = DifferentialConfig {
            bounds: vec![(-5.0, 5.0), (-5.0, 5.0)],
            maxiter: 60,
            seed: Some(11),
            ..Default::default()
        };
        let result = DifferentialEvolution::new(config).optimize(&sphere).unwrap();
        assert!(result.best_score < 1e-3, "best score {}", result.best_score);
        assert_eq!(result.strategy, Strategy::Differential);
        for w in result.history.windows(2) {
            assert!(w[1] <= w[0]);
        }
    }

    #[test]
    fn test_random_search_tolerates_errors() {
        let calls = Cell::new(0usize);
        let objective = |x: &[f64]| -> CoreResult<f64> {
            calls.set(calls.get() + 1);
            if calls.get() % 2 == 0 {
                Err(CoreError::Prediction("flaky".into()))
            } else {
                sphere(x)
            }
        };
        let result = random_search(&objective, &[(0.0, 3.0)], 100, Some(9));
        assert!(result.best_score.is_finite());
        assert!(result.best[0] >= 0.0 && result.best[0] <= 3.0);
        assert_eq!(calls.get(), 100);
    }

    #[test]
    fn test_random_search_all_failures_returns_midpoint() {
        let objective =
            |_: &[f64]| -> CoreResult<f64> { Err(CoreError::Prediction("down".into())) };
        let result = random_search(&objective, &[(0.0, 4.0), (2.0, 3.0)], 10, Some(1));
        assert_eq!(result.best, vec![2.0, 2.5]);
        assert!(result.best_score.is_infinite());
    }

    #[test]
    fn test_minimize_falls_back_on_fault() {
        let calls = Cell::new(0usize);
        let objective = |x: &[f64]| -> CoreResult<f64> {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                return Err(CoreError::Prediction("model offline".into()));
            }
            sphere(x)
        };
        let settings = SearchSettings {
            seed: Some(21),
            ..Default::default()
        };
        let result = minimize(&objective, &[(-2.0, 2.0), (0.0, 4.0)], &settings);

        assert_eq!(result.strategy, Strategy::Random);
        assert!(result.fallback_reason.as_deref().unwrap().contains("model offline"));
        assert!(result.best_score.is_finite());
        assert!(result.best[0] >= -2.0 && result.best[0] <= 2.0);
        assert!(result.best[1] >= 0.0 && result.best[1] <= 4.0);
    }

    #[test]
    fn test_minimize_falls_back_on_panic() {
        let calls = Cell::new(0usize);
        let objective = |x: &[f64]| -> CoreResult<f64> {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                panic!("transient native fault");
            }
            sphere(x)
        };
        let settings = SearchSettings {
            strategy: Strategy::Differential,
            seed: Some(11),
            ..Default::default()
        };
        let result = minimize(&objective, &[(-2.0, 2.0)], &settings);

        assert_eq!(result.strategy, Strategy::Random);
        let reason = result.fallback_reason.unwrap();
        assert!(reason.contains("transient native fault"), "{}", reason);
        assert!(result.best_score.is_finite());
        assert!(calls.get() > 1);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("GA".parse::<Strategy>().unwrap(), Strategy::Genetic);
        assert_eq!("differential".parse::<Strategy>().unwrap(), Strategy::Differential);
        assert!("annealing".parse::<Strategy>().is_err());
        assert_eq!(Strategy::Random.to_string(), "random");
    }
}
