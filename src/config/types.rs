use crate::analytics::features::Metric;
use crate::error::{Error, Result};
use crate::logging::{LogFormat, LogRotation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level analytics configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Logging configuration
    pub logging: LoggingSettings,

    /// Feature matrix construction
    pub features: FeatureConfig,

    /// Anomaly detection tuning
    pub anomaly: AnomalyConfig,

    /// Correlation discovery tuning
    pub correlation: CorrelationConfig,
}

impl AnalyticsConfig {
    /// Validate every section; rejected before any computation starts
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.anomaly.validate()?;
        self.correlation.validate()?;
        Ok(())
    }
}

/// Logging settings as read from configuration sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,

    /// Output format
    pub format: LogFormat,

    /// Enable console output
    pub console_enabled: bool,

    /// Enable rolling file output
    pub file_enabled: bool,

    /// Log directory (defaults to `logs`)
    pub log_dir: Option<PathBuf>,

    /// File rotation policy
    pub rotation: LogRotation,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            console_enabled: true,
            file_enabled: false,
            log_dir: None,
            rotation: LogRotation::Daily,
        }
    }
}

/// Feature matrix construction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Default lookback window in days
    pub lookback_days: usize,

    /// Largest window a single run may request
    pub max_window_days: usize,

    /// Trailing window for derived rolling features
    pub rolling_window_days: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lookback_days: 60,
            max_window_days: 730,
            rolling_window_days: 7,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lookback_days == 0 {
            return Err(invalid("features.lookback_days must be greater than 0"));
        }
        if self.max_window_days < self.lookback_days {
            return Err(invalid(
                "features.max_window_days must not be smaller than features.lookback_days",
            ));
        }
        if self.rolling_window_days == 0 {
            return Err(invalid("features.rolling_window_days must be greater than 0"));
        }
        Ok(())
    }
}

/// Absolute medical range for a metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MedicalBounds {
    pub min: f64,
    pub max: f64,
}

impl MedicalBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether the value falls outside the range (bounds themselves are in range)
    pub fn violated_by(&self, value: f64) -> bool {
        value < self.min || value > self.max
    }
}

/// Anomaly detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Minimum non-null observations for a baseline
    pub min_observations: usize,

    /// Trailing rows used as baseline window
    pub baseline_window_days: usize,

    /// Z threshold applied when no per-metric override exists
    pub default_threshold: f64,

    /// Per-metric z threshold overrides keyed by metric name
    pub thresholds: BTreeMap<String, f64>,

    /// Absolute medical bounds keyed by metric name
    pub medical_bounds: BTreeMap<String, MedicalBounds>,

    /// EWMA span for adaptive baselines
    pub ewma_span: usize,

    /// Expected outlier fraction for the multivariate detector
    pub contamination: f64,

    /// Number of isolation trees
    pub n_trees: usize,

    /// Per-tree subsample size
    pub subsample_size: usize,

    /// Minimum features for the multivariate detector
    pub min_features: usize,

    /// Minimum days for the multivariate detector
    pub min_samples: usize,

    /// Number of metrics a multivariate flag is attributed to
    pub attribution_top_k: usize,

    /// Maximum clusters for the attribution reference centroids
    pub centroid_clusters: usize,

    /// Seed for the isolation forest
    pub seed: u64,

    /// Ensemble weight of the z-score detector
    pub zscore_weight: f64,

    /// Ensemble weight of the isolation forest
    pub iforest_weight: f64,

    /// Maximum anomalies returned per run
    pub max_anomalies: usize,

    /// Candidate features for the multivariate detector
    pub multivariate_features: Vec<Metric>,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        let thresholds = BTreeMap::from([
            (Metric::TotalCalories.to_string(), 3.0),
            (Metric::WeightKg.to_string(), 2.0),
        ]);
        let medical_bounds = BTreeMap::from([
            (Metric::GlucoseMgdl.to_string(), MedicalBounds::new(70.0, 140.0)),
            (Metric::GlucoseFasting.to_string(), MedicalBounds::new(70.0, 140.0)),
            (Metric::RestingHr.to_string(), MedicalBounds::new(40.0, 100.0)),
            (Metric::BpSystolic.to_string(), MedicalBounds::new(90.0, 140.0)),
            (Metric::BpDiastolic.to_string(), MedicalBounds::new(60.0, 90.0)),
            (Metric::Spo2.to_string(), MedicalBounds::new(94.0, 100.0)),
        ]);

        Self {
            min_observations: 14,
            baseline_window_days: 60,
            default_threshold: 2.5,
            thresholds,
            medical_bounds,
            ewma_span: 7,
            contamination: 0.05,
            n_trees: 100,
            subsample_size: 256,
            min_features: 3,
            min_samples: 10,
            attribution_top_k: 2,
            centroid_clusters: 3,
            seed: 42,
            zscore_weight: 0.4,
            iforest_weight: 0.6,
            max_anomalies: 50,
            multivariate_features: vec![
                Metric::SleepHours,
                Metric::SleepQuality,
                Metric::TotalCalories,
                Metric::ProteinG,
                Metric::SugarG,
                Metric::ExerciseMinutes,
                Metric::RestingHr,
                Metric::HrvMs,
                Metric::BpSystolic,
                Metric::GlucoseFasting,
            ],
        }
    }
}

impl AnomalyConfig {
    /// Z threshold for a metric
    pub fn threshold_for(&self, metric: Metric) -> f64 {
        self.thresholds
            .get(metric.as_str())
            .copied()
            .unwrap_or(self.default_threshold)
    }

    /// Medical bounds for a metric, if configured
    pub fn bounds_for(&self, metric: Metric) -> Option<MedicalBounds> {
        self.medical_bounds.get(metric.as_str()).copied()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination < 1.0) {
            return Err(invalid(format!(
                "anomaly.contamination must be in (0, 1), got {}",
                self.contamination
            )));
        }
        if self.min_observations < 2 {
            return Err(invalid("anomaly.min_observations must be at least 2"));
        }
        if self.baseline_window_days == 0 {
            return Err(invalid("anomaly.baseline_window_days must be greater than 0"));
        }
        if !(self.default_threshold > 0.0) {
            return Err(invalid("anomaly.default_threshold must be positive"));
        }
        for (name, threshold) in &self.thresholds {
            name.parse::<Metric>()
                .map_err(|_| invalid(format!("anomaly.thresholds: unknown metric '{}'", name)))?;
            if !(*threshold > 0.0) {
                return Err(invalid(format!(
                    "anomaly.thresholds.{} must be positive",
                    name
                )));
            }
        }
        for (name, bounds) in &self.medical_bounds {
            name.parse::<Metric>().map_err(|_| {
                invalid(format!("anomaly.medical_bounds: unknown metric '{}'", name))
            })?;
            if !(bounds.min <= bounds.max) {
                return Err(invalid(format!(
                    "anomaly.medical_bounds.{}: min must not exceed max",
                    name
                )));
            }
        }
        if self.ewma_span == 0 {
            return Err(invalid("anomaly.ewma_span must be greater than 0"));
        }
        if self.n_trees == 0 || self.subsample_size < 2 {
            return Err(invalid(
                "anomaly.n_trees must be positive and anomaly.subsample_size at least 2",
            ));
        }
        if self.attribution_top_k == 0 || self.centroid_clusters == 0 {
            return Err(invalid(
                "anomaly.attribution_top_k and anomaly.centroid_clusters must be positive",
            ));
        }
        if self.zscore_weight < 0.0
            || self.iforest_weight < 0.0
            || !(self.zscore_weight + self.iforest_weight > 0.0)
        {
            return Err(invalid(
                "anomaly ensemble weights must be non-negative and not both zero",
            ));
        }
        if self.max_anomalies == 0 {
            return Err(invalid("anomaly.max_anomalies must be greater than 0"));
        }
        Ok(())
    }
}

/// Correlation discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Minimum overlapping non-null days for a pair
    pub min_overlap: usize,

    /// Two-sided significance level
    pub significance_level: f64,

    /// Minimum |r| for signed methods
    pub min_abs_correlation: f64,

    /// Records below this strength are discarded
    pub weak_floor: f64,

    /// Maximum Granger lag in days
    pub granger_max_lag: usize,

    /// Maximum cross-correlation lag in days
    pub cross_correlation_max_lag: usize,

    /// k for the KSG mutual information estimator
    pub mi_neighbors: usize,

    /// Permutations for the mutual information significance test
    pub mi_permutations: usize,

    /// Confidence bonus per agreeing method
    pub agreement_bonus: f64,

    /// Lag difference tolerated when comparing methods
    pub lag_tolerance_days: usize,

    /// |z| versus population above which a pair is actionable
    pub population_deviation_z: f64,

    /// Percentile considered extreme (mirrored at the low end)
    pub extreme_percentile: f64,

    /// Seed for permutation tests
    pub seed: u64,

    /// Include derived metrics in pair enumeration
    pub include_derived: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_overlap: 20,
            significance_level: 0.05,
            min_abs_correlation: 0.3,
            weak_floor: 0.2,
            granger_max_lag: 7,
            cross_correlation_max_lag: 14,
            mi_neighbors: 3,
            mi_permutations: 99,
            agreement_bonus: 0.15,
            lag_tolerance_days: 1,
            population_deviation_z: 1.5,
            extreme_percentile: 90.0,
            seed: 42,
            include_derived: false,
        }
    }
}

impl CorrelationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_overlap < 4 {
            return Err(invalid("correlation.min_overlap must be at least 4"));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(invalid("correlation.significance_level must be in (0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.min_abs_correlation) || !(0.0..=1.0).contains(&self.weak_floor)
        {
            return Err(invalid(
                "correlation.min_abs_correlation and correlation.weak_floor must be in [0, 1]",
            ));
        }
        if self.granger_max_lag == 0 {
            return Err(invalid("correlation.granger_max_lag must be greater than 0"));
        }
        if self.cross_correlation_max_lag == 0 {
            return Err(invalid(
                "correlation.cross_correlation_max_lag must be greater than 0",
            ));
        }
        if self.mi_neighbors == 0 {
            return Err(invalid("correlation.mi_neighbors must be greater than 0"));
        }
        if !(self.agreement_bonus >= 0.0) {
            return Err(invalid("correlation.agreement_bonus must not be negative"));
        }
        if !(self.extreme_percentile > 50.0 && self.extreme_percentile < 100.0) {
            return Err(invalid("correlation.extreme_percentile must be in (50, 100)"));
        }
        if !(self.population_deviation_z > 0.0) {
            return Err(invalid("correlation.population_deviation_z must be positive"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidConfiguration(message.into())
}
