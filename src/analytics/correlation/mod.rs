//! Correlation Detection Module
//!
//! メトリクス間の関係発見（線形・ラグ付き因果・相互相関・非線形依存）

pub mod aggregator;
pub mod analyzer;
pub mod cross_correlation;
pub mod granger;
pub mod method;
pub mod mutual_info;
pub mod pearson;
pub mod population;
pub mod stats;
pub mod summary;
pub mod types;

pub use aggregator::CorrelationAggregator;
pub use analyzer::{AnalysisOutcome, CorrelationAnalyzer, MethodSelection};
pub use method::{CorrelationMethod, MetricPair};
pub use population::{default_baseline, enrich, PopulationBaseline};
pub use summary::{CorrelationFinding, CorrelationSummary};
pub use types::{
    CausalDirection, CorrelationCandidate, CorrelationDetails, CorrelationRecord,
    CorrelationStrength, CorrelationType, PopulationComparison,
};
