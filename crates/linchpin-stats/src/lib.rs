//! linchpin-stats — Statistical kernels shared by the three analysis stages.
//!
//! Distribution functions come from `statrs`; everything here is the glue
//! that turns expression and survival vectors into test statistics.

pub mod correlation;
pub mod descriptive;
pub mod multiple_testing;
pub mod survival;
pub mod two_sample;

pub use correlation::{correlate, correlation_test, pearson, spearman, CorrelationMethod, CorrelationTest};
pub use descriptive::{average_ranks, finite, mean, median, variance};
pub use multiple_testing::{adjust_p_values, benjamini_hochberg, bonferroni, PAdjustMethod};
pub use survival::{cox_univariate, log_rank, CoxOutcome, LogRankOutcome};
pub use two_sample::{mann_whitney_u, welch_t_test, TestOutcome};
