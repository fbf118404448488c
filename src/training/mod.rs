//! Model training module
//!
//! Provides the regression estimators and the machinery that picks one:
//! - Decision trees, Random Forests and gradient boosting
//! - A name-keyed registry of model families
//! - Cross-validated grid search and cross-family selection
//! - Regression metrics and the persistable pipeline

mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod metrics;
pub mod pipeline;
pub mod random_forest;
pub mod registry;
pub mod search;
pub mod selector;

pub use cross_validation::{CVResults, CVSplit, CrossValidator};
pub use decision_tree::{DecisionTree, MaxFeatures, TreeNode};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use metrics::{compute, Metric, MetricsReport};
pub use models::{Estimator, Fittable, Predictive};
pub use pipeline::RegressionPipeline;
pub use random_forest::RandomForestRegressor;
pub use registry::{FamilyEntry, Factory, HyperParams, ModelRegistry, ParamKind};
pub use search::{enumerate_grid, CandidateScore, GridSearch, Scoring, SearchResult, SearchSettings};
pub use selector::{FamilySummary, ModelSelector, Selection};
