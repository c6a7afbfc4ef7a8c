pub mod filter;
pub mod loaders;
pub mod order;
pub mod response;
pub mod training;
pub mod us_state;

pub use filter::{Field, FilterPredicate, FilterSet, FilterValue, Operator};
pub use loaders::{generate_synthetic, load_or_generate, load_training_csv};
pub use order::{ParsedOrder, RawBatch, ValidatedOrder};
pub use response::{
    FeaturesUsed, FollowupInsight, ModelStats, QueryRequest, ReorderLabel, ReorderPrediction,
    ResponseEnvelope,
};
pub use training::{TrainingRow, TrainingSet};
