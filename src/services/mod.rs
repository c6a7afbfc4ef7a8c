pub mod features;
pub mod filter_engine;
pub mod hallucination_validator;
pub mod query_interpreter;
pub mod record_extractor;
pub mod reorder_predictor;

pub use features::{FeatureVector, PriceScale, FEATURE_NAMES};
pub use hallucination_validator::{HallucinationValidator, ValidationWarning};
pub use query_interpreter::{to_filter_set, QueryIntent, QueryInterpreter};
pub use record_extractor::RecordExtractor;
pub use reorder_predictor::ReorderPredictor;
