pub mod source_client;

pub use source_client::{
    HttpOrderSource, OrderSource, SourceClient, StaticOrderSource, SAMPLE_ORDERS,
};
