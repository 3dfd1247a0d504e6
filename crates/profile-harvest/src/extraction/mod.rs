//! Multi-strategy profile extraction.

pub mod counts;
pub mod parsers;
pub mod pipeline;
pub mod strategies;

pub use counts::{count_data_points, parse_count};
pub use pipeline::ExtractionPipeline;
pub use strategies::{
    default_strategies, PageRenderStrategy, Strategy, StrategyOutcome, StructuredEndpointStrategy,
};
