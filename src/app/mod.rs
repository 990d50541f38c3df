pub mod convert;
pub mod dataset;
pub mod normalize;
pub mod pipelines;
pub mod runner;
