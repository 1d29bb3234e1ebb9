// Kagami media transformation server library

pub mod cache;
pub mod config;
pub mod constants;
pub mod directive;
pub mod error;
pub mod image_optimizer;
pub mod logging;
pub mod media;
pub mod metrics;
pub mod pipeline;
pub mod proxy;
pub mod scratch;
pub mod storage;
pub mod video;
