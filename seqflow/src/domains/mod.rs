//! The two concrete pipelines: career analysis and DevOps deployment.
//!
//! Both are the same [`SequentialPipeline`](crate::pipeline::SequentialPipeline)
//! with different stages, schemas and fallbacks.

pub mod career;
pub mod devops;

mod keywords;

pub use keywords::{find_keywords, Keyword};
