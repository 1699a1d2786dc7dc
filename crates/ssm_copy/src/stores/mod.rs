//! Object staging implementations

pub mod s3_stager;
pub mod stager_trait;
