//! Security stages: malware scanning and active-content removal.
//!
//! Both stages sit behind traits so deployments can swap engines. Neither
//! returns an error to the pipeline; every outcome is a report value.

pub mod sanitize;
pub mod scanner;

pub use sanitize::*;
pub use scanner::*;
