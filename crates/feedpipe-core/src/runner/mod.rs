//! Built-in task runners
//!
//! - [`PassthroughRunner`]: accepts every valid entry it has not seen before

pub mod passthrough;

pub use passthrough::{PassthroughRunner, PassthroughRunnerFactory};
