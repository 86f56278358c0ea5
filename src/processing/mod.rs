//! Conversion dispatch core: work items and the worker pool

pub mod work;
pub mod worker;

pub use work::{Outcome, Work, WorkHandle};
pub use worker::init_workers;
