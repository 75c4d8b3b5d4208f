extern crate self as blockwise_core;

pub mod log;
