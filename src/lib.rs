//! Acquisition and smoothing pipeline for a serial PIR motion sensor.
//!
//! A [`sensor::SampleSource`] is drained on a dedicated thread by
//! [`pipeline::Pipeline`], each reading goes through the integer
//! [`dsp::iir::IirFilter`], and the raw/filtered/diff triple lands in a shared
//! [`history::SampleHistory`] that any number of readers can snapshot.

pub mod config;
pub mod dsp;
pub mod history;
pub mod monitor;
pub mod pipeline;
pub mod sensor;
pub mod util;
