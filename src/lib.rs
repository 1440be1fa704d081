//! Quick-look imagery for chunked lidar backscatter files.
//!
//! The instrument software writes one JSON file per time chunk. This crate
//! loads those files, joins them into one continuous series per channel and
//! renders a time/altitude heatmap per channel for two altitude ranges.

pub mod data;
pub mod pipeline;
pub mod render;

pub use data::loader::{load_file, LoadError};
pub use data::merge::{join, Discrepancy, MergeError, MergeOutcome, MergePolicy, Merger};
pub use data::model::{ChannelRecord, FieldValue, JoinedMeasurementSet, MeasurementSet, Metadata};
