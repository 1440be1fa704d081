/// Data layer: record types, loading, and merging.
///
/// Architecture:
/// ```text
///  chunk_0.json  chunk_1.json  ...
///        │             │
///        ▼             ▼
///   ┌──────────┐
///   │  loader   │  parse file → MeasurementSet (+ Metadata)
///   └──────────┘
///        │  one set per file, in chronological order
///        ▼
///   ┌──────────┐
///   │  merge    │  concatenate DP sequences, check string fields
///   └──────────┘
///        │
///        ▼
///   JoinedMeasurementSet ──▶ render
/// ```

pub mod loader;
pub mod merge;
pub mod model;
