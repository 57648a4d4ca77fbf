/// Data layer: core types, loading, pivoting, and export.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv  (long form)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → LongDataset
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ LongDataset  │  Vec<Observation>, column index
///   └─────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  apply metadata predicates → kept indices
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  pivot    │  group by run, one wide row per run → WideTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer   │  WideTable → wide .csv
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod pivot;
pub mod writer;
