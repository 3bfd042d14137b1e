/// Data layer: filter decoding, dataset indexing, and querying.
///
/// Architecture:
/// ```text
///  filter.json            BIDS root
///        │                    │
///        ▼                    ▼
///   ┌──────────┐        ┌──────────┐
///   │  loader   │        │  layout   │  walk + parse names → BidsLayout
///   └──────────┘        └──────────┘
///        │ FilterFile          │
///        ▼                    │
///   ┌──────────┐              │
///   │  filter   │ ◄────────────┘
///   └──────────┘  merge into template, one query per bucket
///        │
///        ▼
///    SubjectData
/// ```

pub mod filter;
pub mod layout;
pub mod loader;
pub mod model;
