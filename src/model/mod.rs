//! The tabular metadata graph: collections, typed entities, the mutable graph
//! root (`Model`/`Database`/`Server`), the change committer and the
//! higher-level operations built on top of them.

pub mod backup;
pub mod collection;
pub mod committer;
pub mod entities;
pub mod graph;
pub mod ops;
mod reload;
pub mod types;

pub use collection::{Collection, Named};
pub use committer::ChangeSet;
pub use entities::{
    Column, Culture, Measure, ObjectTranslation, Partition, PartitionSource, Relationship,
    RelationshipEndpoint, Role, Table,
};
pub use graph::{Database, Model, Server};
pub use types::{
    ColumnKind, CrossFilteringBehavior, DataType, Extras, PartitionMode, PartitionState,
    SecurityFilteringBehavior, SourceType, TranslatedProperty,
};

/// Kind of refresh to request for a partition/table. Re-exported from the
/// driver boundary rather than duplicated here — `PendingOp::RequestRefresh`
/// already carries one, and the original library kept several near-identical
/// enums like this across its `logic_utils.py` revisions (see DESIGN NOTES §9).
pub use crate::driver::RefreshKind as RefreshType;
