//! `MetadataProbe`: the read-only capability rules use to consult the
//! external metadata service (spec §6). The core never talks to a
//! connector directly; it only ever asks through this trait.

use crate::partitioning::PartitioningHandle;

/// A write target identified by name, as carried in [`crate::plan::attrs::TableWriteAttrs::target`].
pub type TableTarget<'a> = &'a str;

pub trait MetadataProbe {
    /// Whether `table` supports a connector-level delete push-down, and if
    /// so, the replacement partitioning handle the rewrite should use.
    fn applies_delete(&self, table: &str) -> Option<PartitioningHandle>;

    /// Whether `target` can report how many bytes it physically wrote, a
    /// precondition for using any scale-writer-like partitioning at a
    /// table-writer (spec §4.8).
    fn supports_written_bytes_reporting(&self, target: TableTarget) -> bool;

    /// Whether `target` supports more than one writer task per output
    /// partition, a precondition for the hashed scaled-writer variant (spec
    /// §4.8).
    fn supports_multiple_writers_per_partition(&self, target: TableTarget) -> bool;
}

/// A probe with no connectors attached: every capability query answers "no
/// support". Useful as a default for callers that have not wired a real
/// metadata service, and in tests.
pub struct NoMetadata;

impl MetadataProbe for NoMetadata {
    fn applies_delete(&self, _table: &str) -> Option<PartitioningHandle> {
        None
    }

    fn supports_written_bytes_reporting(&self, _target: TableTarget) -> bool {
        false
    }

    fn supports_multiple_writers_per_partition(&self, _target: TableTarget) -> bool {
        false
    }
}
