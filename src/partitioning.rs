//! Partitioning handles: the distribution strategy of data across workers
//! (spec §3).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitioningHandle {
    Single,
    FixedHash,
    FixedBroadcast,
    /// Unpartitioned; writer count scales with throughput.
    ScaledWriter,
    ScaledWriterHash,
    RoundRobin,
    Source,
}

impl PartitioningHandle {
    /// A handle is "scale-writer-like" if either of the last two scaled
    /// variants (spec §3). These are the ones C8's scaled-writer checker
    /// cares about.
    pub fn is_scale_writer_like(&self) -> bool {
        matches!(
            self,
            PartitioningHandle::ScaledWriter | PartitioningHandle::ScaledWriterHash
        )
    }

    /// Whether rows of a given group-key hash all land on the same
    /// partition; used by stats/cost derivation to decide whether a
    /// redistribution is a no-op repartition or a genuine shuffle.
    pub fn is_hash_partitioned(&self) -> bool {
        matches!(
            self,
            PartitioningHandle::FixedHash | PartitioningHandle::ScaledWriterHash
        )
    }
}
