//! Tuning options for iterative decoding.

/// Bounds for the channels of an iterative dataset.
///
/// The defaults match the service's emission granularity; raising them
/// trades memory for slack between the reader, the decoder and the
/// consumer.
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into, prefix = "with"))]
pub struct DatasetOptions {
    /// Bound on the inbound frame channel.
    #[builder(default = "10")]
    pub frame_capacity: usize,
    /// Bound on each table's row channel.
    #[builder(default = "1000")]
    pub row_capacity: usize,
    /// Bound on each table's raw-fragment channel.
    #[builder(default = "1")]
    pub fragment_capacity: usize,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            frame_capacity: 10,
            row_capacity: 1000,
            fragment_capacity: 1,
        }
    }
}
