//! Per-day demand matrix and stream-name interning.
//!
//! Each day of the input is a set of streams; a stream row carries one size
//! per client (zero when the client does not request that stream that day).
//! Stream names repeat heavily across days, so they are interned to dense
//! [`StreamId`]s at parse time and resolved back to strings only when the
//! solution file is written.

use std::collections::HashMap;

use crate::StreamId;

/// Interner mapping stream names to dense ids.
#[derive(Debug, Clone, Default)]
pub struct StreamNames {
    names: Vec<String>,
    index: HashMap<String, StreamId>,
}

impl StreamNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, allocating one if the name is new.
    pub fn intern(&mut self, name: &str) -> StreamId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = StreamId::new(self.names.len() as u32);
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        id
    }

    /// Id for `name` if it was interned before.
    pub fn get(&self, name: &str) -> Option<StreamId> {
        self.index.get(name).copied()
    }

    /// The string form of an interned id.
    pub fn name(&self, id: StreamId) -> &str {
        &self.names[id.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One demand row: a stream name and its per-client sizes for one day.
#[derive(Debug, Clone)]
pub struct StreamDemand {
    pub stream: StreamId,
    /// One size per client, indexed by post-sort client id; zero means the
    /// client does not request this stream on this day
    pub sizes: Vec<i64>,
    /// Cross-client sum, cached for the allocator's ranking passes
    pub total: i64,
}

impl StreamDemand {
    pub fn new(stream: StreamId, sizes: Vec<i64>) -> Self {
        let total = sizes.iter().sum();
        Self {
            stream,
            sizes,
            total,
        }
    }
}

/// All demand of a single timestamp.
#[derive(Debug, Clone)]
pub struct DemandDay {
    /// Timestamp label from the input, kept opaque
    pub label: String,
    pub streams: Vec<StreamDemand>,
}

impl DemandDay {
    pub fn new(label: String) -> Self {
        Self {
            label,
            streams: Vec::new(),
        }
    }

    /// Total bytes demanded on this day
    pub fn total(&self) -> i64 {
        self.streams.iter().map(|s| s.total).sum()
    }

    /// Total bytes demanded by one client on this day
    pub fn client_total(&self, client: usize) -> i64 {
        self.streams.iter().map(|s| s.sizes[client]).sum()
    }

    /// Largest single stream size on this day
    pub fn max_stream_size(&self) -> i64 {
        self.streams
            .iter()
            .flat_map(|s| s.sizes.iter().copied())
            .max()
            .unwrap_or(0)
    }
}

/// The full demand time-series plus the interner that names its streams.
#[derive(Debug, Clone, Default)]
pub struct DemandSet {
    pub days: Vec<DemandDay>,
    pub names: StreamNames,
}

impl DemandSet {
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn total_demand(&self) -> i64 {
        self.days.iter().map(DemandDay::total).sum()
    }

    /// Compute summary statistics for inspection output
    pub fn stats(&self) -> DemandStats {
        let mut stats = DemandStats {
            num_days: self.days.len(),
            num_stream_names: self.names.len(),
            ..DemandStats::default()
        };
        for day in &self.days {
            let total = day.total();
            stats.num_rows += day.streams.len();
            stats.total_demand += total;
            stats.max_day_total = stats.max_day_total.max(total);
            stats.max_stream_size = stats.max_stream_size.max(day.max_stream_size());
        }
        if stats.num_days > 0 {
            stats.avg_day_total = stats.total_demand / stats.num_days as i64;
        }
        stats
    }
}

/// Statistics about a demand set's size and shape
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DemandStats {
    pub num_days: usize,
    pub num_stream_names: usize,
    /// Stream rows across all days
    pub num_rows: usize,
    pub total_demand: i64,
    pub avg_day_total: i64,
    pub max_day_total: i64,
    pub max_stream_size: i64,
}

impl std::fmt::Display for DemandStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} days, {} stream names, {} rows, {} total demand (avg/day {}, peak day {}, peak stream {})",
            self.num_days,
            self.num_stream_names,
            self.num_rows,
            self.total_demand,
            self.avg_day_total,
            self.max_day_total,
            self.max_stream_size,
        )
    }
}
