//! Typed model of a finished plan, one record per `(day, client, server)`.
//!
//! This is the neutral form shared by the engine (which produces it), the
//! writer (which serialises it to `solution.txt`), and the checker (which
//! re-validates it against the inputs). Ids are post-sort; the writer
//! resolves them back to names.

use crate::{ClientId, ServerId, StreamId};

/// A full plan in output form: one [`SolutionDay`] per demand day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Solution {
    pub days: Vec<SolutionDay>,
}

/// All client lines of one day, in output (input-header) order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolutionDay {
    pub allocations: Vec<ClientAllocation>,
}

/// One client's line: the servers carrying its streams this day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAllocation {
    pub client: ClientId,
    pub cells: Vec<SolutionCell>,
}

/// One `<server,stream,...>` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionCell {
    pub server: ServerId,
    pub streams: Vec<StreamId>,
}

impl Solution {
    /// Total stream assignments across all days.
    pub fn assignment_count(&self) -> usize {
        self.days
            .iter()
            .flat_map(|d| &d.allocations)
            .flat_map(|a| &a.cells)
            .map(|c| c.streams.len())
            .sum()
    }
}
