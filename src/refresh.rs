//! Re-render decision for the periodic sensor poll.

use crate::sensor::WorkoutSummary;

/// Tracks the last seen total distance and decides when the weight graph
/// needs to be redrawn.
#[derive(Debug, Default)]
pub struct RefreshController {
    last_total_distance: f64,
}

impl RefreshController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_total_distance(&self) -> f64 {
        self.last_total_distance
    }

    /// Record the outcome of one poll and report whether to re-render.
    ///
    /// Absent data, a changed total or `force` all trigger a re-render. The
    /// stored total always becomes the fetched one, or 0 without data.
    pub fn observe(&mut self, data: Option<&WorkoutSummary>, force: bool) -> bool {
        let rerender = match data {
            None => true,
            Some(summary) => summary.total_distance != self.last_total_distance,
        } || force;

        self.last_total_distance = data.map_or(0.0, |summary| summary.total_distance);

        rerender
    }
}
