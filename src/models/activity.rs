// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Club activity record as returned by Strava and stored in the records blob.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of a club activity feed.
///
/// Club activities carry no activity ID, so identity is the seven fields
/// compared by [`ActivityRecord::same_activity`]. Everything else Strava
/// sends (`name`, `workout_type`, ...) is kept verbatim in `extra` so the
/// stored document round-trips without loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Athlete name fields, compared as a whole object
    pub athlete: Value,
    /// Distance in meters
    pub distance: f64,
    /// Moving time in seconds
    pub moving_time: i64,
    /// Elapsed time in seconds
    pub elapsed_time: i64,
    /// Elevation gain in meters
    pub total_elevation_gain: f64,
    /// Legacy activity type (Ride, Run, ...)
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Sport type (MountainBikeRide, TrailRun, ...)
    pub sport_type: String,
    /// When this record was first ingested; added by the sync if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Remaining upstream fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActivityRecord {
    /// Field-wise equality on the seven identity fields.
    ///
    /// Numbers use plain `==` with no tolerance. `timestamp` and `extra`
    /// are ignored.
    pub fn same_activity(&self, other: &ActivityRecord) -> bool {
        self.athlete == other.athlete
            && self.distance == other.distance
            && self.moving_time == other.moving_time
            && self.elapsed_time == other.elapsed_time
            && self.total_elevation_gain == other.total_elevation_gain
            && self.activity_type == other.activity_type
            && self.sport_type == other.sport_type
    }
}
