//! Core ID types for tracks and measurements.

use serde::{Deserialize, Serialize};

/// Unique identifier for a Track within a TrackManager.
///
/// TrackIds are assigned sequentially when Tracks are created, so ordering
/// by id is ordering by creation time. Tie-breaks rely on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u64);

impl TrackId {
    /// Create a new TrackId with the given value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Identifier tracing a measurement back to the frame and detection it came from.
///
/// Displayed as `frame/detection`, the same key used by the frame log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MeasurementId {
    pub frame: u64,
    pub detection: u32,
}

impl MeasurementId {
    pub fn new(frame: u64, detection: u32) -> Self {
        Self { frame, detection }
    }
}

impl std::fmt::Display for MeasurementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.frame, self.detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_id_ordering_follows_creation() {
        let first = TrackId::new(3);
        let second = TrackId::new(4);

        assert!(first < second);
        assert_eq!(format!("{}", first), "T3");
    }

    #[test]
    fn test_measurement_id_display() {
        let id = MeasurementId::new(12, 4);
        assert_eq!(id.to_string(), "12/4");
    }

    #[test]
    fn test_measurement_id_as_hashmap_key() {
        use std::collections::HashMap;

        let mut map: HashMap<MeasurementId, &str> = HashMap::new();
        map.insert(MeasurementId::new(1, 0), "first");
        map.insert(MeasurementId::new(1, 1), "second");

        assert_eq!(map.get(&MeasurementId::new(1, 1)), Some(&"second"));
        assert_eq!(map.get(&MeasurementId::new(2, 0)), None);
    }
}
