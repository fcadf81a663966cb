//! Per-frame JSON Lines log for offline replay.
//!
//! Each line is one [`FrameRecord`]: the camera pose, the raw detections and
//! the measurements localized from them. Feeding the measurements back to
//! [`TrackManager::update`] in file order rebuilds the same tracks.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::FusionConfig;
use crate::geometry::{CameraPose, GeometryError, Localizer};
use crate::target::{Detection2D, Measurement3D, MeasurementId};
use crate::tracking::TrackManager;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_id: u64,
    pub timestamp_ns: u64,
    pub pose: CameraPose,
    #[serde(default)]
    pub detections: Vec<Detection2D>,
    #[serde(default)]
    pub measurements: Vec<Measurement3D>,
}

impl FrameRecord {
    /// Localize `detections` and keep both them and the resulting measurements.
    ///
    /// Also returns the detections that could not be localized.
    pub fn localize(
        frame_id: u64,
        timestamp_ns: u64,
        pose: CameraPose,
        detections: Vec<Detection2D>,
        localizer: &Localizer,
    ) -> (Self, Vec<(MeasurementId, GeometryError)>) {
        let frame = localizer.localize_frame(&pose, &detections, timestamp_ns);
        let record = Self {
            frame_id,
            timestamp_ns,
            pose,
            detections,
            measurements: frame.measurements,
        };
        (record, frame.failures)
    }
}

/// Appends [`FrameRecord`]s, one JSON object per line.
pub struct FrameLogWriter<W: Write> {
    writer: W,
    written: usize,
}

impl FrameLogWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create frame log {}", path.display()))?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }
}

impl<W: Write> FrameLogWriter<W> {
    pub fn from_writer(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn append(&mut self, record: &FrameRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)
            .with_context(|| format!("Failed to serialize frame {}", record.frame_id))?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush frame log")
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.writer)
    }
}

pub fn read_frame_log<P: AsRef<Path>>(path: P) -> Result<Vec<FrameRecord>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open frame log {}", path.display()))?;
    parse_frame_log(BufReader::new(file))
        .with_context(|| format!("Failed to read frame log {}", path.display()))
}

/// Parse JSON Lines from any reader. Blank lines are skipped.
pub fn parse_frame_log<R: BufRead>(reader: R) -> Result<Vec<FrameRecord>> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FrameRecord = serde_json::from_str(&line)
            .with_context(|| format!("Invalid frame record on line {}", line_no + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Rebuild the static track set by applying every record's measurements in order.
pub fn replay(records: &[FrameRecord], config: FusionConfig) -> TrackManager {
    let mut manager = TrackManager::new(config);
    let mut incorporated = 0;
    for record in records {
        let report = manager.update(&record.measurements);
        debug!(
            "Replayed frame {} ({} measurements)",
            record.frame_id,
            record.measurements.len()
        );
        incorporated += report.incorporated();
    }
    info!(
        "Replayed {} frames, {} measurements into {} tracks",
        records.len(),
        incorporated,
        manager.len()
    );
    manager
}
