use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Writer, WriterBuilder};
use nalgebra::Vector3;

use crate::geometry::{CameraPose, TimedPose};

/// Header line; `#` makes readers treat it as a comment.
const HEADER: [&str; 8] = ["#timestamp_ns", "x", "y", "z", "qw", "qx", "qy", "qz"];

/// Writes `timestamp_ns,x,y,z,qw,qx,qy,qz` rows, quaternion w-first.
pub struct PoseLogWriter<W: Write> {
    writer: Writer<W>,
}

impl PoseLogWriter<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create pose log {}", path.display()))?;
        Self::from_writer(file)
    }
}

impl<W: Write> PoseLogWriter<W> {
    pub fn from_writer(inner: W) -> Result<Self> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(inner);
        writer.write_record(HEADER)?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, sample: &TimedPose) -> Result<()> {
        let p = &sample.pose.position;
        let q = sample.pose.rotation.quaternion();
        self.writer.write_record(&[
            sample.timestamp_ns.to_string(),
            p.x.to_string(),
            p.y.to_string(),
            p.z.to_string(),
            q.w.to_string(),
            q.i.to_string(),
            q.j.to_string(),
            q.k.to_string(),
        ])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush pose log")
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to finish pose log: {}", e.error()))
    }
}

pub fn read_pose_log<P: AsRef<Path>>(path: P) -> Result<Vec<TimedPose>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open pose log {}", path.display()))?;
    parse_pose_log(file)
}

pub fn parse_pose_log<R: Read>(reader: R) -> Result<Vec<TimedPose>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        if rec.len() < 8 {
            continue;
        }
        let timestamp_ns: u64 = rec[0].trim().parse()?;
        let position = Vector3::new(
            rec[1].trim().parse()?,
            rec[2].trim().parse()?,
            rec[3].trim().parse()?,
        );

        // w-first, normalized on construction
        let qw: f64 = rec[4].trim().parse()?;
        let qx: f64 = rec[5].trim().parse()?;
        let qy: f64 = rec[6].trim().parse()?;
        let qz: f64 = rec[7].trim().parse()?;

        entries.push(TimedPose {
            timestamp_ns,
            pose: CameraPose::from_quaternion(qw, qx, qy, qz, position),
        });
    }
    Ok(entries)
}
