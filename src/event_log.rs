// src/event_log.rs
//
// Shield intervention audit log (JSONL).
//
// Events are buffered in memory during the episode; the buffer is
// authoritative. `flush()` rewrites the whole file in event order, so every
// logging session starts from a truncated file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::types::{Observation, TimestampS};

/// Band name stamped on every pack.
pub const SHIELD_BAND: &str = "SafetyShield";

/// Why the Shield intervened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionReason {
    /// Sensor mismatch: final forced to the neutral action.
    StopSensorMismatch,
    /// Clipped to the hazard-tightened envelope.
    ClipNearBoundary,
    /// Clipped to the nominal envelope.
    ClipOutOfBounds,
}

impl InterventionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionReason::StopSensorMismatch => "stop_sensor_mismatch",
            InterventionReason::ClipNearBoundary => "clip_near_boundary",
            InterventionReason::ClipOutOfBounds => "clip_out_of_bounds",
        }
    }
}

/// Immutable audit record of one Shield intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPack {
    pub timestamp: TimestampS,
    pub tick: u64,
    pub band: String,
    pub obs_before: Observation,
    /// Raw proposal as received (empty when Control had not proposed yet).
    /// Non-finite components are written as `null` and read back as NaN.
    #[serde(deserialize_with = "nullable_components")]
    pub action_proposed: Vec<f64>,
    pub action_final: Vec<f64>,
    pub reason: InterventionReason,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn nullable_components<'de, D>(deserializer: D) -> std::result::Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Per-reason counts plus the first and last event of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub total: usize,
    pub by_reason: BTreeMap<InterventionReason, usize>,
    pub first: Option<EventPack>,
    pub last: Option<EventPack>,
}

#[derive(Debug, Default)]
pub struct EventLogger {
    path: Option<PathBuf>,
    events: Vec<EventPack>,
}

impl EventLogger {
    /// Buffer-only logger; `flush()` is a no-op.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Logger that persists to `path` on `flush()`.
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            events: Vec::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn log(&mut self, event: EventPack) {
        tracing::debug!(
            tick = event.tick,
            reason = event.reason.as_str(),
            "[shield] intervention"
        );
        self.events.push(event);
    }

    pub fn events(&self) -> &[EventPack] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn reason_counts(&self) -> BTreeMap<InterventionReason, usize> {
        let mut counts = BTreeMap::new();
        for ev in &self.events {
            *counts.entry(ev.reason).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary(&self) -> EventSummary {
        EventSummary {
            total: self.events.len(),
            by_reason: self.reason_counts(),
            first: self.events.first().cloned(),
            last: self.events.last().cloned(),
        }
    }

    /// Truncate the file and write every buffered event, one per line.
    ///
    /// An empty buffer still truncates, so a clean run leaves an empty log
    /// rather than a stale one.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut writer = BufWriter::new(File::create(path)?);
        for ev in &self.events {
            serde_json::to_writer(&mut writer, ev)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        tracing::info!(
            path = %path.display(),
            events = self.events.len(),
            "[event_log] flushed"
        );
        Ok(())
    }
}

/// Read a JSONL event log back into memory. Blank lines are skipped.
pub fn read_event_log(path: &Path) -> Result<Vec<EventPack>> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(tick: u64, reason: InterventionReason) -> EventPack {
        EventPack {
            timestamp: tick as f64 * 0.01,
            tick,
            band: SHIELD_BAND.to_string(),
            obs_before: Observation::new().with("x", 0.5),
            action_proposed: vec![0.2],
            action_final: vec![0.05],
            reason,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&InterventionReason::StopSensorMismatch).unwrap();
        assert_eq!(json, "\"stop_sensor_mismatch\"");
        assert_eq!(
            InterventionReason::ClipNearBoundary.as_str(),
            "clip_near_boundary"
        );
    }

    #[test]
    fn summary_tracks_first_last_and_counts() {
        let mut log = EventLogger::in_memory();
        assert_eq!(log.summary(), EventSummary::default());

        log.log(pack(3, InterventionReason::ClipOutOfBounds));
        log.log(pack(4, InterventionReason::ClipOutOfBounds));
        log.log(pack(9, InterventionReason::StopSensorMismatch));

        let s = log.summary();
        assert_eq!(s.total, 3);
        assert_eq!(s.by_reason[&InterventionReason::ClipOutOfBounds], 2);
        assert_eq!(s.by_reason[&InterventionReason::StopSensorMismatch], 1);
        assert_eq!(s.first.map(|e| e.tick), Some(3));
        assert_eq!(s.last.map(|e| e.tick), Some(9));
    }

    #[test]
    fn file_round_trip_is_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut log = EventLogger::to_file(&path);

        // Values whose shortest decimal form does not parse back naively.
        let mut ev = pack(4, InterventionReason::ClipNearBoundary);
        ev.obs_before = Observation::new().with("x", 0.1 + 0.2);
        ev.action_proposed = vec![0.7 * 0.3, f64::NAN];
        ev.action_final = vec![0.05 / 2.0, 0.0];
        log.log(ev.clone());
        log.flush().unwrap();

        let back = read_event_log(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].obs_before, ev.obs_before);
        assert_eq!(back[0].action_proposed[0].to_bits(), ev.action_proposed[0].to_bits());
        assert!(back[0].action_proposed[1].is_nan());
        assert_eq!(back[0].action_final, ev.action_final);
    }

    #[test]
    fn in_memory_flush_is_noop() {
        let mut log = EventLogger::in_memory();
        log.log(pack(0, InterventionReason::ClipOutOfBounds));
        log.flush().unwrap();
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(log.is_empty());
    }
}
