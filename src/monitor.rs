use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, SimError};
use crate::state_snapshot::WeightSnapshot;
use crate::types::{ConnectionId, GroupId, SpikeEvent};

/// Default period of automatic connection snapshots.
pub const DEFAULT_UPDATE_INTERVAL_SEC: i32 = 1;

/// Where a monitor keeps what it records. `File` keeps everything in memory
/// as well and additionally appends one JSON document per line to the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutput {
    Memory,
    File(PathBuf),
}

struct JsonLinesWriter {
    writer: BufWriter<File>,
}

impl JsonLinesWriter {
    fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    fn append<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn open_writer(output: &MonitorOutput) -> Result<Option<JsonLinesWriter>> {
    match output {
        MonitorOutput::Memory => Ok(None),
        MonitorOutput::File(path) => JsonLinesWriter::create(path).map(Some),
    }
}

/// Records the spikes of one group. Neuron ids in the recorded events are
/// indexes within the group.
pub struct SpikeMonitor {
    group_id: GroupId,
    nid_start: usize,
    num_neurons: usize,
    events: Vec<SpikeEvent>,
    recorded_duration_ms: usize,
    writer: Option<JsonLinesWriter>,
}

impl SpikeMonitor {
    pub(crate) fn new(
        group_id: GroupId,
        nid_start: usize,
        num_neurons: usize,
        output: &MonitorOutput,
    ) -> Result<Self> {
        Ok(Self {
            group_id,
            nid_start,
            num_neurons,
            events: Vec::new(),
            recorded_duration_ms: 0,
            writer: open_writer(output)?,
        })
    }

    /// Consumes the globally sorted spiking neuron ids of step `t`.
    pub(crate) fn record(&mut self, t: usize, spiking_nids: &[usize]) -> Result<()> {
        let nid_end = self.nid_start + self.num_neurons;
        let first = spiking_nids.partition_point(|nid| *nid < self.nid_start);

        for nid in spiking_nids[first..].iter().take_while(|nid| **nid < nid_end) {
            let event = SpikeEvent {
                nid: nid - self.nid_start,
                t,
            };

            if let Some(writer) = &mut self.writer {
                writer.append(&event)?;
            }

            self.events.push(event);
        }

        self.recorded_duration_ms += 1;
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        match &mut self.writer {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn events(&self) -> &[SpikeEvent] {
        &self.events
    }

    pub fn spike_count(&self) -> usize {
        self.events.len()
    }

    pub fn spike_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_neurons];
        for event in &self.events {
            counts[event.nid] += 1;
        }
        counts
    }

    pub fn recorded_duration_ms(&self) -> usize {
        self.recorded_duration_ms
    }

    /// Mean firing rate of every neuron in Hz over the recorded duration.
    pub fn firing_rates(&self) -> Vec<f32> {
        let duration_sec = self.recorded_duration_ms as f32 / 1000.0;

        self.spike_counts()
            .into_iter()
            .map(|count| {
                if duration_sec > 0.0 {
                    count as f32 / duration_sec
                } else {
                    0.0
                }
            })
            .collect()
    }

    pub fn population_rate(&self) -> f32 {
        let rates = self.firing_rates();
        rates.iter().sum::<f32>() / rates.len() as f32
    }

    /// Forgets the recorded events. File output already written is kept.
    pub fn clear(&mut self) {
        self.events.clear();
        self.recorded_duration_ms = 0;
    }
}

/// Tracks the weights of one connection through manual and periodic snapshots.
pub struct ConnectionMonitor {
    connection_id: ConnectionId,
    from: GroupId,
    to: GroupId,
    num_pre: usize,
    num_post: usize,
    update_interval_sec: i32,
    snapshots: Vec<WeightSnapshot>,
    writer: Option<JsonLinesWriter>,
}

impl ConnectionMonitor {
    pub(crate) fn new(
        connection_id: ConnectionId,
        (from, to): (GroupId, GroupId),
        (num_pre, num_post): (usize, usize),
        output: &MonitorOutput,
    ) -> Result<Self> {
        Ok(Self {
            connection_id,
            from,
            to,
            num_pre,
            num_post,
            update_interval_sec: DEFAULT_UPDATE_INTERVAL_SEC,
            snapshots: Vec::new(),
            writer: open_writer(output)?,
        })
    }

    pub(crate) fn record(&mut self, snapshot: WeightSnapshot) -> Result<&WeightSnapshot> {
        if let Some(writer) = &mut self.writer {
            writer.append(&snapshot)?;
        }

        self.snapshots.push(snapshot);
        Ok(&self.snapshots[self.snapshots.len() - 1])
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        match &mut self.writer {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    pub(crate) fn set_update_interval_sec(&mut self, interval_sec: i32) -> Result<()> {
        if interval_sec == 0 {
            return Err(SimError::config("update interval must not be zero"));
        }

        self.update_interval_sec = interval_sec;
        Ok(())
    }

    /// Whether a periodic snapshot is due once the clock reads `t_ms`.
    pub(crate) fn is_snapshot_due(&self, t_ms: usize) -> bool {
        self.update_interval_sec > 0 && t_ms % (self.update_interval_sec as usize * 1000) == 0
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn groups(&self) -> (GroupId, GroupId) {
        (self.from, self.to)
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.num_pre, self.num_post)
    }

    pub fn update_interval_sec(&self) -> i32 {
        self.update_interval_sec
    }

    pub fn snapshots(&self) -> &[WeightSnapshot] {
        &self.snapshots
    }

    pub fn last_snapshot(&self) -> Option<&WeightSnapshot> {
        self.snapshots.last()
    }

    pub fn last_matrix(&self) -> Option<Vec<Vec<f32>>> {
        self.last_snapshot()
            .map(|snapshot| snapshot.to_matrix(self.num_pre, self.num_post))
    }

    /// Sum of absolute weight changes between the first and the last snapshot.
    pub fn total_abs_weight_change(&self) -> f32 {
        match (self.snapshots.first(), self.snapshots.last()) {
            (Some(first), Some(last)) => last.abs_weight_change_since(first),
            _ => 0.0,
        }
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut values = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        values.push(serde_json::from_str(&line)?);
    }

    Ok(values)
}

/// Reads the events written by a spike monitor with file output.
pub fn read_spike_log(path: impl AsRef<Path>) -> Result<Vec<SpikeEvent>> {
    read_json_lines(path.as_ref())
}

/// Reads the snapshots written by a connection monitor with file output.
pub fn read_snapshot_log(path: impl AsRef<Path>) -> Result<Vec<WeightSnapshot>> {
    read_json_lines(path.as_ref())
}
