//! Channel registry and time-series store
//!
//! [`DataStore`] turns the ordered packet stream of one session into a
//! queryable model. A registration packet opens a new epoch and replaces the
//! schema together with every stored sample; data packets append to their
//! channel's series; an aging pass bounds each series to roughly one display
//! window.

use std::borrow::Cow;
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::config::ClientConfig;
use crate::protocol::{Data, Packet};
use crate::types::{Channel, ChannelSchema, ChannelType, Group, TimeSeries};
use crate::{Result, TelemetryError};

/// Notable outcomes of ingesting packets.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A new schema was installed
    Registered { channels: usize, labels: usize },
    /// Console text from the emitter, verbatim
    Console(String),
}

/// Channel registry plus per-channel sample storage.
#[derive(Debug)]
pub struct DataStore {
    schema: Option<ChannelSchema>,
    /// One series per channel, indexed by handle
    series: Vec<TimeSeries>,
    /// Packets received before any schema existed
    pending: Vec<Packet>,
    status: Option<String>,
    latest_time: Option<f64>,
    latest_received: Option<Instant>,
    next_clear: f64,
    default_display_duration: f64,
    aging_slack: f64,
    aging_interval: f64,
}

impl DataStore {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            schema: None,
            series: Vec::new(),
            pending: Vec::new(),
            status: None,
            latest_time: None,
            latest_received: None,
            next_clear: f64::NEG_INFINITY,
            default_display_duration: config.default_display_duration,
            aging_slack: config.aging_slack,
            aging_interval: config.aging_interval,
        }
    }

    /// Apply one packet.
    ///
    /// Errors are protocol violations: a malformed registration, a sample for
    /// an unknown handle, or a sample whose type doesn't match its channel.
    pub fn ingest(&mut self, packet: Packet) -> Result<Vec<StoreEvent>> {
        let mut events = Vec::new();
        self.ingest_into(packet, &mut events)?;
        Ok(events)
    }

    /// Apply a drained batch in order, then run an aging pass.
    pub fn ingest_batch<I>(&mut self, packets: I) -> Result<Vec<StoreEvent>>
    where
        I: IntoIterator<Item = Packet>,
    {
        let mut events = Vec::new();
        for packet in packets {
            self.ingest_into(packet, &mut events)?;
        }
        self.maintain();
        Ok(events)
    }

    fn ingest_into(&mut self, packet: Packet, events: &mut Vec<StoreEvent>) -> Result<()> {
        if packet.is_registration() {
            self.install(&packet, events)?;
        } else if self.schema.is_none() {
            trace!(held = self.pending.len() + 1, "No schema yet, holding packet");
            self.pending.push(packet);
            return Ok(());
        }

        self.apply(packet, events)
    }

    fn install(&mut self, packet: &Packet, events: &mut Vec<StoreEvent>) -> Result<()> {
        let schema = ChannelSchema::from_registration(packet, self.default_display_duration)?;

        // Packets held before the first schema belong to this emitter's handshake.
        let held = if self.schema.is_none() { std::mem::take(&mut self.pending) } else { Vec::new() };
        self.reset();

        let channels = schema.channel_count();
        let labels = schema.label_count();
        info!(channels, labels, groups = schema.groups.len(), "Installed registrations");

        self.series = schema.channels.iter().map(|channel| TimeSeries::new(channel.data_type)).collect();
        self.schema = Some(schema);
        events.push(StoreEvent::Registered { channels, labels });

        if !held.is_empty() {
            debug!(count = held.len(), "Replaying packets received before registration");
        }
        for packet in held {
            self.apply(packet, events)?;
        }

        Ok(())
    }

    fn apply(&mut self, packet: Packet, events: &mut Vec<StoreEvent>) -> Result<()> {
        if let Some(data) = packet.data {
            self.stash(data)?;
        }

        if let Some(text) = packet.console_output {
            events.push(StoreEvent::Console(text));
        }

        if let Some(status) = packet.status {
            self.status = Some(status);
        }

        Ok(())
    }

    fn stash(&mut self, data: Data) -> Result<()> {
        let channel = self.channel(data.handle).ok_or_else(|| {
            TelemetryError::protocol_violation(format!("Sample for unknown handle {}", data.handle))
        })?;
        let declared = channel.data_type;

        if data.value.channel_type() != declared {
            return Err(TelemetryError::protocol_violation(format!(
                "Sample of type {} for {} channel '{}' (handle {})",
                data.value.channel_type(),
                declared,
                channel.name,
                data.handle
            )));
        }

        let series = self.series.get_mut(data.handle as usize).ok_or_else(|| {
            TelemetryError::protocol_violation(format!("No series for handle {}", data.handle))
        })?;

        // The emitter skipped repeats of the previous value since maintain_time.
        if let (Some(maintain_time), Some(previous)) = (data.maintain_time, series.last()) {
            if maintain_time > previous.time {
                series.push(maintain_time, previous.value)?;
            }
        }

        series.push(data.time, data.value)?;

        if self.latest_time.is_none_or(|latest| data.time > latest) {
            self.latest_time = Some(data.time);
            self.latest_received = Some(Instant::now());
        }

        Ok(())
    }

    /// Age out samples older than each channel's display window.
    ///
    /// Runs only once the newest timestamp passes the rolling threshold, then
    /// moves the threshold `aging_interval` seconds ahead.
    pub fn maintain(&mut self) {
        let (Some(newest), Some(schema)) = (self.latest_time, self.schema.as_ref()) else {
            return;
        };

        if newest < self.next_clear {
            return;
        }

        let mut dropped = 0;
        for (channel, series) in schema.channels.iter().zip(self.series.iter_mut()) {
            let cutoff = newest - channel.display_duration - self.aging_slack;
            dropped += series.drop_older_than(cutoff);
        }

        self.next_clear = newest + self.aging_interval;
        debug!(dropped, newest, next_clear = self.next_clear, "Aged out samples");
    }

    /// Extrapolate the emitter's current clock.
    ///
    /// Adds the local time elapsed since the newest sample arrived to that
    /// sample's timestamp. Returns 0.0 before the first sample.
    pub fn predict_current_time(&self) -> f64 {
        match (self.latest_time, self.latest_received) {
            (Some(time), Some(received)) => time + received.elapsed().as_secs_f64(),
            _ => 0.0,
        }
    }

    /// Newest sample timestamp seen in this epoch.
    pub fn latest_time(&self) -> Option<f64> {
        self.latest_time
    }

    /// Drop the schema, all samples, held packets and status.
    pub fn reset(&mut self) {
        self.schema = None;
        self.series.clear();
        self.pending.clear();
        self.status = None;
        self.latest_time = None;
        self.latest_received = None;
        self.next_clear = f64::NEG_INFINITY;
    }

    pub fn has_schema(&self) -> bool {
        self.schema.is_some()
    }

    pub fn schema(&self) -> Option<&ChannelSchema> {
        self.schema.as_ref()
    }

    /// Number of packets held while waiting for a registration.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn channel(&self, handle: u32) -> Option<&Channel> {
        self.schema.as_ref().and_then(|schema| schema.channel(handle))
    }

    pub fn channels(&self) -> &[Channel] {
        self.schema.as_ref().map(|schema| schema.channels.as_slice()).unwrap_or_default()
    }

    pub fn groups(&self) -> &[Group] {
        self.schema.as_ref().map(|schema| schema.groups.as_slice()).unwrap_or_default()
    }

    pub fn type_of(&self, handle: u32) -> Option<ChannelType> {
        self.channel(handle).map(|channel| channel.data_type)
    }

    pub fn label_for(&self, handle: u32, value: i32) -> Option<Cow<'_, str>> {
        self.channel(handle).map(|channel| channel.label_for(value))
    }

    pub fn has_label(&self, handle: u32, value: i32) -> bool {
        self.channel(handle).is_some_and(|channel| channel.has_label(value))
    }

    pub fn series(&self, handle: u32) -> Option<&TimeSeries> {
        self.series.get(handle as usize)
    }

    /// Last status text from the emitter.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Change how much history a channel keeps. Returns false for unknown handles.
    pub fn set_display_duration(&mut self, handle: u32, seconds: f64) -> bool {
        match self.schema.as_mut().and_then(|schema| schema.channel_mut(handle)) {
            Some(channel) if seconds.is_finite() && seconds > 0.0 => {
                channel.display_duration = seconds;
                true
            }
            _ => false,
        }
    }

    /// Record whether a channel is being streamed. Returns false for unknown handles.
    pub fn set_active(&mut self, handle: u32, active: bool) -> bool {
        match self.schema.as_mut().and_then(|schema| schema.channel_mut(handle)) {
            Some(channel) => {
                channel.active = active;
                true
            }
            None => false,
        }
    }
}
