//! Foreground client facade
//!
//! [`Client`] ties discovery, the session transport and the data store
//! together. Call [`Client::update`] once per foreground tick; everything else
//! is a cheap query or a queued request that the next tick acts on.
//!
//! ```no_run
//! use rearview::{Client, ClientCallbacks, ClientConfig};
//!
//! # fn main() -> rearview::Result<()> {
//! let callbacks = ClientCallbacks::new()
//!     .on_console(|text| print!("{text}"))
//!     .on_registration_changed(|| println!("channels changed"));
//! let mut client = Client::initialize(ClientConfig::default(), callbacks)?;
//!
//! loop {
//!     client.update();
//!     for channel in client.channels() {
//!         println!("{} = {:?}", channel.name, client.series(channel.handle).and_then(|s| s.last()));
//!     }
//!     # break;
//! }
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;
use std::net::Ipv4Addr;

use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::discovery::{Discovery, ServerListing};
use crate::session::Session;
use crate::store::{DataStore, StoreEvent};
use crate::types::{Channel, ChannelType, Group, TimeSeries};
use crate::Result;

/// Receives console text and debug messages.
pub type TextCallback = Box<dyn FnMut(&str) + Send>;
/// Fired whenever the channel set is replaced or cleared.
pub type RegistrationCallback = Box<dyn FnMut() + Send>;

/// Optional hooks invoked from [`Client::update`].
#[derive(Default)]
pub struct ClientCallbacks {
    console: Option<TextCallback>,
    debug: Option<TextCallback>,
    registration_changed: Option<RegistrationCallback>,
}

impl ClientCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Console output from the emitter, verbatim.
    pub fn on_console(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.console = Some(Box::new(callback));
        self
    }

    /// Human-readable connection progress.
    pub fn on_debug(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.debug = Some(Box::new(callback));
        self
    }

    pub fn on_registration_changed(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.registration_changed = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for ClientCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCallbacks")
            .field("console", &self.console.is_some())
            .field("debug", &self.debug.is_some())
            .field("registration_changed", &self.registration_changed.is_some())
            .finish()
    }
}

/// Telemetry client for one emitter at a time.
///
/// Drive it from a single foreground thread.
#[derive(Debug)]
pub struct Client {
    callbacks: ClientCallbacks,
    session: Session,
    store: DataStore,
    discovery: Option<Discovery>,
    /// Console commands not yet accepted by the session
    outgoing: VecDeque<String>,
    auto_connect: bool,
    /// Whether the last tick saw a live session
    was_connected: bool,
}

impl Client {
    /// Validate `config` and start discovery if enabled.
    pub fn initialize(config: ClientConfig, callbacks: ClientCallbacks) -> Result<Self> {
        config.validate()?;

        let discovery =
            if config.discovery_enabled { Some(Discovery::start(&config)?) } else { None };

        info!(discovery = discovery.is_some(), "Client initialized");

        Ok(Self {
            callbacks,
            session: Session::new(&config),
            store: DataStore::new(&config),
            discovery,
            outgoing: VecDeque::new(),
            auto_connect: true,
            was_connected: false,
        })
    }

    /// Advance the client by one tick.
    ///
    /// While connected: drain inbound packets into the store, fire callbacks
    /// and hand the head of the command queue to the session. Otherwise:
    /// if the session just dropped, deliver its final batch and clear the
    /// model, then connect to the best discovered emitter when auto-connect
    /// is enabled.
    ///
    /// # Panics
    ///
    /// Panics if the emitter violates the protocol: a malformed registration,
    /// a sample for an unknown handle, or a sample of the wrong type.
    pub fn update(&mut self) {
        if self.session.is_connected() {
            self.was_connected = true;
            self.drain_inbound();
            self.flush_commands();
            return;
        }

        if self.was_connected {
            self.was_connected = false;
            self.drain_inbound();
            self.emit_debug("Lost connection to emitter");
            self.clear_model();
        }

        if !self.auto_connect {
            return;
        }

        if let Some(best) = self.discovery.as_ref().and_then(Discovery::best_server) {
            self.connect(best.address, best.port);
        }
    }

    fn drain_inbound(&mut self) {
        let packets = self.session.take_inbound();
        if packets.is_empty() {
            return;
        }

        let events = match self.store.ingest_batch(packets) {
            Ok(events) => events,
            Err(e) => panic!("Emitter protocol violation: {e}"),
        };

        for event in events {
            match event {
                StoreEvent::Registered { channels, labels } => {
                    self.emit_debug(&format!("Registered {channels} channels, {labels} labels"));
                    if let Some(callback) = &mut self.callbacks.registration_changed {
                        callback();
                    }
                }
                StoreEvent::Console(text) => {
                    if let Some(callback) = &mut self.callbacks.console {
                        callback(&text);
                    }
                }
            }
        }
    }

    fn flush_commands(&mut self) {
        while let Some(command) = self.outgoing.front() {
            if !self.session.try_send_command(command) {
                break;
            }
            debug!(%command, "Command handed to session");
            self.outgoing.pop_front();
        }
    }

    /// Connect to an emitter directly. Port 0 selects the default port.
    ///
    /// Any previous session and its data are dropped first. Queued commands
    /// are kept and go to the new emitter.
    pub fn connect(&mut self, address: Ipv4Addr, port: u16) -> bool {
        self.clear_model();
        self.emit_debug(&format!("Connecting to {address}"));

        match self.session.connect(address, port) {
            Ok(()) => {
                self.was_connected = true;
                self.emit_debug(&format!("Connected to {address}"));
                true
            }
            Err(e) => {
                self.was_connected = false;
                self.emit_debug(&format!("Couldn't connect to {address}: {e}"));
                false
            }
        }
    }

    /// Drop the session and any unsent commands, and stop auto-connecting
    /// until [`find_server`](Self::find_server).
    pub fn disconnect(&mut self) {
        self.auto_connect = false;
        self.session.disconnect();
        self.outgoing.clear();
        if self.was_connected {
            self.was_connected = false;
            self.emit_debug("Disconnected");
        }
        self.clear_model();
    }

    /// Re-enable auto-connect to the best discovered emitter.
    pub fn find_server(&mut self) {
        self.auto_connect = true;
        self.emit_debug("Searching for emitters");
    }

    pub fn has_connection(&self) -> bool {
        self.session.is_connected()
    }

    /// Queue a console command. Commands go out in order, one per tick at most.
    pub fn send_console_command(&mut self, command: impl Into<String>) {
        self.outgoing.push_back(command.into());
    }

    /// Commands queued but not yet handed to the session.
    pub fn pending_commands(&self) -> usize {
        self.outgoing.len()
    }

    /// Extrapolated emitter clock; see [`DataStore::predict_current_time`].
    pub fn predict_current_time(&self) -> f64 {
        self.store.predict_current_time()
    }

    pub fn type_of(&self, handle: u32) -> Option<ChannelType> {
        self.store.type_of(handle)
    }

    pub fn label_for(&self, handle: u32, value: i32) -> Option<Cow<'_, str>> {
        self.store.label_for(handle, value)
    }

    pub fn has_label(&self, handle: u32, value: i32) -> bool {
        self.store.has_label(handle, value)
    }

    pub fn series(&self, handle: u32) -> Option<&TimeSeries> {
        self.store.series(handle)
    }

    pub fn channels(&self) -> &[Channel] {
        self.store.channels()
    }

    pub fn groups(&self) -> &[Group] {
        self.store.groups()
    }

    pub fn status(&self) -> Option<&str> {
        self.store.status()
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Discovered emitters, freshest first. Empty when discovery is disabled.
    pub fn servers(&self) -> Vec<ServerListing> {
        self.discovery.as_ref().map(Discovery::servers).unwrap_or_default()
    }

    pub fn set_display_duration(&mut self, handle: u32, seconds: f64) -> bool {
        self.store.set_display_duration(handle, seconds)
    }

    /// Ask the emitter to stream a channel.
    pub fn activate_channel(&mut self, handle: u32) -> bool {
        self.set_channel_active(handle, true)
    }

    /// Ask the emitter to stop streaming a channel.
    pub fn deactivate_channel(&mut self, handle: u32) -> bool {
        self.set_channel_active(handle, false)
    }

    /// Activate every member of a group, in member order.
    pub fn activate_group(&mut self, name: &str) -> bool {
        self.set_group_active(name, true)
    }

    pub fn deactivate_group(&mut self, name: &str) -> bool {
        self.set_group_active(name, false)
    }

    fn set_channel_active(&mut self, handle: u32, active: bool) -> bool {
        let Some(name) = self.store.channel(handle).map(|channel| channel.name.clone()) else {
            return false;
        };

        self.store.set_active(handle, active);
        let verb = if active { "activate" } else { "deactivate" };
        self.outgoing.push_back(format!("{verb} {name}"));
        true
    }

    fn set_group_active(&mut self, name: &str, active: bool) -> bool {
        let Some(members) = self
            .store
            .schema()
            .and_then(|schema| schema.group(name))
            .map(|group| group.channels.clone())
        else {
            return false;
        };

        for handle in members {
            self.set_channel_active(handle, active);
        }
        true
    }

    /// Reset the data model, telling listeners if channels disappeared.
    fn clear_model(&mut self) {
        let had_schema = self.store.has_schema();
        self.store.reset();

        if had_schema {
            if let Some(callback) = &mut self.callbacks.registration_changed {
                callback();
            }
        }
    }

    fn emit_debug(&mut self, message: &str) {
        debug!("{message}");
        if let Some(callback) = &mut self.callbacks.debug {
            callback(message);
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.session.shutdown();
        if let Some(discovery) = self.discovery.take() {
            discovery.join();
        }
    }
}
