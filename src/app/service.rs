//! Improv provisioning service — the owning component of one BLE session.
//!
//! [`ImprovService`] owns the FSM and its session context.  Host events
//! (connect, disconnect, characteristic writes) arrive as method calls,
//! the main loop drives [`ImprovService::on_tick`], and every call ends by
//! publishing what changed through the [`BleHostPort`].
//!
//! ```text
//!  HostEvent ──▶ ┌──────────────────────────┐ ──▶ BleHostPort (status/result notify)
//!                │      ImprovService       │
//!  tick ───────▶ │  FSM · grant · identify  │ ──▶ ConnectivityPort / IndicatorPort
//!                └──────────────────────────┘
//! ```
//!
//! The error characteristic is updated in the adapter's value cache but is
//! never notified; clients poll it after an interaction.

use log::{debug, info, warn};

use crate::app::ports::{BleHostPort, ConnHandle, ConnectivityPort, IndicatorPort};
use crate::config::{DeviceInfo, ImprovConfig};
use crate::error::ProtocolError;
use crate::fsm::context::{SessionContext, WifiAttempt, WifiSnapshot};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, ProvisioningState};
use crate::improv::codec::{self, Command, ResponseFrame, WifiCredentials};
use crate::improv::{CAPABILITIES, Characteristic, ImprovError};

// ───────────────────────────────────────────────────────────────
// ImprovService
// ───────────────────────────────────────────────────────────────

pub struct ImprovService {
    fsm: Fsm,
    ctx: SessionContext,
    device: DeviceInfo,
    /// Indicator switch-off deadline while an identify pulse runs.
    identify_until: Option<u64>,
    /// Served for reads of the rpc-result characteristic.
    last_result: ResponseFrame,
    published_state: ProvisioningState,
    published_error: ImprovError,
}

impl ImprovService {
    /// Build the service in `Stopped`.  Nothing is advertised until [`start`].
    ///
    /// [`start`]: Self::start
    pub fn new(config: ImprovConfig, device: DeviceInfo) -> Self {
        let mut ctx = SessionContext::new(config);
        let mut fsm = Fsm::new(build_state_table(), ProvisioningState::Stopped);
        fsm.start(&mut ctx);
        Self {
            fsm,
            ctx,
            device,
            identify_until: None,
            last_result: ResponseFrame::new(),
            published_state: ProvisioningState::Stopped,
            published_error: ImprovError::None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Begin advertising and wait for a client.
    pub fn start(&mut self, now_ms: u64, ble: &mut impl BleHostPort) {
        self.ctx.now_ms = now_ms;
        if let Err(e) = ble.start_advertising() {
            warn!("Improv: advertising start failed: {}", e);
        }
        self.fsm
            .force_transition(ProvisioningState::AwaitingAuthorization, &mut self.ctx);
        self.publish_changes(ble);
    }

    /// Stop advertising and shut the service down.
    pub fn stop(&mut self, now_ms: u64, ble: &mut impl BleHostPort) {
        self.ctx.now_ms = now_ms;
        if let Err(e) = ble.stop_advertising() {
            warn!("Improv: advertising stop failed: {}", e);
        }
        self.fsm.force_transition(ProvisioningState::Stopped, &mut self.ctx);
        self.publish_changes(ble);
    }

    /// Restart advertising after the host dropped it.  No-op when stopped.
    pub fn resume_advertising(&mut self, ble: &mut impl BleHostPort) {
        if self.state() == ProvisioningState::Stopped {
            return;
        }
        if let Err(e) = ble.start_advertising() {
            warn!("Improv: advertising restart failed: {}", e);
        }
    }

    // ── Host events ───────────────────────────────────────────

    pub fn on_connect(&mut self, conn: ConnHandle, now_ms: u64, ble: &mut impl BleHostPort) {
        self.ctx.now_ms = now_ms;
        if self.state() == ProvisioningState::Stopped {
            debug!("Improv: ignoring connection {} while stopped", conn.0);
            return;
        }
        info!("Improv: client connected (handle {})", conn.0);
        self.ctx.connection = Some(conn);
        self.ctx.error = ImprovError::None;

        if self.ctx.config.require_authorization {
            self.fsm
                .force_transition(ProvisioningState::AwaitingAuthorization, &mut self.ctx);
        } else if self.state() == ProvisioningState::Authorized {
            // Fresh grant for the new client.
            self.ctx.authorized_since = Some(now_ms);
        } else {
            self.fsm.force_transition(ProvisioningState::Authorized, &mut self.ctx);
        }
        self.publish_changes(ble);
    }

    /// Clears the connection and authorization.  Any WiFi attempt keeps
    /// running; [`on_tick`](Self::on_tick) resolves it.
    pub fn on_disconnect(&mut self, conn: ConnHandle, reason: i32, now_ms: u64, ble: &mut impl BleHostPort) {
        self.ctx.now_ms = now_ms;
        if self.ctx.connection != Some(conn) {
            debug!("Improv: disconnect for unknown handle {}", conn.0);
        }
        info!("Improv: client disconnected (reason {})", reason);
        self.ctx.connection = None;
        if self.state() == ProvisioningState::Stopped {
            return;
        }
        self.fsm
            .force_transition(ProvisioningState::AwaitingAuthorization, &mut self.ctx);
        self.publish_changes(ble);
        self.resume_advertising(ble);
    }

    /// External authorization signal (e.g. a button press).
    ///
    /// Returns whether a grant was issued: only a connected session that is
    /// awaiting authorization can be authorized.
    pub fn authorize(&mut self, now_ms: u64, ble: &mut impl BleHostPort) -> bool {
        self.ctx.now_ms = now_ms;
        if self.state() != ProvisioningState::AwaitingAuthorization || !self.ctx.is_connected() {
            debug!("Improv: authorization ignored in {:?}", self.state());
            return false;
        }
        self.fsm.force_transition(ProvisioningState::Authorized, &mut self.ctx);
        self.publish_changes(ble);
        true
    }

    /// Handle a write to the rpc-command characteristic.
    pub fn on_characteristic_write(
        &mut self,
        data: &[u8],
        now_ms: u64,
        ble: &mut impl BleHostPort,
        wifi: &mut impl ConnectivityPort,
        indicator: &mut impl IndicatorPort,
    ) {
        self.ctx.now_ms = now_ms;
        if self.state() == ProvisioningState::Stopped {
            debug!("Improv: ignoring {}-byte write while stopped", data.len());
            return;
        }
        match codec::decode_command(data) {
            Ok(command) => self.dispatch(command, wifi, indicator),
            Err(e) => {
                warn!("Improv: rejected RPC frame ({} bytes): {}", data.len(), e);
                self.ctx.error = ProtocolError::from(e).code();
            }
        }
        self.publish_changes(ble);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Expire the identify pulse, sample WiFi, run the FSM, publish.
    pub fn on_tick(
        &mut self,
        now_ms: u64,
        ble: &mut impl BleHostPort,
        wifi: &mut impl ConnectivityPort,
        indicator: &mut impl IndicatorPort,
    ) {
        self.ctx.now_ms = now_ms;

        if self.identify_until.is_some_and(|until| now_ms >= until) {
            indicator.set_indicator(false);
            self.identify_until = None;
        }

        if self.ctx.attempt.is_some() {
            wifi.poll();
            self.ctx.wifi = WifiSnapshot::read(wifi);
            if self.state() != ProvisioningState::Provisioning {
                self.track_detached_attempt();
            }
        }

        self.fsm.tick(&mut self.ctx);
        self.publish_changes(ble);
    }

    // ── Reads ─────────────────────────────────────────────────

    /// Current value of a readable characteristic.
    pub fn read_characteristic(&self, characteristic: Characteristic) -> ResponseFrame {
        let byte = match characteristic {
            Characteristic::Status => self.state().as_byte(),
            Characteristic::Error => self.error().as_byte(),
            Characteristic::Capabilities => CAPABILITIES,
            Characteristic::RpcResult => return self.last_result.clone(),
            Characteristic::RpcCommand => return ResponseFrame::new(),
        };
        ResponseFrame::from_slice(&[byte]).unwrap_or_default()
    }

    pub fn state(&self) -> ProvisioningState {
        self.fsm.current_state()
    }

    pub fn error(&self) -> ImprovError {
        self.ctx.error
    }

    pub fn connection(&self) -> Option<ConnHandle> {
        self.ctx.connection
    }

    pub fn pending_attempt(&self) -> Option<&WifiAttempt> {
        self.ctx.attempt.as_ref()
    }

    pub fn is_identifying(&self) -> bool {
        self.identify_until.is_some()
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device
    }

    // ── Internal ──────────────────────────────────────────────

    fn dispatch(
        &mut self,
        command: Command,
        wifi: &mut impl ConnectivityPort,
        indicator: &mut impl IndicatorPort,
    ) {
        match command {
            Command::WifiSettings(creds) => self.begin_wifi_attempt(creds, wifi),
            Command::Identify => {
                info!("Improv: identify");
                indicator.set_indicator(true);
                self.identify_until =
                    Some(self.ctx.now_ms + u64::from(self.ctx.config.identify_duration_ms));
            }
            Command::GetDeviceInfo => match codec::encode_device_info(&self.device) {
                Ok(frame) => self.ctx.outbox = Some(frame),
                Err(e) => {
                    warn!("Improv: device info does not fit a response: {}", e);
                    self.ctx.error = ProtocolError::Unknown.code();
                }
            },
            Command::GetWifiNetworks => {
                info!("Improv: GET_WIFI_NETWORKS has no response format, ignoring");
            }
        }
    }

    fn begin_wifi_attempt(&mut self, creds: WifiCredentials, wifi: &mut impl ConnectivityPort) {
        if self.state() != ProvisioningState::Authorized {
            warn!("Improv: WiFi settings rejected in {:?}", self.state());
            self.ctx.error = ProtocolError::NotAuthorized.code();
            return;
        }

        info!("Improv: received WiFi credentials for SSID '{}'", creds.ssid);
        if let Err(e) = wifi.start_connecting(&creds.ssid, &creds.password) {
            warn!("Improv: WiFi attempt not started: {}", e);
            self.ctx.error = ProtocolError::UnableToConnect.code();
            return;
        }

        self.ctx.attempt = Some(WifiAttempt {
            ssid: creds.ssid,
            password: creds.password,
            started_at: self.ctx.now_ms,
        });
        self.ctx.wifi = WifiSnapshot::default();
        self.fsm.force_transition(ProvisioningState::Provisioning, &mut self.ctx);
    }

    /// Resolve an attempt whose session left `Provisioning` on disconnect.
    fn track_detached_attempt(&mut self) {
        if let Some(ip) = self.ctx.wifi.address() {
            info!("Improv: WiFi connected after disconnect, address {}", ip);
            self.ctx.attempt = None;
            if let Ok(frame) = codec::encode_wifi_connected(ip) {
                self.ctx.outbox = Some(frame);
            }
            self.fsm.force_transition(ProvisioningState::Provisioned, &mut self.ctx);
        } else if self.ctx.attempt_timed_out() {
            warn!("Improv: detached WiFi attempt timed out");
            self.ctx.attempt = None;
            self.ctx.error = ImprovError::UnableToConnect;
        }
    }

    /// Push state, error and any pending response to the BLE host.
    fn publish_changes(&mut self, ble: &mut impl BleHostPort) {
        let state = self.state();
        if state != self.published_state {
            self.published_state = state;
            let value = [state.as_byte()];
            if let Err(e) = ble.set_value(Characteristic::Status, &value) {
                warn!("Improv: status cache update failed: {}", e);
            }
            if let Some(conn) = self.ctx.connection {
                if let Err(e) = ble.notify(conn, Characteristic::Status, &value) {
                    warn!("Improv: status notify failed: {}", e);
                }
            }
        }

        let error = self.ctx.error;
        if error != self.published_error {
            self.published_error = error;
            debug!("Improv: error set to {:?}", error);
            if let Err(e) = ble.set_value(Characteristic::Error, &[error.as_byte()]) {
                warn!("Improv: error cache update failed: {}", e);
            }
        }

        if let Some(frame) = self.ctx.outbox.take() {
            if let Err(e) = ble.set_value(Characteristic::RpcResult, &frame) {
                warn!("Improv: result cache update failed: {}", e);
            }
            match self.ctx.connection {
                Some(conn) => match ble.notify(conn, Characteristic::RpcResult, &frame) {
                    Ok(()) => debug!("Improv: sent response ({} bytes)", frame.len()),
                    Err(e) => warn!("Improv: response notify failed: {}", e),
                },
                None => warn!("Improv: no active connection to send response"),
            }
            self.last_result = frame;
        }
    }
}
