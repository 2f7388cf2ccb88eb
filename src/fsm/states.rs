//! Concrete state handlers and the table builder.
//!
//! ```text
//!  STOPPED ──[service start]──▶ AWAITING_AUTHORIZATION ◀──[disconnect / grant expired]──┐
//!                                   │                                                   │
//!                    [connect, no authorizer | authorize()]                             │
//!                                   ▼                                                   │
//!                               AUTHORIZED ─────────────────────────────────────────────┘
//!                                ▲      │
//!                   [timeout]    │   [WIFI_SETTINGS]
//!                                │      ▼
//!                               PROVISIONING ──[link up + address]──▶ PROVISIONED
//!
//!  Any state ──[service stop]──▶ STOPPED
//! ```
//!
//! Event-driven edges are taken by `ImprovService` via `force_transition`;
//! the handlers here own the time-driven ones.

use log::{info, warn};

use super::context::SessionContext;
use super::{ProvisioningState, StateDescriptor};
use crate::improv::ImprovError;
use crate::improv::codec::encode_wifi_connected;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; ProvisioningState::COUNT] {
    [
        // Index 0 — Stopped
        StateDescriptor {
            id: ProvisioningState::Stopped,
            name: "Stopped",
            on_enter: Some(stopped_enter),
            on_exit: None,
            on_update: stopped_update,
        },
        // Index 1 — AwaitingAuthorization
        StateDescriptor {
            id: ProvisioningState::AwaitingAuthorization,
            name: "AwaitingAuthorization",
            on_enter: Some(awaiting_enter),
            on_exit: None,
            on_update: awaiting_update,
        },
        // Index 2 — Authorized
        StateDescriptor {
            id: ProvisioningState::Authorized,
            name: "Authorized",
            on_enter: Some(authorized_enter),
            on_exit: None,
            on_update: authorized_update,
        },
        // Index 3 — Provisioning
        StateDescriptor {
            id: ProvisioningState::Provisioning,
            name: "Provisioning",
            on_enter: Some(provisioning_enter),
            on_exit: None,
            on_update: provisioning_update,
        },
        // Index 4 — Provisioned
        StateDescriptor {
            id: ProvisioningState::Provisioned,
            name: "Provisioned",
            on_enter: Some(provisioned_enter),
            on_exit: None,
            on_update: provisioned_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  STOPPED
// ═══════════════════════════════════════════════════════════════════════════

fn stopped_enter(ctx: &mut SessionContext) {
    ctx.authorized_since = None;
}

fn stopped_update(_ctx: &mut SessionContext) -> Option<ProvisioningState> {
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAITING_AUTHORIZATION — waiting for connect or an external grant
// ═══════════════════════════════════════════════════════════════════════════

fn awaiting_enter(ctx: &mut SessionContext) {
    ctx.authorized_since = None;
}

fn awaiting_update(_ctx: &mut SessionContext) -> Option<ProvisioningState> {
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  AUTHORIZED — a leased grant to submit credentials
// ═══════════════════════════════════════════════════════════════════════════

fn authorized_enter(ctx: &mut SessionContext) {
    ctx.authorized_since = Some(ctx.now_ms);
    info!(
        "AUTHORIZED: grant valid for {} ms",
        ctx.config.authorized_duration_ms
    );
}

fn authorized_update(ctx: &mut SessionContext) -> Option<ProvisioningState> {
    if ctx.grant_expired() {
        info!("AUTHORIZED: grant expired");
        return Some(ProvisioningState::AwaitingAuthorization);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  PROVISIONING — WiFi attempt in flight
// ═══════════════════════════════════════════════════════════════════════════

fn provisioning_enter(ctx: &mut SessionContext) {
    if let Some(attempt) = &ctx.attempt {
        info!(
            "PROVISIONING: connecting to '{}' (timeout {} ms)",
            attempt.ssid, ctx.config.wifi_timeout_ms
        );
    }
}

fn provisioning_update(ctx: &mut SessionContext) -> Option<ProvisioningState> {
    if ctx.attempt.is_none() {
        warn!("PROVISIONING: no attempt outstanding");
        return Some(ProvisioningState::Authorized);
    }

    // Success wins over a timeout observed on the same tick.
    if let Some(ip) = ctx.wifi.address() {
        info!("PROVISIONING: WiFi connected, address {}", ip);
        ctx.attempt = None;
        match encode_wifi_connected(ip) {
            Ok(frame) => ctx.outbox = Some(frame),
            Err(e) => warn!("PROVISIONING: could not encode redirect URL: {}", e),
        }
        return Some(ProvisioningState::Provisioned);
    }

    if ctx.attempt_timed_out() {
        warn!("PROVISIONING: WiFi connection timeout");
        ctx.attempt = None;
        ctx.error = ImprovError::UnableToConnect;
        return Some(ProvisioningState::Authorized);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  PROVISIONED
// ═══════════════════════════════════════════════════════════════════════════

fn provisioned_enter(ctx: &mut SessionContext) {
    ctx.authorized_since = None;
}

fn provisioned_update(_ctx: &mut SessionContext) -> Option<ProvisioningState> {
    None
}
