//! Base risk rules
//!
//! Four additive fingerprint rules score a transaction before any graph
//! effects. The edge-existence rules must see the graph as it stood before
//! the event's own upserts, so the engine captures an [`EdgeSnapshot`] first
//! and the evaluator works only from that snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use riskmesh_common::{saturate, EntityKey};
use riskmesh_config::EngineConfig;

use crate::graph::GraphStore;
use crate::models::EventRequest;

/// Pre-event edge membership needed by the fingerprint rules, captured
/// atomically under the graph lock before the event's upserts.
#[derive(Debug, Clone, Copy)]
pub struct EdgeSnapshot {
    /// `user_<U> -> device_<D>` existed.
    pub user_device: bool,
    /// `user_<U> -> ip_<I>` existed.
    pub user_ip: bool,
    /// `card_<D> -> merchant_<M>` existed (card key aliased to device key).
    pub card_merchant: bool,
    /// The focal user's `last_seen` before this event touched it.
    pub user_last_seen: Option<DateTime<Utc>>,
}

impl EdgeSnapshot {
    pub fn capture(store: &GraphStore, event: &EventRequest) -> Self {
        let user = EntityKey::user(&event.user_id);
        let device = EntityKey::device(&event.device_id);
        let ip = EntityKey::ip(&event.ip_address);
        let merchant = EntityKey::merchant(&event.merchant_id);
        let card = EntityKey::card(&event.device_id);

        Self {
            user_device: store.has_edge(&user, &device),
            user_ip: store.has_edge(&user, &ip),
            card_merchant: store.has_edge(&card, &merchant),
            user_last_seen: store.get_node(&user).map(|n| n.last_seen),
        }
    }
}

/// The base-risk rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    HighAmount,
    NewDevice,
    NewIp,
    NewMerchant,
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::HighAmount => "high_amount",
            RuleKind::NewDevice => "new_device",
            RuleKind::NewIp => "new_ip",
            RuleKind::NewMerchant => "new_merchant",
        }
    }

    /// Human-readable description of the firing, for explanations.
    pub fn describe(&self, event: &EventRequest) -> String {
        match self {
            RuleKind::HighAmount => format!(
                "Transaction amount ${:.2} exceeds the high-amount threshold",
                event.transaction_amount
            ),
            RuleKind::NewDevice => format!(
                "Device '{}' not seen before for this user",
                event.device_id
            ),
            RuleKind::NewIp => format!(
                "IP '{}' not seen before for this user",
                event.ip_address
            ),
            RuleKind::NewMerchant => format!(
                "Merchant '{}' not previously used by this card",
                event.merchant_id
            ),
        }
    }
}

/// One fired rule and its posted contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleContribution {
    pub rule: RuleKind,
    pub contribution: f64,
}

/// Result of base-risk evaluation.
#[derive(Debug, Clone, Default)]
pub struct BaseRisk {
    /// Saturated sum of fired contributions.
    pub score: f64,
    /// Every non-zero contribution, in rule order.
    pub attribution: Vec<RuleContribution>,
}

const HIGH_AMOUNT_CONTRIBUTION: f64 = 0.30;
const NEW_DEVICE_CONTRIBUTION: f64 = 0.20;
const NEW_IP_CONTRIBUTION: f64 = 0.20;
const NEW_MERCHANT_CONTRIBUTION: f64 = 0.10;

/// Rule-based base risk evaluator.
#[derive(Debug, Clone)]
pub struct BaseRiskEvaluator {
    high_amount_threshold: f64,
}

impl BaseRiskEvaluator {
    pub fn new(high_amount_threshold: f64) -> Self {
        Self {
            high_amount_threshold,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.high_amount_threshold)
    }

    /// Evaluate all rules against the event and the pre-event snapshot.
    ///
    /// Rules commute; the attribution records each fired rule's posted
    /// contribution and the score is their sum saturated at 1.0.
    pub fn evaluate(&self, event: &EventRequest, snapshot: &EdgeSnapshot) -> BaseRisk {
        let mut attribution = Vec::new();

        if event.transaction_amount > self.high_amount_threshold {
            debug!(amount = event.transaction_amount, "high amount rule fired");
            attribution.push(RuleContribution {
                rule: RuleKind::HighAmount,
                contribution: HIGH_AMOUNT_CONTRIBUTION,
            });
        }

        if !snapshot.user_device {
            debug!(user = %event.user_id, device = %event.device_id, "new device rule fired");
            attribution.push(RuleContribution {
                rule: RuleKind::NewDevice,
                contribution: NEW_DEVICE_CONTRIBUTION,
            });
        }

        if !snapshot.user_ip {
            debug!(user = %event.user_id, ip = %event.ip_address, "new ip rule fired");
            attribution.push(RuleContribution {
                rule: RuleKind::NewIp,
                contribution: NEW_IP_CONTRIBUTION,
            });
        }

        if !snapshot.card_merchant {
            debug!(merchant = %event.merchant_id, "new merchant rule fired");
            attribution.push(RuleContribution {
                rule: RuleKind::NewMerchant,
                contribution: NEW_MERCHANT_CONTRIBUTION,
            });
        }

        let raw: f64 = attribution.iter().map(|c| c.contribution).sum();
        BaseRisk {
            score: saturate(raw),
            attribution,
        }
    }
}
