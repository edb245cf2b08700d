//! Strategy approvals and per-user IP allow-lists.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditEventType, AuditSeverity, AuditTrail, DataSensitivity};
use crate::error::{ComplianceError, ComplianceResult};

/// Approval state of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Cleared for production trading.
    Approved,
    /// Approval withdrawn.
    Revoked,
}

/// Latest approval decision for a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyApproval {
    /// Strategy id.
    pub strategy_id: String,
    /// Current status.
    pub status: ApprovalStatus,
    /// Operator behind the last decision.
    pub decided_by: String,
    /// Remarks recorded with the decision.
    pub remarks: String,
    /// Decision time.
    pub decided_at: DateTime<Utc>,
}

/// Strategies cleared for production, with every decision audited.
///
/// The audit event is written before the registry changes, so a failed
/// write leaves the previous decision in place.
#[derive(Debug)]
pub struct StrategyRegistry {
    approvals: BTreeMap<String, StrategyApproval>,
    trail: Arc<AuditTrail>,
}

impl StrategyRegistry {
    /// Creates an empty registry auditing into `trail`.
    #[must_use]
    pub fn new(trail: Arc<AuditTrail>) -> Self {
        Self {
            approvals: BTreeMap::new(),
            trail,
        }
    }

    /// Approves a strategy for production use.
    ///
    /// # Errors
    ///
    /// Returns the audit trail's error; the approval is not recorded.
    pub fn approve(
        &mut self,
        strategy_id: &str,
        approved_by: &str,
        remarks: &str,
        now: DateTime<Utc>,
    ) -> ComplianceResult<&StrategyApproval> {
        self.decide(strategy_id, approved_by, remarks, ApprovalStatus::Approved, now)
    }

    /// Withdraws a strategy's approval. Returns `Ok(None)` for a strategy
    /// that was never approved.
    ///
    /// # Errors
    ///
    /// Returns the audit trail's error; the approval stays in force.
    pub fn revoke(
        &mut self,
        strategy_id: &str,
        revoked_by: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ComplianceResult<Option<&StrategyApproval>> {
        if !self.approvals.contains_key(strategy_id) {
            warn!(strategy_id, "revoke requested for unknown strategy");
            return Ok(None);
        }
        self.decide(strategy_id, revoked_by, reason, ApprovalStatus::Revoked, now)
            .map(Some)
    }

    /// True if the strategy's latest decision is an approval.
    #[must_use]
    pub fn is_approved(&self, strategy_id: &str) -> bool {
        self.approvals
            .get(strategy_id)
            .is_some_and(|a| a.status == ApprovalStatus::Approved)
    }

    /// Latest decision for a strategy.
    #[must_use]
    pub fn approval(&self, strategy_id: &str) -> Option<&StrategyApproval> {
        self.approvals.get(strategy_id)
    }

    /// Ids of all approved strategies.
    pub fn approved(&self) -> impl Iterator<Item = &str> {
        self.approvals
            .values()
            .filter(|a| a.status == ApprovalStatus::Approved)
            .map(|a| a.strategy_id.as_str())
    }

    fn decide(
        &mut self,
        strategy_id: &str,
        user: &str,
        remarks: &str,
        status: ApprovalStatus,
        now: DateTime<Utc>,
    ) -> ComplianceResult<&StrategyApproval> {
        let (action, verb) = match status {
            ApprovalStatus::Approved => ("strategy_approved", "approved"),
            ApprovalStatus::Revoked => ("strategy_revoked", "revoked"),
        };
        let event = AuditEvent::new(
            AuditEventType::UserAction,
            AuditSeverity::High,
            "strategy_registry",
            action,
            format!("Strategy {strategy_id} {verb} by {user}"),
        )
        .with_user(Some(user))
        .with_context("strategy_id", strategy_id)
        .with_context("remarks", remarks)
        .with_context("decided_at", now.to_rfc3339())
        .with_tags(&["strategy_approval", "regulatory_compliance"])
        .with_sensitivity(DataSensitivity::Confidential);
        self.trail.log(event)?;

        info!(strategy_id, user, status = ?status, "strategy approval updated");
        let approval = StrategyApproval {
            strategy_id: strategy_id.to_string(),
            status,
            decided_by: user.to_string(),
            remarks: remarks.to_string(),
            decided_at: now,
        };
        let slot = self
            .approvals
            .entry(strategy_id.to_string())
            .and_modify(|existing| *existing = approval.clone())
            .or_insert(approval);
        Ok(&*slot)
    }
}

/// Per-user allow-lists of addresses and CIDR ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IpWhitelist {
    users: BTreeMap<String, Vec<IpNet>>,
}

impl IpWhitelist {
    /// Creates an empty allow-list; every lookup is denied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds allow-lists from `user -> [address or CIDR]` entries.
    ///
    /// # Errors
    ///
    /// `InvalidAddress` for the first entry that is neither.
    pub fn from_entries<I, S>(entries: I) -> ComplianceResult<Self>
    where
        I: IntoIterator<Item = (String, Vec<S>)>,
        S: AsRef<str>,
    {
        let mut whitelist = Self::new();
        for (user, nets) in entries {
            for net in nets {
                whitelist.allow(&user, net.as_ref())?;
            }
        }
        Ok(whitelist)
    }

    /// Adds an address (`10.0.0.7`) or range (`10.0.0.0/24`) for a user.
    ///
    /// # Errors
    ///
    /// `InvalidAddress` if `entry` parses as neither.
    pub fn allow(&mut self, user: &str, entry: &str) -> ComplianceResult<()> {
        let net = parse_entry(entry)?;
        let nets = self.users.entry(user.to_string()).or_default();
        if !nets.contains(&net) {
            nets.push(net);
        }
        Ok(())
    }

    /// Removes an entry. Returns true if it was present.
    pub fn remove(&mut self, user: &str, entry: &str) -> bool {
        let Ok(net) = parse_entry(entry) else {
            return false;
        };
        self.users.get_mut(user).is_some_and(|nets| {
            let before = nets.len();
            nets.retain(|n| *n != net);
            nets.len() < before
        })
    }

    /// True if `address` falls inside one of the user's entries.
    ///
    /// Users without a list and unparseable addresses are denied.
    #[must_use]
    pub fn validate(&self, user: &str, address: &str) -> bool {
        match address.trim().parse::<IpAddr>() {
            Ok(addr) => self.contains(user, addr),
            Err(_) => {
                warn!(user, address, "unparseable address rejected");
                false
            }
        }
    }

    /// Typed form of [`IpWhitelist::validate`].
    #[must_use]
    pub fn contains(&self, user: &str, addr: IpAddr) -> bool {
        let Some(nets) = self.users.get(user) else {
            warn!(user, "no IP whitelist for user");
            return false;
        };
        match nets.iter().find(|net| net.contains(&addr)) {
            Some(net) => {
                info!(user, %addr, range = %net, "address whitelisted");
                true
            }
            None => {
                warn!(user, %addr, "address not whitelisted");
                false
            }
        }
    }

    /// Entries for a user.
    #[must_use]
    pub fn entries(&self, user: &str) -> &[IpNet] {
        self.users.get(user).map_or(&[], Vec::as_slice)
    }
}

fn parse_entry(entry: &str) -> ComplianceResult<IpNet> {
    let entry = entry.trim();
    if let Ok(net) = entry.parse::<IpNet>() {
        return Ok(net.trunc());
    }
    entry
        .parse::<IpAddr>()
        .map(IpNet::from)
        .map_err(|_| ComplianceError::InvalidAddress(entry.to_string()))
}
