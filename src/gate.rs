//! Confirmation gate for mutating statements.
//!
//! Read-only statements pass straight through. A mutating statement is held
//! as the session's single outstanding [`ConfirmationRequest`] until the user
//! confirms or cancels it, or until it expires. The executor boundary only
//! accepts an [`ApprovedStatement`], and only the gate can create one.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{GateError, Result};
use crate::safety::{Classification, OperationKind, RiskTier};
use crate::sanitize::SqlStatement;

/// Identifies one confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a request ID from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A mutating statement waiting for a user decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationRequest {
    pub id: RequestId,
    pub statement: SqlStatement,
    pub operation_kind: OperationKind,
    pub risk_tier: RiskTier,
    pub warning: Option<String>,
    pub created_at: DateTime<Utc>,
    /// None when requests never expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ConfirmationRequest {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// A statement cleared for execution.
///
/// Either a read that bypassed the gate or a mutation whose request was
/// confirmed. There is no public constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedStatement {
    statement: SqlStatement,
    kind: OperationKind,
    request_id: Option<RequestId>,
}

impl ApprovedStatement {
    /// The sanitized SQL text to execute.
    pub fn sql(&self) -> &str {
        self.statement.sanitized_text()
    }

    pub fn statement(&self) -> &SqlStatement {
        &self.statement
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// The confirmed request, or None for reads.
    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }
}

/// What the gate decided for an admitted statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Run the statement now.
    Execute(ApprovedStatement),
    /// Ask the user first.
    AwaitConfirmation(ConfirmationRequest),
}

/// Observable gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    Idle,
    AwaitingConfirmation,
}

/// Per-session confirmation state machine.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationGate {
    pending: Option<ConfirmationRequest>,
    timeout: Option<Duration>,
}

impl ConfirmationGate {
    /// Creates an idle gate. With `timeout` set, pending requests expire
    /// after that long.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            pending: None,
            timeout,
        }
    }

    pub fn state(&self) -> GateState {
        if self.pending.is_some() {
            GateState::AwaitingConfirmation
        } else {
            GateState::Idle
        }
    }

    /// The outstanding request, if any.
    pub fn pending(&self) -> Option<&ConfirmationRequest> {
        self.pending.as_ref()
    }

    /// When the outstanding request expires.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.as_ref().and_then(|r| r.expires_at)
    }

    /// Admits a sanitized, classified statement.
    ///
    /// Reads are approved immediately, even while a request is pending.
    /// A mutation becomes the pending request, unless one is already
    /// outstanding, in which case it is rejected and the existing request
    /// is kept.
    pub fn admit(
        &mut self,
        statement: SqlStatement,
        classification: &Classification,
        now: DateTime<Utc>,
    ) -> Result<GateOutcome> {
        if !classification.requires_confirmation() {
            return Ok(GateOutcome::Execute(ApprovedStatement {
                statement,
                kind: classification.kind,
                request_id: None,
            }));
        }

        self.expire_if_due(now);
        if self.pending.is_some() {
            return Err(GateError::ConfirmationAlreadyPending);
        }

        let expires_at = self
            .timeout
            .and_then(|timeout| chrono::Duration::from_std(timeout).ok())
            .and_then(|timeout| now.checked_add_signed(timeout));
        let request = ConfirmationRequest {
            id: RequestId::new(),
            statement,
            operation_kind: classification.kind,
            risk_tier: classification.risk.unwrap_or(RiskTier::High),
            warning: classification.warning.clone(),
            created_at: now,
            expires_at,
        };

        info!(
            request_id = %request.id,
            kind = %request.operation_kind,
            risk = %request.risk_tier,
            "Awaiting confirmation"
        );
        self.pending = Some(request.clone());
        Ok(GateOutcome::AwaitConfirmation(request))
    }

    /// Confirms the pending request and releases its statement.
    ///
    /// `id`, when given, must name the pending request; a mismatch leaves
    /// the request pending. An expired request is dropped and reported as
    /// [`GateError::ConfirmationExpired`].
    pub fn confirm(
        &mut self,
        id: Option<RequestId>,
        now: DateTime<Utc>,
    ) -> Result<ApprovedStatement> {
        let request = self.take_matching(id)?;
        if request.is_expired(now) {
            info!(request_id = %request.id, "Confirmation arrived after expiry");
            return Err(GateError::ConfirmationExpired);
        }

        info!(request_id = %request.id, kind = %request.operation_kind, "Confirmed");
        Ok(ApprovedStatement {
            statement: request.statement,
            kind: request.operation_kind,
            request_id: Some(request.id),
        })
    }

    /// Cancels the pending request; its statement is never executed.
    pub fn cancel(&mut self, id: Option<RequestId>) -> Result<ConfirmationRequest> {
        let request = self.take_matching(id)?;
        info!(request_id = %request.id, "Cancelled");
        Ok(request)
    }

    /// Drops any pending request without a decision (session reset or switch).
    pub fn discard(&mut self) -> Option<ConfirmationRequest> {
        let discarded = self.pending.take();
        if let Some(request) = &discarded {
            debug!(request_id = %request.id, "Discarded pending confirmation");
        }
        discarded
    }

    /// Drops the pending request if its deadline has passed.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> Option<ConfirmationRequest> {
        if !self.pending.as_ref().is_some_and(|r| r.is_expired(now)) {
            return None;
        }
        let expired = self.pending.take();
        if let Some(request) = &expired {
            info!(request_id = %request.id, "Confirmation expired");
        }
        expired
    }

    fn take_matching(&mut self, id: Option<RequestId>) -> Result<ConfirmationRequest> {
        let pending = self
            .pending
            .as_ref()
            .ok_or(GateError::NoPendingConfirmation)?;
        if id.is_some_and(|id| id != pending.id) {
            return Err(GateError::ConfirmationMismatch);
        }
        self.pending.take().ok_or(GateError::NoPendingConfirmation)
    }
}
