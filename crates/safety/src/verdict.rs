// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Safety verdicts and their severity ordering.

use drover_core::RiskLevel;
use serde::{Deserialize, Serialize};

/// Outcome of classifying one command (or a whole plan).
///
/// Declaration order doubles as severity: `deny` is the worst verdict, and a
/// plan's verdict is the maximum over its commands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Recognized safe read; skips the approval gate.
    AutoApprove,
    /// Allowed, but a human must approve before dispatch.
    RequiresApproval,
    /// Never executed; the task fails at planning.
    Deny,
}

drover_core::simple_display! {
    Verdict {
        AutoApprove => "auto_approve",
        RequiresApproval => "requires_approval",
        Deny => "deny",
    }
}

impl Verdict {
    /// Combine two verdicts; the worst wins.
    pub fn worst(self, other: Verdict) -> Verdict {
        self.max(other)
    }

    /// The risk level this verdict implies on a plan.
    pub fn risk_level(self) -> RiskLevel {
        match self {
            Verdict::AutoApprove => RiskLevel::Low,
            Verdict::RequiresApproval => RiskLevel::Medium,
            Verdict::Deny => RiskLevel::High,
        }
    }
}

#[cfg(test)]
#[path = "verdict_tests.rs"]
mod tests;
