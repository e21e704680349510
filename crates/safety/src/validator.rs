// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command classification.
//!
//! A command line is split on `|`, `;`, `&&`, `||`; each sub-command is
//! classified against the rule sets and the worst verdict wins. Deny rules
//! additionally run against the whole line, because piped-payload and
//! fork-bomb shapes only exist across separator boundaries.

use crate::rules::RuleSet;
use crate::verdict::Verdict;
use drover_core::{Plan, RiskLevel};

/// Split a command line into sub-commands on shell separators.
///
/// `&&` and `||` fall out of the single-character split as empty segments,
/// which are discarded along with all surrounding whitespace.
pub fn split_subcommands(line: &str) -> Vec<&str> {
    line.split(|c| c == ';' || c == '|' || c == '&')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Verdict for a single command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandVerdict {
    pub verdict: Verdict,
    /// Short public label of the matched deny rule (redacted form).
    pub rule: Option<&'static str>,
    /// Full pattern that matched, for the log only.
    pub pattern: Option<&'static str>,
}

/// The deny that sank a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeniedRule {
    pub command_index: usize,
    pub rule: &'static str,
}

/// Verdict for a whole plan: the worst per-command verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanVerdict {
    pub verdict: Verdict,
    pub risk_level: RiskLevel,
    pub denied: Option<DeniedRule>,
}

/// Pure classifier over shell strings. Total: always produces a verdict.
pub struct SafetyValidator {
    rules: RuleSet,
}

impl Default for SafetyValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyValidator {
    pub fn new() -> Self {
        SafetyValidator { rules: RuleSet::builtin() }
    }

    /// Classify one command line.
    pub fn verdict(&self, command: &str) -> CommandVerdict {
        let line = command.trim();
        if line.is_empty() {
            // Nothing recognizably safe about an empty fragment.
            return CommandVerdict {
                verdict: Verdict::RequiresApproval,
                rule: None,
                pattern: None,
            };
        }

        if let Some((head, pattern)) = self.rules.match_deny(line) {
            tracing::warn!(command = %line, rule = head, pattern, "command denied by safety rules");
            return CommandVerdict { verdict: Verdict::Deny, rule: Some(head), pattern: Some(pattern) };
        }

        let mut worst = Verdict::AutoApprove;
        let mut matched: Option<&'static str> = None;
        for sub in split_subcommands(line) {
            let (verdict, pattern) = self.classify_subcommand(sub);
            if let Some((head, pattern)) = self.rules.match_deny(sub) {
                tracing::warn!(command = %line, rule = head, pattern, "command denied by safety rules");
                return CommandVerdict {
                    verdict: Verdict::Deny,
                    rule: Some(head),
                    pattern: Some(pattern),
                };
            }
            if verdict > worst {
                worst = verdict;
                matched = pattern;
            }
        }

        CommandVerdict { verdict: worst, rule: None, pattern: matched }
    }

    fn classify_subcommand(&self, sub: &str) -> (Verdict, Option<&'static str>) {
        if let Some(pattern) = self.rules.match_approval(sub) {
            return (Verdict::RequiresApproval, Some(pattern));
        }
        if let Some(pattern) = self.rules.match_safe(sub) {
            return (Verdict::AutoApprove, Some(pattern));
        }
        // Unknown commands need a human.
        (Verdict::RequiresApproval, None)
    }

    /// Classify every command in a plan; the worst verdict wins.
    pub fn evaluate_plan(&self, plan: &Plan) -> PlanVerdict {
        let mut worst = Verdict::AutoApprove;
        let mut denied = None;
        for (index, command) in plan.commands.iter().enumerate() {
            let cv = self.verdict(&command.run);
            if cv.verdict == Verdict::Deny && denied.is_none() {
                denied = cv.rule.map(|rule| DeniedRule { command_index: index, rule });
            }
            worst = worst.worst(cv.verdict);
        }
        PlanVerdict { verdict: worst, risk_level: worst.risk_level(), denied }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
