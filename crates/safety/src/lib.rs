// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-safety: pattern-based classification of planned shell commands.
//!
//! A total function over command strings — a verdict is always produced.
//! Mis-classification here is a security bug, so the rule sets err on the
//! side of `requires_approval`: anything not recognizably safe needs a human.

mod rules;
mod validator;
mod verdict;

pub use rules::RuleSet;
pub use validator::{split_subcommands, CommandVerdict, DeniedRule, PlanVerdict, SafetyValidator};
pub use verdict::Verdict;
