// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in pattern rule sets.
//!
//! Three tiers: deny (never runs), approval-required (runs after a human
//! says so), and an auto-approve allowlist of known-safe reads. Deny rules
//! carry a short head label — that label is all the public error message
//! ever echoes; the full command text goes to the log only.

use regex::{Regex, RegexBuilder};

/// A deny rule: short public label plus the pattern that enforces it.
struct DenyRule {
    head: &'static str,
    pattern: &'static str,
}

/// Deny patterns are matched against the whole command line as well as each
/// sub-command, because several of them (piped payloads, fork bombs) only
/// exist across separator boundaries.
const DENY: &[DenyRule] = &[
    // Root-level recursive deletes and friends.
    DenyRule {
        head: "rm",
        pattern: r"\brm\s+(?:-[a-z-]+\s+)*(?:/|/\*|~|~/|\$home\b|\$\{home\})\s*(?:[;|&]|$)",
    },
    DenyRule { head: "rm", pattern: r"\brm\b.*--no-preserve-root" },
    // Filesystem formatters.
    DenyRule { head: "mkfs", pattern: r"\bmkfs(?:\.[a-z0-9]+)?\b" },
    // Raw block-device writes.
    DenyRule { head: "dd", pattern: r"\bdd\b.*\bof=/dev/" },
    DenyRule { head: "raw device write", pattern: r">\s*/dev/(?:sd|nvme|hd)" },
    // Fork bombs, named and anonymous forms.
    DenyRule {
        head: "fork bomb",
        pattern: r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;?\s*:",
    },
    DenyRule { head: "fork bomb", pattern: r"\(\s*\)\s*\{\s*\|\s*&\s*\}" },
    // Piped execution of remote payloads.
    DenyRule {
        head: "piped remote shell",
        pattern: r"\b(?:curl|wget)\b[^|]*\|\s*(?:sh|bash|zsh)\b",
    },
    // Sensitive credential files.
    DenyRule { head: "/etc/shadow", pattern: r"/etc/shadow" },
    DenyRule { head: "/etc/passwd", pattern: r">{1,2}\s*/etc/passwd\b" },
    DenyRule { head: "/etc/passwd", pattern: r"\b(?:tee|mv|cp)\b.*\s/etc/passwd\b" },
    DenyRule { head: "/etc/sudoers", pattern: r"/etc/sudoers" },
    // Network lock-outs.
    DenyRule {
        head: "iptables",
        pattern: r"\biptables\s+(?:-[a-z]+\s+)*(?:-f\b|--flush\b)",
    },
    DenyRule { head: "ufw", pattern: r"\bufw\s+disable\b" },
    DenyRule {
        head: "ssh service",
        pattern: r"\bsystemctl\s+(?:stop|disable)\s+ssh(?:d)?\b",
    },
    // World-writable root.
    DenyRule {
        head: "chmod",
        pattern: r"\bchmod\s+(?:-[a-z]+\s+)*777\s+/\s*(?:[;|&]|$)",
    },
    // Reverse shells.
    DenyRule { head: "netcat", pattern: r"\b(?:nc|ncat)\s+(?:-[a-z]+\s+)*-e\b" },
    DenyRule { head: "/dev/tcp", pattern: r"/dev/(?:tcp|udp)/" },
];

/// Approval-required patterns, matched per sub-command.
const APPROVAL: &[&str] = &[
    r"^(?:sudo\s+)?(?:reboot|shutdown|halt|poweroff)\b",
    r"^(?:sudo\s+)?init\s+[0-6]\b",
    r"^(?:sudo\s+)?systemctl\s+(?:restart|stop|disable|enable|mask)\b",
    r"^(?:sudo\s+)?service\s+\S+\s+(?:start|stop|restart)\b",
    r"^(?:sudo\s+)?apt(?:-get)?\s+(?:install|remove|purge|upgrade|dist-upgrade|autoremove)\b",
    r"^(?:sudo\s+)?(?:yum|dnf)\s+(?:install|remove|update|upgrade)\b",
    r"^(?:sudo\s+)?pip3?\s+install\b",
    r"^(?:sudo\s+)?npm\s+install\s+(?:-g|--global)\b",
    r"^(?:sudo\s+)?docker\s+(?:rm|rmi|(?:system|container|image)\s+prune)\b",
    r"^(?:sudo\s+)?docker-compose\s+(?:down|rm)\b",
    r"^git\s+push\b.*(?:\s--force\b|\s-f\b)",
    r"^git\s+reset\s+--hard\b",
    r"^git\s+clean\s+-f",
    r"\bdrop\s+(?:table|database|index|view)\b",
    r"\bdelete\s+from\b",
    r"\btruncate\b",
    r"^(?:sudo\s+)?(?:useradd|userdel|usermod|passwd|groupadd|groupdel)\b",
    r"^crontab\s+-",
];

/// Auto-approve allowlist: anchored, known-safe reads.
const SAFE: &[&str] = &[
    r"^ls(?:\s|$)",
    r"^pwd$",
    r"^whoami$",
    r"^id$",
    r"^date(?:\s|$)",
    r"^uptime$",
    r"^hostname(?:\s|$)",
    r"^uname(?:\s|$)",
    r"^df(?:\s|$)",
    r"^du\s",
    r"^free(?:\s|$)",
    r"^cat\s",
    r"^head\s",
    r"^tail\s",
    r"^less\s",
    r"^grep\s",
    r"^find\s",
    r"^wc\s",
    r"^sort(?:\s|$)",
    r"^uniq(?:\s|$)",
    r"^echo(?:\s|$)",
    r"^printf\s",
    r"^ps(?:\s|$)",
    r"^env$",
    r"^printenv(?:\s|$)",
    r"^which\s",
    r"^git\s+(?:status|log|diff|branch|show|fetch|pull)(?:\s|$)",
    r"^docker\s+(?:ps|images|logs|inspect|stats)(?:\s|$)",
    r"^systemctl\s+(?:status|is-active|list-units)(?:\s|$)",
    r"^journalctl(?:\s|$)",
];

/// Compiled rule sets. Compilation happens once per validator instance; the
/// patterns are fixed, so failures are programmer errors surfaced in tests.
pub struct RuleSet {
    deny: Vec<(&'static str, &'static str, Regex)>,
    approval: Vec<(&'static str, Regex)>,
    safe: Vec<(&'static str, Regex)>,
}

fn compile(pattern: &str) -> Regex {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => re,
        Err(e) => unreachable!("builtin safety pattern failed to compile: {pattern}: {e}"),
    }
}

impl RuleSet {
    /// The built-in three-tier rule set.
    pub fn builtin() -> Self {
        RuleSet {
            deny: DENY
                .iter()
                .map(|r| (r.head, r.pattern, compile(r.pattern)))
                .collect(),
            approval: APPROVAL.iter().map(|p| (*p, compile(p))).collect(),
            safe: SAFE.iter().map(|p| (*p, compile(p))).collect(),
        }
    }

    /// First deny rule matching the text, as `(head, pattern)`.
    pub fn match_deny(&self, text: &str) -> Option<(&'static str, &'static str)> {
        self.deny
            .iter()
            .find(|(_, _, re)| re.is_match(text))
            .map(|(head, pattern, _)| (*head, *pattern))
    }

    /// First approval-required pattern matching the text.
    pub fn match_approval(&self, text: &str) -> Option<&'static str> {
        self.approval
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(pattern, _)| *pattern)
    }

    /// First allowlist pattern matching the text.
    pub fn match_safe(&self, text: &str) -> Option<&'static str> {
        self.safe
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(pattern, _)| *pattern)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}
