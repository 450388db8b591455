// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Terminal display utilities for the mailsift CLI.
//!
//! OneDark for dark terminals, One Light for light ones. Respects `NO_COLOR`
//! and falls back to plain text when stdout is not a TTY, so piped output
//! stays greppable.
//!
//! # Theme detection order
//!
//! 1. `MAILSIFT_THEME` env var ("dark" or "light")
//! 2. `COLORFGBG` env var (terminal background hint)
//! 3. macOS appearance (via defaults read)
//! 4. Default to dark theme

use std::sync::OnceLock;

use mailsift::harness::{Outcome, Report};
use mailsift::store::{QueryPage, VectorMatch};
use mailsift::{Classification, EmailRecord};

// Width between │ and │ (excluding border chars)
pub const BOX_WIDTH: usize = 80;

// ═══════════════════════════════════════════════════════════════════════════
// THEME DETECTION
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
}

static THEME: OnceLock<Theme> = OnceLock::new();

fn detect_theme() -> Theme {
    // 1. Explicit override
    if let Ok(theme) = std::env::var("MAILSIFT_THEME") {
        match theme.to_lowercase().as_str() {
            "light" | "l" => return Theme::Light,
            "dark" | "d" => return Theme::Dark,
            _ => {}
        }
    }

    // 2. COLORFGBG is "fg;bg"; backgrounds 7 and up (except 8) are light
    if let Ok(colorfgbg) = std::env::var("COLORFGBG") {
        if let Some(bg) = colorfgbg.split(';').next_back() {
            if let Ok(bg_num) = bg.parse::<u8>() {
                if bg_num >= 7 && bg_num != 8 {
                    return Theme::Light;
                }
            }
        }
    }

    // 3. macOS appearance; no AppleInterfaceStyle means light
    #[cfg(target_os = "macos")]
    {
        if let Ok(output) = std::process::Command::new("defaults")
            .args(["read", "-g", "AppleInterfaceStyle"])
            .output()
        {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.contains("Dark") && output.status.success() {
                return Theme::Light;
            }
        }
    }

    // 4. Default
    Theme::Dark
}

pub fn theme() -> Theme {
    *THEME.get_or_init(detect_theme)
}

// ═══════════════════════════════════════════════════════════════════════════
// PALETTES (True Color)
// ═══════════════════════════════════════════════════════════════════════════
//
// Colours are picked per role, not per hue, so the printers below only say
// what a piece of text is.

fn rgb((r, g, b): (u8, u8, u8)) -> String {
    format!("\x1b[38;2;{};{};{}m", r, g, b)
}

pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
}

pub use colors::*;

/// What a piece of output means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Pass,
    Fail,
    Skip,
    /// Email ids.
    Id,
    /// Section labels.
    Label,
    /// Borders and low-scoring detail.
    Muted,
}

struct Palette {
    pass: (u8, u8, u8),
    fail: (u8, u8, u8),
    skip: (u8, u8, u8),
    id: (u8, u8, u8),
    label: (u8, u8, u8),
    muted: (u8, u8, u8),
}

impl Palette {
    fn get(&self, role: Role) -> (u8, u8, u8) {
        match role {
            Role::Pass => self.pass,
            Role::Fail => self.fail,
            Role::Skip => self.skip,
            Role::Id => self.id,
            Role::Label => self.label,
            Role::Muted => self.muted,
        }
    }
}

// OneDark
const DARK: Palette = Palette {
    pass: (152, 195, 121),  // #98c379
    fail: (224, 108, 117),  // #e06c75
    skip: (229, 192, 123),  // #e5c07b
    id: (97, 175, 239),     // #61afef
    label: (86, 182, 194),  // #56b6c2
    muted: (92, 99, 112),   // #5c6370
};

// One Light
const LIGHT: Palette = Palette {
    pass: (80, 161, 79),    // #50a14f
    fail: (228, 86, 73),    // #e45649
    skip: (193, 132, 1),    // #c18401
    id: (64, 120, 242),     // #4078f2
    label: (1, 132, 188),   // #0184bc
    muted: (160, 161, 167), // #a0a1a7
};

fn palette(theme: Theme) -> &'static Palette {
    match theme {
        Theme::Dark => &DARK,
        Theme::Light => &LIGHT,
    }
}

/// Escape sequence for `role` under the detected theme.
pub fn role_color(role: Role) -> String {
    rgb(palette(theme()).get(role))
}

// ═══════════════════════════════════════════════════════════════════════════
// CORE UTILITIES
// ═══════════════════════════════════════════════════════════════════════════

pub fn use_colors() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    atty::is(atty::Stream::Stdout)
}

/// Colour `text` for its role, plain when colours are off.
pub fn themed(role: Role, modifiers: &[&str], text: &str) -> String {
    if use_colors() {
        format!("{}{}{}{}", modifiers.join(""), role_color(role), text, RESET)
    } else {
        text.to_string()
    }
}

/// Visible length, excluding ANSI codes
pub fn visible_len(s: &str) -> usize {
    let mut in_escape = false;
    let mut len = 0;
    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
        } else if in_escape && c == 'm' {
            in_escape = false;
        } else if !in_escape {
            len += 1;
        }
    }
    len
}

/// Cut to `max` chars, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

// ═══════════════════════════════════════════════════════════════════════════
// BOX DRAWING
// ═══════════════════════════════════════════════════════════════════════════

fn border() -> String {
    if use_colors() {
        role_color(Role::Muted)
    } else {
        String::new()
    }
}

fn reset() -> &'static str {
    if use_colors() {
        RESET
    } else {
        ""
    }
}

/// │ content          │
pub fn row(content: &str) {
    let pad = BOX_WIDTH.saturating_sub(visible_len(content));
    let b = border();
    println!("{}│{}{}{}{}│{}", b, reset(), content, " ".repeat(pad), b, reset());
}

/// ┌─ LABEL ──────────┐
pub fn section_top(label: &str) {
    let label_part = format!("─ {} ", themed(Role::Label, &[BOLD], label));
    let remaining = BOX_WIDTH.saturating_sub(visible_len(&label_part));
    let b = border();
    println!(
        "{}┌{}{}{}{}┐{}",
        b,
        reset(),
        label_part,
        b,
        "─".repeat(remaining),
        reset()
    );
}

/// └──────────────────┘
pub fn section_bot() {
    println!("{}└{}┘{}", border(), "─".repeat(BOX_WIDTH), reset());
}

// ═══════════════════════════════════════════════════════════════════════════
// SEMANTIC FORMATTERS
// ═══════════════════════════════════════════════════════════════════════════

pub fn outcome_badge(outcome: &Outcome) -> String {
    let label = format!("[{}]", outcome.label());
    match outcome {
        Outcome::Passed(_) => themed(Role::Pass, &[BOLD], &label),
        Outcome::Failed(_) => themed(Role::Fail, &[BOLD], &label),
        Outcome::Skipped(_) => themed(Role::Skip, &[], &label),
    }
}

pub fn classification_label(classification: &Classification) -> String {
    match classification {
        Classification::Accepted => themed(Role::Pass, &[BOLD], "accepted"),
        Classification::Rejected(rejection) => themed(
            Role::Fail,
            &[BOLD],
            &format!("rejected [{}]: {}", rejection.kind(), rejection),
        ),
    }
}

/// Similarity score (1 - distance), greener when closer.
pub fn score_value(distance: f32) -> String {
    let score = 1.0 - distance;
    let text = format!("{:.4}", score);
    if score >= 0.8 {
        themed(Role::Pass, &[BOLD], &text)
    } else if score >= 0.4 {
        themed(Role::Skip, &[], &text)
    } else {
        themed(Role::Muted, &[], &text)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// COMMAND OUTPUT
// ═══════════════════════════════════════════════════════════════════════════

pub fn print_report(report: &Report) {
    section_top(&format!(
        "CONFORMANCE {} / {}",
        report.account_id, report.seed_id
    ));
    for result in &report.results {
        let line = format!(
            " {} #{:<2} {} {}",
            outcome_badge(&result.outcome),
            result.number,
            truncate(&result.description, 44),
            themed(Role::Muted, &[], &truncate(result.outcome.detail(), 24)),
        );
        row(&line);
    }
    section_bot();

    let summary = report.summary();
    if report.is_success() {
        println!("{}", themed(Role::Pass, &[BOLD], &summary));
    } else {
        println!("{}", themed(Role::Fail, &[BOLD], &summary));
        for result in report.results.iter().filter(|r| r.outcome.is_failure()) {
            println!("  {}", result);
        }
    }
}

pub fn print_emails(account_id: &str, emails: &[EmailRecord]) {
    if emails.is_empty() {
        println!("No emails found for account {}", account_id);
        return;
    }
    println!(
        "Found {} email(s) for account {}:\n",
        emails.len(),
        account_id
    );
    for email in emails {
        let from = email
            .first_sender()
            .map(ToString::to_string)
            .unwrap_or_default();
        println!("  {}", themed(Role::Id, &[BOLD], &email.email_id));
        println!("    Subject:  {}", email.subject);
        println!("    From:     {}", from);
        println!("    Received: {}", email.received_at);
        let indexed = if email.search_chunks > 0 {
            themed(Role::Pass, &[], &format!("{} chunk(s)", email.search_chunks))
        } else {
            themed(Role::Skip, &[], "not indexed")
        };
        println!("    Index:    {}", indexed);
        println!();
    }
}

pub fn print_matches(matches: &[VectorMatch]) {
    if matches.is_empty() {
        println!("No results found.");
        return;
    }
    println!("Found {} result(s):\n", matches.len());
    for m in matches {
        let field = |name: &str| {
            m.metadata
                .get(name)
                .map(|v| match v.as_str() {
                    Some(s) => s.to_string(),
                    None => v.to_string(),
                })
                .unwrap_or_default()
        };
        println!(
            "  Score: {}  Email: {}",
            score_value(m.distance),
            themed(Role::Id, &[BOLD], &field("emailId"))
        );
        println!("    Subject: {}", field("subject"));
        println!("    From:    {}", field("from"));
        println!("    Chunk:   {} ({})", field("chunkIndex"), field("type"));
        println!();
    }
}

pub fn print_query_page(page: &QueryPage) {
    let total = page
        .total
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!(
        "{} id(s) from position {} (total: {})",
        page.ids.len(),
        page.position,
        total
    );
    for id in &page.ids {
        println!("  {}", id);
    }
}
