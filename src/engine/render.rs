//! Telegram message rendering (legacy Markdown)

use super::decision::AlertDecision;
use super::sentiment::Sentiment;
use super::types::{IndexReading, MarketContext};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::{Decimal, RoundingStrategy};

const RULE: &str = "━━━━━━━━━━━━━━━";

/// Characters that open an entity in legacy Markdown
const MARKDOWN_SPECIALS: [char; 4] = ['_', '*', '`', '['];

/// Compose the alert text; empty when no alert is due.
pub fn render_message(
    decision: &AlertDecision,
    today: &IndexReading,
    yesterday: &IndexReading,
    context: &MarketContext,
    timezone: Tz,
    generated_at: DateTime<Utc>,
) -> String {
    let Some(kind) = decision.kind() else {
        return String::new();
    };

    let sentiment = Sentiment::from_label(&today.classification);
    let mut lines: Vec<String> = vec![
        kind.header().to_string(),
        String::new(),
        format!("{} *Fear & Greed Index*", sentiment.icon()),
        RULE.to_string(),
        format!(
            "📊 Current index: *{}* ({})",
            today.value,
            escape_markdown(&today.classification)
        ),
        format!(
            "{} Change vs yesterday: *{:+}*",
            decision.direction().icon(),
            decision.change
        ),
        format!("📅 Yesterday: {}", yesterday.value),
    ];

    if let Some((btc, eth)) = context.prices() {
        lines.push(format!(
            "💰 *BTC*: ${} | *ETH*: ${}",
            format_usd(btc),
            format_usd(eth)
        ));
    }

    if let Some(commentary) = context.commentary() {
        lines.push(String::new());
        lines.push("🤖 *AI Market Insight*:".to_string());
        lines.push(italic(commentary));
    }

    lines.push(String::new());
    lines.extend(kind.action_lines().iter().map(|line| line.to_string()));
    lines.push(String::new());
    lines.push(format!("⏰ {}", format_generated_at(generated_at, timezone)));

    lines.join("\n")
}

/// Backslash-escape entity characters in free text
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_SPECIALS.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Italicize free text. Legacy Markdown cannot escape inside an entity, so the
/// italic run is closed around each special character.
pub fn italic(text: &str) -> String {
    fn close_run(out: &mut String, run: &mut String) {
        if !run.is_empty() {
            out.push('_');
            out.push_str(run);
            out.push('_');
            run.clear();
        }
    }

    let mut out = String::with_capacity(text.len() + 2);
    let mut run = String::new();
    for ch in text.chars() {
        if MARKDOWN_SPECIALS.contains(&ch) {
            close_run(&mut out, &mut run);
            out.push('\\');
            out.push(ch);
        } else {
            run.push(ch);
        }
    }
    close_run(&mut out, &mut run);
    out
}

/// `2026-10-19 09:00:00 KST`
pub fn format_generated_at(at: DateTime<Utc>, timezone: Tz) -> String {
    at.with_timezone(&timezone)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}

/// Thousands-grouped amount with at most two fraction digits: `97,123.5`
pub fn format_usd(amount: Decimal) -> String {
    let rounded = amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    let text = rounded.to_string();

    let (int_part, frac_part) = match text.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (text.as_str(), None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}
