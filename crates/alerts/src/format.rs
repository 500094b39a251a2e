//! Rendering alert batches for each channel.

use pricewatch_engine::Alert;
use serde_json::{json, Value};

/// Slack caps the number of blocks per message.
pub const SLACK_MAX_ALERTS: usize = 10;
pub const DISCORD_MAX_ALERTS: usize = 15;
/// Red
pub const DISCORD_EMBED_COLOR: u32 = 15158332;

const TABLE_NAME_WIDTH: usize = 40;
const EMAIL_NAME_WIDTH: usize = 50;

pub fn headline(count: usize) -> String {
    format!("🚨 {} Price Change Alert(s) Detected", count)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn old_price_label(alert: &Alert) -> String {
    alert.currency.format(alert.old_price)
}

fn new_price_label(alert: &Alert) -> String {
    alert.currency.format(alert.new_price)
}

/// Markdown table for the GitHub Actions job summary.
pub fn markdown_summary(alerts: &[Alert]) -> String {
    let mut out = String::from("## 🚨 Price Change Alerts\n\n");
    out.push_str("| Product | Retailer | Type | Severity | Old Price | New Price | Change |\n");
    out.push_str("|---------|----------|------|----------|-----------|-----------|--------|\n");
    for alert in alerts {
        out.push_str(&format!(
            "| {} | {} | {} {} | {} | {} | {} | {} |\n",
            truncate(&alert.product_name, TABLE_NAME_WIDTH).replace('|', "\\|"),
            alert.product.retailer,
            alert.kind.emoji(),
            alert.kind,
            alert.severity,
            old_price_label(alert),
            new_price_label(alert),
            alert.pct_label(),
        ));
    }
    out.push_str(&format!("\n*{} alerts generated*\n\n", alerts.len()));
    out
}

pub fn slack_payload(alerts: &[Alert]) -> Value {
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {"type": "plain_text", "text": headline(alerts.len())},
        }),
        json!({"type": "divider"}),
    ];
    blocks.extend(alerts.iter().take(SLACK_MAX_ALERTS).map(|alert| {
        json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": alert.message()},
        })
    }));
    if alerts.len() > SLACK_MAX_ALERTS {
        blocks.push(json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!("_...and {} more alerts_", alerts.len() - SLACK_MAX_ALERTS),
            },
        }));
    }
    json!({ "blocks": blocks })
}

pub fn discord_payload(alerts: &[Alert]) -> Value {
    let description = alerts
        .iter()
        .take(DISCORD_MAX_ALERTS)
        .map(Alert::message)
        .collect::<Vec<_>>()
        .join("\n");
    json!({
        "embeds": [{
            "title": format!("🚨 {} Price Change Alert(s)", alerts.len()),
            "description": description,
            "color": DISCORD_EMBED_COLOR,
        }]
    })
}

/// Flat alert objects for custom receivers.
pub fn json_payload(alerts: &[Alert]) -> Value {
    let alerts: Vec<Value> = alerts
        .iter()
        .map(|alert| {
            json!({
                "retailer": alert.product.retailer,
                "product_url": alert.product.url,
                "product_name": alert.product_name,
                "alert_type": alert.kind,
                "severity": alert.severity,
                "currency": alert.currency,
                "old_price": alert.old_price,
                "new_price": alert.new_price,
                "pct_change": alert.pct_change,
                "availability": alert.availability,
                "message": alert.message(),
                "generated_at": alert.generated_at,
            })
        })
        .collect();
    json!({ "alerts": alerts })
}

pub fn email_text(alerts: &[Alert]) -> String {
    let mut out = format!("PRICE CHANGE ALERTS\n{}\n\n", "=".repeat(40));
    out.push_str(
        &alerts
            .iter()
            .map(Alert::message)
            .collect::<Vec<_>>()
            .join("\n"),
    );
    out
}

pub fn email_html(alerts: &[Alert]) -> String {
    let mut out = String::from(
        "<html><body>\n<h2>🚨 Price Change Alerts</h2>\n\
         <table border=\"1\" cellpadding=\"8\" cellspacing=\"0\" style=\"border-collapse: collapse;\">\n\
         <tr style=\"background-color: #f2f2f2;\">\
         <th>Product</th><th>Retailer</th><th>Old Price</th><th>New Price</th><th>Change</th></tr>\n",
    );
    for alert in alerts {
        let color = match alert.pct_change {
            Some(pct) if pct < 0.0 => "#d4edda",
            _ => "#f8d7da",
        };
        out.push_str(&format!(
            "<tr style=\"background-color: {};\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><strong>{}</strong></td></tr>\n",
            color,
            escape_html(&truncate(&alert.product_name, EMAIL_NAME_WIDTH)),
            escape_html(&alert.product.retailer),
            escape_html(&old_price_label(alert)),
            escape_html(&new_price_label(alert)),
            alert.pct_label(),
        ));
    }
    out.push_str("</table></body></html>");
    out
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
