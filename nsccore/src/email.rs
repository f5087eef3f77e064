//! Notification e-mail templates.
//!
//! Every template renders to a subject, a plain-text body and an HTML body.
//! Values that come from users (names, notes) are HTML-escaped in the HTML
//! body only.

use std::fmt::Write as _;

use serde::Serialize;

use crate::types::{KycStatus, WithdrawalStatus};

/// Rendered message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// All outbound e-mails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailTemplate {
    Welcome {
        name: String,
        referral_code: String,
    },
    PasswordReset {
        name: String,
        token: String,
        expires_in_minutes: i64,
    },
    PaymentReceived {
        name: String,
        amount_cents: i64,
        purpose: String,
    },
    PackageActivated {
        name: String,
        plan_name: String,
        amount_cents: i64,
        monthly_roi_bps: i32,
    },
    RoiCredited {
        name: String,
        amount_cents: i64,
        payment_number: i32,
        max_payments: i32,
    },
    CommissionEarned {
        name: String,
        amount_cents: i64,
        level: i32,
    },
    WithdrawalRequested {
        name: String,
        amount_cents: i64,
        net_amount_cents: i64,
    },
    WithdrawalStatusChanged {
        name: String,
        status: WithdrawalStatus,
        amount_cents: i64,
        note: Option<String>,
    },
    KycStatusChanged {
        name: String,
        status: KycStatus,
        note: Option<String>,
    },
}

/// Format cents as `$1,234.56`; negatives as `-$1.00`.
pub fn format_usd(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let dollars = (abs / 100).to_string();
    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}.{:02}", abs % 100)
}

/// Format basis points as a percentage, e.g. `450` -> `4.5%`.
pub fn format_bps(bps: i32) -> String {
    if bps % 100 == 0 {
        format!("{}%", bps / 100)
    } else {
        let s = format!("{:.2}", bps as f64 / 100.0);
        format!("{}%", s.trim_end_matches('0'))
    }
}

/// Minimal HTML escaping for text nodes and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

struct Body {
    greeting_name: String,
    lines: Vec<String>,
    action: Option<(String, String)>,
}

impl EmailTemplate {
    fn name(&self) -> &str {
        match self {
            EmailTemplate::Welcome { name, .. }
            | EmailTemplate::PasswordReset { name, .. }
            | EmailTemplate::PaymentReceived { name, .. }
            | EmailTemplate::PackageActivated { name, .. }
            | EmailTemplate::RoiCredited { name, .. }
            | EmailTemplate::CommissionEarned { name, .. }
            | EmailTemplate::WithdrawalRequested { name, .. }
            | EmailTemplate::WithdrawalStatusChanged { name, .. }
            | EmailTemplate::KycStatusChanged { name, .. } => name,
        }
    }

    fn subject(&self, app_name: &str) -> String {
        match self {
            EmailTemplate::Welcome { .. } => format!("Welcome to {app_name}"),
            EmailTemplate::PasswordReset { .. } => format!("{app_name} password reset"),
            EmailTemplate::PaymentReceived { .. } => "Payment received".to_string(),
            EmailTemplate::PackageActivated { plan_name, .. } => {
                format!("Your {plan_name} package is active")
            }
            EmailTemplate::RoiCredited { amount_cents, .. } => {
                format!("ROI credited: {}", format_usd(*amount_cents))
            }
            EmailTemplate::CommissionEarned { amount_cents, .. } => {
                format!("Referral commission: {}", format_usd(*amount_cents))
            }
            EmailTemplate::WithdrawalRequested { .. } => "Withdrawal request received".to_string(),
            EmailTemplate::WithdrawalStatusChanged { status, .. } => {
                format!("Withdrawal {status}")
            }
            EmailTemplate::KycStatusChanged { status, .. } => match status {
                KycStatus::Approved => "KYC verification approved".to_string(),
                KycStatus::Rejected => "KYC verification rejected".to_string(),
                _ => "KYC verification update".to_string(),
            },
        }
    }

    fn body(&self, app_name: &str, base_url: &str) -> Body {
        let mut action = None;
        let lines = match self {
            EmailTemplate::Welcome { referral_code, .. } => {
                action = Some(("Open dashboard".to_string(), format!("{base_url}/dashboard")));
                vec![
                    format!("Your {app_name} account has been created."),
                    format!("Your referral code is {referral_code}."),
                    format!("Share this link: {base_url}/register?ref={referral_code}"),
                ]
            }
            EmailTemplate::PasswordReset {
                token,
                expires_in_minutes,
                ..
            } => {
                action = Some((
                    "Reset password".to_string(),
                    format!("{base_url}/reset-password?token={token}"),
                ));
                vec![
                    "We received a request to reset your password.".to_string(),
                    format!("The link expires in {expires_in_minutes} minutes."),
                    "If you did not ask for this, ignore this message.".to_string(),
                ]
            }
            EmailTemplate::PaymentReceived {
                amount_cents,
                purpose,
                ..
            } => vec![
                format!(
                    "We received your payment of {} for {purpose}.",
                    format_usd(*amount_cents)
                ),
                "It will be activated once our team verifies the transaction.".to_string(),
            ],
            EmailTemplate::PackageActivated {
                plan_name,
                amount_cents,
                monthly_roi_bps,
                ..
            } => vec![
                format!(
                    "Your {plan_name} package of {} is now active.",
                    format_usd(*amount_cents)
                ),
                format!(
                    "It earns {} per month for 12 months.",
                    format_bps(*monthly_roi_bps)
                ),
            ],
            EmailTemplate::RoiCredited {
                amount_cents,
                payment_number,
                max_payments,
                ..
            } => vec![format!(
                "{} has been credited to your balance (payment {payment_number} of {max_payments}).",
                format_usd(*amount_cents)
            )],
            EmailTemplate::CommissionEarned {
                amount_cents,
                level,
                ..
            } => vec![format!(
                "You earned a level {level} referral commission of {}.",
                format_usd(*amount_cents)
            )],
            EmailTemplate::WithdrawalRequested {
                amount_cents,
                net_amount_cents,
                ..
            } => vec![
                format!(
                    "Your withdrawal request of {} has been received.",
                    format_usd(*amount_cents)
                ),
                format!("You will receive {} after fees.", format_usd(*net_amount_cents)),
            ],
            EmailTemplate::WithdrawalStatusChanged {
                status,
                amount_cents,
                note,
                ..
            } => {
                let mut lines = vec![format!(
                    "Your withdrawal of {} is now {status}.",
                    format_usd(*amount_cents)
                )];
                if *status == WithdrawalStatus::Rejected {
                    lines.push("The amount has been returned to your balance.".to_string());
                }
                if let Some(note) = note {
                    lines.push(format!("Note: {note}"));
                }
                lines
            }
            EmailTemplate::KycStatusChanged { status, note, .. } => {
                let mut lines = vec![format!("Your identity verification is now {status}.")];
                if let Some(note) = note {
                    lines.push(format!("Note: {note}"));
                }
                lines
            }
        };
        Body {
            greeting_name: self.name().to_string(),
            lines,
            action,
        }
    }

    /// Render the message for `app_name`, linking to `base_url`.
    pub fn render(&self, app_name: &str, base_url: &str) -> RenderedEmail {
        let base_url = base_url.trim_end_matches('/');
        let body = self.body(app_name, base_url);

        let mut text = format!("Hello {},\n\n", body.greeting_name);
        for line in &body.lines {
            let _ = writeln!(text, "{line}");
        }
        if let Some((label, url)) = &body.action {
            let _ = writeln!(text, "\n{label}: {url}");
        }
        let _ = write!(text, "\n-- \n{app_name}\n");

        let mut html = String::new();
        let _ = write!(
            html,
            "<!DOCTYPE html><html><body style=\"font-family:sans-serif\"><p>Hello {},</p>",
            escape_html(&body.greeting_name)
        );
        for line in &body.lines {
            let _ = write!(html, "<p>{}</p>", escape_html(line));
        }
        if let Some((label, url)) = &body.action {
            let _ = write!(
                html,
                "<p><a href=\"{}\">{}</a></p>",
                escape_html(url),
                escape_html(label)
            );
        }
        let _ = write!(html, "<p>{}</p></body></html>", escape_html(app_name));

        RenderedEmail {
            subject: self.subject(app_name),
            text,
            html,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(0), "$0.00");
        assert_eq!(format_usd(5), "$0.05");
        assert_eq!(format_usd(123_456), "$1,234.56");
        assert_eq!(format_usd(100_000_000), "$1,000,000.00");
        assert_eq!(format_usd(-100), "-$1.00");
    }

    #[test]
    fn test_format_bps() {
        assert_eq!(format_bps(400), "4%");
        assert_eq!(format_bps(450), "4.5%");
        assert_eq!(format_bps(425), "4.25%");
    }

    #[test]
    fn test_welcome_contains_referral_link() {
        let mail = EmailTemplate::Welcome {
            name: "Alice".to_string(),
            referral_code: "ABCD2345".to_string(),
        }
        .render("NSC Bot", "https://nsc.example/");
        assert_eq!(mail.subject, "Welcome to NSC Bot");
        assert!(mail.text.starts_with("Hello Alice,"));
        assert!(mail.text.contains("https://nsc.example/register?ref=ABCD2345"));
        assert!(mail.html.contains("href=\"https://nsc.example/dashboard\""));
    }

    #[test]
    fn test_user_input_escaped_in_html() {
        let mail = EmailTemplate::KycStatusChanged {
            name: "<script>".to_string(),
            status: KycStatus::Rejected,
            note: Some("blurry \"photo\"".to_string()),
        }
        .render("NSC Bot", "https://nsc.example");
        assert_eq!(mail.subject, "KYC verification rejected");
        assert!(mail.html.contains("&lt;script&gt;"));
        assert!(!mail.html.contains("<script>"));
        assert!(mail.html.contains("blurry &quot;photo&quot;"));
        assert!(mail.text.contains("Note: blurry \"photo\""));
    }

    #[test]
    fn test_rejected_withdrawal_mentions_refund() {
        let mail = EmailTemplate::WithdrawalStatusChanged {
            name: "Bob".to_string(),
            status: WithdrawalStatus::Rejected,
            amount_cents: 2_500,
            note: None,
        }
        .render("NSC Bot", "https://nsc.example");
        assert_eq!(mail.subject, "Withdrawal rejected");
        assert!(mail.text.contains("$25.00 is now rejected"));
        assert!(mail.text.contains("returned to your balance"));
    }

    #[test]
    fn test_roi_credit_subject() {
        let mail = EmailTemplate::RoiCredited {
            name: "Carol".to_string(),
            amount_cents: 40_000,
            payment_number: 3,
            max_payments: 12,
        }
        .render("NSC Bot", "https://nsc.example");
        assert_eq!(mail.subject, "ROI credited: $400.00");
        assert!(mail.text.contains("payment 3 of 12"));
    }
}
