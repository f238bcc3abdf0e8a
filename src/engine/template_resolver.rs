//! # Template Variable Resolver
//!
//! Single-pass placeholder substitution for outreach email and task text.
//! The token table is fixed: there is no expression language, no nesting, and
//! no recursion. Anything the render context cannot supply resolves to an
//! empty string so a half-populated CRM record never leaks placeholder syntax
//! or "undefined" into outgoing copy.
//!
//! ## Supported tokens
//!
//! ```text
//! {{contact.firstName}} {{contact.lastName}} {{contact.fullName}}
//! {{contact.email}} {{contact.phone}} {{contact.position}}
//! {{client.name}} {{client.industry}}
//! {{deal.name}} {{deal.value}} {{deal.stage}}
//! {{user.name}} {{user.email}}
//! {{today}} {{tomorrow}} {{nextWeek}}
//! ```

use crate::models::{Client, Contact, Deal, User};
use chrono::{DateTime, Duration, Utc};

const DATE_FORMAT: &str = "%B %-d, %Y";

/// Entity snapshots available to one render pass.
///
/// `now` is injected by the caller so rendered dates are deterministic under
/// test and consistent across the subject and body of a single email.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub contact: Option<&'a Contact>,
    pub client: Option<&'a Client>,
    pub deal: Option<&'a Deal>,
    pub user: Option<&'a User>,
    pub now: DateTime<Utc>,
}

impl<'a> RenderContext<'a> {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            contact: None,
            client: None,
            deal: None,
            user: None,
            now,
        }
    }

    pub fn with_contact(mut self, contact: Option<&'a Contact>) -> Self {
        self.contact = contact;
        self
    }

    pub fn with_client(mut self, client: Option<&'a Client>) -> Self {
        self.client = client;
        self
    }

    pub fn with_deal(mut self, deal: Option<&'a Deal>) -> Self {
        self.deal = deal;
        self
    }

    pub fn with_user(mut self, user: Option<&'a User>) -> Self {
        self.user = user;
        self
    }
}

/// Resolves `{{...}}` placeholders against a [`RenderContext`].
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    default_currency: String,
}

impl TemplateResolver {
    pub fn new(default_currency: impl Into<String>) -> Self {
        Self {
            default_currency: default_currency.into(),
        }
    }

    /// Replace every known token in `text`. Unknown `{{...}}` spans are left
    /// as-is; known tokens with no backing data become empty strings.
    pub fn resolve(&self, text: &str, ctx: &RenderContext<'_>) -> String {
        let mut out = text.to_string();
        for (token, value) in self.bindings(ctx) {
            if out.contains(token) {
                out = out.replace(token, &value);
            }
        }
        out
    }

    fn bindings(&self, ctx: &RenderContext<'_>) -> [(&'static str, String); 16] {
        let contact = ctx.contact;
        let client = ctx.client;
        let deal = ctx.deal;
        let user = ctx.user;

        [
            (
                "{{contact.firstName}}",
                opt_field(contact.and_then(|c| c.first_name.as_deref())),
            ),
            (
                "{{contact.lastName}}",
                opt_field(contact.and_then(|c| c.last_name.as_deref())),
            ),
            (
                "{{contact.fullName}}",
                contact.map(Contact::full_name).unwrap_or_default(),
            ),
            (
                "{{contact.email}}",
                opt_field(contact.and_then(|c| c.email.as_deref())),
            ),
            (
                "{{contact.phone}}",
                opt_field(contact.and_then(|c| c.phone.as_deref())),
            ),
            (
                "{{contact.position}}",
                opt_field(contact.and_then(|c| c.position.as_deref())),
            ),
            (
                "{{client.name}}",
                client.map(|c| c.name.clone()).unwrap_or_default(),
            ),
            (
                "{{client.industry}}",
                opt_field(client.and_then(|c| c.industry.as_deref())),
            ),
            (
                "{{deal.name}}",
                deal.map(|d| d.name.clone()).unwrap_or_default(),
            ),
            ("{{deal.value}}", self.deal_value(deal)),
            (
                "{{deal.stage}}",
                opt_field(deal.and_then(|d| d.stage.as_deref())),
            ),
            (
                "{{user.name}}",
                user.map(|u| u.name.clone()).unwrap_or_default(),
            ),
            (
                "{{user.email}}",
                opt_field(user.and_then(|u| u.email.as_deref())),
            ),
            ("{{today}}", format_date(ctx.now)),
            ("{{tomorrow}}", format_date(ctx.now + Duration::days(1))),
            ("{{nextWeek}}", format_date(ctx.now + Duration::days(7))),
        ]
    }

    fn deal_value(&self, deal: Option<&Deal>) -> String {
        let Some(deal) = deal else {
            return String::new();
        };
        let Some(value) = deal.value else {
            return String::new();
        };
        let currency = deal.currency.as_deref().unwrap_or(&self.default_currency);
        format_currency(value, currency)
    }
}

fn opt_field(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn format_date(date: DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Render a monetary amount with a currency symbol (or code prefix for
/// currencies without one), thousands grouping, and two decimals.
fn format_currency(value: f64, currency: &str) -> String {
    let amount = group_thousands(value);
    match currency {
        "USD" => format!("${amount}"),
        "EUR" => format!("\u{20ac}{amount}"),
        "GBP" => format!("\u{a3}{amount}"),
        other => format!("{other} {amount}"),
    }
}

fn group_thousands(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (whole, frac) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn contact() -> Contact {
        Contact {
            id: 1,
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            phone: None,
            position: Some("CTO".to_string()),
            client_id: Some(5),
        }
    }

    fn deal(value: Option<f64>, currency: Option<&str>) -> Deal {
        Deal {
            id: 3,
            name: "Analytical Engine".to_string(),
            value,
            currency: currency.map(String::from),
            stage: Some("negotiation".to_string()),
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_contact_tokens_resolve() {
        let resolver = TemplateResolver::new("USD");
        let contact = contact();
        let ctx = RenderContext::at(fixed_now()).with_contact(Some(&contact));

        let out = resolver.resolve("Hi {{contact.firstName}} ({{contact.fullName}})", &ctx);
        assert_eq!(out, "Hi Ada (Ada Lovelace)");
    }

    #[test]
    fn test_missing_entities_resolve_to_empty() {
        let resolver = TemplateResolver::new("USD");
        let ctx = RenderContext::at(fixed_now());

        let out = resolver.resolve(
            "Hi {{contact.firstName}}, re {{deal.name}} at {{client.name}}",
            &ctx,
        );
        assert_eq!(out, "Hi , re  at ");
    }

    #[test]
    fn test_missing_field_on_present_contact_is_empty() {
        let resolver = TemplateResolver::new("USD");
        let contact = contact();
        let ctx = RenderContext::at(fixed_now()).with_contact(Some(&contact));

        assert_eq!(resolver.resolve("Call {{contact.phone}} now", &ctx), "Call  now");
    }

    #[test]
    fn test_deal_value_usd_grouping() {
        let resolver = TemplateResolver::new("USD");
        let deal = deal(Some(1234567.5), Some("USD"));
        let ctx = RenderContext::at(fixed_now()).with_deal(Some(&deal));

        assert_eq!(resolver.resolve("{{deal.value}}", &ctx), "$1,234,567.50");
    }

    #[test]
    fn test_deal_value_symbol_and_code_currencies() {
        let resolver = TemplateResolver::new("USD");

        let eur = deal(Some(900.0), Some("EUR"));
        let ctx = RenderContext::at(fixed_now()).with_deal(Some(&eur));
        assert_eq!(resolver.resolve("{{deal.value}}", &ctx), "\u{20ac}900.00");

        let sek = deal(Some(12000.0), Some("SEK"));
        let ctx = RenderContext::at(fixed_now()).with_deal(Some(&sek));
        assert_eq!(resolver.resolve("{{deal.value}}", &ctx), "SEK 12,000.00");
    }

    #[test]
    fn test_deal_value_falls_back_to_default_currency() {
        let resolver = TemplateResolver::new("GBP");
        let deal = deal(Some(50.0), None);
        let ctx = RenderContext::at(fixed_now()).with_deal(Some(&deal));

        assert_eq!(resolver.resolve("{{deal.value}}", &ctx), "\u{a3}50.00");
    }

    #[test]
    fn test_deal_without_value_is_empty() {
        let resolver = TemplateResolver::new("USD");
        let deal = deal(None, Some("USD"));
        let ctx = RenderContext::at(fixed_now()).with_deal(Some(&deal));

        assert_eq!(resolver.resolve("worth {{deal.value}}", &ctx), "worth ");
    }

    #[test]
    fn test_date_tokens_use_injected_now() {
        let resolver = TemplateResolver::new("USD");
        let ctx = RenderContext::at(fixed_now());

        assert_eq!(resolver.resolve("{{today}}", &ctx), "March 5, 2026");
        assert_eq!(resolver.resolve("{{tomorrow}}", &ctx), "March 6, 2026");
        assert_eq!(resolver.resolve("{{nextWeek}}", &ctx), "March 12, 2026");
    }

    #[test]
    fn test_repeated_token_replaced_everywhere() {
        let resolver = TemplateResolver::new("USD");
        let contact = contact();
        let ctx = RenderContext::at(fixed_now()).with_contact(Some(&contact));

        let out = resolver.resolve("{{contact.firstName}}, {{contact.firstName}}!", &ctx);
        assert_eq!(out, "Ada, Ada!");
    }

    #[test]
    fn test_unknown_tokens_left_untouched() {
        let resolver = TemplateResolver::new("USD");
        let ctx = RenderContext::at(fixed_now());

        assert_eq!(
            resolver.resolve("{{contact.nickname}} stays", &ctx),
            "{{contact.nickname}} stays"
        );
    }
}
