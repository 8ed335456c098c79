//! Template Renderer - Personalizes subject and body content

use regex::{NoExpand, Regex};
use uuid::Uuid;

use sendloop_common::types::Variant;

/// Static pricing content for one variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantContent {
    pub price_huf: u32,
    pub original_price_huf: u32,
    pub discount_percent: u8,
    pub badge: Option<&'static str>,
    pub positioning: &'static str,
    pub emphasis: &'static str,
}

const VARIANT_A: VariantContent = VariantContent {
    price_huf: 990,
    original_price_huf: 7990,
    discount_percent: 87,
    badge: None,
    positioning: "Kezdd el most 990 Ft-ért",
    emphasis: "Mindenki számára elérhető ár - nincs kockázat!",
};

const VARIANT_B: VariantContent = VariantContent {
    price_huf: 1990,
    original_price_huf: 7990,
    discount_percent: 75,
    badge: Some("⭐ LEGJOBB ÉRTÉK"),
    positioning: "Fele áron, teljes elemzés",
    emphasis: "Legtöbben ezt választják - tökéletes ár-érték arány!",
};

const VARIANT_C: VariantContent = VariantContent {
    price_huf: 2990,
    original_price_huf: 7990,
    discount_percent: 63,
    badge: Some("👑 PRÉMIUM MINŐSÉG"),
    positioning: "Professzionális, teljes körű értékelés",
    emphasis: "A legmélyebb betekintés - befektetés az önmagadba!",
};

impl VariantContent {
    /// Look up the content block for a variant
    pub fn for_variant(variant: Variant) -> &'static VariantContent {
        match variant {
            Variant::A => &VARIANT_A,
            Variant::B => &VARIANT_B,
            Variant::C => &VARIANT_C,
        }
    }
}

/// Built-in newsletter body used by campaign delivery
pub const DEFAULT_NEWSLETTER_BODY: &str = r#"<!DOCTYPE html>
<html lang="hu">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Csakra Elemzés - Különleges Ajánlat</title>
</head>
<body style="margin: 0; padding: 0; background-color: #f9f9f9; color: #333; font-family: Arial, sans-serif; line-height: 1.6;">
  <div style="max-width: 600px; margin: 0 auto; background-color: #ffffff;">
    <div style="background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); padding: 45px 30px; text-align: center;">
      <h1 style="color: #ffffff; margin: 0;">Miért Érzed Magad Kimerültnek Minden Nap?</h1>
    </div>
    <div style="padding: 30px;">
      <p>Kedves {{name}}!</p>
      <p>A csakráid egyensúlya többet árul el rólad, mint gondolnád. A teljes
      elemzés megmutatja, melyik energiaközpontod blokkolt, és mit tehetsz ellene.</p>
      <div style="border: 2px solid #667eea; border-radius: 12px; padding: 25px; margin: 25px 0; text-align: center;">
        <div style="color: #667eea; font-weight: bold;">{{badge}}</div>
        <h2 style="margin: 10px 0;">{{positioning}}</h2>
        <p style="font-size: 15px;">
          <span style="text-decoration: line-through; color: #999;">{{original_price}} Ft</span>
          <span style="font-size: 28px; font-weight: bold; color: #333;"> {{price}} Ft</span>
          <span style="background-color: #e53e3e; color: #fff; border-radius: 4px; padding: 2px 8px;">-{{discount}}%</span>
        </p>
        <p style="font-style: italic;">{{emphasis}}</p>
      </div>
      <p>Az ajánlat korlátozott ideig érvényes.</p>
    </div>
    <div style="padding: 20px 30px; background-color: #f5f5f5; text-align: center; font-size: 12px; color: #999;">
      <p>Ezt a levelet a(z) {{email}} címre küldtük.</p>
      <p><a href="{{unsubscribe_url}}" style="color: #999;">Leiratkozás</a></p>
    </div>
  </div>
</body>
</html>
"#;

/// Template renderer for personalizing email content
pub struct TemplateRenderer {
    /// Base URL for unsubscribe links
    unsubscribe_base_url: String,
}

impl TemplateRenderer {
    /// Create a new template renderer
    pub fn new(unsubscribe_base_url: String) -> Self {
        Self {
            unsubscribe_base_url,
        }
    }

    /// Render a template for one recipient
    ///
    /// Placeholders are case-insensitive. A missing name falls back to
    /// the local part of the email address.
    pub fn render(
        &self,
        template: &str,
        name: &str,
        email: &str,
        campaign_id: Option<Uuid>,
    ) -> String {
        let display_name = display_name(name, email);

        let mut result = replace_placeholder(template, "name", &display_name);
        result = replace_placeholder(&result, "email", email);

        // Unsubscribe URL
        let token = self.generate_unsubscribe_token(email, campaign_id);
        let unsubscribe_url = format!("{}/{}", self.unsubscribe_base_url, token);
        result = replace_placeholder(&result, "unsubscribe_url", &unsubscribe_url);

        // Clean up any remaining placeholders
        remove_unused_placeholders(&result)
    }

    /// Render a template with a variant's pricing content substituted in
    pub fn render_with_variant(
        &self,
        template: &str,
        name: &str,
        email: &str,
        variant: Variant,
        campaign_id: Option<Uuid>,
    ) -> String {
        let content = VariantContent::for_variant(variant);

        let mut result = replace_placeholder(template, "price", &format_huf(content.price_huf));
        result = replace_placeholder(
            &result,
            "original_price",
            &format_huf(content.original_price_huf),
        );
        result = replace_placeholder(&result, "discount", &content.discount_percent.to_string());
        result = replace_placeholder(&result, "badge", content.badge.unwrap_or(""));
        result = replace_placeholder(&result, "positioning", content.positioning);
        result = replace_placeholder(&result, "emphasis", content.emphasis);

        self.render(&result, name, email, campaign_id)
    }

    /// Render a subject line for one recipient
    pub fn render_subject(&self, subject: &str, name: &str, email: &str) -> String {
        let display_name = display_name(name, email);

        let mut result = replace_placeholder(subject, "name", &display_name);
        result = replace_placeholder(&result, "email", email);

        remove_unused_placeholders(&result)
    }

    /// Generate unsubscribe token for a recipient
    fn generate_unsubscribe_token(&self, email: &str, campaign_id: Option<Uuid>) -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        use sha2::{Digest, Sha256};

        let payload = match campaign_id {
            Some(id) => format!("{}:{}", email, id),
            None => email.to_string(),
        };

        let mut hasher = Sha256::new();
        hasher.update(&payload);
        let hash = hasher.finalize();
        let hash_prefix = &hash[..8];

        let token_data = format!("{}:{}", payload, hex::encode(hash_prefix));
        URL_SAFE_NO_PAD.encode(token_data.as_bytes())
    }

    /// Parse unsubscribe token and extract email
    pub fn parse_unsubscribe_token(&self, token: &str) -> Option<(String, Option<Uuid>)> {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let decoded = URL_SAFE_NO_PAD.decode(token).ok()?;
        let token_data = String::from_utf8(decoded).ok()?;

        // Split by last colon to get hash
        let parts: Vec<&str> = token_data.rsplitn(2, ':').collect();
        if parts.len() != 2 {
            return None;
        }

        let payload = parts[1];
        let _hash_hex = parts[0];

        if let Some((email, campaign_id_str)) = payload.split_once(':') {
            let campaign_id = Uuid::parse_str(campaign_id_str).ok();
            Some((email.to_string(), campaign_id))
        } else {
            Some((payload.to_string(), None))
        }
    }
}

fn display_name(name: &str, email: &str) -> String {
    let trimmed = name.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    email.split('@').next().unwrap_or(email).to_string()
}

fn replace_placeholder(content: &str, placeholder: &str, value: &str) -> String {
    let re = Regex::new(&format!(r"(?i)\{{\{{{}\}}\}}", placeholder)).unwrap();
    re.replace_all(content, NoExpand(value)).to_string()
}

/// Remove unused placeholder variables
fn remove_unused_placeholders(content: &str) -> String {
    let re = Regex::new(r"\{\{[^}]+\}\}").unwrap();
    re.replace_all(content, "").to_string()
}

/// Format a forint amount with space-grouped thousands
fn format_huf(amount: u32) -> String {
    let digits = amount.to_string();
    let mut grouped = String::new();
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new("https://mail.example.com/unsubscribe".to_string())
    }

    #[test]
    fn test_render_basic_template() {
        let template = "Hello {{name}}, your email is {{email}}";
        let result = renderer().render(template, "John Doe", "test@example.com", None);

        assert_eq!(result, "Hello John Doe, your email is test@example.com");
    }

    #[test]
    fn test_render_placeholders_case_insensitive() {
        let template = "Hello {{Name}}, your email is {{EMAIL}}";
        let result = renderer().render(template, "John Doe", "test@example.com", None);

        assert_eq!(result, "Hello John Doe, your email is test@example.com");
    }

    #[test]
    fn test_render_name_falls_back_to_local_part() {
        let result = renderer().render("Szia {{name}}!", "  ", "anna.kovacs@example.com", None);

        assert_eq!(result, "Szia anna.kovacs!");
    }

    #[test]
    fn test_render_removes_unused() {
        let template = "Hello {{name}}, {{unknown_var}} test";
        let result = renderer().render(template, "John Doe", "test@example.com", None);

        assert_eq!(result, "Hello John Doe,  test");
    }

    #[test]
    fn test_render_unsubscribe_url() {
        let r = renderer();
        let campaign_id = Uuid::new_v4();
        let result = r.render(
            "{{unsubscribe_url}}",
            "John",
            "test@example.com",
            Some(campaign_id),
        );

        let token = result
            .strip_prefix("https://mail.example.com/unsubscribe/")
            .expect("rendered URL should start with the base URL");
        let (email, parsed_campaign) = r.parse_unsubscribe_token(token).unwrap();
        assert_eq!(email, "test@example.com");
        assert_eq!(parsed_campaign, Some(campaign_id));
    }

    #[test]
    fn test_render_subject() {
        let result = renderer().render_subject("{{name}}, itt az eredményed", "", "anna@example.com");

        assert_eq!(result, "anna, itt az eredményed");
    }

    #[test]
    fn test_render_with_variant_pricing() {
        let template = "Ár: {{price}} Ft ({{discount}}% kedvezmény) - {{positioning}}";
        let result = renderer().render_with_variant(
            template,
            "Anna",
            "anna@example.com",
            Variant::B,
            None,
        );

        assert_eq!(
            result,
            "Ár: 1 990 Ft (75% kedvezmény) - Fele áron, teljes elemzés"
        );
    }

    #[test]
    fn test_render_with_variant_badge() {
        let r = renderer();

        // Variant A has no badge, the placeholder resolves to nothing
        let a = r.render_with_variant("[{{badge}}]", "x", "x@example.com", Variant::A, None);
        assert_eq!(a, "[]");

        let b = r.render_with_variant("[{{badge}}]", "x", "x@example.com", Variant::B, None);
        assert_eq!(b, "[⭐ LEGJOBB ÉRTÉK]");
    }

    #[test]
    fn test_variant_table() {
        let a = VariantContent::for_variant(Variant::A);
        assert_eq!(a.price_huf, 990);
        assert_eq!(a.discount_percent, 87);
        assert_eq!(a.badge, None);

        let b = VariantContent::for_variant(Variant::B);
        assert_eq!(b.price_huf, 1990);
        assert_eq!(b.discount_percent, 75);

        let c = VariantContent::for_variant(Variant::C);
        assert_eq!(c.price_huf, 2990);
        assert_eq!(c.original_price_huf, 7990);
        assert_eq!(c.discount_percent, 63);
    }

    #[test]
    fn test_format_huf() {
        assert_eq!(format_huf(990), "990");
        assert_eq!(format_huf(1990), "1 990");
        assert_eq!(format_huf(7990), "7 990");
        assert_eq!(format_huf(1234567), "1 234 567");
    }

    #[test]
    fn test_default_body_renders_completely() {
        let r = renderer();
        let campaign_id = Uuid::new_v4();
        let result = r.render_with_variant(
            DEFAULT_NEWSLETTER_BODY,
            "Anna",
            "anna@example.com",
            Variant::C,
            Some(campaign_id),
        );

        assert!(result.contains("Kedves Anna!"));
        assert!(result.contains("2 990 Ft"));
        assert!(result.contains("-63%"));
        assert!(result.contains("👑 PRÉMIUM MINŐSÉG"));
        assert!(result.contains("https://mail.example.com/unsubscribe/"));
        // Every placeholder resolved or stripped
        assert!(!result.contains("{{"));
    }

    #[test]
    fn test_unsubscribe_token_roundtrip() {
        let r = renderer();
        let email = "test@example.com";
        let campaign_id = Some(Uuid::new_v4());

        let token = r.generate_unsubscribe_token(email, campaign_id);
        let (parsed_email, parsed_campaign) = r.parse_unsubscribe_token(&token).unwrap();

        assert_eq!(parsed_email, email);
        assert_eq!(parsed_campaign, campaign_id);
    }

    #[test]
    fn test_unsubscribe_token_without_campaign() {
        let r = renderer();

        let token = r.generate_unsubscribe_token("solo@example.com", None);
        let (parsed_email, parsed_campaign) = r.parse_unsubscribe_token(&token).unwrap();

        assert_eq!(parsed_email, "solo@example.com");
        assert_eq!(parsed_campaign, None);
    }

    #[test]
    fn test_parse_unsubscribe_token_rejects_garbage() {
        assert_eq!(renderer().parse_unsubscribe_token("not base64 at all!!"), None);
    }
}
