//! Helpers for rendering a generator session for the terminal

use crate::ai::TextField;
use crate::export::ExportFormat;
use crate::generator::Generator;
use crate::store::QrCodeRecord;
use serde_json::{Map, Value, json};
use std::path::PathBuf;

/// One exported file and the configuration row saved for it
#[derive(Debug, Clone)]
pub struct ExportedFile {
    /// Format written
    pub format: ExportFormat,
    /// Path on disk
    pub path: PathBuf,
    /// Row inserted into `qr_codes`
    pub record: QrCodeRecord,
}

/// Combined structured and human-readable representation of a session
#[derive(Debug, Clone)]
pub struct RenderedSession {
    /// Structured JSON representation suitable for scripting
    pub json: Value,
    /// Human-readable lines for terminal presentation
    pub human: Vec<String>,
}

/// Render the generator state and the files produced into both forms.
pub fn render_session(generator: &Generator, exports: &[ExportedFile]) -> RenderedSession {
    let json = session_value(generator, exports);
    let mut human = Vec::new();

    human.push(format!("QR code for {}", generator.url()));
    human.push(format!(
        "  Colors: {} on {}",
        generator.foreground(),
        generator.background()
    ));
    human.push(format!("  Size: {}px", generator.size()));
    human.push(format!(
        "  Logo: {}",
        if generator.has_logo() { "yes" } else { "no" }
    ));

    for field in [TextField::OrgDescription, TextField::UrlPurpose] {
        let value = generator.text(field).value();
        if !value.is_empty() {
            human.push(format!("  {}: {}", capitalize(field.label()), value));
        }
    }

    match generator.user() {
        Some(user) => human.push(format!("  User: {} <{}>", user.name, user.email)),
        None => human.push("  User: not submitted, downloads locked".to_string()),
    }

    for export in exports {
        human.push(format!(
            "  Saved {} to {}",
            export.format,
            export.path.display()
        ));
    }

    if let Some(error) = generator.error() {
        human.push(format!("  Error: {error}"));
    }

    RenderedSession { json, human }
}

fn session_value(generator: &Generator, exports: &[ExportedFile]) -> Value {
    let mut root = Map::new();
    root.insert("url".to_string(), Value::String(generator.url().to_string()));
    root.insert(
        "style".to_string(),
        json!({
            "foreground": generator.foreground(),
            "background": generator.background(),
            "size": generator.size(),
            "has_logo": generator.has_logo(),
        }),
    );
    root.insert(
        "org_description".to_string(),
        Value::String(generator.text(TextField::OrgDescription).value().to_string()),
    );
    root.insert(
        "url_purpose".to_string(),
        Value::String(generator.text(TextField::UrlPurpose).value().to_string()),
    );
    root.insert(
        "user".to_string(),
        generator.user().map_or(Value::Null, |user| {
            json!({
                "id": user.id.to_string(),
                "email": user.email,
                "name": user.name,
                "organization": user.organization,
                "ein": user.ein.as_ref().map(|ein| ein.as_str()),
                "app_ids": user.app_ids,
            })
        }),
    );
    root.insert(
        "exports".to_string(),
        Value::Array(
            exports
                .iter()
                .map(|export| {
                    json!({
                        "format": export.format,
                        "path": export.path.display().to_string(),
                        "qr_code_id": export.record.id.to_string(),
                    })
                })
                .collect(),
        ),
    );
    root.insert(
        "error".to_string(),
        generator
            .error()
            .map_or(Value::Null, |error| Value::String(error.to_string())),
    );
    Value::Object(root)
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_session_reports_locked_downloads() {
        let mut generator = Generator::new();
        generator.set_url("https://harbor.org/give");

        let rendered = render_session(&generator, &[]);
        assert_eq!(rendered.json["url"], "https://harbor.org/give");
        assert_eq!(rendered.json["style"]["size"], 256);
        assert!(rendered.json["user"].is_null());
        assert!(
            rendered
                .human
                .iter()
                .any(|line| line.contains("downloads locked"))
        );
    }

    #[test]
    fn capitalizes_labels() {
        assert_eq!(capitalize("organization description"), "Organization description");
        assert_eq!(capitalize(""), "");
    }
}
