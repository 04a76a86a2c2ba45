//! Generator state: everything the operator has configured so far
//!
//! The generator owns the transient design (URL, copy, colors, size, logo),
//! the bound user and a page-level error banner. Every action clears the
//! banner before it starts; failures set it again.

use crate::ai::{CompletionRequest, TextDrafter, TextField};
use crate::error::{Error, Result};
use crate::export::{self, ExportFormat};
use crate::logo;
use crate::qr::{self, QrEncoder, QrStyle};
use crate::store::{self, NewQrCode, QrCodeRecord, Store, User, UserInput};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Banner shown when drafting fails without a provider message
pub const GENERIC_AI_ERROR: &str = "Failed to generate text. Please try again.";

/// Banner shown when rasterization or file export fails
pub const GENERIC_DOWNLOAD_ERROR: &str = "Failed to download QR code. Please try again.";

/// A text field that toggles between display and edit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditableText {
    value: String,
    draft: Option<String>,
}

impl EditableText {
    /// Committed value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the field is in its edit sub-state
    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    /// Current draft, while editing
    pub fn draft(&self) -> Option<&str> {
        self.draft.as_deref()
    }

    /// Copy the committed value into the draft buffer.
    pub fn start_edit(&mut self) {
        self.draft = Some(self.value.clone());
    }

    /// Replace the draft buffer contents; ignored outside the edit sub-state.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        if let Some(draft) = self.draft.as_mut() {
            *draft = text.into();
        }
    }

    /// Copy the draft back into the committed value.
    pub fn commit_edit(&mut self) {
        if let Some(draft) = self.draft.take() {
            self.value = draft;
        }
    }

    /// Leave the edit sub-state without changing the committed value.
    pub fn cancel_edit(&mut self) {
        self.draft = None;
    }

    fn replace(&mut self, text: String) {
        self.value = text;
    }
}

/// Result of a download request
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    /// No user is bound yet; nothing was written anywhere
    Locked,
    /// The configuration was saved and the file written
    Saved {
        /// Stored configuration row
        record: QrCodeRecord,
        /// Exported file
        path: PathBuf,
    },
    /// Persisting or exporting failed; see [`Generator::error`]
    Failed,
}

/// Ticket for one in-flight drafting request
#[derive(Debug)]
pub struct DraftTicket {
    field: TextField,
    request: CompletionRequest,
}

impl DraftTicket {
    /// Field the completion will replace
    pub fn field(&self) -> TextField {
        self.field
    }

    /// Request to send to the provider
    pub fn request(&self) -> &CompletionRequest {
        &self.request
    }
}

/// Main generator state
#[derive(Debug, Clone)]
pub struct Generator {
    url: String,
    org_description: EditableText,
    url_purpose: EditableText,
    fg_color: String,
    bg_color: String,
    size: u32,
    logo: Option<String>,
    user: Option<User>,
    error: Option<String>,
    generating: bool,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            url: String::new(),
            org_description: EditableText::default(),
            url_purpose: EditableText::default(),
            fg_color: qr::DEFAULT_FOREGROUND.to_string(),
            bg_color: qr::DEFAULT_BACKGROUND.to_string(),
            size: qr::DEFAULT_SIZE,
            logo: None,
            user: None,
            error: None,
            generating: false,
        }
    }
}

impl Generator {
    /// Generator with default colors and size
    pub fn new() -> Self {
        Self::default()
    }

    /// Target URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Set the target URL.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Foreground color as entered
    pub fn foreground(&self) -> &str {
        &self.fg_color
    }

    /// Background color as entered
    pub fn background(&self) -> &str {
        &self.bg_color
    }

    /// Preview size in pixels
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Set the foreground color (`#RRGGBB`).
    pub fn set_foreground(&mut self, color: impl Into<String>) {
        self.fg_color = color.into();
    }

    /// Set the background color (`#RRGGBB`).
    pub fn set_background(&mut self, color: impl Into<String>) {
        self.bg_color = color.into();
    }

    /// Set the preview size in pixels.
    pub fn set_size(&mut self, size: u32) {
        self.size = size;
    }

    /// Logo callback target: `Some(data_url)` sets, `None` clears.
    pub fn set_logo(&mut self, data_url: Option<String>) {
        self.logo = data_url;
    }

    /// Whether a logo is set
    pub fn has_logo(&self) -> bool {
        self.logo.is_some()
    }

    /// One of the two editable text fields
    pub fn text(&self, field: TextField) -> &EditableText {
        match field {
            TextField::OrgDescription => &self.org_description,
            TextField::UrlPurpose => &self.url_purpose,
        }
    }

    /// Mutable access to one of the two editable text fields
    pub fn text_mut(&mut self, field: TextField) -> &mut EditableText {
        match field {
            TextField::OrgDescription => &mut self.org_description,
            TextField::UrlPurpose => &mut self.url_purpose,
        }
    }

    /// Bound user, once the profile form has been submitted
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Whether downloads are unlocked
    pub fn can_download(&self) -> bool {
        self.user.is_some()
    }

    /// Page-level error banner
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a drafting request is in flight
    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Colors and size as a validated style
    pub fn style(&self) -> Result<QrStyle> {
        QrStyle::from_hex(&self.fg_color, &self.bg_color, self.size)
    }

    /// Save (or merge) the user and bind the result.
    pub async fn bind_user(&mut self, store: &dyn Store, input: &UserInput) -> Result<User> {
        self.error = None;
        match store::save_user(store, input).await {
            Ok(user) => {
                info!(user_id = %user.id, "User bound, downloads unlocked");
                self.user = Some(user.clone());
                Ok(user)
            }
            Err(err) => {
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Start drafting `field` from `seed`, or `None` while another draft is in flight.
    pub fn begin_draft(&mut self, field: TextField, seed: &str) -> Option<DraftTicket> {
        if self.generating {
            return None;
        }
        self.error = None;
        self.generating = true;
        Some(DraftTicket {
            field,
            request: CompletionRequest::for_field(field, seed),
        })
    }

    /// Apply a completion: success replaces the field, failure sets the banner.
    pub fn finish_draft(&mut self, ticket: DraftTicket, result: Result<String>) -> bool {
        self.generating = false;
        match result {
            Ok(text) => {
                let field = self.text_mut(ticket.field);
                field.cancel_edit();
                field.replace(text);
                true
            }
            Err(err) => {
                warn!(field = ticket.field.label(), error = %err, "Drafting failed");
                let message = err.to_string();
                self.error = Some(if message.trim().is_empty() {
                    GENERIC_AI_ERROR.to_string()
                } else {
                    message
                });
                false
            }
        }
    }

    /// Draft `field` through `drafter`. Returns `false` without calling the
    /// provider when another draft is already in flight.
    pub async fn draft_text(
        &mut self,
        drafter: &dyn TextDrafter,
        field: TextField,
        seed: &str,
    ) -> bool {
        let Some(ticket) = self.begin_draft(field, seed) else {
            return false;
        };
        let result = drafter.complete(ticket.request()).await;
        self.finish_draft(ticket, result)
    }

    /// Configuration row describing the current design
    pub fn snapshot(&self, user: &User) -> NewQrCode {
        NewQrCode {
            user_id: user.id,
            url: self.url.clone(),
            org_description: self.org_description.value.clone(),
            url_purpose: self.url_purpose.value.clone(),
            fg_color: self.fg_color.clone(),
            bg_color: self.bg_color.clone(),
            size: self.size,
            has_logo: self.logo.is_some(),
        }
    }

    fn encoder(&self) -> Result<QrEncoder> {
        let logo = self
            .logo
            .as_deref()
            .map(logo::decode_data_url)
            .transpose()?;
        Ok(QrEncoder::new(self.style()?).with_logo(logo))
    }

    /// On-screen preview at 1×.
    pub fn preview(&self) -> Result<RgbImage> {
        self.encoder()?.render(&self.url, 1)
    }

    /// Full-resolution export raster (2×, white background).
    pub fn rasterize(&self) -> Result<RgbImage> {
        self.encoder()?.rasterize(&self.url)
    }

    /// Persist the configuration, then write `format` into `dir`.
    pub async fn download(
        &mut self,
        store: &dyn Store,
        format: ExportFormat,
        dir: &Path,
    ) -> DownloadOutcome {
        let Some(user) = self.user.clone() else {
            return DownloadOutcome::Locked;
        };
        self.error = None;

        if self.url.trim().is_empty() {
            self.error = Some(
                Error::Validation("Enter a URL before downloading".to_string()).to_string(),
            );
            return DownloadOutcome::Failed;
        }

        let record = match store::save_qr_code(store, &self.snapshot(&user)).await {
            Ok(record) => record,
            Err(err) => {
                self.error = Some(err.to_string());
                return DownloadOutcome::Failed;
            }
        };

        match self
            .rasterize()
            .and_then(|image| export::write(&image, format, dir))
        {
            Ok(path) => DownloadOutcome::Saved { record, path },
            Err(err) => {
                warn!(error = %err, %format, "Export failed");
                self.error = Some(GENERIC_DOWNLOAD_ERROR.to_string());
                DownloadOutcome::Failed
            }
        }
    }
}
