//! qrstudio - QR code designer for non-profit operators
//!
//! This library holds everything behind the `qrstudio` command: the profile
//! form, logo intake, AI-drafted copy, persistence against a hosted
//! PostgREST store, and PNG/JPEG/PDF export of the styled code.
//!
//! # Features
//!
//! - **Profile form**: email and EIN validation with live EIN formatting
//! - **Logo intake**: size/dimension checks, compression, data-URL hand-off
//! - **Persistence**: find-or-create users by email, one row per download
//! - **Drafting**: chat-completion copy for the description and URL purpose
//! - **Export**: 2× rasters on white, or a centered US-Letter PDF
//!
//! # Example
//!
//! ```no_run
//! use qrstudio::{ExportFormat, Generator, MemoryStore, ProfileForm, SubmitOutcome};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = MemoryStore::new();
//!     let store_ref: &dyn qrstudio::Store = &store;
//!     let mut generator = Generator::new();
//!     generator.set_url("https://harbor.org/give");
//!
//!     let mut form = ProfileForm::new();
//!     form.set_name("Harbor Food Bank");
//!     form.set_email("ops@harbor.org");
//!     let bound = &mut generator;
//!     let outcome = form
//!         .submit(|input| async move { bound.bind_user(store_ref, &input).await })
//!         .await;
//!     if let SubmitOutcome::Submitted(user) = outcome {
//!         println!("Bound {}", user.email);
//!     }
//!
//!     let outcome = generator
//!         .download(store_ref, ExportFormat::Png, std::path::Path::new("."))
//!         .await;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod ai;
pub mod config;
pub mod error;
pub mod export;
pub mod generator;
pub mod logging;
pub mod logo;
pub mod output;
pub mod profile;
pub mod qr;
pub mod store;

// Re-exports for convenience
pub use error::{Error, Result};

pub use ai::{CompletionRequest, OpenAiDrafter, TextDrafter, TextField};
pub use config::{
    AiOptions, ExportOptions, LogRotation, LoggingOptions, QrStudioConfig, StoreOptions,
};
pub use export::{ExportFormat, PdfPlacement};
pub use generator::{DownloadOutcome, EditableText, Generator};
pub use logo::{LogoFile, LogoIntake, LogoOutcome};
pub use profile::{Ein, ProfileForm, SubmitOutcome};
pub use qr::{QrEncoder, QrStyle};
pub use store::{MemoryStore, RestStore, Store, User, UserInput};
