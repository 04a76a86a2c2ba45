//! qrstudio command-line entrypoint

use clap::Parser;
use qrstudio::output::{ExportedFile, RenderedSession, render_session};
use qrstudio::{
    DownloadOutcome, Error, ExportFormat, Generator, LogoFile, LogoIntake, LogoOutcome,
    MemoryStore, OpenAiDrafter, ProfileForm, QrStudioConfig, RestStore, Result, Store,
    SubmitOutcome, TextField, logging,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "qrstudio",
    version,
    about = "Design, save and export branded QR codes for non-profits"
)]
struct Cli {
    /// Optional configuration file (toml/yaml). Defaults to qrstudio.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep users and saved codes in memory instead of the hosted store
    #[arg(long)]
    offline: bool,

    /// Output results as formatted JSON instead of human-readable text
    #[arg(long)]
    json: bool,

    /// URL encoded into the QR code
    #[arg(long, value_name = "URL")]
    url: String,

    /// Foreground color (#RGB or #RRGGBB)
    #[arg(long = "fg", value_name = "HEX")]
    foreground: Option<String>,

    /// Background color (#RGB or #RRGGBB)
    #[arg(long = "bg", value_name = "HEX")]
    background: Option<String>,

    /// Preview size in pixels (128-1024); exports are twice this
    #[arg(long, value_name = "PX")]
    size: Option<u32>,

    /// Logo image placed in the center of the code
    #[arg(long, value_name = "PATH")]
    logo: Option<PathBuf>,

    /// Organization description, used as-is
    #[arg(long, value_name = "TEXT", conflicts_with = "draft_description")]
    description: Option<String>,

    /// URL purpose, used as-is
    #[arg(long, value_name = "TEXT", conflicts_with = "draft_purpose")]
    purpose: Option<String>,

    /// Draft the organization description from a short seed
    #[arg(long, value_name = "SEED")]
    draft_description: Option<String>,

    /// Draft the URL purpose from a short seed
    #[arg(long, value_name = "SEED")]
    draft_purpose: Option<String>,

    /// Contact name; required to unlock downloads
    #[arg(long, value_name = "NAME")]
    name: Option<String>,

    /// Contact email; required to unlock downloads
    #[arg(long, value_name = "EMAIL")]
    email: Option<String>,

    /// Organization name
    #[arg(long, value_name = "NAME")]
    organization: Option<String>,

    /// Employer Identification Number (digits, dash optional)
    #[arg(long, value_name = "EIN")]
    ein: Option<String>,

    /// Download format; repeat for several (png, jpeg, pdf)
    #[arg(long = "format", value_name = "FORMAT")]
    formats: Vec<ExportFormat>,

    /// Directory the exports are written to
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = QrStudioConfig::load(cli.config.as_deref())?;
    if let Some(ref dir) = cli.out {
        config.export.output_dir = dir.clone();
    }

    logging::init(&config.logging)?;

    let store: Box<dyn Store> = if cli.offline {
        info!("Using in-memory store");
        Box::new(MemoryStore::new())
    } else {
        let (url, anon_key) = config.store.credentials()?;
        info!(url, "Using hosted store");
        Box::new(RestStore::new(url, anon_key)?)
    };
    let drafter = OpenAiDrafter::new(&config.ai);

    let mut generator = Generator::new();
    generator.set_url(cli.url.as_str());
    if let Some(ref color) = cli.foreground {
        generator.set_foreground(color.as_str());
    }
    if let Some(ref color) = cli.background {
        generator.set_background(color.as_str());
    }
    if let Some(size) = cli.size {
        generator.set_size(size);
    }
    // Fail on a bad color or size before anything is persisted.
    generator.style()?;

    if let Some(ref path) = cli.logo {
        let logo = attach_logo(LogoFile::from_path(path)?).await?;
        generator.set_logo(Some(logo));
    }

    for (field, text) in [
        (TextField::OrgDescription, &cli.description),
        (TextField::UrlPurpose, &cli.purpose),
    ] {
        if let Some(text) = text {
            let editable = generator.text_mut(field);
            editable.start_edit();
            editable.set_draft(text.as_str());
            editable.commit_edit();
        }
    }

    if !drafter.is_configured()
        && (cli.draft_description.is_some() || cli.draft_purpose.is_some())
    {
        return Err(Error::AiNotConfigured);
    }
    for (field, seed) in [
        (TextField::OrgDescription, &cli.draft_description),
        (TextField::UrlPurpose, &cli.draft_purpose),
    ] {
        let Some(seed) = seed else { continue };
        if !generator.draft_text(&drafter, field, seed).await {
            warn!(field = field.label(), "Draft was not applied");
        }
    }

    if cli.name.is_some() || cli.email.is_some() {
        submit_profile(&cli, &mut generator, store.as_ref()).await?;
    }

    let mut exports = Vec::new();
    let formats = if cli.formats.is_empty() {
        vec![ExportFormat::Png]
    } else {
        cli.formats.clone()
    };
    for format in formats {
        match generator
            .download(store.as_ref(), format, &config.export.output_dir)
            .await
        {
            DownloadOutcome::Saved { record, path } => exports.push(ExportedFile {
                format,
                path,
                record,
            }),
            DownloadOutcome::Locked => {
                info!("Downloads are locked until a profile is submitted");
                break;
            }
            DownloadOutcome::Failed => break,
        }
    }

    emit(&render_session(&generator, &exports), cli.json)?;

    match generator.error() {
        Some(message) => Err(Error::Other(message.to_string())),
        None => Ok(()),
    }
}

async fn attach_logo(file: LogoFile) -> Result<String> {
    let slot: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    let intake = LogoIntake::new(move |data_url| {
        if let Ok(mut current) = sink.lock() {
            *current = data_url;
        }
    });

    match intake.upload(file).await {
        LogoOutcome::Accepted => slot
            .lock()
            .ok()
            .and_then(|mut current| current.take())
            .ok_or_else(|| Error::Other("Logo was accepted but not delivered".to_string())),
        LogoOutcome::Rejected(message) => Err(Error::Validation(message)),
        LogoOutcome::Busy | LogoOutcome::Removed => {
            Err(Error::Other("Logo upload did not complete".to_string()))
        }
    }
}

async fn submit_profile(cli: &Cli, generator: &mut Generator, store: &dyn Store) -> Result<()> {
    let mut form = ProfileForm::new();
    form.set_name(cli.name.clone().unwrap_or_default());
    form.set_email(cli.email.clone().unwrap_or_default());
    if let Some(ref organization) = cli.organization {
        form.set_organization(organization.as_str());
    }
    if let Some(ref ein) = cli.ein {
        form.set_ein(ein);
    }

    let outcome = form
        .submit(|input| async move { generator.bind_user(store, &input).await })
        .await;

    match outcome {
        SubmitOutcome::Submitted(user) => {
            info!(user_id = %user.id, email = %user.email, "Profile submitted");
            Ok(())
        }
        SubmitOutcome::Blocked => {
            let message = form
                .email_error()
                .or(form.ein_error())
                .unwrap_or("Name and email are required");
            Err(Error::Validation(message.to_string()))
        }
        SubmitOutcome::Failed(message) => {
            warn!(%message, "Profile submission failed");
            Ok(())
        }
    }
}

fn emit(rendered: &RenderedSession, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&rendered.json)?);
    } else {
        for line in &rendered.human {
            println!("{line}");
        }
    }
    Ok(())
}
