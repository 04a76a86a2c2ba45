use std::io::Cursor;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use qrstudio::store::{APP_ID, StoreOp};
use qrstudio::{
    DownloadOutcome, ExportFormat, Generator, LogoFile, LogoIntake, LogoOutcome, MemoryStore,
    ProfileForm, Store, SubmitOutcome,
};

fn decode(path: &std::path::Path) -> String {
    let gray = image::open(path).expect("open export").to_luma8();
    let mut prepared = rqrr::PreparedImage::prepare(gray);
    let grids = prepared.detect_grids();
    assert!(!grids.is_empty(), "no QR code detected");
    let (_meta, content) = grids[0].decode().expect("decode grid");
    content
}

fn logo_png() -> Vec<u8> {
    let logo = RgbaImage::from_fn(300, 300, |x, y| {
        if (x / 30 + y / 30) % 2 == 0 {
            Rgba([200, 30, 30, 255])
        } else {
            Rgba([30, 30, 200, 255])
        }
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(logo)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode logo");
    bytes
}

async fn bind(generator: &mut Generator, store: &dyn Store) -> SubmitOutcome {
    let mut form = ProfileForm::new();
    form.set_name("Harbor Food Bank");
    form.set_email("ops@harbor.org");
    form.set_ein("123456789");
    form.submit(|input| async move { generator.bind_user(store, &input).await })
        .await
}

#[tokio::test]
async fn downloads_stay_locked_until_profile_is_submitted() {
    let store = MemoryStore::new();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut generator = Generator::new();
    generator.set_url("https://harbor.org/give");

    let outcome = generator
        .download(&store, ExportFormat::Png, dir.path())
        .await;
    assert!(matches!(outcome, DownloadOutcome::Locked));
    assert_eq!(store.call_count(StoreOp::InsertQrCode), 0);
    assert!(!dir.path().join("qr-code.png").exists());
}

#[tokio::test]
async fn submitted_profile_unlocks_every_format() {
    let store = MemoryStore::new();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut generator = Generator::new();
    generator.set_url("https://harbor.org/give");
    generator.set_foreground("#1a4d2e");

    let outcome = bind(&mut generator, &store).await;
    let SubmitOutcome::Submitted(user) = outcome else {
        panic!("profile was not submitted: {outcome:?}");
    };
    assert!(user.has_app(APP_ID));
    assert_eq!(user.ein.as_ref().map(|ein| ein.as_str()), Some("12-3456789"));
    assert!(generator.can_download());
    assert_eq!(
        store.visit(user.id, APP_ID).map(|visit| visit.visit_count),
        Some(1)
    );

    for format in [ExportFormat::Png, ExportFormat::Jpeg, ExportFormat::Pdf] {
        match generator.download(&store, format, dir.path()).await {
            DownloadOutcome::Saved { record, path } => {
                assert_eq!(path, dir.path().join(format.file_name()));
                assert_eq!(record.config.user_id, user.id);
                assert_eq!(record.config.fg_color, "#1a4d2e");
            }
            other => panic!("{format} download failed: {other:?}"),
        }
    }

    assert_eq!(store.qr_codes().len(), 3);
    assert_eq!(decode(&dir.path().join("qr-code.png")), "https://harbor.org/give");
}

#[tokio::test]
async fn failed_save_writes_no_file() {
    let store = MemoryStore::new();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut generator = Generator::new();
    generator.set_url("https://harbor.org/give");
    assert!(matches!(
        bind(&mut generator, &store).await,
        SubmitOutcome::Submitted(_)
    ));

    store.fail_on(StoreOp::InsertQrCode);
    let outcome = generator
        .download(&store, ExportFormat::Png, dir.path())
        .await;

    assert!(matches!(outcome, DownloadOutcome::Failed));
    assert!(generator.error().is_some());
    assert!(!dir.path().join("qr-code.png").exists());
}

#[tokio::test]
async fn accepted_logo_is_embedded_and_still_scans() {
    let store = MemoryStore::new();
    let dir = tempfile::tempdir().expect("tempdir");

    let slot: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    let intake = LogoIntake::new(move |data_url| {
        *sink.lock().expect("logo slot") = data_url;
    });
    let outcome = intake.upload(LogoFile::new("image/png", logo_png())).await;
    assert_eq!(outcome, LogoOutcome::Accepted);

    let data_url = slot.lock().expect("logo slot").clone();
    assert!(
        data_url
            .as_deref()
            .is_some_and(|url| url.starts_with("data:image/"))
    );

    let mut generator = Generator::new();
    generator.set_url("https://harbor.org/give");
    generator.set_logo(data_url);
    assert!(matches!(
        bind(&mut generator, &store).await,
        SubmitOutcome::Submitted(_)
    ));

    match generator
        .download(&store, ExportFormat::Png, dir.path())
        .await
    {
        DownloadOutcome::Saved { record, path } => {
            assert!(record.config.has_logo);
            assert_eq!(decode(&path), "https://harbor.org/give");
        }
        other => panic!("download failed: {other:?}"),
    }

    assert_eq!(intake.remove(), LogoOutcome::Removed);
    assert!(slot.lock().expect("logo slot").is_none());
}
