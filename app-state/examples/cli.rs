use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, ImageFormat};

use app_error::AppError;
use app_state::{
    imaging,
    overlay::{OutfitOverlay, OutfitRenderer, TryOn},
    store::StateStore,
};
use data_outfit::{Outfit, OutfitId};
use kv_storage::{file_db::FileDb, DB_FILE_NAME};

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        println!("Usage:");
        println!(" cargo run --example cli status <data-dir>");
        println!(" cargo run --example cli photo <data-dir> <image-file>");
        println!(" cargo run --example cli try-on <data-dir> <outfit-id> <outfit-image-file>");
        println!(" cargo run --example cli favorite <data-dir> <outfit-id>");
        println!(" cargo run --example cli reset <data-dir>");
        return Ok(());
    }

    let command = &args[1];
    let data_dir = Path::new(&args[2]);
    let store = open_store(data_dir).await;
    match command.as_str() {
        "status" => status_command(&store),
        "photo" => photo_command(&store, &args).await,
        "try-on" => try_on_command(store, data_dir, &args).await,
        "favorite" => favorite_command(&store, &args).await,
        "reset" => reset_command(&store).await,
        _ => {
            eprintln!(
                "Invalid command. Use 'status', 'photo', 'try-on', \
                 'favorite' or 'reset'."
            );
            Ok(())
        }
    }
}

async fn open_store(data_dir: &Path) -> Arc<StateStore> {
    let db =
        FileDb::new("app".to_string(), &data_dir.join(DB_FILE_NAME));
    Arc::new(StateStore::open(Arc::new(db)).await)
}

fn status_command(store: &StateStore) -> Result<()> {
    let state = store.snapshot();
    println!("rehydration: {:?}", store.rehydration());
    println!(
        "photo: {}",
        if state.user_photo.is_some() {
            "set"
        } else {
            "none"
        }
    );
    println!(
        "current outfit: {}",
        state
            .current_outfit
            .map(|outfit| outfit.name)
            .unwrap_or_else(|| "none".to_owned())
    );
    println!("guest try-ons: {}", state.guest_try_ons);
    println!(
        "favorites: {}",
        state
            .favorites
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("cached composites: {}", state.processed_images.len());
    Ok(())
}

async fn photo_command(store: &StateStore, args: &[String]) -> Result<()> {
    if args.len() < 4 {
        println!("Usage: cargo run --example cli photo <data-dir> <image-file>");
        return Ok(());
    }

    let path = Path::new(&args[3]);
    let bytes = std::fs::read(path).context("Failed to read image file")?;
    let uri = imaging::prepare_photo(&bytes, guess_mime(path))
        .context("Photo was rejected")?;
    store.set_user_photo(Some(uri));
    store.flush().await;
    println!("Photo stored; cached composites were cleared");
    Ok(())
}

async fn try_on_command(
    store: Arc<StateStore>,
    data_dir: &Path,
    args: &[String],
) -> Result<()> {
    if args.len() < 5 {
        println!("Usage: cargo run --example cli try-on <data-dir> <outfit-id> <outfit-image-file>");
        return Ok(());
    }

    let outfit = Outfit::new(
        OutfitId::new(args[3].clone()),
        args[3].clone(),
        args[4].clone(),
    );
    let overlay = OutfitOverlay::new(store.clone(), Arc::new(LocalRenderer));

    match overlay.try_on(&outfit, false).await {
        TryOn::Generated(image) => {
            let out = save_composite(&image, data_dir)?;
            println!("Generated composite saved to {}", out.display());
        }
        TryOn::Cached(image) => {
            let out = save_composite(&image, data_dir)?;
            println!("Cached composite saved to {}", out.display());
        }
        TryOn::MissingPhoto => {
            println!("Upload a photo first: cli photo <data-dir> <image-file>");
        }
        TryOn::FreeLimitReached => {
            println!("Free try-ons used up; reset to start over");
        }
        TryOn::Failed => println!("Rendering failed, see the log"),
    }
    store.flush().await;
    Ok(())
}

async fn favorite_command(
    store: &StateStore,
    args: &[String],
) -> Result<()> {
    if args.len() < 4 {
        println!("Usage: cargo run --example cli favorite <data-dir> <outfit-id>");
        return Ok(());
    }

    let id = OutfitId::new(args[3].clone());
    store.toggle_favorite(id.clone());
    if store.is_favorite(&id) {
        println!("Added {} to favorites", id);
    } else {
        println!("Removed {} from favorites", id);
    }
    store.flush().await;
    Ok(())
}

async fn reset_command(store: &StateStore) -> Result<()> {
    store.reset_state();
    store.flush().await;
    println!("Session state reset");
    Ok(())
}

/// Stands in for the hosted image generation backend: pastes the garment,
/// read from a local file, over the lower half of the photo.
struct LocalRenderer;

#[async_trait]
impl OutfitRenderer for LocalRenderer {
    async fn render(
        &self,
        photo: &str,
        outfit: &Outfit,
    ) -> app_error::Result<String> {
        let (_, bytes) = imaging::decode_data_uri(photo)?;
        let base = image::load_from_memory(&bytes)
            .map_err(|err| AppError::Image(err.to_string()))?;
        let garment = image::open(&outfit.image_url)
            .map_err(|err| AppError::Image(err.to_string()))?;

        let mut canvas = base.to_rgba8();
        let garment = garment.resize(
            canvas.width() / 2,
            canvas.height() / 2,
            FilterType::Triangle,
        );
        let x = i64::from((canvas.width() - garment.width()) / 2);
        let y = i64::from(canvas.height() - garment.height());
        image::imageops::overlay(&mut canvas, &garment.to_rgba8(), x, y);

        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|err| AppError::Image(err.to_string()))?;
        Ok(imaging::encode_data_uri(buf.get_ref(), "image/png"))
    }
}

fn save_composite(image: &str, data_dir: &Path) -> Result<PathBuf> {
    let (_, bytes) = imaging::decode_data_uri(image)
        .context("Composite is not a data URI")?;
    let out = data_dir.join("last-result.png");
    std::fs::write(&out, bytes).context("Failed to write composite")?;
    Ok(out)
}

fn guess_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
