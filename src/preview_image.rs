//! Preview image download, normalization and placeholder fallback.

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use log::{info, warn};
use zune_core::{colorspace::ColorSpace, options::DecoderOptions};
use zune_jpeg::JpegDecoder;

use crate::http_fetcher::ListingFetcher;
use crate::report::output_stem;

const PREVIEW_FALLBACK_STEM: &str = "preview";
const PLACEHOLDER_EDGE_PX: u32 = 512;
const PLACEHOLDER_FILL: Rgb<u8> = Rgb([224, 224, 224]);

/// How the preview file ended up on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewOutcome {
    Converted,
    RawBytes,
    Placeholder,
}

/// Encodes `image` as PNG beside `target_path`, then renames it into place so
/// a reader never sees a half-written preview.
fn write_png_atomically(image: &DynamicImage, target_path: &Path) -> Result<(), String> {
    let staging_path = target_path.with_extension("png.tmp");
    let written = image
        .save_with_format(&staging_path, ImageFormat::Png)
        .map_err(|err| format!("PNG encode failed: {err}"))
        .and_then(|()| {
            fs::rename(&staging_path, target_path)
                .map_err(|err| format!("PNG rename failed: {err}"))
        });
    if written.is_err() {
        let _ = fs::remove_file(&staging_path);
    }
    written
}

/// Lenient JPEG decode for previews with truncated or padded streams that
/// the strict `image` decoder rejects.
fn decode_lenient_jpeg(bytes: &[u8]) -> Option<DynamicImage> {
    if !bytes.starts_with(&[0xff, 0xd8]) {
        return None;
    }
    let mut decoder = JpegDecoder::new_with_options(
        bytes,
        DecoderOptions::new_cmd()
            .set_strict_mode(false)
            .jpeg_set_out_colorspace(ColorSpace::RGBA),
    );
    let rgba = decoder.decode().ok()?;
    let (width, height) = decoder.dimensions()?;
    image::RgbaImage::from_raw(u32::try_from(width).ok()?, u32::try_from(height).ok()?, rgba)
        .map(DynamicImage::ImageRgba8)
}

fn decode_preview(bytes: &[u8]) -> Option<DynamicImage> {
    image::load_from_memory(bytes)
        .ok()
        .or_else(|| decode_lenient_jpeg(bytes))
}

/// Composites transparent pixels onto white and drops the alpha channel.
fn flatten_onto_white(decoded: DynamicImage) -> RgbImage {
    if !decoded.color().has_alpha() {
        return decoded.to_rgb8();
    }
    let rgba = decoded.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [red, green, blue, alpha] = rgba.get_pixel(x, y).0;
        let blend = |channel: u8| -> u8 {
            let alpha = u32::from(alpha);
            ((u32::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255) as u8
        };
        Rgb([blend(red), blend(green), blend(blue)])
    })
}

pub fn preview_path(output_dir: &Path, model_file_name: &str) -> PathBuf {
    let stem = output_stem(model_file_name, PREVIEW_FALLBACK_STEM);
    output_dir.join(format!("{stem}.png"))
}

/// Writes downloaded preview bytes as an RGB PNG, or verbatim when undecodable.
fn write_preview_bytes(bytes: &[u8], target_path: &Path) -> Result<PreviewOutcome, String> {
    if let Some(decoded) = decode_preview(bytes) {
        let flattened = DynamicImage::ImageRgb8(flatten_onto_white(decoded));
        match write_png_atomically(&flattened, target_path) {
            Ok(()) => return Ok(PreviewOutcome::Converted),
            Err(reason) => warn!(
                "Preview image: {reason}, writing original bytes. path={}",
                target_path.display()
            ),
        }
    }
    fs::write(target_path, bytes)
        .map_err(|err| format!("Failed to write preview {}: {}", target_path.display(), err))?;
    Ok(PreviewOutcome::RawBytes)
}

fn write_placeholder(placeholder: Option<&Path>, target_path: &Path) -> Result<PreviewOutcome, String> {
    if let Some(placeholder) = placeholder {
        if placeholder.exists() {
            fs::copy(placeholder, target_path).map_err(|err| {
                format!(
                    "Failed to copy placeholder {}: {}",
                    placeholder.display(),
                    err
                )
            })?;
            return Ok(PreviewOutcome::Placeholder);
        }
        warn!(
            "Preview image: placeholder not found, using built-in. path={}",
            placeholder.display()
        );
    }
    let generated = DynamicImage::ImageRgb8(RgbImage::from_pixel(
        PLACEHOLDER_EDGE_PX,
        PLACEHOLDER_EDGE_PX,
        PLACEHOLDER_FILL,
    ));
    write_png_atomically(&generated, target_path).map_err(|reason| {
        format!("Failed to write placeholder {}: {reason}", target_path.display())
    })?;
    Ok(PreviewOutcome::Placeholder)
}

/// Saves `<output_dir>/<file stem>.png` from the preview URL or a placeholder.
pub fn save_preview_image(
    fetcher: &dyn ListingFetcher,
    preview_url: Option<&str>,
    model_file_name: &str,
    output_dir: &Path,
    placeholder: Option<&Path>,
) -> Result<(PathBuf, PreviewOutcome), String> {
    let target_path = preview_path(output_dir, model_file_name);
    fs::create_dir_all(output_dir).map_err(|err| {
        format!(
            "Failed to create output directory {}: {}",
            output_dir.display(),
            err
        )
    })?;

    if let Some(url) = preview_url {
        match fetcher.fetch_bytes(url) {
            Ok(bytes) => {
                let outcome = write_preview_bytes(&bytes, &target_path)?;
                info!(
                    "Preview image saved ({outcome:?}). path={}",
                    target_path.display()
                );
                return Ok((target_path, outcome));
            }
            Err(reason) => {
                warn!("Preview image: download failed, using placeholder: {reason}");
            }
        }
    }

    let outcome = write_placeholder(placeholder, &target_path)?;
    Ok((target_path, outcome))
}
