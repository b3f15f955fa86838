use crate::error::CaptionError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::{Cursor, Read};
use std::path::Path;

const UPLOAD_QUALITY: u8 = 90;

/// Decode, orient and downscale an image, returning JPEG bytes ready to
/// send to a vision model.
///
/// Undecodable files surface as `CorruptImage`; a file that cannot be
/// opened at all is a generation failure for that item.
pub fn prepare_for_upload(path: &Path, max_edge: u32) -> Result<Vec<u8>, CaptionError> {
    let orientation = read_orientation(path);
    let mut img = decode_image(path)?;

    if img.width() > max_edge || img.height() > max_edge {
        img = img.resize(max_edge, max_edge, FilterType::Triangle);
    }
    if orientation != 1 {
        img = apply_orientation(img, orientation);
    }

    encode_jpeg(&img)
}

fn decode_image(path: &Path) -> Result<DynamicImage, CaptionError> {
    ImageReader::open(path)
        .map_err(|e| CaptionError::Generation(format!("Failed to open image {}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| CaptionError::Generation(format!("Failed to read image {}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| CaptionError::CorruptImage(format!("Failed to decode image {}: {}", path.display(), e)))
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, CaptionError> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, UPLOAD_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| CaptionError::Generation(format!("Failed to encode image for upload: {}", e)))?;
    Ok(buffer.into_inner())
}

/// EXIF orientation from the file header, 1 when absent or unreadable.
fn read_orientation(path: &Path) -> u32 {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return 1,
    };

    // Read first 128KB (covers most EXIF headers)
    let mut header_buf = Vec::with_capacity(128 * 1024);
    if file.take(128 * 1024).read_to_end(&mut header_buf).is_err() {
        return 1;
    }

    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(&header_buf)) {
        Ok(e) => e,
        Err(_) => return 1,
    };

    match exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY) {
        Some(field) => match field.value {
            exif::Value::Short(ref v) => *v.first().unwrap_or(&1) as u32,
            exif::Value::Long(ref v) => *v.first().unwrap_or(&1),
            _ => 1,
        },
        None => 1,
    }
}

fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
