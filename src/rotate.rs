//! In-place 90-degree rotation of photo files.
//!
//! The EXIF crate in use is read-only, so instead of rewriting the
//! orientation tag the rotation is baked into the pixels: decode honoring
//! any existing tag, rotate, re-encode without one.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::debug;

use crate::error::Error;

/// Rotate the photo at `path` 90 degrees clockwise, overwriting the file.
///
/// The rotation applies to the image as a viewer sees it: an orientation
/// tag in the source is folded in during decode, and the re-encoded file
/// carries the result in its pixels alone.
pub fn rotate_file(path: &Path) -> Result<(), Error> {
    let oriented = decode_oriented(path)?;
    let rotated = image::imageops::rotate90(&oriented);
    let format = ImageFormat::from_path(path)?;
    let out = match format {
        // JPEG carries no alpha channel.
        ImageFormat::Jpeg => DynamicImage::ImageRgba8(rotated).to_rgb8().into(),
        _ => DynamicImage::ImageRgba8(rotated),
    };
    out.save_with_format(path, format)?;
    Ok(())
}

/// Decode an image to RGBA8 with its EXIF orientation applied.
///
/// A vanished file surfaces as [`Error::NotFound`], like a cache-load miss.
pub fn decode_oriented(path: &Path) -> Result<RgbaImage, Error> {
    let reader = image::ImageReader::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.to_path_buf())
        } else {
            Error::Io(err)
        }
    })?;
    let img = reader.with_guessed_format()?.decode()?.to_rgba8();
    let orientation = read_orientation(path).unwrap_or(1);
    Ok(apply_orientation(img, orientation))
}

fn apply_orientation(img: RgbaImage, orientation: u16) -> RgbaImage {
    use image::imageops::{flip_horizontal, flip_vertical, rotate180, rotate270, rotate90};
    match orientation {
        2 => flip_horizontal(&img),
        3 => rotate180(&img),
        4 => flip_vertical(&img),
        5 => flip_horizontal(&rotate90(&img)),
        6 => rotate90(&img),
        7 => flip_horizontal(&rotate270(&img)),
        8 => rotate270(&img),
        _ => img,
    }
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)?;
    debug!(orientation = value, path = %path.display(), "exif orientation");
    Some(value as u16)
}
