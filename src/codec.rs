//! Thumbnail rendering: decode, resize to a target box, re-encode.
//!
//! Pure functions with no shared state. Failures never propagate as
//! errors; a source that cannot be decoded simply yields `None` and the
//! item keeps an empty payload ("no thumbnail available").

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageFormat;
use std::path::Path;

/// A rendered thumbnail plus the source dimensions it was derived from.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Encoded JPEG bytes.
    pub payload: Vec<u8>,
    /// Thumbnail width after the fit.
    pub width: u32,
    /// Thumbnail height after the fit.
    pub height: u32,
    /// Width of the decoded source image.
    pub source_width: u32,
    /// Height of the decoded source image.
    pub source_height: u32,
}

/// Largest size that fits inside `box_w x box_h` preserving aspect ratio.
///
/// Exactly one dimension equals its box edge (both, when the ratios
/// match); the other is rounded and never exceeds the box. Sources smaller
/// than the box are scaled up. Neither returned dimension is ever zero.
pub fn fit_box(src_w: u32, src_h: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 || box_w == 0 || box_h == 0 {
        return (box_w.max(1), box_h.max(1));
    }

    let sw = src_w as u64;
    let sh = src_h as u64;
    let bw = box_w as u64;
    let bh = box_h as u64;

    if sw * bh >= sh * bw {
        // Width is the binding edge
        let h = ((sh * bw + sw / 2) / sw).clamp(1, bh) as u32;
        (box_w, h)
    } else {
        let w = ((sw * bh + sh / 2) / sh).clamp(1, bw) as u32;
        (w, box_h)
    }
}

/// Render a thumbnail for one source file.
///
/// The codec is picked from the file extension, falling back to content
/// sniffing when the extension is unknown. The decoded image is resized
/// with a fast triangle filter (thumbnail sizes hide the difference to
/// slower filters) and re-encoded as JPEG at `quality`.
pub fn render(path: &Path, box_w: u32, box_h: u32, quality: u8) -> Option<Rendered> {
    let reader = match ImageFormat::from_path(path) {
        Ok(format) => {
            let mut r = image::ImageReader::open(path)
                .map_err(|e| log::warn!("cannot open {}: {}", path.display(), e))
                .ok()?;
            r.set_format(format);
            r
        }
        Err(_) => image::ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| log::warn!("cannot open {}: {}", path.display(), e))
            .ok()?,
    };

    let img = match reader.decode() {
        Ok(img) => img,
        Err(e) => {
            log::warn!("failed to decode {}: {}", path.display(), e);
            return None;
        }
    };

    let (src_w, src_h) = (img.width(), img.height());
    let (thumb_w, thumb_h) = fit_box(src_w, src_h, box_w, box_h);

    // JPEG has no alpha channel, so flatten before encoding
    let resized = img.resize_exact(thumb_w, thumb_h, FilterType::Triangle).to_rgb8();

    let mut payload = Vec::new();
    if let Err(e) = JpegEncoder::new_with_quality(&mut payload, quality).encode_image(&resized) {
        log::warn!("failed to encode thumbnail for {}: {}", path.display(), e);
        return None;
    }

    Some(Rendered {
        payload,
        width: thumb_w,
        height: thumb_h,
        source_width: src_w,
        source_height: src_h,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path, w: u32, h: u32) {
        let img = image::RgbImage::from_fn(w, h, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn test_fit_box_wide_source() {
        assert_eq!(fit_box(200, 100, 120, 75), (120, 60));
    }

    #[test]
    fn test_fit_box_tall_source() {
        assert_eq!(fit_box(600, 800, 120, 75), (56, 75));
    }

    #[test]
    fn test_fit_box_upscales_small_source() {
        // One dimension lands exactly on the box edge even when scaling up
        assert_eq!(fit_box(50, 50, 120, 75), (75, 75));
    }

    #[test]
    fn test_fit_box_exact_ratio() {
        assert_eq!(fit_box(800, 600, 120, 75), (100, 75));
        assert_eq!(fit_box(240, 150, 120, 75), (120, 75));
    }

    #[test]
    fn test_fit_box_never_zero() {
        let (w, h) = fit_box(10_000, 1, 120, 75);
        assert_eq!(w, 120);
        assert!(h >= 1);
    }

    #[test]
    fn test_render_fits_target_box() {
        let dir = scratch_dir("thumbcache_codec_render");
        let src = dir.join("wide.png");
        write_png(&src, 200, 100);

        let rendered = render(&src, 120, 75, 75).unwrap();
        assert_eq!((rendered.width, rendered.height), (120, 60));
        assert_eq!((rendered.source_width, rendered.source_height), (200, 100));
        assert!(!rendered.payload.is_empty());

        // Payload must decode back as a JPEG of the stated size
        let round = image::load_from_memory(&rendered.payload).unwrap();
        assert_eq!((round.width(), round.height()), (120, 60));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_render_corrupt_file_is_none() {
        let dir = scratch_dir("thumbcache_codec_corrupt");
        let src = dir.join("broken.jpg");
        fs::write(&src, b"this is not a jpeg").unwrap();

        assert!(render(&src, 120, 75, 75).is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_render_missing_file_is_none() {
        let missing = Path::new("/nonexistent/thumbcache/missing.png");
        assert!(render(missing, 120, 75, 75).is_none());
    }
}
