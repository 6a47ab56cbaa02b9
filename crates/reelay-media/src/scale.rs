//! Output geometry rules for the encoder.

use std::path::Path;

/// Neither output dimension may exceed this many pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 1920;

/// ffmpeg `scale` filter that bounds the long side and keeps aspect ratio.
///
/// The long side is clamped to `min(bound, input)`. The other side is `-2`:
/// proportional, rounded to an even value as libx264 requires.
#[must_use]
pub fn scale_filter(max_width: u32, max_height: u32) -> String {
    format!(
        "scale=if(gte(iw\\,ih)\\,min({max_width}\\,iw)\\,-2):if(lt(iw\\,ih)\\,min({max_height}\\,ih)\\,-2)"
    )
}

/// Output size the [`scale_filter`] rule yields for a `width`×`height` input.
///
/// Landscape and square inputs are bounded by width, portrait inputs by
/// height. The proportional side is rounded down to the nearest even number.
#[must_use]
pub fn scaled_dimensions(width: u32, height: u32, bound: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    if width >= height {
        let w = width.min(bound);
        (w, proportional_even(height, w, width))
    } else {
        let h = height.min(bound);
        (proportional_even(width, h, height), h)
    }
}

fn proportional_even(side: u32, target: u32, reference: u32) -> u32 {
    let scaled = u64::from(side) * u64::from(target) / u64::from(reference);
    // `scaled <= side`, so it always fits back into u32.
    u32::try_from(scaled).unwrap_or(u32::MAX) & !1
}

/// Suffix for the transcoded file: the source extension including the dot,
/// or the whole file name when there is no extension.
#[must_use]
pub fn output_suffix(source: &Path) -> String {
    match source.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}
