//! `DCTDecode` through `zune-jpeg`.

use crate::object::Dictionary;
use crate::object::dict::keys::COLOR_TRANSFORM;
use log::warn;
use std::io::Cursor;
use zune_jpeg::JpegDecoder;
use zune_jpeg::zune_core::colorspace::ColorSpace;
use zune_jpeg::zune_core::options::DecoderOptions;

/// Decode a baseline or progressive JPEG into interleaved 8-bit samples in the
/// color space of the image: gray, RGB or CMYK.
pub(crate) fn decode(data: &[u8], params: &Dictionary) -> Option<Vec<u8>> {
    let options = DecoderOptions::default()
        .set_max_width(u16::MAX as usize)
        .set_max_height(u16::MAX as usize);
    let mut decoder = JpegDecoder::new_with_options(Cursor::new(data), options);

    if let Err(e) = decoder.decode_headers() {
        warn!("failed to read JPEG headers: {e:?}");

        return None;
    }

    let color_transform = params.get_integer(COLOR_TRANSFORM);

    let out = match decoder.input_colorspace()? {
        // `/ColorTransform 0` means the samples are stored as RGB already.
        ColorSpace::YCbCr if color_transform == Some(0) => ColorSpace::YCbCr,
        ColorSpace::YCbCr | ColorSpace::RGB | ColorSpace::RGBA => ColorSpace::RGB,
        ColorSpace::Luma | ColorSpace::LumaA => ColorSpace::Luma,
        ColorSpace::CMYK | ColorSpace::YCCK => ColorSpace::CMYK,
        _ => ColorSpace::RGB,
    };

    decoder.set_options(options.jpeg_set_out_colorspace(out));

    match decoder.decode() {
        Ok(samples) => Some(samples),
        Err(e) => {
            warn!("failed to decode JPEG: {e:?}");

            None
        }
    }
}
