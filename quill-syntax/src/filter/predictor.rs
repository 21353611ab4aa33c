//! PNG and TIFF predictors for `FlateDecode` and `LZWDecode`.

use crate::object::Dictionary;
use crate::object::dict::keys::{BITS_PER_COMPONENT, COLORS, COLUMNS, EARLY_CHANGE, PREDICTOR};
use log::warn;

pub(crate) struct PredictorParams {
    pub(crate) predictor: i64,
    colors: usize,
    bits_per_component: usize,
    columns: usize,
    pub(crate) early_change: bool,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
            early_change: true,
        }
    }
}

impl PredictorParams {
    pub(crate) fn from_dict(dict: &Dictionary) -> Self {
        let positive = |key: &[u8], default: usize| {
            dict.get_integer(key)
                .and_then(|v| usize::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };

        Self {
            predictor: dict.get_integer(PREDICTOR).unwrap_or(1),
            colors: positive(COLORS, 1),
            bits_per_component: positive(BITS_PER_COMPONENT, 8),
            columns: positive(COLUMNS, 1),
            early_change: dict.get_integer(EARLY_CHANGE).unwrap_or(1) != 0,
        }
    }

    fn bytes_per_pixel(&self) -> usize {
        (self.bits_per_component * self.colors).div_ceil(8)
    }

    fn row_len(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }
}

pub(crate) fn apply(data: Vec<u8>, params: &PredictorParams) -> Option<Vec<u8>> {
    match params.predictor {
        1 => Some(data),
        2 => tiff(data, params),
        10..=15 => png(&data, params),
        other => {
            warn!("unknown predictor {other}");

            None
        }
    }
}

fn png(data: &[u8], params: &PredictorParams) -> Option<Vec<u8>> {
    let row_len = params.row_len();
    let bpp = params.bytes_per_pixel();

    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0_u8; row_len];
    let mut row = vec![0_u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let (&kind, input) = chunk.split_first()?;

        // A truncated last row is padded with zeros.
        row.fill(0);
        row[..input.len()].copy_from_slice(input);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };

            let predicted = match kind {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    warn!("invalid PNG predictor type {other}");

                    return None;
                }
            };

            row[i] = row[i].wrapping_add(predicted);
        }

        out.extend_from_slice(&row[..input.len()]);
        std::mem::swap(&mut prev, &mut row);
    }

    Some(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn tiff(mut data: Vec<u8>, params: &PredictorParams) -> Option<Vec<u8>> {
    let row_len = params.row_len();
    let colors = params.colors;

    match params.bits_per_component {
        8 => {
            for row in data.chunks_mut(row_len) {
                for i in colors..row.len() {
                    row[i] = row[i].wrapping_add(row[i - colors]);
                }
            }
        }
        16 => {
            let step = colors * 2;

            for row in data.chunks_mut(row_len) {
                let mut i = step;

                while i + 1 < row.len() {
                    let cur = u16::from_be_bytes([row[i], row[i + 1]]);
                    let left = u16::from_be_bytes([row[i - step], row[i - step + 1]]);
                    row[i..i + 2].copy_from_slice(&cur.wrapping_add(left).to_be_bytes());
                    i += 2;
                }
            }
        }
        bpc => {
            warn!("TIFF predictor with {bpc} bits per component is unsupported");

            return None;
        }
    }

    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(predictor: i64, colors: usize, columns: usize) -> PredictorParams {
        PredictorParams {
            predictor,
            colors,
            bits_per_component: 8,
            columns,
            early_change: true,
        }
    }

    #[test]
    fn png_up() {
        let data = vec![2, 1, 2, 3, 2, 1, 1, 1];
        assert_eq!(
            apply(data, &params(12, 1, 3)).unwrap(),
            vec![1, 2, 3, 2, 3, 4]
        );
    }

    #[test]
    fn png_sub_and_paeth() {
        let data = vec![1, 1, 1, 1, 4, 0, 0, 0];
        assert_eq!(
            apply(data, &params(15, 1, 3)).unwrap(),
            vec![1, 2, 3, 1, 2, 3]
        );
    }

    #[test]
    fn tiff_rgb() {
        let data = vec![10, 20, 30, 1, 2, 3];
        assert_eq!(
            apply(data, &params(2, 3, 2)).unwrap(),
            vec![10, 20, 30, 11, 22, 33]
        );
    }
}
