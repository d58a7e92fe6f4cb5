//! Display rotation of video streams.
//!
//! Rotation comes either from a `rotate` metadata tag or from a display
//! matrix attached to the stream as side data. The tag wins when both are
//! present.

use crate::container::Input;
use crate::types::{tag, SideDataKind, StreamInfo};
use crate::{Error, Result};

/// Size in bytes of a serialized display matrix.
pub const DISPLAY_MATRIX_SIZE: usize = 9 * 4;

/// Display rotation of input stream `index` in degrees, within `[0, 360)`.
pub fn rotation<I: Input>(input: &I, index: usize) -> Result<i64> {
    let stream = input.streams().get(index).ok_or_else(|| {
        Error::invalid_argument(format!(
            "stream index {} out of range ({} streams)",
            index,
            input.streams().len()
        ))
    })?;
    Ok(stream_rotation(stream))
}

/// Rotation of a stream descriptor in degrees, within `[0, 360)`.
pub fn stream_rotation(stream: &StreamInfo) -> i64 {
    if let Some(value) = tag(&stream.metadata, "rotate") {
        return leading_int(value).rem_euclid(360);
    }

    stream
        .side_data
        .iter()
        .find(|sd| sd.kind == SideDataKind::DisplayMatrix && sd.data.len() >= DISPLAY_MATRIX_SIZE)
        .map(|sd| {
            let theta = display_matrix_rotation(&matrix_from_bytes(&sd.data));
            let theta = if theta.is_nan() {
                0.0
            } else {
                (theta + 360.0) % 360.0
            };
            ((theta + 0.5) as i64).rem_euclid(360)
        })
        .unwrap_or(0)
}

/// Counter-clockwise angle in degrees encoded by a display matrix.
///
/// The result lies in `[-180, 180]`, or is NaN when the matrix is degenerate.
pub fn display_matrix_rotation(matrix: &[i32; 9]) -> f64 {
    let scale0 = f64::from(matrix[0]).hypot(f64::from(matrix[3]));
    let scale1 = f64::from(matrix[1]).hypot(f64::from(matrix[4]));

    if scale0 == 0.0 || scale1 == 0.0 {
        return f64::NAN;
    }

    let rotation = (f64::from(matrix[1]) / scale1).atan2(f64::from(matrix[0]) / scale0);
    -rotation.to_degrees()
}

/// Display matrix for a pure rotation that [`display_matrix_rotation`]
/// decodes back to `angle` degrees.
pub fn display_matrix(angle: f64) -> [i32; 9] {
    let radians = angle.to_radians();
    let c = (radians.cos() * 65536.0).round() as i32;
    let s = (radians.sin() * 65536.0).round() as i32;

    let mut matrix = [0i32; 9];
    matrix[0] = c;
    matrix[1] = -s;
    matrix[3] = s;
    matrix[4] = c;
    matrix[8] = 1 << 30;
    matrix
}

/// Serialize a display matrix into native-endian side data bytes.
pub fn display_matrix_bytes(matrix: &[i32; 9]) -> Vec<u8> {
    matrix.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

fn matrix_from_bytes(data: &[u8]) -> [i32; 9] {
    let mut matrix = [0i32; 9];
    for (value, chunk) in matrix.iter_mut().zip(data.chunks_exact(4)) {
        *value = i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    matrix
}

/// Parse the leading integer of a tag value, ignoring leading whitespace and
/// anything after the digits. Returns 0 when there is no number.
fn leading_int(value: &str) -> i64 {
    let s = value.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut n: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        n = n.saturating_mul(10).saturating_add(i64::from(b - b'0'));
    }
    if negative {
        -n
    } else {
        n
    }
}
