//! Linear 16-bit quantization onto a float domain.

/// Largest raw quantized value.
pub const U16_MAX_F: f32 = 65535.0;

/// Maps `raw` onto `[min, max]`.
///
/// Written as a two-sided lerp so that `0` yields exactly `min` and `65535`
/// yields exactly `max`.
#[inline]
#[must_use]
pub fn dequantize_u16(raw: u16, min: f32, max: f32) -> f32 {
    let t = f32::from(raw) / U16_MAX_F;
    min * (1.0 - t) + max * t
}

/// Maps `value` from `[min, max]` to the nearest raw value. Out-of-domain
/// values clamp.
#[inline]
#[must_use]
pub fn quantize_u16(value: f32, min: f32, max: f32) -> u16 {
    let span = max - min;
    if span <= 0.0 {
        return 0;
    }
    let t = ((value - min) / span).clamp(0.0, 1.0);
    // Clamped to [0, 65535] above, the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let raw = (t * U16_MAX_F).round() as u16;
    raw
}

/// Dequantizes three components against per-axis domains.
#[inline]
#[must_use]
pub fn dequantize_vec3(raw: [u16; 3], min: [f32; 3], max: [f32; 3]) -> [f32; 3] {
    [
        dequantize_u16(raw[0], min[0], max[0]),
        dequantize_u16(raw[1], min[1], max[1]),
        dequantize_u16(raw[2], min[2], max[2]),
    ]
}

/// Dequantizes two components against per-axis domains.
#[inline]
#[must_use]
pub fn dequantize_vec2(raw: [u16; 2], min: [f32; 2], max: [f32; 2]) -> [f32; 2] {
    [
        dequantize_u16(raw[0], min[0], max[0]),
        dequantize_u16(raw[1], min[1], max[1]),
    ]
}
