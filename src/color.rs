//! LED colour from encoder movement
//!
//! The status LED's hue rotates with the encoder count read on each tick.
//! Duties are scaled to the expander's PWM period so the brightest channel
//! sits at `period * brightness`.

use rgb::RGB16;

/// Hue in `[0, 1)` for a signed encoder count, one degree per tick.
pub fn hue_for_count(count: i32) -> f64 {
    count.rem_euclid(360) as f64 / 360.0
}

/// HSV to RGB with all components in `[0, 1]`.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// PWM duties for the RGB pins given this tick's encoder count.
pub fn led_duty(count: i32, period: u16, brightness: f64) -> RGB16 {
    let (r, g, b) = hsv_to_rgb(hue_for_count(count), 1.0, 1.0);
    let scale = |c: f64| (c * period as f64 * brightness) as u16;
    RGB16 {
        r: scale(r),
        g: scale(g),
        b: scale(b),
    }
}
