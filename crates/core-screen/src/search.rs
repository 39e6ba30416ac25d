//! Pixel search used by the `wait_for_image` / `wait_for_color` actions.

use image::RgbaImage;

/// Channel-wise match within `tolerance` (alpha ignored).
pub fn color_matches(actual: [u8; 4], expected: [u8; 3], tolerance: u8) -> bool {
    actual[0].abs_diff(expected[0]) <= tolerance
        && actual[1].abs_diff(expected[1]) <= tolerance
        && actual[2].abs_diff(expected[2]) <= tolerance
}

/// Find the top-left position of `needle` inside `haystack`, comparing RGB
/// channels within `tolerance`. Scans row-major and returns the first hit.
///
/// Naive template scan with a first-pixel prefilter; screenshots are a few
/// megapixels and the needle is typically an icon, which keeps this well
/// under the inter-action delay in practice.
pub fn find_template(haystack: &RgbaImage, needle: &RgbaImage, tolerance: u8) -> Option<(u32, u32)> {
    let (hw, hh) = haystack.dimensions();
    let (nw, nh) = needle.dimensions();
    if nw == 0 || nh == 0 || nw > hw || nh > hh {
        return None;
    }

    let first = needle.get_pixel(0, 0).0;
    let first_rgb = [first[0], first[1], first[2]];

    for y in 0..=(hh - nh) {
        for x in 0..=(hw - nw) {
            if !color_matches(haystack.get_pixel(x, y).0, first_rgb, tolerance) {
                continue;
            }
            if window_matches(haystack, needle, x, y, tolerance) {
                return Some((x, y));
            }
        }
    }
    None
}

fn window_matches(
    haystack: &RgbaImage,
    needle: &RgbaImage,
    ox: u32,
    oy: u32,
    tolerance: u8,
) -> bool {
    for (nx, ny, px) in needle.enumerate_pixels() {
        let hp = haystack.get_pixel(ox + nx, oy + ny).0;
        if !color_matches(hp, [px.0[0], px.0[1], px.0[2]], tolerance) {
            return false;
        }
    }
    true
}
