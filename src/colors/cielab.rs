//! CIELAB (D65) to sRGB conversion

/// D65 reference white, 2° observer
const WHITE: [f64; 3] = [0.95047, 1.0, 1.08883];

/// Linear sRGB from CIE XYZ
const RGB_FROM_XYZ: [[f64; 3]; 3] = [
    [3.240_481_34, -1.537_151_52, -0.498_536_33],
    [-0.969_254_95, 1.875_990_00, 0.041_555_93],
    [0.055_646_64, -0.204_041_34, 1.057_311_07],
];

fn lab_f_inverse(t: f64) -> f64 {
    if t > 6.0 / 29.0 {
        t * t * t
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

fn gamma(v: f64) -> f64 {
    if v > 0.003_130_8 {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    } else {
        12.92 * v
    }
}

/// sRGB channels in `[0, 1]` for a CIELAB colour, clipped to the gamut
pub fn lab_to_rgb(l: f64, a: f64, b: f64) -> [f64; 3] {
    let fy = (l + 16.0) / 116.0;
    let fx = a / 500.0 + fy;
    // Negative z is outside the colour space
    let fz = (fy - b / 200.0).max(0.0);

    let xyz = [
        WHITE[0] * lab_f_inverse(fx),
        WHITE[1] * lab_f_inverse(fy),
        WHITE[2] * lab_f_inverse(fz),
    ];

    let mut rgb = [0.0; 3];
    for (channel, row) in rgb.iter_mut().zip(RGB_FROM_XYZ.iter()) {
        let linear: f64 = row.iter().zip(xyz.iter()).map(|(m, v)| m * v).sum();
        *channel = gamma(linear).clamp(0.0, 1.0);
    }
    rgb
}

/// `#rrggbb` for channels in `[0, 1]` (truncating, like `int(v * 255)`)
pub fn hex(rgb: [f64; 3]) -> String {
    let byte = |v: f64| (v.clamp(0.0, 1.0) * 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", byte(rgb[0]), byte(rgb[1]), byte(rgb[2]))
}

/// Hex colour for a point of the unit square: `x` and `y` span the `a`
/// and `b` axes over `[-128, 128]` at lightness `l`
pub fn cielab_hex_from_xy(x: f64, y: f64, l: f64) -> String {
    let a = (x - 0.5) * 2.0 * 128.0;
    let b = (y - 0.5) * 2.0 * 128.0;
    hex(lab_to_rgb(l, a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_grey() {
        let rgb = lab_to_rgb(70.0, 0.0, 0.0);
        assert!((rgb[0] - rgb[1]).abs() < 1e-3);
        assert!((rgb[1] - rgb[2]).abs() < 1e-3);
        // L = 70 is a light grey, roughly #ababab
        assert!((rgb[0] * 255.0 - 171.0).abs() < 2.0);
    }

    #[test]
    fn test_white_and_black() {
        assert!(lab_to_rgb(100.0, 0.0, 0.0).iter().all(|&c| c > 0.999));
        assert_eq!(hex(lab_to_rgb(0.0, 0.0, 0.0)), "#000000");
    }

    #[test]
    fn test_axes_map_to_hues() {
        // +a is red-ish, -a green-ish
        let red = lab_to_rgb(70.0, 60.0, 0.0);
        let green = lab_to_rgb(70.0, -60.0, 0.0);
        assert!(red[0] > red[1]);
        assert!(green[1] > green[0]);
    }

    #[test]
    fn test_hex_format() {
        assert_eq!(hex([1.0, 0.5, 0.0]), "#ff7f00");
        assert_eq!(cielab_hex_from_xy(0.5, 0.5, 70.0).len(), 7);
    }
}
