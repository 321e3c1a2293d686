//! Choropleth color scale and legend buckets for prediction maps.
//!
//! Predicted values are mapped onto a blue-to-red hue ramp (low to high) and
//! summarized by fixed-width legend buckets. The same [`color`] function
//! feeds both feature fills and legend swatches so the two cannot drift.

use crate::format;

/// Width of one legend bucket in prediction units.
pub const BUCKET_WIDTH: f64 = 500.0;

/// Fill used for features whose prediction is absent or not a number.
pub const MISSING_VALUE_COLOR: Rgb = Rgb {
    r: 176,
    g: 176,
    b: 176,
};

/// An opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// CSS-style hex form, e.g. `#ff0000`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Map a predicted value onto the scale defined by `[min, max]`.
///
/// The ratio is clamped into `[0, 1]`, so out-of-range values saturate at
/// the ends rather than wrapping. A degenerate range (`max <= min`) pins
/// every value to the low end; non-finite values get the missing color.
pub fn color(value: f64, min: f64, max: f64) -> Rgb {
    if !value.is_finite() {
        return MISSING_VALUE_COLOR;
    }
    let ratio = if max > min {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let hue = (1.0 - ratio) * 240.0;
    hsl_to_rgb(hue, 1.0, 0.5)
}

/// One row of the map legend.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendBucket {
    /// Inclusive lower bound.
    pub lower: f64,
    /// Exclusive upper bound.
    pub upper: f64,
    /// Swatch fill, sampled from the same ramp as the map.
    pub swatch: Rgb,
    pub label: String,
}

/// Build legend buckets covering `[min, max]`.
///
/// The first bound is `min` rounded down to a multiple of the bucket width;
/// buckets continue while their lower bound does not exceed `max`, so a
/// single-value range still produces one bucket. A non-finite or inverted
/// range yields no legend at all.
pub fn buckets(min: f64, max: f64) -> Vec<LegendBucket> {
    if !min.is_finite() || !max.is_finite() || max < min {
        return Vec::new();
    }
    let mut lower = (min / BUCKET_WIDTH).floor() * BUCKET_WIDTH;
    let mut rows = Vec::new();
    while lower <= max {
        let upper = lower + BUCKET_WIDTH;
        rows.push(LegendBucket {
            lower,
            upper,
            swatch: color(lower, min, max),
            label: format!(
                "{} - {}",
                format::legend_bound(lower),
                format::legend_bound(upper)
            ),
        });
        lower = upper;
    }
    rows
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Rgb {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hh = (h / 60.0) % 6.0;
    let x = c * (1.0 - ((hh % 2.0) - 1.0).abs());
    let (r1, g1, b1) = match hh as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    Rgb {
        r: ((r1 + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        g: ((g1 + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        b: ((b1 + m) * 255.0).round().clamp(0.0, 255.0) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUE: Rgb = Rgb { r: 0, g: 0, b: 255 };
    const GREEN: Rgb = Rgb { r: 0, g: 255, b: 0 };
    const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };

    #[test]
    fn scale_endpoints_and_midpoint() {
        assert_eq!(color(0.0, 0.0, 1000.0), BLUE);
        assert_eq!(color(1000.0, 0.0, 1000.0), RED);
        assert_eq!(color(500.0, 0.0, 1000.0), GREEN);
    }

    #[test]
    fn out_of_range_values_saturate() {
        assert_eq!(color(-250.0, 0.0, 1000.0), BLUE);
        assert_eq!(color(4200.0, 0.0, 1000.0), RED);
    }

    #[test]
    fn degenerate_range_is_constant() {
        let fixed = color(5.0, 5.0, 5.0);
        assert_eq!(color(-9000.0, 5.0, 5.0), fixed);
        assert_eq!(color(9000.0, 5.0, 5.0), fixed);
        assert_eq!(fixed, BLUE);
    }

    #[test]
    fn non_finite_values_get_the_missing_color() {
        assert_eq!(color(f64::NAN, 0.0, 1000.0), MISSING_VALUE_COLOR);
        assert_eq!(color(f64::INFINITY, 0.0, 1000.0), MISSING_VALUE_COLOR);
    }

    #[test]
    fn buckets_align_to_width_and_cover_max() {
        let rows = buckets(120.0, 1380.0);
        let bounds: Vec<(f64, f64)> = rows.iter().map(|b| (b.lower, b.upper)).collect();
        assert_eq!(
            bounds,
            vec![(0.0, 500.0), (500.0, 1000.0), (1000.0, 1500.0)]
        );
    }

    #[test]
    fn single_zero_range_gets_one_bucket() {
        let rows = buckets(0.0, 0.0);
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].lower, rows[0].upper), (0.0, 500.0));
    }

    #[test]
    fn negative_ranges_floor_downwards() {
        let rows = buckets(-700.0, 200.0);
        let lowers: Vec<f64> = rows.iter().map(|b| b.lower).collect();
        assert_eq!(lowers, vec![-1000.0, -500.0, 0.0]);
    }

    #[test]
    fn swatches_come_from_the_same_ramp() {
        let rows = buckets(120.0, 1380.0);
        for row in &rows {
            assert_eq!(row.swatch, color(row.lower, 120.0, 1380.0));
        }
    }

    #[test]
    fn labels_group_thousands() {
        let rows = buckets(1000.0, 1600.0);
        assert_eq!(rows[0].label, "1,000 - 1,500");
        assert_eq!(rows[1].label, "1,500 - 2,000");
    }

    #[test]
    fn inverted_or_nan_range_disables_the_legend() {
        assert!(buckets(10.0, -10.0).is_empty());
        assert!(buckets(f64::NAN, 100.0).is_empty());
    }

    #[test]
    fn hex_form_is_lowercase() {
        assert_eq!(RED.to_hex(), "#ff0000");
        assert_eq!(MISSING_VALUE_COLOR.to_hex(), "#b0b0b0");
    }
}
