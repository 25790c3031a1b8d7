extern crate image;
extern crate imageproc;
extern crate std;

use crate::position;
use crate::result;

pub struct Styles {
    pub color_background: image::Rgb<u8>,
    pub color_rail: image::Rgb<u8>,
    pub color_zero_line: image::Rgb<u8>,
    pub color_marker: image::Rgb<u8>,
}

impl Styles {
    pub fn new() -> Styles {
        return Styles{
            color_background: image::Rgb([255, 255, 255]),
            color_rail: image::Rgb([0, 164, 167]),
            color_zero_line: image::Rgb([192, 192, 192]),
            color_marker: image::Rgb([255, 204, 0]),
        };
    }
}

const IMAGE_WIDTH: u32 = 640;
const IMAGE_HEIGHT: u32 = 384;
const MARGIN: f32 = 32.0;
const MARKER_RADIUS: i32 = 5;

// Smallest |y| the frame will scale to, so a quiet snapshot isn't blown up.
const MIN_Y_EXTENT: f64 = 100.0;

// Schematic, not to scale: x is stretched so both rails fit the width, y so
// the farthest train touches the top or bottom margin.
struct Frame {
    x_scale: f32,
    y_scale: f32,
    origin_x: f32,
    origin_y: f32,
}

impl Frame {
    fn fit(markers: &position::MarkerSet) -> Frame {
        let max_offset = markers.markers.iter()
            .map(|m| m.coordinate.y.abs())
            .filter(|y| y.is_finite())
            .fold(MIN_Y_EXTENT, f64::max);

        return Frame{
            x_scale: (IMAGE_WIDTH as f32 - 2.0 * MARGIN) / position::LINE_SPACING as f32,
            y_scale: (IMAGE_HEIGHT as f32 / 2.0 - MARGIN) / max_offset as f32,
            origin_x: MARGIN,
            origin_y: IMAGE_HEIGHT as f32 / 2.0,
        };
    }

    fn to_pixel(&self, coordinate: position::Coordinate) -> (f32, f32) {
        return (self.origin_x + coordinate.x as f32 * self.x_scale,
                self.origin_y - coordinate.y as f32 * self.y_scale);
    }
}

pub fn render_markers(markers: &position::MarkerSet, styles: &Styles) -> image::RgbImage {
    let mut imgbuf = image::RgbImage::new(IMAGE_WIDTH, IMAGE_HEIGHT);
    let frame = Frame::fit(markers);

    imageproc::drawing::draw_filled_rect_mut(
        &mut imgbuf,
        imageproc::rect::Rect::at(0, 0).of_size(IMAGE_WIDTH, IMAGE_HEIGHT),
        styles.color_background);

    imageproc::drawing::draw_line_segment_mut(
        &mut imgbuf,
        (0.0, frame.origin_y),
        (IMAGE_WIDTH as f32, frame.origin_y),
        styles.color_zero_line);

    for rail_x in &[0.0, position::LINE_SPACING] {
        let (x, _) = frame.to_pixel(position::Coordinate{x: *rail_x, y: 0.0});
        let x = x.round();
        imageproc::drawing::draw_line_segment_mut(
            &mut imgbuf, (x, 0.0), (x, IMAGE_HEIGHT as f32), styles.color_rail);
    }

    for marker in &markers.markers {
        let (x, y) = frame.to_pixel(marker.coordinate);
        imageproc::drawing::draw_filled_circle_mut(
            &mut imgbuf, (x.round() as i32, y.round() as i32), MARKER_RADIUS, styles.color_marker);
    }

    return imgbuf;
}

pub fn save_markers_png(markers: &position::MarkerSet, path: &str) -> result::DlrMapResult<()> {
    render_markers(markers, &Styles::new()).save(path)?;
    debug!("Wrote {} markers to {}", markers.len(), path);
    return Ok(());
}

#[cfg(test)]
mod tests {
    use crate::position::{Coordinate, Marker, MarkerSet};

    fn marker(id: &str, x: f64, y: f64) -> Marker {
        return Marker{id: id.to_string(), coordinate: Coordinate{x: x, y: y}};
    }

    #[test]
    fn empty_snapshot_draws_background_and_rails() {
        let styles = super::Styles::new();
        let img = super::render_markers(&MarkerSet::empty(), &styles);

        assert_eq!(super::IMAGE_WIDTH, img.width());
        assert_eq!(super::IMAGE_HEIGHT, img.height());
        assert_eq!(styles.color_background, *img.get_pixel(5, 5));
        assert_eq!(styles.color_rail, *img.get_pixel(32, 5));
        assert_eq!(styles.color_rail, *img.get_pixel(608, 5));
    }

    #[test]
    fn markers_land_on_their_rails() {
        let styles = super::Styles::new();
        let markers = MarkerSet{
            sequence: 1,
            markers: vec![
                // Farthest train sets the scale: y=100 maps to the top margin.
                marker("stratford", 0.0, 100.0),
                marker("lewisham", 10000.0, -50.0),
                marker("bank", 0.0, 0.0),
            ],
        };

        let img = super::render_markers(&markers, &styles);

        assert_eq!(styles.color_marker, *img.get_pixel(32, 32));
        assert_eq!(styles.color_marker, *img.get_pixel(608, 272));
        assert_eq!(styles.color_marker, *img.get_pixel(32, 192));
        assert_eq!(styles.color_background, *img.get_pixel(320, 100));
    }

    #[test]
    fn non_finite_offsets_do_not_break_the_frame() {
        let markers = MarkerSet{
            sequence: 1,
            markers: vec![marker("nan", 0.0, std::f64::NAN), marker("ok", 0.0, 50.0)],
        };

        let img = super::render_markers(&markers, &super::Styles::new());
        // 50 units against the 100 unit minimum extent: halfway up.
        assert_eq!(super::Styles::new().color_marker, *img.get_pixel(32, 112));
    }
}
