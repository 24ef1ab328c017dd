//! Draws the current frame with its boxes using half-block cells.

use annotation_common::{BoundingBox, ClassPalette};
use image::RgbImage;
use ratatui::{buffer::Buffer, layout::Rect, style::Color, widgets::Widget};

/// Largest rect inside `area` with the frame's aspect ratio, centered.
///
/// A cell holds two vertically stacked pixels, so a cell is treated as square.
pub fn fit(area: Rect, (width, height): (u32, u32)) -> Rect {
    if area.width == 0 || area.height == 0 || width == 0 || height == 0 {
        return Rect::new(area.x, area.y, 0, 0);
    }
    let avail_w = area.width as u64;
    let avail_h = area.height as u64 * 2;
    let (view_w, view_h) = if avail_w * height as u64 <= avail_h * width as u64 {
        (avail_w, avail_w * height as u64 / width as u64)
    } else {
        (avail_h * width as u64 / height as u64, avail_h)
    };
    let cells_w = view_w.max(1) as u16;
    let cells_h = view_h.div_ceil(2).max(1) as u16;
    Rect::new(
        area.x + (area.width - cells_w) / 2,
        area.y + (area.height - cells_h) / 2,
        cells_w,
        cells_h,
    )
}

/// Box outline color, brightened so dark class colors stay visible.
pub fn display_color((r, g, b): (u8, u8, u8)) -> Color {
    let max = r.max(g).max(b).max(1) as u32;
    let scale = |c: u8| (c as u32 * 255 / max) as u8;
    Color::Rgb(scale(r), scale(g), scale(b))
}

pub struct FrameView<'a> {
    pub image: &'a RgbImage,
    pub boxes: &'a [BoundingBox],
    pub selected: Option<usize>,
    pub preview: Option<BoundingBox>,
    pub palette: &'a ClassPalette,
}

impl FrameView<'_> {
    fn pixel(&self, x: u64, y: u64) -> Color {
        let px = self.image.get_pixel(x as u32, y as u32);
        Color::Rgb(px[0], px[1], px[2])
    }

    fn draw_image(&self, area: Rect, buf: &mut Buffer) {
        let (width, height) = self.image.dimensions();
        let (w, h) = (width as u64, height as u64);
        let rows = area.height as u64 * 2;
        for cy in 0..area.height {
            for cx in 0..area.width {
                let x = (cx as u64 * w / area.width as u64).min(w - 1);
                let top = (cy as u64 * 2 * h / rows).min(h - 1);
                let bottom = ((cy as u64 * 2 + 1) * h / rows).min(h - 1);
                if let Some(cell) = buf.cell_mut((area.x + cx, area.y + cy)) {
                    cell.set_symbol("▀")
                        .set_fg(self.pixel(x, top))
                        .set_bg(self.pixel(x, bottom));
                }
            }
        }
    }

    fn draw_box(&self, area: Rect, buf: &mut Buffer, bbox: &BoundingBox, heavy: bool) {
        let (width, height) = self.image.dimensions();
        let to_col = |x: i32| {
            let col = x.max(0) as u64 * area.width as u64 / width.max(1) as u64;
            area.x + col.min(area.width as u64 - 1) as u16
        };
        let to_row = |y: i32| {
            let row = y.max(0) as u64 * area.height as u64 / height.max(1) as u64;
            area.y + row.min(area.height as u64 - 1) as u16
        };
        let (left, right) = (to_col(bbox.x_min()), to_col(bbox.x_max()));
        let (top, bottom) = (to_row(bbox.y_min()), to_row(bbox.y_max()));
        let color = display_color(self.palette.color(bbox.class_id));
        let (h, v, tl, tr, bl, br) = if heavy {
            ("━", "┃", "┏", "┓", "┗", "┛")
        } else {
            ("─", "│", "┌", "┐", "└", "┘")
        };

        let mut put = |x: u16, y: u16, symbol: &str| {
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_symbol(symbol).set_fg(color);
            }
        };
        for x in left..=right {
            put(x, top, h);
            put(x, bottom, h);
        }
        for y in top..=bottom {
            put(left, y, v);
            put(right, y, v);
        }
        put(left, top, tl);
        put(right, top, tr);
        put(left, bottom, bl);
        put(right, bottom, br);
    }
}

impl Widget for FrameView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 || self.image.width() == 0 || self.image.height() == 0 {
            return;
        }
        self.draw_image(area, buf);
        for (idx, bbox) in self.boxes.iter().enumerate() {
            self.draw_box(area, buf, bbox, self.selected == Some(idx));
        }
        if let Some(preview) = &self.preview {
            self.draw_box(area, buf, preview, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_keeps_aspect_ratio() {
        // 16:9 frame in an 80x40 cell area (80x80 pixel rows): width bound.
        let rect = fit(Rect::new(0, 0, 80, 40), (1280, 720));
        assert_eq!((rect.width, rect.height), (80, 23));
        assert_eq!(rect.y, 8);

        // Tall frame: height bound.
        let rect = fit(Rect::new(2, 1, 80, 10), (100, 200));
        assert_eq!((rect.width, rect.height), (10, 10));
        assert_eq!(rect.x, 2 + 35);
    }

    #[test]
    fn brightened_color_keeps_hue() {
        assert_eq!(display_color((30, 45, 69)), Color::Rgb(110, 166, 255));
        assert_eq!(display_color((0, 0, 0)), Color::Rgb(0, 0, 0));
    }

    #[test]
    fn renders_box_outline_in_class_color() {
        let image = RgbImage::new(20, 20);
        let palette = ClassPalette::new(&["a".to_string(), "b".to_string()]).unwrap();
        let boxes = [BoundingBox::from_coords(0, 0, 10, 10, 1)];
        let area = Rect::new(0, 0, 20, 10);
        let mut buf = Buffer::empty(area);
        FrameView {
            image: &image,
            boxes: &boxes,
            selected: Some(0),
            preview: None,
            palette: &palette,
        }
        .render(area, &mut buf);

        let corner = &buf[(0, 0)];
        assert_eq!(corner.symbol(), "┏");
        assert_eq!(corner.fg, display_color(palette.color(1)));
        assert_eq!(buf[(10, 5)].symbol(), "┛");
        assert_eq!(buf[(15, 8)].symbol(), "▀");
    }
}
