//! Area chart of the latency histogram.
//!
//! Geometry is kept separate from drawing so the scaling arithmetic can be
//! checked without rasterising anything.

use reflex_core::Histogram;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::text::{Anchor, TextStyle, Typesetter};

const MARGIN_LEFT: f32 = 40.0;
const MARGIN_RIGHT: f32 = 10.0;
const MARGIN_TOP: f32 = 10.0;
const MARGIN_BOTTOM: f32 = 30.0;
const GRID_LINES: usize = 5;
const Y_LABELS: usize = 5;
const X_LABEL_EVERY: usize = 3;

const AXIS: [u8; 4] = [0xe5, 0xe7, 0xeb, 255];
const GRID: [u8; 4] = [0xf3, 0xf4, 0xf6, 255];
const AREA: [u8; 4] = [59, 156, 235, 51];
const LINE: [u8; 4] = [0x3b, 0x9c, 0xeb, 255];
const LABEL: TextStyle = TextStyle::new(10.0, [0x6b, 0x72, 0x80, 255]);

/// Placement of the chart inside the frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ChartGeometry {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn plot_width(&self) -> f32 {
        self.width - MARGIN_LEFT - MARGIN_RIGHT
    }

    pub fn plot_height(&self) -> f32 {
        self.height - MARGIN_TOP - MARGIN_BOTTOM
    }

    pub fn left(&self) -> f32 {
        self.x + MARGIN_LEFT
    }

    pub fn top(&self) -> f32 {
        self.y + MARGIN_TOP
    }

    pub fn baseline(&self) -> f32 {
        self.y + self.height - MARGIN_BOTTOM
    }

    pub fn right(&self) -> f32 {
        self.x + self.width - MARGIN_RIGHT
    }

    fn step_x(&self, bins: usize) -> f32 {
        if bins < 2 {
            return 0.0;
        }
        self.plot_width() / (bins - 1) as f32
    }

    /// One point per bin, left to right, scaled so the tallest bin touches the top.
    pub fn points(&self, histogram: &Histogram) -> Vec<(f32, f32)> {
        let max = histogram.max_value();
        let step = self.step_x(histogram.len());
        histogram
            .bins
            .iter()
            .enumerate()
            .map(|(i, bin)| {
                let x = self.left() + i as f32 * step;
                let y = self.baseline() - (bin.value / max) as f32 * self.plot_height();
                (x, y)
            })
            .collect()
    }

    pub fn grid_lines(&self) -> Vec<f32> {
        (0..GRID_LINES)
            .map(|i| self.top() + self.plot_height() * (i as f32 / GRID_LINES as f32))
            .collect()
    }

    /// Y-axis ticks from the top down: `(y, round(max * (1 - i/4)))`.
    pub fn y_labels(&self, max_value: f64) -> Vec<(f32, u64)> {
        let steps = (Y_LABELS - 1) as f64;
        (0..Y_LABELS)
            .map(|i| {
                let frac = i as f64 / steps;
                let y = self.top() + self.plot_height() * frac as f32;
                (y, (max_value * (1.0 - frac)).round() as u64)
            })
            .collect()
    }

    /// Every third bin start, at its x position.
    pub fn x_labels(&self, histogram: &Histogram) -> Vec<(f32, u32)> {
        let step = self.step_x(histogram.len());
        histogram
            .bins
            .iter()
            .enumerate()
            .step_by(X_LABEL_EVERY)
            .map(|(i, bin)| (self.left() + i as f32 * step, bin.start_ms))
            .collect()
    }

    pub fn draw(&self, canvas: &mut Pixmap, histogram: &Histogram, text: &mut Typesetter) {
        let mut paint = Paint::default();
        paint.anti_alias = true;

        // Axes
        let mut pb = PathBuilder::new();
        pb.move_to(self.left(), self.top());
        pb.line_to(self.left(), self.baseline());
        pb.line_to(self.right(), self.baseline());
        stroke(canvas, pb, &mut paint, AXIS, 1.0);

        for y in self.grid_lines() {
            let mut pb = PathBuilder::new();
            pb.move_to(self.left(), y);
            pb.line_to(self.right(), y);
            stroke(canvas, pb, &mut paint, GRID, 0.5);
        }

        let points = self.points(histogram);
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            let mut area = PathBuilder::new();
            area.move_to(first.0, self.baseline());
            for &(x, y) in &points {
                area.line_to(x, y);
            }
            area.line_to(last.0, self.baseline());
            area.close();
            if let Some(path) = area.finish() {
                set_color(&mut paint, AREA);
                canvas.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
            }

            let mut line = PathBuilder::new();
            line.move_to(first.0, first.1);
            for &(x, y) in &points[1..] {
                line.line_to(x, y);
            }
            stroke(canvas, line, &mut paint, LINE, 2.0);
        }

        let label_y = self.y + self.height - 15.0;
        for (x, start_ms) in self.x_labels(histogram) {
            text.draw(
                canvas,
                &format!("{start_ms}ms"),
                LABEL,
                Anchor::Center,
                (x, label_y),
                -45.0,
            );
        }
        for (y, value) in self.y_labels(histogram.max_value()) {
            text.draw(
                canvas,
                &value.to_string(),
                LABEL,
                Anchor::Right,
                (self.x + 35.0, y),
                0.0,
            );
        }
    }
}

fn set_color(paint: &mut Paint, c: [u8; 4]) {
    paint.set_color(Color::from_rgba8(c[0], c[1], c[2], c[3]));
}

fn stroke(canvas: &mut Pixmap, pb: PathBuilder, paint: &mut Paint, color: [u8; 4], width: f32) {
    let Some(path) = pb.finish() else {
        return;
    };
    set_color(paint, color);
    let stroke = Stroke {
        width,
        ..Stroke::default()
    };
    canvas.stroke_path(&path, paint, &stroke, Transform::identity(), None);
}
