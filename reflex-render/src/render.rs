use ab_glyph::FontArc;
use anyhow::{Result, anyhow, ensure};
use reflex_core::{Histogram, SessionSummary, TrialState};
use reflex_timing::{Clock, HighPrecisionClock};
use std::time::Duration;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Transform};

use crate::chart::ChartGeometry;
use crate::text::{Anchor, TextStyle, Typesetter};

const BLUE: [u8; 4] = [43, 135, 209, 255];
const RED: [u8; 4] = [206, 38, 54, 255];
const GREEN: [u8; 4] = [75, 219, 106, 255];
const PAGE: [u8; 4] = [243, 244, 246, 255];
const CARD: [u8; 4] = [255, 255, 255, 255];
const STAT_BOX: [u8; 4] = [249, 250, 251, 255];

const TITLE: TextStyle = TextStyle::new(44.0, [255, 255, 255, 255]);
const SUBTITLE: TextStyle = TextStyle::new(20.0, [255, 255, 255, 255]);
const CARD_TITLE: TextStyle = TextStyle::new(22.0, [31, 41, 55, 255]);
const STAT_LABEL: TextStyle = TextStyle::new(13.0, [107, 114, 128, 255]);
const STAT_VALUE: TextStyle = TextStyle::new(22.0, [31, 41, 55, 255]);
const LIST_TEXT: TextStyle = TextStyle::new(14.0, [55, 65, 81, 255]);

const CHART_WIDTH: f32 = 400.0;
const CHART_HEIGHT: f32 = 240.0;
const CARD_MARGIN: f32 = 24.0;
const CARD_PADDING: f32 = 20.0;

/// Everything a frame shows, read from the session.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub state: TrialState,
    pub last_reaction_ms: Option<u64>,
    pub summary: &'a SessionSummary,
    pub histogram: &'a Histogram,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
}

/// Where each part of the frame goes for a given surface size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub width: f32,
    pub height: f32,
    pub test_area_height: f32,
    pub card: (f32, f32, f32, f32),
    pub chart: ChartGeometry,
    pub stats_x: f32,
}

impl Layout {
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let test_area_height = (h * 0.5).round();

        let card_x = CARD_MARGIN;
        let card_y = test_area_height + CARD_MARGIN;
        let card_w = (w - 2.0 * CARD_MARGIN).max(0.0);
        let card_h = (h - card_y - CARD_MARGIN).max(0.0);

        let chart_w = CHART_WIDTH.min((card_w - 2.0 * CARD_PADDING).max(0.0));
        let chart = ChartGeometry::new(
            card_x + CARD_PADDING,
            card_y + CARD_PADDING + 36.0,
            chart_w,
            CHART_HEIGHT,
        );

        Self {
            width: w,
            height: h,
            test_area_height,
            card: (card_x, card_y, card_w, card_h),
            chart,
            stats_x: chart.x + chart_w + CARD_PADDING,
        }
    }

    /// Whether a click at `(x, y)` lands on the coloured test area.
    pub fn in_test_area(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width as f64 && y < self.test_area_height as f64
    }
}

pub fn test_area_color(state: TrialState) -> [u8; 4] {
    match state {
        TrialState::Armed => RED,
        TrialState::Stimulus => GREEN,
        TrialState::Idle | TrialState::Result | TrialState::FalseStart => BLUE,
    }
}

/// Headline and instruction lines for the test area.
pub fn test_area_text(
    state: TrialState,
    last_reaction_ms: Option<u64>,
) -> (String, Vec<&'static str>) {
    match state {
        TrialState::Idle => (
            "Reaction Time Test".to_string(),
            vec![
                "When the red box turns green, click as quickly as you can.",
                "Click anywhere to start.",
            ],
        ),
        TrialState::Armed => ("Wait for green".to_string(), vec![]),
        TrialState::Stimulus => ("Click!".to_string(), vec![]),
        TrialState::FalseStart => ("Too soon!".to_string(), vec!["Click to try again."]),
        TrialState::Result => (
            format!("{} ms", last_reaction_ms.unwrap_or_default()),
            vec!["Click to keep going"],
        ),
    }
}

pub struct SkiaRenderer {
    layout: Layout,
    canvas: Pixmap,
    text: Typesetter,
    clock: HighPrecisionClock,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, font: Option<FontArc>) -> Result<Self> {
        let canvas = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("cannot allocate {width}x{height} canvas"))?;
        if font.is_none() {
            tracing::warn!("no font loaded, text will not be drawn");
        }
        Ok(Self {
            layout: Layout::new(width, height),
            canvas,
            text: Typesetter::new(font),
            clock: HighPrecisionClock::new(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("cannot allocate {width}x{height} canvas"))?;
        self.layout = Layout::new(width, height);
        Ok(())
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Draws a full frame and copies it into an RGBA surface of the same size.
    pub fn render_frame(
        &mut self,
        view: &FrameView<'_>,
        frame_buffer: &mut [u8],
    ) -> Result<FrameStats> {
        ensure!(
            frame_buffer.len() == self.canvas.data().len(),
            "frame buffer is {} bytes, canvas is {}",
            frame_buffer.len(),
            self.canvas.data().len()
        );

        let t0 = self.clock.now();
        self.draw(view);
        let draw = self.clock.elapsed(t0);

        let t1 = self.clock.now();
        // The canvas is fully opaque, so premultiplied and straight RGBA agree.
        frame_buffer.copy_from_slice(self.canvas.data());
        let copy = self.clock.elapsed(t1);

        Ok(FrameStats {
            draw,
            copy,
            total: draw + copy,
        })
    }

    pub fn draw(&mut self, view: &FrameView<'_>) {
        self.canvas.fill(color(PAGE));
        self.draw_test_area(view);
        self.draw_card(view);
    }

    fn draw_test_area(&mut self, view: &FrameView<'_>) {
        let l = self.layout;
        fill_rect(
            &mut self.canvas,
            0.0,
            0.0,
            l.width,
            l.test_area_height,
            test_area_color(view.state),
        );

        let cx = l.width * 0.5;
        let cy = l.test_area_height * 0.5;

        if matches!(view.state, TrialState::Armed | TrialState::Stimulus) {
            let mut paint = Paint::default();
            paint.anti_alias = true;
            paint.set_color(Color::from_rgba8(255, 255, 255, 230));
            for i in -1..=1 {
                if let Some(dot) = PathBuilder::from_circle(cx + i as f32 * 28.0, cy - 60.0, 8.0) {
                    self.canvas
                        .fill_path(&dot, &paint, FillRule::Winding, Transform::identity(), None);
                }
            }
        }

        let (headline, lines) = test_area_text(view.state, view.last_reaction_ms);
        self.text
            .draw(&mut self.canvas, &headline, TITLE, Anchor::Center, (cx, cy), 0.0);
        for (i, line) in lines.iter().enumerate() {
            let y = cy + 48.0 + i as f32 * 28.0;
            self.text
                .draw(&mut self.canvas, line, SUBTITLE, Anchor::Center, (cx, y), 0.0);
        }
    }

    fn draw_card(&mut self, view: &FrameView<'_>) {
        let l = self.layout;
        let (x, y, w, h) = l.card;
        fill_rect(&mut self.canvas, x, y, w, h, CARD);
        self.text.draw(
            &mut self.canvas,
            "Statistics",
            CARD_TITLE,
            Anchor::Left,
            (x + CARD_PADDING, y + CARD_PADDING + 12.0),
            0.0,
        );

        l.chart.draw(&mut self.canvas, view.histogram, &mut self.text);

        let summary = view.summary;
        let boxes = [
            ("Attempts", summary.attempts.to_string()),
            ("Average", format!("{} ms", summary.average_ms)),
            ("Best", format!("{} ms", summary.best_ms)),
        ];
        let box_w = 120.0;
        let box_h = 64.0;
        let top = l.chart.y;
        for (i, (label, value)) in boxes.iter().enumerate() {
            let bx = l.stats_x + i as f32 * (box_w + 12.0);
            fill_rect(&mut self.canvas, bx, top, box_w, box_h, STAT_BOX);
            self.text.draw(
                &mut self.canvas,
                label,
                STAT_LABEL,
                Anchor::Center,
                (bx + box_w * 0.5, top + 18.0),
                0.0,
            );
            self.text.draw(
                &mut self.canvas,
                value,
                STAT_VALUE,
                Anchor::Center,
                (bx + box_w * 0.5, top + 44.0),
                0.0,
            );
        }

        if summary.attempts == 0 {
            return;
        }
        let mut ly = top + box_h + 28.0;
        self.text.draw(
            &mut self.canvas,
            "Recent Attempts:",
            STAT_VALUE,
            Anchor::Left,
            (l.stats_x, ly),
            0.0,
        );
        for attempt in &summary.recent {
            ly += 22.0;
            let line = format!(
                "Attempt {}: {} ms",
                attempt.attempt, attempt.reaction_time_ms
            );
            self.text
                .draw(&mut self.canvas, &line, LIST_TEXT, Anchor::Left, (l.stats_x, ly), 0.0);
        }
    }
}

fn color(c: [u8; 4]) -> Color {
    Color::from_rgba8(c[0], c[1], c[2], c[3])
}

fn fill_rect(canvas: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, c: [u8; 4]) {
    // Zero-sized or off-canvas rects come out as None and are skipped.
    let Some(rect) = Rect::from_xywh(x, y, w, h) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(color(c));
    canvas.fill_rect(rect, &paint, Transform::identity(), None);
}
