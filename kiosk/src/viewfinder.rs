use crate::app::Message;
use attendcore::render::overlay::{LABEL_SIZE, STROKE_WIDTH};
use attendcore::render::{Overlay, OverlayColor};
use iced::widget::canvas::{self, Frame, Geometry, Path, Stroke};
use iced::{mouse, Color, Pixels, Point, Rectangle, Renderer, Size, Theme};

/// Draws the latest verdict's face box over the captured frame.
///
/// Overlay coordinates are in frame pixels and get rescaled to whatever
/// size the canvas is laid out at.
pub struct Viewfinder {
    overlay: Option<Overlay>,
    frame_size: Option<(u32, u32)>,
}

impl Viewfinder {
    pub fn new(overlay: Option<Overlay>, frame_size: Option<(u32, u32)>) -> Self {
        Self {
            overlay,
            frame_size,
        }
    }
}

fn to_color(color: OverlayColor) -> Color {
    Color::from_rgb(color.r, color.g, color.b)
}

impl canvas::Program<Message> for Viewfinder {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());

        let Some((width, height)) = self.frame_size.filter(|(w, h)| *w > 0 && *h > 0) else {
            frame.fill_rectangle(
                Point::ORIGIN,
                bounds.size(),
                Color::from_rgb(0.05, 0.05, 0.05),
            );
            return vec![frame.into_geometry()];
        };

        if let Some(overlay) = &self.overlay {
            let scaled = overlay.scaled(bounds.width / width as f32, bounds.height / height as f32);
            let color = to_color(scaled.color);
            let outline = Path::rectangle(
                Point::new(scaled.face.x1, scaled.face.y1),
                Size::new(scaled.face.width(), scaled.face.height()),
            );
            frame.stroke(
                &outline,
                Stroke::default().with_width(STROKE_WIDTH).with_color(color),
            );
            // Canvas text hangs from its position; lift it so the label's
            // baseline sits where the overlay asked.
            frame.fill_text(canvas::Text {
                content: scaled.label.clone(),
                position: Point::new(scaled.label_x, scaled.label_y - LABEL_SIZE),
                color,
                size: Pixels(LABEL_SIZE),
                ..canvas::Text::default()
            });
        }

        vec![frame.into_geometry()]
    }
}
