use crate::protocol::{FaceBox, VerificationVerdict};

/// Labels sit this far above the box unless the box hugs the top edge.
pub const LABEL_LIFT: f32 = 10.0;
pub const LABEL_TOP_MARGIN: f32 = 20.0;
pub const STROKE_WIDTH: f32 = 3.0;
pub const LABEL_SIZE: f32 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl OverlayColor {
    pub const GREEN: OverlayColor = OverlayColor {
        r: 0.0,
        g: 128.0 / 255.0,
        b: 0.0,
    };
    pub const RED: OverlayColor = OverlayColor {
        r: 1.0,
        g: 0.0,
        b: 0.0,
    };
    pub const ORANGE: OverlayColor = OverlayColor {
        r: 1.0,
        g: 165.0 / 255.0,
        b: 0.0,
    };

    pub fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// Accepts the backend's colour hints: a few CSS names or `#rrggbb`.
    pub fn parse(hint: &str) -> Option<Self> {
        let hint = hint.trim().to_ascii_lowercase();
        if let Some(hex) = hint.strip_prefix('#') {
            if hex.len() != 6 {
                return None;
            }
            let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
            return Some(Self::rgb8(channel(0)?, channel(2)?, channel(4)?));
        }
        match hint.as_str() {
            "green" => Some(Self::GREEN),
            "red" => Some(Self::RED),
            "orange" => Some(Self::ORANGE),
            "yellow" => Some(Self::rgb8(255, 255, 0)),
            "blue" => Some(Self::rgb8(0, 0, 255)),
            "white" => Some(Self::rgb8(255, 255, 255)),
            _ => None,
        }
    }
}

/// Box and label to draw for one verdict, in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub face: FaceBox,
    pub color: OverlayColor,
    pub label: String,
    pub label_x: f32,
    pub label_y: f32,
}

impl Overlay {
    pub fn from_verdict(verdict: &VerificationVerdict) -> Option<Self> {
        let face = verdict.face_box()?;
        let fallback = if verdict.success {
            OverlayColor::GREEN
        } else {
            OverlayColor::RED
        };
        let color = verdict
            .box_color
            .as_deref()
            .and_then(OverlayColor::parse)
            .unwrap_or(fallback);
        let label_y = if face.y1 > LABEL_TOP_MARGIN {
            face.y1 - LABEL_LIFT
        } else {
            LABEL_TOP_MARGIN
        };
        Some(Self {
            face,
            color,
            label: verdict.label(),
            label_x: face.x1,
            label_y,
        })
    }

    /// Maps frame pixels onto a canvas of a different size.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            face: FaceBox {
                x1: self.face.x1 * sx,
                y1: self.face.y1 * sy,
                x2: self.face.x2 * sx,
                y2: self.face.y2 * sy,
            },
            color: self.color,
            label: self.label.clone(),
            label_x: self.label_x * sx,
            label_y: self.label_y * sy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(coords: [f32; 4], color: Option<&str>) -> VerificationVerdict {
        VerificationVerdict {
            success: true,
            message: "IN attendance marked for Asha.".into(),
            name: Some("Asha".into()),
            reg_no: Some("R1".into()),
            box_coords: Some(coords),
            box_color: color.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn label_sits_above_the_box() {
        let overlay = Overlay::from_verdict(&verdict([40.0, 100.0, 140.0, 220.0], Some("green"))).unwrap();
        assert_eq!(overlay.label, "Asha (R1)");
        assert_eq!((overlay.label_x, overlay.label_y), (40.0, 90.0));
        assert_eq!(overlay.color, OverlayColor::GREEN);
    }

    #[test]
    fn label_clamps_near_top_edge() {
        let overlay = Overlay::from_verdict(&verdict([40.0, 12.0, 140.0, 120.0], Some("orange"))).unwrap();
        assert_eq!(overlay.label_y, LABEL_TOP_MARGIN);
        assert_eq!(overlay.color, OverlayColor::ORANGE);
    }

    #[test]
    fn no_box_means_no_overlay() {
        let verdict = VerificationVerdict {
            message: "Face not recognized.".into(),
            box_color: Some("red".into()),
            ..Default::default()
        };
        assert!(Overlay::from_verdict(&verdict).is_none());
    }

    #[test]
    fn colour_hints_parse() {
        assert_eq!(OverlayColor::parse("#00ff00"), Some(OverlayColor::rgb8(0, 255, 0)));
        assert_eq!(OverlayColor::parse(" RED "), Some(OverlayColor::RED));
        assert_eq!(OverlayColor::parse("#0f0"), None);
        assert_eq!(OverlayColor::parse("chartreuse"), None);
    }

    #[test]
    fn unknown_colour_falls_back_on_success() {
        let overlay = Overlay::from_verdict(&verdict([0.0, 30.0, 10.0, 40.0], Some("mauve"))).unwrap();
        assert_eq!(overlay.color, OverlayColor::GREEN);
        let scaled = overlay.scaled(0.5, 2.0);
        assert_eq!(scaled.face.y2, 80.0);
        assert_eq!(scaled.label_y, 40.0);
    }
}
