use serde::{Deserialize, Serialize};

/// Recognition backend result for one submitted frame.
///
/// Every field is defaulted so partial bodies (e.g. a bare `{message}` error
/// reply) still decode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VerificationVerdict {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reg_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recognized_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_coords: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_color: Option<String>,
}

/// Face rectangle in the submitted frame's pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl FaceBox {
    pub fn from_coords(coords: [f32; 4]) -> Self {
        let [ax, ay, bx, by] = coords;
        Self {
            x1: ax.min(bx),
            y1: ay.min(by),
            x2: ax.max(bx),
            y2: ay.max(by),
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

impl VerificationVerdict {
    pub fn face_box(&self) -> Option<FaceBox> {
        self.box_coords.map(FaceBox::from_coords)
    }

    /// `"<name> (<reg_no>)"`, falling back to the backend's combined id text.
    pub fn label(&self) -> String {
        match (&self.name, &self.reg_no, &self.recognized_id) {
            (Some(name), Some(reg_no), _) => format!("{} ({})", name, reg_no),
            (Some(name), None, _) => name.clone(),
            (None, _, Some(recognized)) => recognized.clone(),
            (None, Some(reg_no), None) => reg_no.clone(),
            (None, None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_decodes_backend_body() {
        let body = r#"{"success":true,"message":"IN attendance marked for Asha.","name":"Asha","reg_no":"R1","box_coords":[10.0,40.5,110.0,160.0],"box_color":"green"}"#;
        let verdict: VerificationVerdict = serde_json::from_str(body).unwrap();
        assert!(verdict.success);
        assert_eq!(verdict.label(), "Asha (R1)");
        let face = verdict.face_box().unwrap();
        assert_eq!(face.width(), 100.0);
        assert_eq!(face.height(), 119.5);
    }

    #[test]
    fn verdict_tolerates_bare_message() {
        let verdict: VerificationVerdict =
            serde_json::from_str(r#"{"message":"No image file provided."}"#).unwrap();
        assert!(!verdict.success);
        assert!(verdict.face_box().is_none());
    }

    #[test]
    fn label_falls_back_to_recognized_id() {
        let verdict = VerificationVerdict {
            recognized_id: Some("Asha (R1)".into()),
            ..Default::default()
        };
        assert_eq!(verdict.label(), "Asha (R1)");
    }

    #[test]
    fn face_box_normalizes_swapped_corners() {
        let face = FaceBox::from_coords([50.0, 80.0, 10.0, 20.0]);
        assert_eq!((face.x1, face.y1, face.x2, face.y2), (10.0, 20.0, 50.0, 80.0));
    }
}
