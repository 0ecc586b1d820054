use serde::Serialize;

/// One tracked blob as published on a touch stream.
///
/// `x`/`y` are the blob center normalized by the frame size; `w`/`h` are in
/// pixels. Serializes as `{"type":"touch","id":..,"x":..,"y":..,"w":..,"h":..}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename = "touch")]
pub struct TouchRecord {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub w: u32,
    pub h: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let record = TouchRecord {
            id: 7,
            x: 0.5,
            y: 0.25,
            w: 10,
            h: 12,
        };
        let value = serde_json::to_value(record).unwrap();
        assert_eq!(value["type"], "touch");
        assert_eq!(value["id"], 7);
        assert_eq!(value["x"], 0.5);
        assert_eq!(value["y"], 0.25);
        assert_eq!(value["w"], 10);
        assert_eq!(value["h"], 12);
    }
}
