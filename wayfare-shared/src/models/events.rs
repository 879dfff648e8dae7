use serde::{Deserialize, Serialize};

/// Latest known seat count for one flight, as pushed by the seat stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatSnapshot {
    pub flight_id: String,
    #[serde(default)]
    pub cabin_class: String,
    pub available_seats: u32,
    #[serde(default)]
    pub timestamp: String,
}

/// One payload received on the seat-update channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    SeatUpdate(SeatSnapshot),
    /// Well-formed JSON that is not a seat update (keep-alives, control frames)
    Ignored,
}

impl StreamMessage {
    pub const SEAT_UPDATE: &'static str = "seatUpdate";

    /// Fails only on malformed JSON or a `seatUpdate` missing its fields.
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(data)?;
        if value.get("type").and_then(|t| t.as_str()) != Some(Self::SEAT_UPDATE) {
            return Ok(StreamMessage::Ignored);
        }
        Ok(StreamMessage::SeatUpdate(serde_json::from_value(value)?))
    }
}
