use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Vehicle identifier, unique within a single batch.
pub type VehicleId = i64;

// ---------- Inbound (loosely typed) ----------

/// One vehicle record as submitted by a client. Measurements may arrive as
/// JSON numbers or as text; the collector coerces them.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawVehicleRecord {
    #[serde(default, alias = "car_id", alias = "carId", alias = "vehicleId", alias = "vehicle_id")]
    pub id: Option<Value>,
    #[serde(default, alias = "remainingBattery")]
    pub remaining_battery: Option<Value>,
    #[serde(default, alias = "drainRate")]
    pub drain_rate: Option<Value>,
    #[serde(default, alias = "remainingRange")]
    pub remaining_range: Option<Value>,
    #[serde(default, alias = "estimatedTimeLeft")]
    pub estimated_time_left: Option<Value>,
    #[serde(default, alias = "timeToStation")]
    pub time_to_station: Option<Value>,
    #[serde(default, alias = "distanceToStation")]
    pub distance_to_station: Option<Value>,
}

// ---------- Canonical batch ----------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehicleTelemetry {
    pub id: VehicleId,
    pub remaining_battery: f64,
    pub drain_rate: f64,
    pub remaining_range: f64,
    pub estimated_time_left: f64,
    pub time_to_station: f64,
    pub distance_to_station: f64,
}

/// Ordered, immutable set of vehicles submitted together. Position `i` of
/// any oracle score array refers to `vehicles()[i]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    vehicles: Vec<VehicleTelemetry>,
}

impl Batch {
    /// Caller guarantees ids are unique.
    pub(crate) fn from_validated(vehicles: Vec<VehicleTelemetry>) -> Self {
        Self { vehicles }
    }

    pub fn vehicles(&self) -> &[VehicleTelemetry] {
        &self.vehicles
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.vehicles.iter().map(|v| v.id)
    }

    pub fn contains(&self, id: VehicleId) -> bool {
        self.vehicles.iter().any(|v| v.id == id)
    }

    pub fn id_at(&self, index: usize) -> Option<VehicleId> {
        self.vehicles.get(index).map(|v| v.id)
    }
}

// ---------- Oracle wire format ----------

/// Row sent to the scoring oracle: the six measurements, no identifier.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct OracleFeatures {
    pub remaining_battery: f64,
    pub drain_rate: f64,
    pub remaining_range: f64,
    pub estimated_time_left: f64,
    pub time_to_station: f64,
    pub distance_to_station: f64,
}

impl From<&VehicleTelemetry> for OracleFeatures {
    fn from(v: &VehicleTelemetry) -> Self {
        Self {
            remaining_battery: v.remaining_battery,
            drain_rate: v.drain_rate,
            remaining_range: v.remaining_range,
            estimated_time_left: v.estimated_time_left,
            time_to_station: v.time_to_station,
            distance_to_station: v.distance_to_station,
        }
    }
}

/// Encode a batch into the oracle payload, preserving order.
pub fn encode_batch(batch: &Batch) -> Vec<OracleFeatures> {
    batch.vehicles().iter().map(OracleFeatures::from).collect()
}

// ---------- Verdict ----------

/// What the oracle decided, already checked against the submitted batch.
#[derive(Debug, Clone, PartialEq)]
pub enum PriorityVerdict {
    /// The oracle named the winner directly.
    Winner(VehicleId),
    /// One score per vehicle, aligned with the batch.
    Scores(Vec<f64>),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct VehiclePriority {
    pub id: VehicleId,
    pub score: f64,
}

/// Result of one dispatch: the winner, plus per-vehicle scores when the
/// oracle returned them.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub winning_vehicle_id: VehicleId,
    pub priorities: Option<Vec<VehiclePriority>>,
}

// ---------- Outbound (to client) ----------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictResponse {
    #[serde(rename = "winningVehicleId")]
    pub winning_vehicle_id: VehicleId,
    pub max_priority_car_id: VehicleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priorities: Option<Vec<VehiclePriority>>,
}

impl From<DispatchOutcome> for PredictResponse {
    fn from(o: DispatchOutcome) -> Self {
        Self {
            winning_vehicle_id: o.winning_vehicle_id,
            max_priority_car_id: o.winning_vehicle_id,
            priorities: o.priorities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(id: VehicleId, battery: f64) -> VehicleTelemetry {
        VehicleTelemetry {
            id,
            remaining_battery: battery,
            drain_rate: 1.5,
            remaining_range: 120.25,
            estimated_time_left: 42.0,
            time_to_station: 9.75,
            distance_to_station: 3.1,
        }
    }

    #[test]
    fn test_wire_roundtrip_preserves_values_and_order() {
        let batch = Batch::from_validated(vec![vehicle(4, 80.0), vehicle(9, 0.1), vehicle(2, 55.5)]);
        let payload = encode_batch(&batch);

        let json = serde_json::to_string(&payload).expect("Should serialize payload");
        assert!(!json.contains("\"id\""), "Identifiers must not reach the oracle");

        let decoded: Vec<OracleFeatures> = serde_json::from_str(&json).expect("Should deserialize payload");
        assert_eq!(decoded.len(), batch.len());
        for (row, v) in decoded.iter().zip(batch.vehicles()) {
            assert!((row.remaining_battery - v.remaining_battery).abs() < 1e-12);
            assert!((row.remaining_range - v.remaining_range).abs() < 1e-12);
            assert!((row.distance_to_station - v.distance_to_station).abs() < 1e-12);
        }
        println!("✓ Wire round-trip preserved {} rows", decoded.len());
    }

    #[test]
    fn test_wire_row_has_exactly_six_fields() {
        let row = OracleFeatures::from(&vehicle(1, 50.0));
        let value = serde_json::to_value(row).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 6);
        for key in [
            "remaining_battery",
            "drain_rate",
            "remaining_range",
            "estimated_time_left",
            "time_to_station",
            "distance_to_station",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_batch_lookup() {
        let batch = Batch::from_validated(vec![vehicle(10, 1.0), vehicle(20, 2.0)]);
        assert!(batch.contains(20));
        assert!(!batch.contains(30));
        assert_eq!(batch.id_at(1), Some(20));
        assert_eq!(batch.id_at(2), None);
        assert_eq!(batch.ids().collect::<Vec<_>>(), vec![10, 20]);
    }

    #[test]
    fn test_response_omits_priorities_for_single_winner() {
        let resp = PredictResponse::from(DispatchOutcome {
            winning_vehicle_id: 3,
            priorities: None,
        });
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["winningVehicleId"], 3);
        assert_eq!(value["max_priority_car_id"], 3);
        assert!(value.get("priorities").is_none());
    }

    #[test]
    fn test_raw_record_accepts_both_spellings() {
        let snake: RawVehicleRecord =
            serde_json::from_str(r#"{"car_id": 1, "remaining_battery": "80"}"#).unwrap();
        let camel: RawVehicleRecord =
            serde_json::from_str(r#"{"id": 1, "remainingBattery": 80}"#).unwrap();
        assert!(snake.id.is_some() && snake.remaining_battery.is_some());
        assert!(camel.id.is_some() && camel.remaining_battery.is_some());
        assert!(snake.drain_rate.is_none());
    }
}
