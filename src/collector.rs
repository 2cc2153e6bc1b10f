//! Telemetry collector: turns loosely typed client records into a
//! canonical numeric [`Batch`].
//!
//! The whole batch is rejected on the first bad record. Dropping a row
//! would shift every later vehicle against the oracle's score positions.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{DispatchError, DispatchResult};
use crate::types::{Batch, RawVehicleRecord, VehicleId, VehicleTelemetry};

/// Validate and coerce a sequence of raw records, preserving order.
pub fn collect(records: &[RawVehicleRecord]) -> DispatchResult<Batch> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut vehicles = Vec::with_capacity(records.len());

    for (index, rec) in records.iter().enumerate() {
        let id = coerce_id(index, rec.id.as_ref())?;
        if !seen.insert(id) {
            return Err(DispatchError::MalformedInput(format!(
                "record {index}: duplicate vehicle id {id}"
            )));
        }

        vehicles.push(VehicleTelemetry {
            id,
            remaining_battery: coerce_measurement(index, "remaining_battery", rec.remaining_battery.as_ref())?,
            drain_rate: coerce_measurement(index, "drain_rate", rec.drain_rate.as_ref())?,
            remaining_range: coerce_measurement(index, "remaining_range", rec.remaining_range.as_ref())?,
            estimated_time_left: coerce_measurement(index, "estimated_time_left", rec.estimated_time_left.as_ref())?,
            time_to_station: coerce_measurement(index, "time_to_station", rec.time_to_station.as_ref())?,
            distance_to_station: coerce_measurement(index, "distance_to_station", rec.distance_to_station.as_ref())?,
        });
    }

    Ok(Batch::from_validated(vehicles))
}

/// Integer identifier from a JSON integer, an integral float, or integer text.
pub(crate) fn parse_id(value: &Value) -> Option<VehicleId> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_id(index: usize, value: Option<&Value>) -> DispatchResult<VehicleId> {
    let value = value.ok_or_else(|| {
        DispatchError::MalformedInput(format!("record {index}: missing vehicle id"))
    })?;
    parse_id(value).ok_or_else(|| {
        DispatchError::MalformedInput(format!("record {index}: vehicle id {value} is not an integer"))
    })
}

fn coerce_measurement(index: usize, field: &str, value: Option<&Value>) -> DispatchResult<f64> {
    let value = value.ok_or_else(|| {
        DispatchError::MalformedInput(format!("record {index}: missing {field}"))
    })?;

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(f) if f.is_finite() => Ok(f),
        _ => Err(DispatchError::MalformedInput(format!(
            "record {index}: {field} value {value} is not a finite number"
        ))),
    }
}
