use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParcelState {
    Pending,
    Picked,
    InTransit,
    OutForDelivery,
    Delivered,
    Failed,
    Returned,
}

impl ParcelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelState::Pending => "pending",
            ParcelState::Picked => "picked",
            ParcelState::InTransit => "in_transit",
            ParcelState::OutForDelivery => "out_for_delivery",
            ParcelState::Delivered => "delivered",
            ParcelState::Failed => "failed",
            ParcelState::Returned => "returned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ParcelState::Delivered | ParcelState::Failed | ParcelState::Returned
        )
    }
}

impl fmt::Display for ParcelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence collected at the door. Signature and photo are opaque encoded
/// payloads as sent by the driver app.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProofOfDelivery {
    pub signature: Option<String>,
    pub photo: Option<String>,
    pub recipient_name: Option<String>,
    pub notes: Option<String>,
}

impl ProofOfDelivery {
    pub fn has_evidence(&self) -> bool {
        let present =
            |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.signature) || present(&self.photo)
    }

    /// Overlays the fields present in `update`.
    pub fn merge(&mut self, update: ProofOfDelivery) {
        fn overlay(slot: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *slot = value;
            }
        }
        overlay(&mut self.signature, update.signature);
        overlay(&mut self.photo, update.photo);
        overlay(&mut self.recipient_name, update.recipient_name);
        overlay(&mut self.notes, update.notes);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parcel {
    pub id: Uuid,
    pub reference: String,
    pub request_id: Uuid,
    pub description: Option<String>,
    pub weight: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub declared_value: f64,
    pub state: ParcelState,
    pub pod: ProofOfDelivery,
    pub current_job: Option<Uuid>,
    pub picked_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Parcel {
    /// Cubic centimeters; zero unless all three dimensions are positive.
    pub fn volume(&self) -> f64 {
        match (self.length, self.width, self.height) {
            (Some(l), Some(w), Some(h)) if l > 0.0 && w > 0.0 && h > 0.0 => l * w * h,
            _ => 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let measures = [
            ("weight", self.weight),
            ("length", self.length),
            ("width", self.width),
            ("height", self.height),
        ];
        for (name, value) in measures {
            if value.is_some_and(|v| v < 0.0) {
                return Err(AppError::ValidationFailed(format!(
                    "{name} cannot be negative"
                )));
            }
        }
        if self.declared_value < 0.0 {
            return Err(AppError::ValidationFailed(
                "declared value cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn mark_picked(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.state != ParcelState::Pending {
            return Err(self.invalid("only pending parcels can be marked as picked"));
        }
        self.state = ParcelState::Picked;
        self.picked_at = Some(now);
        Ok(())
    }

    pub fn mark_in_transit(&mut self) -> Result<(), AppError> {
        if !matches!(self.state, ParcelState::Picked | ParcelState::Pending) {
            return Err(
                self.invalid("only picked or pending parcels can be marked as in transit")
            );
        }
        self.state = ParcelState::InTransit;
        Ok(())
    }

    pub fn mark_out_for_delivery(&mut self) -> Result<(), AppError> {
        if !matches!(self.state, ParcelState::InTransit | ParcelState::Picked) {
            return Err(self.invalid(
                "only in-transit or picked parcels can be marked as out for delivery",
            ));
        }
        self.state = ParcelState::OutForDelivery;
        Ok(())
    }

    pub fn mark_delivered(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.state != ParcelState::OutForDelivery {
            return Err(self.invalid("only parcels out for delivery can be marked as delivered"));
        }
        if !self.pod.has_evidence() {
            return Err(AppError::ValidationFailed(format!(
                "parcel {}: proof of delivery (signature or photo) is required",
                self.reference
            )));
        }
        self.state = ParcelState::Delivered;
        self.delivered_at = Some(now);
        Ok(())
    }

    pub fn mark_failed(&mut self) -> Result<(), AppError> {
        if !matches!(
            self.state,
            ParcelState::OutForDelivery | ParcelState::InTransit
        ) {
            return Err(self.invalid("only parcels in delivery can be marked as failed"));
        }
        self.state = ParcelState::Failed;
        Ok(())
    }

    pub fn mark_returned(&mut self) -> Result<(), AppError> {
        if !matches!(
            self.state,
            ParcelState::Failed | ParcelState::InTransit | ParcelState::OutForDelivery
        ) {
            return Err(
                self.invalid("only failed or in-delivery parcels can be marked as returned")
            );
        }
        self.state = ParcelState::Returned;
        Ok(())
    }

    /// Administrative override used when a delivery job fails: no guard.
    pub fn force_fail(&mut self) {
        self.state = ParcelState::Failed;
    }

    /// Stores the evidence without moving the parcel. Fields missing from
    /// `pod` keep their stored values; the result must carry evidence.
    pub fn attach_pod(&mut self, pod: ProofOfDelivery) -> Result<(), AppError> {
        self.ensure_open_for_pod()?;
        let mut merged = self.pod.clone();
        merged.merge(pod);
        if !merged.has_evidence() {
            return Err(AppError::ValidationFailed(format!(
                "parcel {}: proof of delivery needs a signature or a photo",
                self.reference
            )));
        }
        self.pod = merged;
        Ok(())
    }

    /// Like `attach_pod` but leaves the evidence check to `mark_delivered`.
    pub fn merge_pod(&mut self, pod: ProofOfDelivery) -> Result<(), AppError> {
        self.ensure_open_for_pod()?;
        self.pod.merge(pod);
        Ok(())
    }

    fn ensure_open_for_pod(&self) -> Result<(), AppError> {
        if self.state.is_terminal() {
            return Err(self.invalid("cannot attach proof of delivery to a closed parcel"));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> AppError {
        AppError::InvalidTransition(format!(
            "parcel {}: {reason} (state: {})",
            self.reference, self.state
        ))
    }
}
