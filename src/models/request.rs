use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::job::JobType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    #[default]
    Local,
    Express,
    Scheduled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Draft,
    Confirmed,
    Assigned,
    InProgress,
    Delivered,
    Cancelled,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Draft => "draft",
            RequestState::Confirmed => "confirmed",
            RequestState::Assigned => "assigned",
            RequestState::InProgress => "in_progress",
            RequestState::Delivered => "delivered",
            RequestState::Cancelled => "cancelled",
        }
    }

    /// States in which a missed scheduled delivery counts as a delay.
    pub fn is_pending_delivery(&self) -> bool {
        matches!(
            self,
            RequestState::Confirmed | RequestState::Assigned | RequestState::InProgress
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a delivery order: where to go and whom to call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    pub address: String,
    pub location: Option<GeoPoint>,
    pub contact_name: Option<String>,
    pub phone: String,
}

impl Endpoint {
    pub fn validate(&self, label: &str) -> Result<(), AppError> {
        if self.address.trim().is_empty() {
            return Err(AppError::ValidationFailed(format!(
                "{label} address cannot be empty"
            )));
        }
        if self.phone.trim().is_empty() {
            return Err(AppError::ValidationFailed(format!(
                "{label} phone cannot be empty"
            )));
        }
        if let Some(location) = &self.location {
            location.validate(label)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub reference: String,
    pub customer: String,
    pub service_type: ServiceType,
    pub pickup: Endpoint,
    pub delivery: Endpoint,
    pub service_fee: f64,
    pub cod_amount: f64,
    pub currency: String,
    pub notes: Option<String>,
    pub assigned_driver: Option<Uuid>,
    pub state: RequestState,
    pub scheduled_pickup: Option<DateTime<Utc>>,
    pub scheduled_delivery: Option<DateTime<Utc>>,
    pub actual_pickup: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl ServiceRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.customer.trim().is_empty() {
            return Err(AppError::ValidationFailed(
                "customer cannot be empty".to_string(),
            ));
        }
        self.pickup.validate("pickup")?;
        self.delivery.validate("delivery")?;
        if self.service_fee < 0.0 {
            return Err(AppError::ValidationFailed(
                "service fee cannot be negative".to_string(),
            ));
        }
        if self.cod_amount < 0.0 {
            return Err(AppError::ValidationFailed(
                "cod amount cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// The endpoint a job of the given type operates at.
    pub fn endpoint_for(&self, job_type: JobType) -> &Endpoint {
        match job_type {
            JobType::Pickup => &self.pickup,
            JobType::Delivery => &self.delivery,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(
            self.state,
            RequestState::Delivered | RequestState::Cancelled
        )
    }

    pub fn confirm(&mut self, parcel_count: usize) -> Result<(), AppError> {
        if self.state != RequestState::Draft {
            return Err(self.invalid("only draft requests can be confirmed"));
        }
        if parcel_count == 0 {
            return Err(AppError::ValidationFailed(format!(
                "request {}: cannot confirm a service request without parcels",
                self.reference
            )));
        }
        self.state = RequestState::Confirmed;
        Ok(())
    }

    /// Assignment is accepted from draft or confirmed only; an already
    /// assigned request must be cancelled and recreated.
    pub fn assign(
        &mut self,
        driver_id: Uuid,
        scheduled_pickup: DateTime<Utc>,
        scheduled_delivery: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        if !matches!(self.state, RequestState::Draft | RequestState::Confirmed) {
            return Err(self.invalid("only draft or confirmed requests can be assigned"));
        }
        self.assigned_driver = Some(driver_id);
        self.scheduled_pickup = Some(scheduled_pickup);
        self.scheduled_delivery = Some(scheduled_delivery.unwrap_or(scheduled_pickup));
        self.state = RequestState::Assigned;
        Ok(())
    }

    /// Returns true when the request moved from assigned to in_progress.
    pub fn promote_in_progress(&mut self) -> bool {
        if self.state == RequestState::Assigned {
            self.state = RequestState::InProgress;
            return true;
        }
        false
    }

    pub fn cancel(&mut self) -> Result<(), AppError> {
        if self.state == RequestState::Delivered {
            return Err(self.invalid("cannot cancel a delivered service request"));
        }
        self.state = RequestState::Cancelled;
        Ok(())
    }

    pub fn mark_delivered(&mut self, now: DateTime<Utc>) {
        self.state = RequestState::Delivered;
        self.actual_delivery = Some(now);
    }

    fn invalid(&self, reason: &str) -> AppError {
        AppError::InvalidTransition(format!(
            "request {}: {reason} (state: {})",
            self.reference, self.state
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{Endpoint, RequestState, ServiceRequest, ServiceType};
    use crate::error::AppError;
    use crate::geo::GeoPoint;
    use crate::models::job::JobType;

    pub(crate) fn request() -> ServiceRequest {
        ServiceRequest {
            id: Uuid::new_v4(),
            reference: "SR/00001".to_string(),
            customer: "Acme Trading".to_string(),
            service_type: ServiceType::Local,
            pickup: Endpoint {
                address: "1 Harbour Road".to_string(),
                location: Some(GeoPoint {
                    lat: 53.5511,
                    lng: 9.9937,
                }),
                contact_name: Some("Sender".to_string()),
                phone: "+49 40 1111".to_string(),
            },
            delivery: Endpoint {
                address: "9 Market Street".to_string(),
                location: Some(GeoPoint {
                    lat: 53.56,
                    lng: 10.01,
                }),
                contact_name: Some("Recipient".to_string()),
                phone: "+49 40 2222".to_string(),
            },
            service_fee: 12.5,
            cod_amount: 0.0,
            currency: "EUR".to_string(),
            notes: None,
            assigned_driver: None,
            state: RequestState::Draft,
            scheduled_pickup: None,
            scheduled_delivery: None,
            actual_pickup: None,
            actual_delivery: None,
            created_at: Utc::now(),
            version: 0,
        }
    }

    #[test]
    fn confirm_requires_parcels() {
        let mut sr = request();
        assert!(matches!(sr.confirm(0), Err(AppError::ValidationFailed(_))));
        assert_eq!(sr.state, RequestState::Draft);

        sr.confirm(1).unwrap();
        assert_eq!(sr.state, RequestState::Confirmed);
    }

    #[test]
    fn confirm_twice_is_rejected() {
        let mut sr = request();
        sr.confirm(1).unwrap();
        assert!(matches!(sr.confirm(1), Err(AppError::InvalidTransition(_))));
    }

    #[test]
    fn assign_defaults_delivery_schedule_to_pickup() {
        let mut sr = request();
        let pickup_at = Utc::now() + Duration::hours(1);
        sr.assign(Uuid::new_v4(), pickup_at, None).unwrap();

        assert_eq!(sr.state, RequestState::Assigned);
        assert_eq!(sr.scheduled_delivery, Some(pickup_at));
    }

    #[test]
    fn reassignment_is_rejected() {
        let mut sr = request();
        sr.assign(Uuid::new_v4(), Utc::now(), None).unwrap();
        assert!(matches!(
            sr.assign(Uuid::new_v4(), Utc::now(), None),
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[test]
    fn in_progress_promotion_never_demotes() {
        let mut sr = request();
        assert!(!sr.promote_in_progress());
        assert_eq!(sr.state, RequestState::Draft);

        sr.state = RequestState::Assigned;
        assert!(sr.promote_in_progress());
        assert!(!sr.promote_in_progress());
        assert_eq!(sr.state, RequestState::InProgress);
    }

    #[test]
    fn delivered_request_cannot_be_cancelled() {
        let mut sr = request();
        sr.mark_delivered(Utc::now());
        assert!(matches!(sr.cancel(), Err(AppError::InvalidTransition(_))));
        assert_eq!(sr.state, RequestState::Delivered);
    }

    #[test]
    fn endpoint_follows_job_type() {
        let sr = request();
        assert_eq!(sr.endpoint_for(JobType::Pickup).address, "1 Harbour Road");
        assert_eq!(sr.endpoint_for(JobType::Delivery).address, "9 Market Street");
    }

    #[test]
    fn out_of_range_coordinates_fail_validation() {
        let mut sr = request();
        sr.delivery.location = Some(GeoPoint {
            lat: 91.0,
            lng: 0.0,
        });
        assert!(matches!(sr.validate(), Err(AppError::ValidationFailed(_))));

        let mut sr = request();
        sr.pickup.location = Some(GeoPoint {
            lat: 0.0,
            lng: 181.0,
        });
        assert!(matches!(sr.validate(), Err(AppError::ValidationFailed(_))));
    }

    #[test]
    fn negative_amounts_fail_validation() {
        let mut sr = request();
        sr.cod_amount = -1.0;
        assert!(matches!(sr.validate(), Err(AppError::ValidationFailed(_))));
    }
}
