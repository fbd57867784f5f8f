use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::contract::{ContractState, PartnerContract, PartnerType};
use crate::state::AppState;

fn default_sla_target() -> f64 {
    95.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewContract {
    pub partner: String,
    pub partner_type: PartnerType,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub rate_per_km: f64,
    #[serde(default)]
    pub rate_per_delivery: f64,
    #[serde(default)]
    pub minimum_guarantee: f64,
    pub currency: Option<String>,
    #[serde(default = "default_sla_target")]
    pub sla_target: f64,
    pub notes: Option<String>,
}

pub fn create(state: &AppState, input: NewContract) -> Result<PartnerContract, AppError> {
    let mut contract = PartnerContract {
        id: Uuid::new_v4(),
        reference: String::new(),
        partner: input.partner.trim().to_string(),
        partner_type: input.partner_type,
        start_date: input.start_date,
        end_date: input.end_date,
        rate_per_km: input.rate_per_km,
        rate_per_delivery: input.rate_per_delivery,
        minimum_guarantee: input.minimum_guarantee,
        currency: input
            .currency
            .unwrap_or_else(|| state.config.default_currency.clone()),
        sla_target: input.sla_target,
        state: ContractState::Draft,
        notes: input.notes,
        created_at: Utc::now(),
    };
    contract.validate()?;
    contract.reference = state.contract_seq.next();

    state.contracts.insert(contract.id, contract.clone());
    info!(contract_id = %contract.id, reference = %contract.reference, "contract created");
    Ok(contract)
}

pub fn activate(state: &AppState, contract_id: Uuid) -> Result<PartnerContract, AppError> {
    update(state, contract_id, PartnerContract::activate)
}

pub fn terminate(state: &AppState, contract_id: Uuid) -> Result<PartnerContract, AppError> {
    update(state, contract_id, PartnerContract::terminate)
}

pub fn list(state: &AppState) -> Vec<PartnerContract> {
    let mut contracts: Vec<PartnerContract> = state
        .contracts
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    contracts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    contracts
}

/// Moves active contracts whose end date has passed to expired.
pub fn expire_contracts(state: &AppState, today: NaiveDate) -> usize {
    let mut expired = 0;
    for mut entry in state.contracts.iter_mut() {
        if entry.value_mut().expire_if_ended(today) {
            info!(reference = %entry.value().reference, "contract expired");
            expired += 1;
        }
    }
    expired
}

fn update<F>(state: &AppState, contract_id: Uuid, op: F) -> Result<PartnerContract, AppError>
where
    F: FnOnce(&mut PartnerContract) -> Result<(), AppError>,
{
    let mut entry = state
        .contracts
        .get_mut(&contract_id)
        .ok_or_else(|| AppError::NotFound(format!("contract {contract_id} not found")))?;

    let mut draft = entry.value().clone();
    let result = op(&mut draft);
    let outcome = match &result {
        Ok(()) => "success",
        Err(err) => err.kind(),
    };
    state
        .metrics
        .transitions_total
        .with_label_values(&["contract", outcome])
        .inc();
    result?;

    *entry.value_mut() = draft.clone();
    info!(contract_id = %contract_id, state = %draft.state, "contract updated");
    Ok(draft)
}
