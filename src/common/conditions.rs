use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

pub const CONDITION_ACCEPTED: &str = "Accepted";
pub const CONDITION_PROGRAMMED: &str = "Programmed";

pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyConditionReason {
    Accepted,
    Invalid,
    TargetNotFound,
    Conflicted,
}

impl PolicyConditionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyConditionReason::Accepted => "Accepted",
            PolicyConditionReason::Invalid => "Invalid",
            PolicyConditionReason::TargetNotFound => "TargetNotFound",
            PolicyConditionReason::Conflicted => "Conflicted",
        }
    }
}

pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    conditions.iter().any(|c| c.type_ == condition_type && c.status == STATUS_TRUE)
}

pub fn accepted_condition(reason: PolicyConditionReason, message: String, observed_generation: Option<i64>) -> Condition {
    Condition {
        type_: CONDITION_ACCEPTED.to_owned(),
        status: if reason == PolicyConditionReason::Accepted { STATUS_TRUE } else { STATUS_FALSE }.to_owned(),
        reason: reason.as_str().to_owned(),
        message,
        observed_generation,
        last_transition_time: Time(chrono::Utc::now()),
    }
}

/// Merges `new_condition` into `conditions` by type.
///
/// The transition time is kept when the status is unchanged. Conditions of other types are preserved.
pub fn set_status_condition(conditions: &mut Vec<Condition>, new_condition: Condition) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == new_condition.type_) {
        if existing.status != new_condition.status {
            existing.status = new_condition.status;
            existing.last_transition_time = new_condition.last_transition_time;
        }
        existing.reason = new_condition.reason;
        existing.message = new_condition.message;
        existing.observed_generation = new_condition.observed_generation;
    } else {
        conditions.push(new_condition);
    }
}

pub fn conditions_equal_ignoring_time(this: &[Condition], other: &[Condition]) -> bool {
    this.len() == other.len()
        && this.iter().zip(other.iter()).all(|(a, b)| {
            a.type_ == b.type_ && a.status == b.status && a.reason == b.reason && a.message == b.message && a.observed_generation == b.observed_generation
        })
}
