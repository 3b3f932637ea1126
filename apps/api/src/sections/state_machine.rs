use crate::sections::error::StoreError;
use crate::sections::models::SectionState;

/// Validates a section state transition. Every store write goes through this first.
pub fn validate_transition(from: SectionState, to: SectionState) -> Result<(), StoreError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StoreError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: SectionState) -> &'static [SectionState] {
    use SectionState::*;
    match from {
        Locked => &[Ready],
        Ready => &[Generating],
        Generating => &[Complete, Error],
        Complete => &[Ready],
        Error => &[Ready],
    }
}
