//! Application phases: the broader lifecycle a tailored document lives in.
//!
//! Generation moves `draft -> generating`; assembly moves `generating -> ready`.
//! Everything after `ready` is advanced by the user.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sections::models::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentPhase {
    Draft,
    Generating,
    Ready,
    Applied,
    Interviewing,
    Offer,
    Rejected,
    Withdrawn,
}

impl DocumentPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentPhase::Draft => "draft",
            DocumentPhase::Generating => "generating",
            DocumentPhase::Ready => "ready",
            DocumentPhase::Applied => "applied",
            DocumentPhase::Interviewing => "interviewing",
            DocumentPhase::Offer => "offer",
            DocumentPhase::Rejected => "rejected",
            DocumentPhase::Withdrawn => "withdrawn",
        }
    }

    pub fn next_phases(&self) -> &'static [DocumentPhase] {
        use DocumentPhase::*;
        match self {
            Draft => &[Generating, Withdrawn],
            Generating => &[Ready, Withdrawn],
            Ready => &[Generating, Applied, Withdrawn],
            Applied => &[Interviewing, Rejected, Withdrawn],
            Interviewing => &[Offer, Rejected, Withdrawn],
            Offer => &[Withdrawn],
            Rejected | Withdrawn => &[],
        }
    }

    pub fn can_advance_to(&self, next: DocumentPhase) -> bool {
        self.next_phases().contains(&next)
    }

    /// Once submitted to an employer, regenerating content no longer moves the phase back.
    pub fn is_submitted(&self) -> bool {
        !matches!(
            self,
            DocumentPhase::Draft | DocumentPhase::Generating | DocumentPhase::Ready
        )
    }
}

impl fmt::Display for DocumentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentPhase {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use DocumentPhase::*;
        [
            Draft,
            Generating,
            Ready,
            Applied,
            Interviewing,
            Offer,
            Rejected,
            Withdrawn,
        ]
        .into_iter()
        .find(|p| p.as_str() == s)
        .ok_or_else(|| UnknownVariant {
            kind: "document phase",
            value: s.to_string(),
        })
    }
}
