//! Status enums and transition tables for jobs, proposals and contracts.
//!
//! Statuses are persisted as their display text (`"Proposal Submitted"`,
//! `"Needs Revision"`, ...), which is also their serde representation.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// A status enum with a transition table.
pub trait StatusMachine: Copy + Eq + fmt::Display + 'static {
    /// Entity name used in errors and log fields.
    const ENTITY: &'static str;

    /// The status a freshly created record starts in.
    const INITIAL: Self;

    /// Statuses reachable in one step from `self`.
    fn allowed_next(&self) -> &'static [Self];

    fn can_transition_to(&self, target: Self) -> bool {
        self.allowed_next().contains(&target)
    }

    fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }
}

/// Error returned when a stored or requested status string is unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {entity} status '{value}'")]
pub struct UnknownStatus {
    pub entity: &'static str,
    pub value: String,
}

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $entity:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every status, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownStatus {
                        entity: $entity,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

status_enum! {
    /// Lifecycle of a job. Completed and Cancelled are terminal.
    JobStatus, "job" {
        Pending => "Pending",
        ProposalSubmitted => "Proposal Submitted",
        ProposalApproved => "Proposal Approved",
        ProposalNeedsRevision => "Proposal Needs Revision",
        ContractDrafted => "Contract Drafted",
        ContractApproved => "Contract Approved",
        InProgress => "In Progress",
        Completed => "Completed",
        Cancelled => "Cancelled",
    }
}

status_enum! {
    /// Lifecycle of a proposal. Deleted is the terminal soft-delete marker.
    ProposalStatus, "proposal" {
        Submitted => "Submitted",
        Approved => "Approved",
        NeedsRevision => "Needs Revision",
        Rejected => "Rejected",
        ContractCreated => "Contract Created",
        Deleted => "Deleted",
    }
}

status_enum! {
    /// Lifecycle of a contract. Only Draft has successors.
    ContractStatus, "contract" {
        Draft => "Draft",
        Approved => "Approved",
        Rejected => "Rejected",
        Revised => "Revised",
    }
}

impl StatusMachine for JobStatus {
    const ENTITY: &'static str = "job";
    const INITIAL: Self = JobStatus::Pending;

    fn allowed_next(&self) -> &'static [Self] {
        use JobStatus::*;
        match self {
            Pending => &[ProposalSubmitted, Cancelled],
            ProposalSubmitted => &[ProposalApproved, ProposalNeedsRevision, Cancelled],
            ProposalApproved => &[ContractDrafted, Cancelled],
            ProposalNeedsRevision => &[ProposalSubmitted, Cancelled],
            ContractDrafted => &[ContractApproved, Cancelled],
            ContractApproved => &[InProgress, Cancelled],
            InProgress => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }
}

impl JobStatus {
    /// Whether a job in this status must reference a proposal.
    ///
    /// Cancelled is exempt: a job can be cancelled before or after a
    /// proposal arrives.
    pub fn requires_proposal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Cancelled)
    }
}

impl StatusMachine for ProposalStatus {
    const ENTITY: &'static str = "proposal";
    const INITIAL: Self = ProposalStatus::Submitted;

    fn allowed_next(&self) -> &'static [Self] {
        use ProposalStatus::*;
        match self {
            Submitted => &[Approved, NeedsRevision, Rejected, Deleted],
            Approved => &[ContractCreated, Deleted],
            NeedsRevision => &[Submitted, Deleted],
            Rejected => &[Deleted],
            ContractCreated => &[Deleted],
            Deleted => &[],
        }
    }
}

impl ProposalStatus {
    pub fn is_live(&self) -> bool {
        *self != ProposalStatus::Deleted
    }
}

impl StatusMachine for ContractStatus {
    const ENTITY: &'static str = "contract";
    const INITIAL: Self = ContractStatus::Draft;

    fn allowed_next(&self) -> &'static [Self] {
        use ContractStatus::*;
        match self {
            Draft => &[Approved, Rejected, Revised],
            Approved | Rejected | Revised => &[],
        }
    }
}
