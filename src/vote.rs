//! The logged-in user's vote lifecycle.
//!
//! ```text
//! NotVoted --cast--> Unconfirmed(v) --confirm--> Confirmed(v)
//!                    Unconfirmed(v) --cast----> Unconfirmed(w)
//!                    Unconfirmed(v) <-unconfirm-- Confirmed(v)   (post failed)
//! any      --reconcile(v, confirmed=true)--> Confirmed(v)
//! ```
//!
//! Local transitions out of `Confirmed` are illegal, except undoing a local
//! confirmation whose post the server rejected. Only a server-sourced
//! [`VoteState::reconcile`] may change a confirmed vote.

use crate::error::RobinError;
use crate::models::VoteType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoteState {
    #[default]
    NotVoted,
    Unconfirmed(VoteType),
    Confirmed(VoteType),
}

impl VoteState {
    /// The vote currently held, if any.
    pub fn current(&self) -> Option<VoteType> {
        match *self {
            VoteState::NotVoted => None,
            VoteState::Unconfirmed(v) | VoteState::Confirmed(v) => Some(v),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, VoteState::Confirmed(_))
    }

    pub fn can_confirm(&self) -> bool {
        matches!(self, VoteState::Unconfirmed(_))
    }

    /// Record a locally submitted vote.
    pub fn cast(&mut self, vote: VoteType) -> Result<(), RobinError> {
        if !vote.is_submittable() {
            return Err(RobinError::IllegalState("cannot cast NOVOTE"));
        }
        match self {
            VoteState::Confirmed(_) => Err(RobinError::IllegalState("vote is already confirmed")),
            _ => {
                *self = VoteState::Unconfirmed(vote);
                Ok(())
            }
        }
    }

    /// Lock in the unconfirmed vote and return it.
    pub fn confirm(&mut self) -> Result<VoteType, RobinError> {
        match *self {
            VoteState::Unconfirmed(v) => {
                *self = VoteState::Confirmed(v);
                Ok(v)
            }
            VoteState::NotVoted => Err(RobinError::IllegalState("no vote to confirm")),
            VoteState::Confirmed(_) => Err(RobinError::IllegalState("vote is already confirmed")),
        }
    }

    /// Roll back a local confirmation of `vote` that never reached the server.
    pub fn unconfirm(&mut self, vote: VoteType) -> Result<(), RobinError> {
        match *self {
            VoteState::Confirmed(v) if v == vote => {
                *self = VoteState::Unconfirmed(v);
                Ok(())
            }
            _ => Err(RobinError::IllegalState("no matching confirmation to undo")),
        }
    }

    /// Converge on the server's view of this user's vote.
    ///
    /// A confirmed server vote always wins. An unconfirmed one never
    /// downgrades a confirmed local state. `NoVote` from the server is
    /// ignored unless nothing is confirmed yet.
    pub fn reconcile(&mut self, vote: VoteType, confirmed: bool) {
        let next = match (*self, vote, confirmed) {
            (_, VoteType::NoVote, _) if !self.is_confirmed() => VoteState::NotVoted,
            (_, VoteType::NoVote, _) => *self,
            (_, v, true) => VoteState::Confirmed(v),
            (VoteState::Confirmed(_), _, false) => *self,
            (_, v, false) => VoteState::Unconfirmed(v),
        };
        if next != *self {
            tracing::debug!(from = ?*self, to = ?next, "vote state reconciled");
        }
        *self = next;
    }
}
