//! The accusation vote: `none → pending → none`.
//!
//! One vote at a time, only during a round. The initiator's yes is implied.
//! A single no kills the vote; yes from everyone but the target convicts.

use std::collections::HashMap;

use spyglass_protocol::{PlayerId, Recipient, ServerEvent, Winner};
use spyglass_transport::ConnectionId;

use crate::state::Events;
use crate::{Room, RoomError, RoomStatus};

pub const VOTE_REJECTED_MESSAGE: &str = "vote rejected";
pub const TARGET_LEFT_MESSAGE: &str = "the accused player left, vote cancelled";

/// A vote in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteState {
    pub target: PlayerId,
    pub initiator: PlayerId,
    /// Only yes ballots are ever stored; a no ends the vote.
    pub ballots: HashMap<PlayerId, bool>,
    /// Everyone except the target.
    pub required_yes: usize,
}

impl VoteState {
    pub fn yes_count(&self) -> usize {
        self.ballots.values().filter(|yes| **yes).count()
    }

    fn is_carried(&self) -> bool {
        self.yes_count() >= self.required_yes
    }
}

impl Room {
    /// Accuses the player currently on `target_connection`.
    ///
    /// When the initiator's implied yes already meets the quorum (a
    /// two-player room), the vote resolves immediately.
    ///
    /// # Errors
    /// - [`RoomError::InvalidState`]: no round running, or a vote is pending
    /// - [`RoomError::PlayerNotFound`]: initiator not in the room
    /// - [`RoomError::Invalid`]: nobody on that connection, or accusing
    ///   yourself
    pub fn start_vote(
        &mut self,
        initiator: &PlayerId,
        target_connection: ConnectionId,
    ) -> Result<Events, RoomError> {
        self.require_status(RoomStatus::Playing)?;
        if self.vote.is_some() {
            return Err(RoomError::InvalidState("a vote is already pending".into()));
        }
        self.require_member(initiator)?;
        let target = self
            .player_by_connection(target_connection)
            .map(|p| p.id.clone())
            .ok_or_else(|| {
                RoomError::Invalid(format!("no player on {target_connection}"))
            })?;
        if target == *initiator {
            return Err(RoomError::Invalid("cannot accuse yourself".into()));
        }

        self.vote = Some(VoteState {
            target: target.clone(),
            initiator: initiator.clone(),
            ballots: HashMap::from([(initiator.clone(), true)]),
            required_yes: self.players.len() - 1,
        });
        tracing::info!(code = %self.code, %initiator, %target, "vote started");

        let mut events = Vec::new();
        if let Some(announcement) = self.vote_started_event() {
            events.push((Recipient::All, announcement));
        }
        events.extend(self.settle_vote());
        Ok(events)
    }

    /// Records a ballot on the pending vote.
    ///
    /// # Errors
    /// - [`RoomError::InvalidState`]: no round running, or no vote pending
    /// - [`RoomError::PlayerNotFound`]: voter not in the room
    /// - [`RoomError::Invalid`]: the target trying to vote
    pub fn submit_vote(&mut self, voter: &PlayerId, decision: bool) -> Result<Events, RoomError> {
        self.require_status(RoomStatus::Playing)?;
        self.require_member(voter)?;
        let target = self
            .vote
            .as_ref()
            .map(|v| v.target.clone())
            .ok_or_else(|| RoomError::InvalidState("no vote pending".into()))?;
        if target == *voter {
            return Err(RoomError::Invalid("the accused cannot vote".into()));
        }

        if !decision {
            self.vote = None;
            tracing::info!(code = %self.code, %voter, "vote rejected");
            return Ok(vec![(
                Recipient::All,
                ServerEvent::VoteResult {
                    success: false,
                    message: VOTE_REJECTED_MESSAGE.into(),
                },
            )]);
        }

        if let Some(vote) = self.vote.as_mut() {
            vote.ballots.insert(voter.clone(), true);
        }
        Ok(self.settle_vote())
    }

    /// The `voteStarted` announcement for the pending vote.
    pub(crate) fn vote_started_event(&self) -> Option<ServerEvent> {
        let vote = self.vote.as_ref()?;
        let target = self.player(&vote.target)?;
        let initiator_name = self
            .player(&vote.initiator)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        Some(ServerEvent::VoteStarted {
            target_name: target.name.clone(),
            initiator_name,
            target_id: target.connection,
        })
    }

    /// Updates the pending vote after `leaver` has been removed from the
    /// room: the vote dies with its target, otherwise the leaver's ballot
    /// is dropped and the quorum shrinks.
    pub(crate) fn vote_after_departure(&mut self, leaver: &PlayerId) -> Events {
        let Some(target) = self.vote.as_ref().map(|v| v.target.clone()) else {
            return Vec::new();
        };
        if target == *leaver {
            self.vote = None;
            return vec![(
                Recipient::All,
                ServerEvent::VoteResult {
                    success: false,
                    message: TARGET_LEFT_MESSAGE.into(),
                },
            )];
        }
        let required_yes = self.players.len().saturating_sub(1);
        if let Some(vote) = self.vote.as_mut() {
            vote.ballots.remove(leaver);
            vote.required_yes = required_yes;
        }
        self.settle_vote()
    }

    /// Convicts the target once the quorum is met.
    fn settle_vote(&mut self) -> Events {
        let Some(vote) = self.vote.as_ref().filter(|v| v.is_carried()) else {
            return Vec::new();
        };
        let target = vote.target.clone();
        let target_name = self
            .player(&target)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let target_is_role_holder = self
            .round
            .as_ref()
            .is_some_and(|r| r.is_role_holder(&target));

        tracing::info!(code = %self.code, %target, target_is_role_holder, "vote carried");
        if target_is_role_holder {
            self.finish(Winner::Civilians, &format!("spy caught: {target_name}"))
        } else {
            self.finish(
                Winner::Spies,
                &format!("wrong, {target_name} was a civilian"),
            )
        }
    }
}
