//! Round lifecycle: dealing roles, the clock, and resolution.
//!
//! Every way a round can end goes through [`Room::finish`], which only
//! acts while the room is `Playing` and flips it to `Results` before doing
//! anything else. Whatever fires second (a tick, a guess, the last ballot)
//! finds the room already resolved and does nothing.

use std::collections::HashSet;
use std::time::Instant;

use rand::Rng;
use spyglass_protocol::{MASKED_LOCATION, PlayerId, Recipient, Role, ServerEvent, Winner};

use crate::state::{Events, Player};
use crate::{Room, RoomError, RoomStatus};

/// Stand-in for the revealed location when no round data exists.
pub const UNKNOWN_LOCATION: &str = "unknown";

pub const REASON_TIMEOUT: &str = "time ran out, the spy wins";
pub const REASON_ROLE_HOLDERS_LEFT: &str = "the spy left the game";
pub const REASON_ONLY_ROLE_HOLDERS: &str = "only spies remain";

/// The secret half of a round.
#[derive(Debug, Clone)]
pub struct RoundState {
    pub secret_location: String,
    pub role_holders: HashSet<PlayerId>,
    /// Names of spies who left mid-round, so the reveal still lists them.
    pub departed_role_holders: Vec<String>,
    pub started_at: Instant,
    pub remaining_secs: u32,
}

impl RoundState {
    pub fn is_role_holder(&self, player_id: &PlayerId) -> bool {
        self.role_holders.contains(player_id)
    }
}

impl Room {
    /// Deals roles and starts the clock.
    ///
    /// The location is drawn uniformly from the active set. The number of
    /// spies is the configured count capped at `players - 1`, and spies are
    /// drawn by rejection sampling over seat indices.
    ///
    /// # Errors
    /// - [`RoomError::NotHost`]: `actor` isn't the host
    /// - [`RoomError::InvalidState`]: not in the lobby
    /// - [`RoomError::Invalid`]: fewer players than `min_players`
    pub fn start_round<R: Rng + ?Sized>(
        &mut self,
        actor: &PlayerId,
        rng: &mut R,
    ) -> Result<Events, RoomError> {
        self.require_host(actor)?;
        self.require_status(RoomStatus::Lobby)?;
        let player_count = self.players.len();
        if player_count < self.min_players {
            return Err(RoomError::Invalid(format!(
                "need at least {} players, have {player_count}",
                self.min_players
            )));
        }

        let locations = &self.settings.active_locations;
        let secret_location = locations[rng.random_range(0..locations.len())].clone();

        let spy_count = usize::from(self.settings.spy_count).min(player_count - 1);
        let mut seats = HashSet::with_capacity(spy_count);
        while seats.len() < spy_count {
            seats.insert(rng.random_range(0..player_count));
        }
        let role_holders = seats
            .into_iter()
            .map(|seat| self.players[seat].id.clone())
            .collect();

        self.round = Some(RoundState {
            secret_location,
            role_holders,
            departed_role_holders: Vec::new(),
            started_at: Instant::now(),
            remaining_secs: self.settings.duration_secs(),
        });
        self.vote = None;
        self.outcome = None;
        self.status = RoomStatus::Playing;
        self.rounds_started += 1;

        tracing::info!(
            code = %self.code,
            round = self.rounds_started,
            players = player_count,
            spies = spy_count,
            seconds = self.settings.duration_secs(),
            "round started"
        );

        Ok(self
            .players
            .iter()
            .filter_map(|p| {
                self.game_started_for(p)
                    .map(|event| (Recipient::Player(p.id.clone()), event))
            })
            .collect())
    }

    /// Advances the clock by `elapsed` seconds. Resolves the round in the
    /// spies' favour when it reaches zero. A tick outside a round does
    /// nothing.
    pub fn tick(&mut self, elapsed: u32) -> Events {
        if !self.status.is_active() {
            return Vec::new();
        }
        let Some(round) = self.round.as_mut() else {
            return Vec::new();
        };
        round.remaining_secs = round.remaining_secs.saturating_sub(elapsed);
        if round.remaining_secs == 0 {
            return self.finish(Winner::Spies, REASON_TIMEOUT);
        }
        Vec::new()
    }

    /// A spy names the location. Right answer: spies win. Wrong answer:
    /// civilians win.
    ///
    /// # Errors
    /// - [`RoomError::InvalidState`]: no round running
    /// - [`RoomError::NotRoleHolder`]: `actor` isn't a spy
    pub fn guess(&mut self, actor: &PlayerId, location: &str) -> Result<Events, RoomError> {
        self.require_status(RoomStatus::Playing)?;
        let round = self
            .round
            .as_ref()
            .ok_or_else(|| RoomError::InvalidState("no round data".into()))?;
        if !round.is_role_holder(actor) {
            return Err(RoomError::NotRoleHolder);
        }

        if location == round.secret_location {
            let reason = format!("the spy guessed the location: {location}");
            Ok(self.finish(Winner::Spies, &reason))
        } else {
            let reason = format!(
                "the spy guessed wrong, the location was {}",
                round.secret_location
            );
            Ok(self.finish(Winner::Civilians, &reason))
        }
    }

    /// Resolves the round. Runs at most once per round: only a `Playing`
    /// room is resolved, and resolving moves it to `Results`.
    ///
    /// Clears the round and any vote, records the outcome for players who
    /// reconnect, and returns the single `gameOver` broadcast.
    pub fn finish(&mut self, winner: Winner, reason: &str) -> Events {
        if self.status != RoomStatus::Playing {
            tracing::debug!(code = %self.code, status = %self.status, "finish ignored");
            return Vec::new();
        }
        self.status = RoomStatus::Results;
        self.vote = None;

        let round = self.round.take();
        let role_holder_names = match &round {
            Some(round) => self
                .players
                .iter()
                .filter(|p| round.is_role_holder(&p.id))
                .map(|p| p.name.clone())
                .chain(round.departed_role_holders.iter().cloned())
                .collect(),
            None => Vec::new(),
        };
        let revealed_location = round
            .map(|r| r.secret_location)
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

        tracing::info!(code = %self.code, %winner, reason, "round finished");

        let event = ServerEvent::GameOver {
            winner,
            reason: reason.to_string(),
            revealed_location,
            role_holder_names,
        };
        self.outcome = Some(event.clone());
        vec![(Recipient::All, event)]
    }

    /// Sends everyone back to the lobby, abandoning a running round.
    ///
    /// # Errors
    /// - [`RoomError::NotHost`]: `actor` isn't the host
    /// - [`RoomError::InvalidState`]: already in the lobby
    pub fn return_to_lobby(&mut self, actor: &PlayerId) -> Result<Events, RoomError> {
        self.require_host(actor)?;
        if !self.status.can_transition_to(RoomStatus::Lobby) {
            return Err(RoomError::InvalidState(format!(
                "cannot return to lobby from {}",
                self.status
            )));
        }
        self.status = RoomStatus::Lobby;
        self.round = None;
        self.vote = None;
        self.outcome = None;
        tracing::info!(code = %self.code, "returned to lobby");
        Ok(vec![(Recipient::All, ServerEvent::ReturnToLobby)])
    }

    /// What a player who (re)appears needs to see to catch up.
    pub(crate) fn replay_for(&self, player_id: &PlayerId) -> Events {
        let to = || Recipient::Player(player_id.clone());
        match self.status {
            RoomStatus::Lobby => Vec::new(),
            RoomStatus::Playing => {
                let mut events = Vec::new();
                if let Some(event) = self.player(player_id).and_then(|p| self.game_started_for(p)) {
                    events.push((to(), event));
                }
                if let Some(event) = self.vote_started_event() {
                    events.push((to(), event));
                }
                events
            }
            RoomStatus::Results => self
                .outcome
                .iter()
                .map(|event| (to(), event.clone()))
                .collect(),
        }
    }

    /// Settles the round after `leaver` has been removed: the round ends if
    /// no spies or only spies are left, and the vote is updated.
    pub(crate) fn settle_departure(&mut self, leaver: &Player) -> Events {
        let Some(round) = self.round.as_mut() else {
            return Vec::new();
        };
        if round.role_holders.remove(&leaver.id) {
            round.departed_role_holders.push(leaver.name.clone());
        }

        let no_role_holders = round.role_holders.is_empty();
        let only_role_holders = self.players.iter().all(|p| round.is_role_holder(&p.id));
        if no_role_holders {
            return self.finish(Winner::Civilians, REASON_ROLE_HOLDERS_LEFT);
        }
        if only_role_holders {
            return self.finish(Winner::Spies, REASON_ONLY_ROLE_HOLDERS);
        }
        self.vote_after_departure(&leaver.id)
    }

    /// The personalized `gameStarted` for one player.
    fn game_started_for(&self, player: &Player) -> Option<ServerEvent> {
        let round = self.round.as_ref()?;
        let is_role_holder = round.is_role_holder(&player.id);
        Some(ServerEvent::GameStarted {
            role: if is_role_holder {
                Role::Spy
            } else {
                Role::Civilian
            },
            location: if is_role_holder {
                MASKED_LOCATION.to_string()
            } else {
                round.secret_location.clone()
            },
            is_role_holder,
            seconds_remaining: round.remaining_secs,
            active_locations: self.settings.active_locations.clone(),
            roster: self.roster(),
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::state::tests::{arrival, conn, lobby_with, pid, sent_to};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    /// A room with `n` players in a running round.
    fn playing(n: usize) -> Room {
        let mut room = lobby_with(n);
        room.start_round(&pid("host"), &mut rng()).unwrap();
        room
    }

    fn spies(room: &Room) -> Vec<PlayerId> {
        room.players()
            .iter()
            .filter(|p| room.round().unwrap().is_role_holder(&p.id))
            .map(|p| p.id.clone())
            .collect()
    }

    fn civilians(room: &Room) -> Vec<PlayerId> {
        room.players()
            .iter()
            .filter(|p| !room.round().unwrap().is_role_holder(&p.id))
            .map(|p| p.id.clone())
            .collect()
    }

    fn game_overs(events: &Events) -> usize {
        events
            .iter()
            .filter(|(_, e)| matches!(e, ServerEvent::GameOver { .. }))
            .count()
    }

    // =====================================================================
    // start_round()
    // =====================================================================

    #[test]
    fn test_start_round_four_players_one_spy_gets_mask() {
        let mut room = lobby_with(4);
        room.settings.active_locations = vec!["L1".into(), "L2".into(), "L3".into()];

        let events = room.start_round(&pid("host"), &mut rng()).unwrap();

        assert_eq!(room.status(), RoomStatus::Playing);
        assert_eq!(events.len(), 4, "one personalized event per player");
        let secret = room.round().unwrap().secret_location.clone();
        assert!(["L1", "L2", "L3"].contains(&secret.as_str()));

        let mut holders = 0;
        for (recipient, event) in &events {
            let Recipient::Player(_) = recipient else {
                panic!("gameStarted must be per player");
            };
            let ServerEvent::GameStarted {
                role,
                location,
                is_role_holder,
                seconds_remaining,
                active_locations,
                roster,
            } = event
            else {
                panic!("unexpected event {event:?}");
            };
            assert_eq!(*seconds_remaining, 300);
            assert_eq!(active_locations.len(), 3);
            assert_eq!(roster.len(), 4);
            if *is_role_holder {
                holders += 1;
                assert_eq!(*role, Role::Spy);
                assert_eq!(location, MASKED_LOCATION);
            } else {
                assert_eq!(*role, Role::Civilian);
                assert_eq!(*location, secret);
            }
        }
        assert_eq!(holders, 1);
    }

    #[test]
    fn test_start_round_spy_count_capped_at_players_minus_one() {
        let mut room = lobby_with(3);
        room.settings.spy_count = 3;

        room.start_round(&pid("host"), &mut rng()).unwrap();

        assert_eq!(spies(&room).len(), 2);
    }

    #[test]
    fn test_start_round_respects_configured_spy_count() {
        for seed in 0..20 {
            let mut room = lobby_with(6);
            room.settings.spy_count = 2;
            room.start_round(&pid("host"), &mut StdRng::seed_from_u64(seed))
                .unwrap();
            assert_eq!(spies(&room).len(), 2, "seed {seed}");
        }
    }

    #[test]
    fn test_start_round_non_host_is_rejected() {
        let mut room = lobby_with(3);
        let result = room.start_round(&pid("p2"), &mut rng());
        assert!(matches!(result, Err(RoomError::NotHost)));
        assert_eq!(room.status(), RoomStatus::Lobby);
    }

    #[test]
    fn test_start_round_while_playing_is_rejected() {
        let mut room = playing(3);
        let before = room.round().unwrap().secret_location.clone();

        let result = room.start_round(&pid("host"), &mut rng());

        assert!(matches!(result, Err(RoomError::InvalidState(_))));
        assert_eq!(room.round().unwrap().secret_location, before);
        assert_eq!(room.rounds_started(), 1);
    }

    #[test]
    fn test_start_round_alone_is_rejected() {
        let mut room = lobby_with(1);
        let result = room.start_round(&pid("host"), &mut rng());
        assert!(matches!(result, Err(RoomError::Invalid(_))));
    }

    // =====================================================================
    // tick()
    // =====================================================================

    #[test]
    fn test_tick_counts_down() {
        let mut room = playing(3);
        assert!(room.tick(1).is_empty());
        assert!(room.tick(2).is_empty());
        assert_eq!(room.round().unwrap().remaining_secs, 297);
    }

    #[test]
    fn test_tick_to_zero_spies_win_by_timeout() {
        let mut room = playing(3);

        let events = room.tick(300);

        assert_eq!(room.status(), RoomStatus::Results);
        assert!(matches!(
            &events[..],
            [(Recipient::All, ServerEvent::GameOver { winner: Winner::Spies, reason, .. })]
                if reason == REASON_TIMEOUT
        ));
    }

    #[test]
    fn test_tick_after_round_is_noop() {
        let mut room = playing(3);
        room.tick(300);

        assert!(room.tick(1).is_empty());
        assert_eq!(room.status(), RoomStatus::Results);
    }

    #[test]
    fn test_tick_in_lobby_is_noop() {
        let mut room = lobby_with(3);
        assert!(room.tick(1000).is_empty());
        assert_eq!(room.status(), RoomStatus::Lobby);
    }

    // =====================================================================
    // guess()
    // =====================================================================

    #[test]
    fn test_guess_correct_spies_win() {
        let mut room = playing(4);
        let spy = spies(&room)[0].clone();
        let secret = room.round().unwrap().secret_location.clone();

        let events = room.guess(&spy, &secret).unwrap();

        assert!(matches!(
            &events[0].1,
            ServerEvent::GameOver { winner: Winner::Spies, revealed_location, .. }
                if *revealed_location == secret
        ));
    }

    #[test]
    fn test_guess_wrong_civilians_win_and_location_revealed() {
        let mut room = playing(4);
        let spy = spies(&room)[0].clone();
        let secret = room.round().unwrap().secret_location.clone();

        let events = room.guess(&spy, "Definitely Not It").unwrap();

        let ServerEvent::GameOver {
            winner,
            revealed_location,
            role_holder_names,
            ..
        } = &events[0].1
        else {
            panic!("expected gameOver");
        };
        assert_eq!(*winner, Winner::Civilians);
        assert_eq!(*revealed_location, secret);
        assert_eq!(role_holder_names.len(), 1);
    }

    #[test]
    fn test_guess_by_civilian_is_rejected() {
        let mut room = playing(4);
        let civilian = civilians(&room)[0].clone();

        let result = room.guess(&civilian, "Beach");

        assert!(matches!(result, Err(RoomError::NotRoleHolder)));
        assert_eq!(room.status(), RoomStatus::Playing);
    }

    #[test]
    fn test_guess_outside_round_is_rejected() {
        let mut room = lobby_with(3);
        assert!(matches!(
            room.guess(&pid("host"), "Beach"),
            Err(RoomError::InvalidState(_))
        ));
    }

    // =====================================================================
    // finish()
    // =====================================================================

    #[test]
    fn test_finish_twice_has_no_further_effect() {
        let mut room = playing(3);
        let first = room.finish(Winner::Civilians, "first");
        let recorded = room.outcome.clone();

        let second = room.finish(Winner::Spies, "second");

        assert_eq!(game_overs(&first), 1);
        assert!(second.is_empty());
        assert_eq!(room.outcome, recorded);
        assert_eq!(room.status(), RoomStatus::Results);
    }

    #[test]
    fn test_finish_every_trigger_racing_yields_one_game_over() {
        let mut room = playing(4);
        let spy = spies(&room)[0].clone();
        let secret = room.round().unwrap().secret_location.clone();
        let mut events = Vec::new();

        events.extend(room.tick(300));
        events.extend(room.guess(&spy, &secret).unwrap_or_default());
        events.extend(room.finish(Winner::Civilians, "conviction"));
        events.extend(room.tick(1));

        assert_eq!(game_overs(&events), 1);
    }

    #[test]
    fn test_finish_without_round_data_uses_sentinels() {
        let mut room = lobby_with(2);
        room.status = RoomStatus::Playing;

        let events = room.finish(Winner::Spies, "oops");

        assert!(matches!(
            &events[0].1,
            ServerEvent::GameOver { revealed_location, role_holder_names, .. }
                if revealed_location == UNKNOWN_LOCATION && role_holder_names.is_empty()
        ));
    }

    #[test]
    fn test_finish_clears_round_and_vote() {
        let mut room = playing(4);
        let target = room.players()[1].connection;
        room.start_vote(&pid("host"), target).unwrap();

        room.finish(Winner::Spies, "done");

        assert!(room.round().is_none());
        assert!(room.vote().is_none());
    }

    // =====================================================================
    // return_to_lobby()
    // =====================================================================

    #[test]
    fn test_return_to_lobby_from_results() {
        let mut room = playing(3);
        room.tick(300);

        let events = room.return_to_lobby(&pid("host")).unwrap();

        assert_eq!(room.status(), RoomStatus::Lobby);
        assert!(room.outcome.is_none());
        assert_eq!(events, vec![(Recipient::All, ServerEvent::ReturnToLobby)]);
    }

    #[test]
    fn test_return_to_lobby_mid_round_abandons_round() {
        let mut room = playing(3);

        room.return_to_lobby(&pid("host")).unwrap();

        assert_eq!(room.status(), RoomStatus::Lobby);
        assert!(room.round().is_none());
        assert!(room.finish(Winner::Spies, "late").is_empty());
    }

    #[test]
    fn test_return_to_lobby_non_host_is_rejected() {
        let mut room = playing(3);
        assert!(matches!(
            room.return_to_lobby(&pid("p2")),
            Err(RoomError::NotHost)
        ));
        assert_eq!(room.status(), RoomStatus::Playing);
    }

    #[test]
    fn test_return_to_lobby_from_lobby_is_rejected() {
        let mut room = lobby_with(2);
        assert!(room.return_to_lobby(&pid("host")).is_err());
    }

    // =====================================================================
    // Replay on rejoin
    // =====================================================================

    #[test]
    fn test_rejoin_mid_round_replays_current_seconds() {
        let mut room = playing(3);
        room.tick(42);
        let player = room.players()[2].id.clone();

        let events = room.rejoin(&player, conn(77)).unwrap();

        let started: Vec<_> = sent_to(&events, &player)
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::GameStarted {
                    seconds_remaining, ..
                } => Some(*seconds_remaining),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![258]);
    }

    #[test]
    fn test_rejoin_mid_vote_replays_vote() {
        let mut room = playing(4);
        let target = room.players()[3].connection;
        room.start_vote(&pid("host"), target).unwrap();

        let events = room.rejoin(&pid("p2"), conn(22)).unwrap();

        assert!(
            sent_to(&events, &pid("p2"))
                .iter()
                .any(|e| matches!(e, ServerEvent::VoteStarted { .. }))
        );
    }

    #[test]
    fn test_rejoin_in_results_replays_outcome() {
        let mut room = playing(3);
        room.tick(300);

        let events = room.rejoin(&pid("p3"), conn(33)).unwrap();

        assert_eq!(game_overs(&events), 1);
        assert!(
            events
                .iter()
                .all(|(r, e)| !matches!(e, ServerEvent::GameOver { .. })
                    || *r == Recipient::Player(pid("p3")))
        );
    }

    #[test]
    fn test_join_with_known_identity_mid_round_replays() {
        let mut room = playing(3);

        let events = room.join(arrival("p2", 40, "Back Again")).unwrap();

        assert!(
            sent_to(&events, &pid("p2"))
                .iter()
                .any(|e| matches!(e, ServerEvent::GameStarted { .. }))
        );
        assert_eq!(room.player(&pid("p2")).unwrap().name, "Back Again");
    }

    // =====================================================================
    // Departures mid-round
    // =====================================================================

    #[test]
    fn test_leave_last_spy_civilians_win() {
        let mut room = playing(4);
        room.round.as_mut().unwrap().role_holders = HashSet::from([pid("p3")]);

        let departure = room.leave(&pid("p3")).unwrap();

        assert_eq!(room.status(), RoomStatus::Results);
        assert!(departure.events.iter().any(|(_, e)| matches!(
            e,
            ServerEvent::GameOver { winner: Winner::Civilians, reason, .. }
                if reason == REASON_ROLE_HOLDERS_LEFT
        )));
    }

    #[test]
    fn test_leave_until_only_spies_remain_spies_win() {
        let mut room = playing(3);
        room.round.as_mut().unwrap().role_holders = HashSet::from([pid("host"), pid("p2")]);

        let departure = room.leave(&pid("p3")).unwrap();

        assert_eq!(room.status(), RoomStatus::Results);
        assert!(departure.events.iter().any(|(_, e)| matches!(
            e,
            ServerEvent::GameOver { winner: Winner::Spies, reason, .. }
                if reason == REASON_ONLY_ROLE_HOLDERS
        )));
    }

    #[test]
    fn test_leave_spy_mid_round_is_still_named_in_reveal() {
        let mut room = playing(5);
        room.round.as_mut().unwrap().role_holders = HashSet::from([pid("p2"), pid("p3")]);
        let departed = room.player(&pid("p2")).unwrap().name.clone();
        room.leave(&pid("p2")).unwrap();

        let events = room.finish(Winner::Spies, REASON_TIMEOUT);

        let ServerEvent::GameOver {
            role_holder_names, ..
        } = &events[0].1
        else {
            panic!("expected gameOver");
        };
        assert_eq!(role_holder_names.len(), 2);
        assert!(role_holder_names.contains(&departed));
    }

    #[test]
    fn test_leave_last_spy_reveal_names_them() {
        let mut room = playing(4);
        room.round.as_mut().unwrap().role_holders = HashSet::from([pid("p3")]);
        let departed = room.player(&pid("p3")).unwrap().name.clone();

        let departure = room.leave(&pid("p3")).unwrap();

        assert!(departure.events.iter().any(|(_, e)| matches!(
            e,
            ServerEvent::GameOver { role_holder_names, .. } if *role_holder_names == vec![departed.clone()]
        )));
    }

    #[test]
    fn test_leave_one_of_two_spies_keeps_playing() {
        let mut room = playing(5);
        room.round.as_mut().unwrap().role_holders = HashSet::from([pid("p2"), pid("p3")]);

        room.leave(&pid("p2")).unwrap();

        assert_eq!(room.status(), RoomStatus::Playing);
        assert!(room.round().unwrap().role_holders.contains(&pid("p3")));
    }

    #[test]
    fn test_leave_civilian_mid_round_keeps_playing() {
        let mut room = playing(5);
        let Some(civilian) = civilians(&room)
            .into_iter()
            .find(|id| *id != pid("host"))
        else {
            panic!("five players must include a non-host civilian");
        };

        let departure = room.leave(&civilian).unwrap();

        assert_eq!(room.status(), RoomStatus::Playing);
        assert_eq!(game_overs(&departure.events), 0);
    }
}
