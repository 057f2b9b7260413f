//! Wire models for the NHL web API and their mapping onto [`GameSnapshot`].

use std::collections::HashMap;

use serde::Deserialize;

use crate::state::game::{
    EventDetail, EventPayload, FeedEvent, GameClock, GameId, GameSnapshot, GameStatus, GoalDetail,
    PenaltyDetail, PostGameSummary, Score, StarPlayer, TeamId, TeamInfo,
};

#[derive(Debug, Deserialize)]
pub(super) struct LocalizedName {
    #[serde(default)]
    pub default: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PlayByPlay {
    pub id: u64,
    pub game_state: String,
    #[serde(default)]
    pub game_schedule_state: Option<String>,
    pub away_team: TeamBlock,
    pub home_team: TeamBlock,
    #[serde(default)]
    pub period_descriptor: Option<PeriodDescriptor>,
    #[serde(default)]
    pub clock: Option<ClockBlock>,
    #[serde(default)]
    pub plays: Vec<Play>,
    #[serde(default)]
    pub roster_spots: Vec<RosterSpot>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TeamBlock {
    pub id: TeamId,
    pub abbrev: String,
    #[serde(default)]
    pub common_name: Option<LocalizedName>,
    #[serde(default)]
    pub score: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PeriodDescriptor {
    pub number: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ClockBlock {
    #[serde(default)]
    pub time_remaining: Option<String>,
    #[serde(default)]
    pub in_intermission: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Play {
    pub event_id: u64,
    pub type_desc_key: String,
    #[serde(default)]
    pub sort_order: u64,
    #[serde(default)]
    pub period_descriptor: Option<PeriodDescriptor>,
    #[serde(default)]
    pub time_in_period: Option<String>,
    #[serde(default)]
    pub details: Option<PlayDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PlayDetails {
    pub event_owner_team_id: Option<TeamId>,
    pub scoring_player_id: Option<u64>,
    pub assist1_player_id: Option<u64>,
    pub assist2_player_id: Option<u64>,
    pub shot_type: Option<String>,
    pub away_score: Option<u32>,
    pub home_score: Option<u32>,
    pub desc_key: Option<String>,
    pub duration: Option<u32>,
    pub committed_by_player_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RosterSpot {
    pub player_id: u64,
    pub first_name: LocalizedName,
    pub last_name: LocalizedName,
}

#[derive(Debug, Deserialize)]
pub(super) struct Landing {
    #[serde(default)]
    pub summary: Option<LandingSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LandingSummary {
    #[serde(default)]
    pub three_stars: Vec<ThreeStar>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ThreeStar {
    pub star: u8,
    #[serde(default)]
    pub team_abbrev: String,
    pub name: LocalizedName,
}

#[derive(Debug, Deserialize)]
pub(super) struct ScoreBoard {
    #[serde(default)]
    pub games: Vec<ScoreBoardGame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ScoreBoardGame {
    pub id: u64,
    pub away_team: ScoreBoardTeam,
    pub home_team: ScoreBoardTeam,
}

#[derive(Debug, Deserialize)]
pub(super) struct ScoreBoardTeam {
    pub id: TeamId,
}

/// Map the API's game state codes onto [`GameStatus`].
pub(super) fn map_status(game_state: &str, schedule_state: Option<&str>) -> GameStatus {
    if matches!(schedule_state, Some("PPD" | "CNCL" | "SUSP")) {
        return GameStatus::Postponed;
    }

    match game_state {
        "PRE" => GameStatus::Imminent,
        "LIVE" | "CRIT" => GameStatus::Live,
        "FINAL" | "OFF" => GameStatus::Final,
        _ => GameStatus::Scheduled,
    }
}

impl PlayByPlay {
    pub(super) fn into_snapshot(self, summary: Option<PostGameSummary>) -> GameSnapshot {
        let names: HashMap<u64, String> = self
            .roster_spots
            .iter()
            .map(|spot| {
                let initial = spot.first_name.default.chars().next().unwrap_or(' ');
                (
                    spot.player_id,
                    format!("{initial}. {}", spot.last_name.default),
                )
            })
            .collect();
        let abbrevs: HashMap<TeamId, String> = [
            (self.away_team.id, self.away_team.abbrev.clone()),
            (self.home_team.id, self.home_team.abbrev.clone()),
        ]
        .into_iter()
        .collect();

        let status = map_status(&self.game_state, self.game_schedule_state.as_deref());
        let score = Score {
            away: self.away_team.score.unwrap_or(0),
            home: self.home_team.score.unwrap_or(0),
        };
        let clock = GameClock {
            period: self.period_descriptor.map(|p| p.number).unwrap_or(0),
            time_remaining: self.clock.as_ref().and_then(|c| c.time_remaining.clone()),
            in_break: self.clock.as_ref().is_some_and(|c| c.in_intermission),
        };
        let events = self
            .plays
            .into_iter()
            .filter_map(|play| play.into_event(&names, &abbrevs))
            .collect();

        GameSnapshot {
            game_id: GameId::from(self.id),
            status,
            away: self.away_team.into_info(),
            home: self.home_team.into_info(),
            clock,
            score,
            events,
            summary,
        }
    }
}

impl TeamBlock {
    fn into_info(self) -> TeamInfo {
        TeamInfo {
            id: self.id,
            name: self
                .common_name
                .map(|name| name.default)
                .unwrap_or_else(|| self.abbrev.clone()),
            abbrev: self.abbrev,
        }
    }
}

impl Play {
    /// Plays the bot never renders (shots, faceoffs, hits) are dropped here.
    fn into_event(
        self,
        names: &HashMap<u64, String>,
        abbrevs: &HashMap<TeamId, String>,
    ) -> Option<FeedEvent> {
        let details = self.details.unwrap_or_default();
        let player = |id: Option<u64>| id.and_then(|id| names.get(&id).cloned());
        let team = details
            .event_owner_team_id
            .and_then(|id| abbrevs.get(&id).cloned())
            .unwrap_or_default();

        let detail = match self.type_desc_key.as_str() {
            "goal" => EventDetail::Goal(GoalDetail {
                team,
                scorer: player(details.scoring_player_id).unwrap_or_else(|| "Unknown".into()),
                assists: [details.assist1_player_id, details.assist2_player_id]
                    .into_iter()
                    .filter_map(|id| player(id))
                    .collect(),
                shot_type: details.shot_type,
                score_after: Score {
                    away: details.away_score.unwrap_or(0),
                    home: details.home_score.unwrap_or(0),
                },
            }),
            "penalty" => EventDetail::Penalty(PenaltyDetail {
                team,
                player: player(details.committed_by_player_id),
                infraction: details
                    .desc_key
                    .map(|key| key.replace('-', " "))
                    .unwrap_or_else(|| "penalty".into()),
                minutes: details.duration.unwrap_or(2),
            }),
            "period-start" => EventDetail::PeriodStart,
            "period-end" => EventDetail::PeriodEnd,
            _ => return None,
        };

        Some(FeedEvent {
            id: self.event_id.to_string(),
            sequence: self.sort_order,
            payload: EventPayload {
                period: self.period_descriptor.map(|p| p.number).unwrap_or(0),
                time_in_period: self.time_in_period.unwrap_or_default(),
                detail,
            },
        })
    }
}

impl Landing {
    pub(super) fn into_summary(self) -> Option<PostGameSummary> {
        let stars: Vec<StarPlayer> = self
            .summary?
            .three_stars
            .into_iter()
            .map(|star| StarPlayer {
                rank: star.star,
                name: star.name.default,
                team: star.team_abbrev,
            })
            .collect();

        (!stars.is_empty()).then_some(PostGameSummary {
            stars,
            series_status: None,
        })
    }
}
