use super::{SportStrategy, ordinal};
use crate::{
    dao::sink::NotificationContent,
    state::game::{EventDetail, EventKind, FeedEvent, GameSnapshot},
};

const REGULATION_PERIODS: u32 = 3;

/// Hockey: goals, penalties and period boundaries; waits for the three stars.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hockey;

fn period_label(period: u32) -> String {
    match period {
        0 => "pregame".into(),
        p if p <= REGULATION_PERIODS => format!("{} period", ordinal(p)),
        p if p == REGULATION_PERIODS + 1 => "overtime".into(),
        p => format!("{} overtime", ordinal(p - REGULATION_PERIODS)),
    }
}

impl SportStrategy for Hockey {
    fn is_notable(&self, event: &FeedEvent) -> bool {
        matches!(
            event.kind(),
            EventKind::Goal | EventKind::Penalty | EventKind::PeriodBoundary
        )
    }

    fn settles(&self) -> bool {
        true
    }

    fn render_preview(&self, snapshot: &GameSnapshot) -> NotificationContent {
        NotificationContent::new(
            format!("{} at {}", snapshot.away.name, snapshot.home.name),
            "Puck drop is imminent.",
        )
    }

    fn render_event(&self, snapshot: &GameSnapshot, event: &FeedEvent) -> NotificationContent {
        let payload = &event.payload;
        let when = format!("{} of the {}", payload.time_in_period, period_label(payload.period));

        match &payload.detail {
            EventDetail::Goal(goal) => {
                let assists = if goal.assists.is_empty() {
                    "unassisted".to_string()
                } else {
                    format!("assists: {}", goal.assists.join(", "))
                };
                let shot = goal
                    .shot_type
                    .as_deref()
                    .map(|shot| format!(" ({shot})"))
                    .unwrap_or_default();
                NotificationContent::new(
                    format!("{} goal!", goal.team),
                    format!(
                        "{}{shot}, {assists}, at {when}. {} {} - {} {}",
                        goal.scorer,
                        snapshot.away.abbrev,
                        goal.score_after.away,
                        snapshot.home.abbrev,
                        goal.score_after.home
                    ),
                )
            }
            EventDetail::Penalty(penalty) => NotificationContent::new(
                format!("{} penalty", penalty.team),
                format!(
                    "{}: {} minutes for {}, at {when}.",
                    penalty.player.as_deref().unwrap_or("Bench"),
                    penalty.minutes,
                    penalty.infraction
                ),
            ),
            EventDetail::PeriodStart => NotificationContent::new(
                format!("Start of the {}", period_label(payload.period)),
                format!(
                    "{} {} - {} {}",
                    snapshot.away.abbrev, snapshot.score.away, snapshot.home.abbrev, snapshot.score.home
                ),
            ),
            EventDetail::PeriodEnd => NotificationContent::new(
                format!("End of the {}", period_label(payload.period)),
                format!(
                    "{} {} - {} {}",
                    snapshot.away.abbrev, snapshot.score.away, snapshot.home.abbrev, snapshot.score.home
                ),
            ),
            EventDetail::ScoringPlay(play) | EventDetail::PitchingChange(play) => {
                NotificationContent::new(play.team.clone(), play.description.clone())
            }
            EventDetail::Other { description } => {
                NotificationContent::new("Update", description.clone())
            }
        }
    }

    fn render_summary(&self, snapshot: &GameSnapshot) -> NotificationContent {
        let Some(summary) = snapshot.summary.as_ref().filter(|s| !s.stars.is_empty()) else {
            return NotificationContent::new("Three stars", "Three stars were not announced.");
        };

        let mut stars = summary.stars.clone();
        stars.sort_by_key(|star| star.rank);
        let mut lines: Vec<String> = stars
            .iter()
            .map(|star| format!("{} star: {} ({})", ordinal(u32::from(star.rank)), star.name, star.team))
            .collect();
        if let Some(series) = &summary.series_status {
            lines.push(series.clone());
        }

        NotificationContent::new("Three stars", lines.join("\n"))
    }
}
