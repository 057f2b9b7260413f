use super::{SportStrategy, ordinal};
use crate::{
    dao::sink::NotificationContent,
    state::game::{EventDetail, EventKind, FeedEvent, GameSnapshot},
};

/// Baseball: scoring plays, pitching changes and inning ends; no post-game settling.
#[derive(Debug, Clone, Copy, Default)]
pub struct Baseball;

impl SportStrategy for Baseball {
    fn is_notable(&self, event: &FeedEvent) -> bool {
        match event.kind() {
            EventKind::ScoringPlay | EventKind::PitchingChange => true,
            EventKind::PeriodBoundary => matches!(event.payload.detail, EventDetail::PeriodEnd),
            _ => false,
        }
    }

    fn settles(&self) -> bool {
        false
    }

    fn render_preview(&self, snapshot: &GameSnapshot) -> NotificationContent {
        NotificationContent::new(
            format!("{} at {}", snapshot.away.name, snapshot.home.name),
            "First pitch is imminent.",
        )
    }

    fn render_event(&self, snapshot: &GameSnapshot, event: &FeedEvent) -> NotificationContent {
        let inning = ordinal(event.payload.period);
        match &event.payload.detail {
            EventDetail::ScoringPlay(play) => {
                let score = play.score_after.unwrap_or(snapshot.score);
                NotificationContent::new(
                    format!("{} scores in the {inning}", play.team),
                    format!(
                        "{} {} {} - {} {}",
                        play.description,
                        snapshot.away.abbrev,
                        score.away,
                        snapshot.home.abbrev,
                        score.home
                    ),
                )
            }
            EventDetail::PitchingChange(play) => NotificationContent::new(
                format!("{} pitching change", play.team),
                play.description.clone(),
            ),
            EventDetail::PeriodEnd => NotificationContent::new(
                format!("End of the {inning}"),
                format!(
                    "{} {} - {} {}",
                    snapshot.away.abbrev, snapshot.score.away, snapshot.home.abbrev, snapshot.score.home
                ),
            ),
            EventDetail::PeriodStart => {
                NotificationContent::new(format!("Top of the {inning}"), String::new())
            }
            EventDetail::Goal(goal) => {
                NotificationContent::new(goal.team.clone(), goal.scorer.clone())
            }
            EventDetail::Penalty(penalty) => {
                NotificationContent::new(penalty.team.clone(), penalty.infraction.clone())
            }
            EventDetail::Other { description } => {
                NotificationContent::new("Update", description.clone())
            }
        }
    }

    fn render_summary(&self, snapshot: &GameSnapshot) -> NotificationContent {
        self.render_final(snapshot)
    }
}
