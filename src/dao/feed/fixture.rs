use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use serde::Deserialize;

use super::{FeedError, FeedResult, FeedSource};
use crate::state::game::{GameId, GameSnapshot, TeamId};

const SCHEDULE_FILE: &str = "schedule.json";

/// Feed backed by JSON files on disk: `<dir>/<game_id>.json` snapshots and a `schedule.json`.
#[derive(Debug, Clone)]
pub struct FixtureFeed {
    dir: Arc<Path>,
}

#[derive(Debug, Deserialize)]
struct ScheduleEntry {
    game_id: GameId,
    home_team_id: TeamId,
    away_team_id: TeamId,
}

impl FixtureFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Arc::from(dir.into()),
        }
    }

    /// Load a single snapshot file, independent of any fixture directory.
    pub async fn load_file(path: &Path) -> FeedResult<GameSnapshot> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                FeedError::NotFound {
                    game_id: GameId::new(
                        path.file_stem()
                            .map(|stem| stem.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    ),
                }
            } else {
                FeedError::transient(format!("failed to read `{}`", path.display()), err)
            }
        })?;

        serde_json::from_str(&contents)
            .map_err(|err| FeedError::transient(format!("invalid snapshot `{}`", path.display()), err))
    }
}

impl FeedSource for FixtureFeed {
    fn snapshot(&self, game_id: &GameId) -> BoxFuture<'static, FeedResult<GameSnapshot>> {
        let path = self.dir.join(format!("{game_id}.json"));
        let game_id = game_id.clone();
        Box::pin(async move {
            match Self::load_file(&path).await {
                Err(FeedError::NotFound { .. }) => Err(FeedError::NotFound { game_id }),
                other => other,
            }
        })
    }

    fn daily_game_ids(
        &self,
        favorite: Option<TeamId>,
    ) -> BoxFuture<'static, FeedResult<Vec<GameId>>> {
        let path = self.dir.join(SCHEDULE_FILE);
        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(err) => {
                    return Err(FeedError::transient(
                        format!("failed to read `{}`", path.display()),
                        err,
                    ));
                }
            };

            let entries: Vec<ScheduleEntry> = serde_json::from_str(&contents).map_err(|err| {
                FeedError::transient(format!("invalid schedule `{}`", path.display()), err)
            })?;

            Ok(entries
                .into_iter()
                .filter(|entry| {
                    favorite.is_none_or(|team| {
                        entry.home_team_id == team || entry.away_team_id == team
                    })
                })
                .map(|entry| entry.game_id)
                .collect())
        })
    }
}
