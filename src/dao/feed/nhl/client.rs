use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::models::{Landing, PlayByPlay, ScoreBoard};
use crate::{
    dao::feed::{FeedError, FeedResult, FeedSource},
    state::game::{GameId, GameSnapshot, GameStatus, TeamId},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the NHL web API.
#[derive(Clone)]
pub struct NhlFeed {
    client: Client,
    base_url: Arc<str>,
}

impl NhlFeed {
    /// Build a feed client against `base_url`.
    pub fn new(base_url: impl AsRef<str>) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| FeedError::transient("failed to build NHL client", err))?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
        })
    }

    async fn get_json<T>(
        client: Client,
        base_url: Arc<str>,
        path: String,
        game_id: Option<GameId>,
    ) -> FeedResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{base_url}/{path}");
        debug!(%url, "fetching NHL feed");

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|err| FeedError::transient(format!("request to `{path}` failed"), err))?;

        match response.status() {
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|err| FeedError::transient(format!("invalid payload from `{path}`"), err)),
            StatusCode::NOT_FOUND => match game_id {
                Some(game_id) => Err(FeedError::NotFound { game_id }),
                None => Err(FeedError::Transient {
                    message: format!("`{path}` returned 404"),
                    source: None,
                }),
            },
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(FeedError::RateLimited { retry_after })
            }
            other => Err(FeedError::Transient {
                message: format!("unexpected status {other} from `{path}`"),
                source: None,
            }),
        }
    }
}

impl FeedSource for NhlFeed {
    fn snapshot(&self, game_id: &GameId) -> BoxFuture<'static, FeedResult<GameSnapshot>> {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let game_id = game_id.clone();

        Box::pin(async move {
            let play_by_play: PlayByPlay = Self::get_json(
                client.clone(),
                base_url.clone(),
                format!("gamecenter/{game_id}/play-by-play"),
                Some(game_id.clone()),
            )
            .await?;

            let status = super::models::map_status(
                &play_by_play.game_state,
                play_by_play.game_schedule_state.as_deref(),
            );

            // The landing page only carries the three stars once the game is over.
            let summary = if status == GameStatus::Final {
                match Self::get_json::<Landing>(
                    client,
                    base_url,
                    format!("gamecenter/{game_id}/landing"),
                    Some(game_id.clone()),
                )
                .await
                {
                    Ok(landing) => landing.into_summary(),
                    Err(err) => {
                        warn!(%game_id, error = %err, "failed to fetch post-game summary");
                        None
                    }
                }
            } else {
                None
            };

            Ok(play_by_play.into_snapshot(summary))
        })
    }

    fn daily_game_ids(
        &self,
        favorite: Option<TeamId>,
    ) -> BoxFuture<'static, FeedResult<Vec<GameId>>> {
        let client = self.client.clone();
        let base_url = self.base_url.clone();

        Box::pin(async move {
            let board: ScoreBoard =
                Self::get_json(client, base_url, "score/now".to_string(), None).await?;

            Ok(board
                .games
                .into_iter()
                .filter(|game| {
                    favorite.is_none_or(|team| game.home_team.id == team || game.away_team.id == team)
                })
                .map(|game| GameId::from(game.id))
                .collect())
        })
    }
}
