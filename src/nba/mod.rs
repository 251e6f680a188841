pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod types;

pub use cached_client::{latest_games, CachedNbaClient, GAMES_NAMESPACE, SEASON_AVERAGES_NAMESPACE};
pub use client::NbaClient;
pub use types::{GameRecord, Player, SeasonAverage, StatCategory};
