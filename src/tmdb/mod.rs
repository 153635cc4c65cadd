mod client;
pub mod fetch;
mod genres;
pub mod mood;
mod types;

pub use client::{TmdbClient, TmdbError, TmdbResult};
pub use fetch::{
    FetchError, NetworkErrorKind, RawResponse, ReqwestTransport, ResilientFetcher, RetryPolicy,
    Transport, TransportError,
};
pub use genres::{genre_id, GENRES};
pub use mood::{find_mood, MoodPreset, MOODS};
pub use types::{summarize_results, MovieSummary};
