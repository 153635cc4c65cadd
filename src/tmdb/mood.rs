use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;

/// A named bundle of discovery filters.
#[derive(Debug, Clone, Serialize)]
pub struct MoodPreset {
    pub name: &'static str,
    pub genres: &'static [u32],
    pub keywords: &'static [&'static str],
    #[serde(rename = "yearRange")]
    pub year_range: (u16, u16),
    #[serde(rename = "minRating")]
    pub min_rating: f32,
}

pub const MIN_VOTE_COUNT: u32 = 1000;
pub const SUGGESTION_LIMIT: usize = 6;

pub const MOODS: &[MoodPreset] = &[
    MoodPreset {
        name: "Happy",
        genres: &[35],
        keywords: &["feel-good", "uplifting", "comedy"],
        year_range: (2020, 2024),
        min_rating: 7.0,
    },
    MoodPreset {
        name: "Sad",
        genres: &[18],
        keywords: &["emotional", "drama", "heartfelt"],
        year_range: (2015, 2024),
        min_rating: 7.5,
    },
    MoodPreset {
        name: "Romantic",
        genres: &[10749],
        keywords: &["romance", "love", "romantic"],
        year_range: (2018, 2024),
        min_rating: 7.0,
    },
    MoodPreset {
        name: "Excited",
        genres: &[28],
        keywords: &["action", "adventure", "thrilling"],
        year_range: (2020, 2024),
        min_rating: 7.0,
    },
    MoodPreset {
        name: "Thoughtful",
        genres: &[9648],
        keywords: &["mystery", "psychological", "mind-bending"],
        year_range: (2015, 2024),
        min_rating: 7.5,
    },
    MoodPreset {
        name: "Nostalgic",
        genres: &[36],
        keywords: &["classic", "nostalgic", "retro"],
        year_range: (1990, 2010),
        min_rating: 7.0,
    },
    MoodPreset {
        name: "Adventurous",
        genres: &[12],
        keywords: &["adventure", "journey", "quest"],
        year_range: (2018, 2024),
        min_rating: 7.0,
    },
    MoodPreset {
        name: "Inspiring",
        genres: &[18],
        keywords: &["inspirational", "motivational", "biography"],
        year_range: (2015, 2024),
        min_rating: 7.5,
    },
];

pub fn find_mood(name: &str) -> Option<&'static MoodPreset> {
    let name = name.trim();
    MOODS.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}

impl MoodPreset {
    /// Query parameters for TMDB `/discover/movie`.
    pub fn discover_params(&self) -> Vec<(&'static str, String)> {
        let genres: Vec<String> = self.genres.iter().map(|g| g.to_string()).collect();
        vec![
            ("with_genres", genres.join("|")),
            ("primary_release_date.gte", format!("{}-01-01", self.year_range.0)),
            ("primary_release_date.lte", format!("{}-12-31", self.year_range.1)),
            ("vote_average.gte", format!("{:.1}", self.min_rating)),
            ("vote_count.gte", MIN_VOTE_COUNT.to_string()),
            ("sort_by", "vote_average.desc".to_string()),
            ("include_adult", "false".to_string()),
        ]
    }
}

/// Keep results that have artwork, shuffle them and take up to `limit`.
pub fn pick_suggestions<R: Rng + ?Sized>(page: &Value, limit: usize, rng: &mut R) -> Vec<Value> {
    let has = |movie: &Value, field: &str| {
        movie
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };

    let mut movies: Vec<Value> = page
        .get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter(|m| has(m, "poster_path") && has(m, "backdrop_path"))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    movies.shuffle(rng);
    movies.truncate(limit);
    movies
}
