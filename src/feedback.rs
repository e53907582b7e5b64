//! Taste feedback
//!
//! A finished session offers a six-axis taste rating. Ratings are appended to
//! a JSONL store, averaged into a [`TasteProfile`], and the profile biases the
//! prompt sent to the recipe generator.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Highest value on every taste axis
pub const MAX_AXIS: u8 = 5;

/// Axis names in display order
pub const AXES: [&str; 6] = ["sweet", "salty", "spicy", "sour", "bitter", "umami"];

/// One user's rating of a cooked recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasteRating {
    pub recipe_id: String,
    pub sweet: u8,
    pub salty: u8,
    pub spicy: u8,
    pub sour: u8,
    pub bitter: u8,
    pub umami: u8,
    #[serde(default)]
    pub notes: String,
    pub rated_at: DateTime<Utc>,
}

impl TasteRating {
    /// Build a rating from axis values in [`AXES`] order
    ///
    /// # Errors
    ///
    /// Returns [`Error::Feedback`] if any axis exceeds [`MAX_AXIS`]
    pub fn new(recipe_id: impl Into<String>, axes: [u8; 6], notes: impl Into<String>) -> Result<Self> {
        let [sweet, salty, spicy, sour, bitter, umami] = axes;
        let rating = Self {
            recipe_id: recipe_id.into(),
            sweet,
            salty,
            spicy,
            sour,
            bitter,
            umami,
            notes: notes.into(),
            rated_at: Utc::now(),
        };
        rating.validate()?;
        Ok(rating)
    }

    /// Axis values in [`AXES`] order
    #[must_use]
    pub const fn axes(&self) -> [u8; 6] {
        [
            self.sweet,
            self.salty,
            self.spicy,
            self.sour,
            self.bitter,
            self.umami,
        ]
    }

    /// Check every axis is within `0..=5`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Feedback`] naming the first out-of-range axis
    pub fn validate(&self) -> Result<()> {
        for (name, value) in AXES.iter().zip(self.axes()) {
            if value > MAX_AXIS {
                return Err(Error::Feedback(format!(
                    "{name} must be between 0 and {MAX_AXIS}, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Destination for submitted ratings
pub trait FeedbackSink: Send + Sync {
    /// Persist one rating
    ///
    /// # Errors
    ///
    /// Returns an error if the rating is invalid or cannot be stored
    fn submit(&self, rating: &TasteRating) -> Result<()>;
}

/// Append-only JSONL rating store
#[derive(Debug, Clone)]
pub struct JsonlRatingStore {
    path: PathBuf,
}

impl JsonlRatingStore {
    /// Store backed by `path`; the file is created on first submit
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Underlying file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored rating, skipping malformed lines
    ///
    /// A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read
    pub fn load(&self) -> Result<Vec<TasteRating>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ratings = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<TasteRating>(trimmed) {
                Ok(rating) => ratings.push(rating),
                Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "skipping malformed rating"),
            }
        }
        Ok(ratings)
    }

    /// Aggregate profile over every stored rating
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read
    pub fn profile(&self) -> Result<TasteProfile> {
        Ok(TasteProfile::from_ratings(&self.load()?))
    }
}

impl FeedbackSink for JsonlRatingStore {
    fn submit(&self, rating: &TasteRating) -> Result<()> {
        rating.validate()?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(rating)?)?;
        file.flush()?;

        tracing::info!(recipe_id = %rating.recipe_id, path = %self.path.display(), "stored taste rating");
        Ok(())
    }
}

/// Average rating per taste axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TasteProfile {
    pub sweet: f64,
    pub salty: f64,
    pub spicy: f64,
    pub sour: f64,
    pub bitter: f64,
    pub umami: f64,
    /// Number of ratings averaged
    pub ratings: usize,
}

impl TasteProfile {
    /// Average each axis over `ratings`; all zero when empty
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_ratings(ratings: &[TasteRating]) -> Self {
        if ratings.is_empty() {
            return Self::default();
        }

        let mut sums = [0.0_f64; 6];
        for rating in ratings {
            for (sum, value) in sums.iter_mut().zip(rating.axes()) {
                *sum += f64::from(value);
            }
        }
        let count = ratings.len() as f64;
        let [sweet, salty, spicy, sour, bitter, umami] = sums.map(|sum| sum / count);

        Self {
            sweet,
            salty,
            spicy,
            sour,
            bitter,
            umami,
            ratings: ratings.len(),
        }
    }

    /// Axis averages in [`AXES`] order
    #[must_use]
    pub const fn axes(&self) -> [f64; 6] {
        [
            self.sweet,
            self.salty,
            self.spicy,
            self.sour,
            self.bitter,
            self.umami,
        ]
    }

    /// Prefix a generation prompt with the user's non-zero preferences
    #[must_use]
    pub fn enhance_prompt(&self, prompt: &str) -> String {
        let preferences: Vec<String> = AXES
            .iter()
            .zip(self.axes())
            .filter(|(_, value)| *value > 0.0)
            .map(|(name, value)| format!("{name}: {}", (value * 10.0).round() / 10.0))
            .collect();

        if preferences.is_empty() {
            return prompt.to_string();
        }
        format!(
            "Create a recipe for someone with these taste preferences: {}. {prompt}",
            preferences.join(", ")
        )
    }
}
