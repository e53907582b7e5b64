//! Normalization of loosely-shaped recipe JSON
//!
//! Language models return recipes with inconsistent field names
//! (`instruction`/`step`/`action`, `estimateSeconds`/`duration`/`minutes`),
//! wrap them in prose or in an API envelope, and occasionally send steps as
//! plain strings. Everything here maps that input onto [`Recipe`] without
//! failing on odd values: a duration that isn't a usable number becomes
//! "no timer".

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{DEFAULT_SERVINGS, Recipe, Step};
use crate::{Error, Result};

/// Title used when the input names none
pub const FALLBACK_TITLE: &str = "Generated Recipe";

static MINUTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*min").expect("valid minutes regex"));
static SECONDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*sec").expect("valid seconds regex"));

/// A step as it appears in generator output
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawStep {
    /// Bare instruction text
    Text(String),
    /// Object with any of the known field aliases
    Object(Map<String, Value>),
    /// Anything else (numbers, nulls, nested arrays); dropped
    Other(Value),
}

/// Step list as it appears in generator output
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSteps {
    List(Vec<RawStep>),
    /// Newline separated instructions
    Text(String),
    Other(Value),
}

/// A recipe as it appears in generator output; every field optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecipe {
    pub id: Option<Value>,
    pub title: Option<Value>,
    pub name: Option<Value>,
    pub recipe_title: Option<Value>,
    pub summary: Option<Value>,
    pub description: Option<Value>,
    pub original_servings: Option<Value>,
    pub servings: Option<Value>,
    pub ingredients: Option<Value>,
    pub steps: Option<RawSteps>,
}

impl RawRecipe {
    /// Whether the object looks like a recipe at all
    #[must_use]
    pub const fn has_recipe_fields(&self) -> bool {
        self.title.is_some()
            || self.name.is_some()
            || self.recipe_title.is_some()
            || self.ingredients.is_some()
            || self.steps.is_some()
    }

    /// Produce the canonical recipe
    #[must_use]
    pub fn normalize(self) -> Recipe {
        let id = match self.id {
            Some(Value::String(id)) if !id.trim().is_empty() => id,
            Some(Value::Number(n)) => n.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };

        let title = first_text([&self.title, &self.name, &self.recipe_title])
            .unwrap_or_else(|| FALLBACK_TITLE.to_string());
        let summary = first_text([&self.summary, &self.description]).unwrap_or_default();

        let original_servings = [&self.original_servings, &self.servings]
            .into_iter()
            .flatten()
            .find_map(positive_whole)
            .unwrap_or(DEFAULT_SERVINGS);

        Recipe {
            id,
            title,
            summary,
            ingredients: normalize_ingredients(self.ingredients.as_ref()),
            steps: self.steps.map(normalize_steps).unwrap_or_default(),
            original_servings,
        }
    }
}

impl RawStep {
    /// Canonical step, or `None` for values that carry no instruction
    #[must_use]
    pub fn normalize(self) -> Option<Step> {
        match self {
            Self::Text(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| Step::new(text, 0))
            }
            Self::Object(fields) => {
                let instruction = ["instruction", "step", "action", "description"]
                    .iter()
                    .find_map(|key| non_empty_str(fields.get(*key)))
                    .map_or_else(
                        || Value::Object(fields.clone()).to_string(),
                        ToString::to_string,
                    );
                Some(Step::new(instruction, step_seconds(&fields)))
            }
            Self::Other(value) => {
                tracing::debug!(%value, "dropping step without instruction");
                None
            }
        }
    }
}

/// Pull a JSON value out of free-form text
///
/// Tries the whole text first, then the widest `{...}` span, then the widest
/// `[...]` span.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    [('{', '}'), ('[', ']')].into_iter().find_map(|(open, close)| {
        let start = trimmed.find(open)?;
        let end = trimmed.rfind(close)?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&trimmed[start..=end]).ok()
    })
}

/// Parse generator output (raw text, API envelope, or recipe JSON) into a recipe
///
/// # Errors
///
/// Returns [`Error::Recipe`] if no recipe-shaped JSON object can be found
pub fn parse_recipe_text(text: &str) -> Result<Recipe> {
    let value = extract_json(text)
        .ok_or_else(|| Error::Recipe("no JSON found in recipe text".to_string()))?;
    recipe_from_value(value)
}

/// Normalize an already-parsed JSON value into a recipe
///
/// # Errors
///
/// Returns [`Error::Recipe`] if the value holds no recipe fields
pub fn recipe_from_value(value: Value) -> Result<Recipe> {
    if let Some(text) = candidate_text(&value) {
        tracing::debug!("unwrapping generator response envelope");
        return parse_recipe_text(text);
    }

    let raw: RawRecipe = serde_json::from_value(value)
        .map_err(|e| Error::Recipe(format!("recipe is not a JSON object: {e}")))?;
    if !raw.has_recipe_fields() {
        return Err(Error::Recipe(
            "JSON has no title, ingredients or steps".to_string(),
        ));
    }

    let recipe = raw.normalize();
    tracing::debug!(
        title = %recipe.title,
        steps = recipe.steps.len(),
        ingredients = recipe.ingredients.len(),
        "normalized recipe"
    );
    Ok(recipe)
}

/// Text part of a `candidates[0].content.parts[0].text` response envelope
fn candidate_text(value: &Value) -> Option<&str> {
    value
        .pointer("/candidates/0/content/parts/0/text")
        .or_else(|| value.pointer("/outputs/0/content/0/text"))
        .and_then(Value::as_str)
}

fn normalize_steps(raw: RawSteps) -> Vec<Step> {
    match raw {
        RawSteps::List(steps) => steps.into_iter().filter_map(RawStep::normalize).collect(),
        RawSteps::Text(text) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| Step::new(line, 0))
            .collect(),
        RawSteps::Other(_) => Vec::new(),
    }
}

fn normalize_ingredients(raw: Option<&Value>) -> Vec<String> {
    match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(text)) => text
            .split(['\n', ','])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Duration of a step object in whole seconds, zero when unusable
fn step_seconds(fields: &Map<String, Value>) -> u32 {
    let numeric = ["estimateSeconds", "timeSeconds", "duration", "minutes", "secs"]
        .iter()
        .find_map(|key| {
            let n = fields.get(*key)?.as_f64()?;
            Some(if *key == "minutes" { n * 60.0 } else { n })
        });

    if let Some(seconds) = numeric {
        return whole_seconds(seconds);
    }

    let Some(time) = fields.get("time").and_then(Value::as_str) else {
        return 0;
    };

    if let Some(caps) = MINUTES_RE.captures(time) {
        return caps[1].parse::<u32>().map_or(0, |m| m.saturating_mul(60));
    }
    SECONDS_RE
        .captures(time)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .unwrap_or(0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(seconds: f64) -> u32 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    seconds.round().min(f64::from(u32::MAX)) as u32
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn positive_whole(value: &Value) -> Option<u32> {
    let n = value.as_f64()?;
    (n.is_finite() && n >= 1.0).then(|| n.round().min(f64::from(u32::MAX)) as u32)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn first_text<const N: usize>(candidates: [&Option<Value>; N]) -> Option<String> {
    candidates
        .into_iter()
        .find_map(|value| non_empty_str(value.as_ref()))
        .map(ToString::to_string)
}
