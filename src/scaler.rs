//! Recipe scaling
//!
//! Ingredient quantities scale linearly with the serving ratio; step
//! durations grow sub-linearly (doubling a batch adds roughly a fifth to the
//! cooking time). Everything here is a pure function of its inputs.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::language::Language;
use crate::recipe::{Recipe, Step};

/// Duration growth per doubling of the batch
pub const GROWTH_PER_DOUBLING: f64 = 0.2;

/// Duration shrink per halving of the batch
pub const SHRINK_PER_HALVING: f64 = 0.1;

/// Distance within which a quantity snaps to a common fraction
const FRACTION_TOLERANCE: f64 = 0.05;

/// Common culinary fractions, checked in order; first match wins
const FRACTIONS: &[(f64, &str)] = &[
    (0.25, "1/4"),
    (0.33, "1/3"),
    (0.5, "1/2"),
    (0.66, "2/3"),
    (0.75, "3/4"),
    (1.25, "1 1/4"),
    (1.33, "1 1/3"),
    (1.5, "1 1/2"),
    (1.66, "1 2/3"),
    (1.75, "1 3/4"),
    (2.25, "2 1/4"),
    (2.33, "2 1/3"),
    (2.5, "2 1/2"),
    (2.66, "2 2/3"),
    (2.75, "2 3/4"),
];

static MIXED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(\d+)/(\d+)(\s*)([a-zA-Z]+)?\s+(.+)$").expect("valid mixed regex")
});
static FRACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)/(\d+)(\s*)([a-zA-Z]+)?\s+(.+)$").expect("valid fraction regex")
});
static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+\.?\d*)-(\d+\.?\d*)(\s*)([a-zA-Z]+)?\s+(.+)$").expect("valid range regex")
});
static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+\.?\d*)(\s*)([a-zA-Z/]+)?\s+(.+)$").expect("valid decimal regex")
});

/// A recipe projected onto a target serving count
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaledRecipe {
    /// Recipe with scaled ingredients and step durations
    #[serde(flatten)]
    pub recipe: Recipe,
    pub target_servings: u32,
    /// `target_servings / original_servings`, always positive
    pub scale_factor: f64,
}

impl ScaledRecipe {
    /// The unscaled projection of a recipe
    #[must_use]
    pub fn unchanged(recipe: &Recipe) -> Self {
        Self {
            target_servings: recipe.base_servings(),
            recipe: recipe.clone(),
            scale_factor: 1.0,
        }
    }
}

/// Scale a recipe to `target_servings`
///
/// A target of zero returns the recipe unchanged. A target equal to the
/// recipe's own serving count is a no-op as well.
#[must_use]
pub fn scale(recipe: &Recipe, target_servings: u32) -> ScaledRecipe {
    if target_servings == 0 {
        tracing::debug!(recipe = %recipe.title, "ignoring zero target servings");
        return ScaledRecipe::unchanged(recipe);
    }

    let base = recipe.base_servings();
    if target_servings == base {
        return ScaledRecipe::unchanged(recipe);
    }

    let factor = f64::from(target_servings) / f64::from(base);
    let multiplier = time_multiplier(factor);

    let mut scaled = recipe.clone();
    scaled.ingredients = recipe
        .ingredients
        .iter()
        .map(|ingredient| scale_ingredient(ingredient, factor))
        .collect();
    scaled.steps = recipe
        .steps
        .iter()
        .map(|step| Step {
            instruction: step.instruction.clone(),
            estimate_seconds: scale_seconds(step.estimate_seconds, multiplier),
        })
        .collect();

    tracing::debug!(
        recipe = %recipe.title,
        from = base,
        to = target_servings,
        factor,
        multiplier,
        "scaled recipe"
    );

    ScaledRecipe {
        recipe: scaled,
        target_servings,
        scale_factor: factor,
    }
}

/// Scale the leading quantity of one ingredient line
///
/// Lines without a recognizable quantity are returned unchanged.
#[must_use]
pub fn scale_ingredient(ingredient: &str, factor: f64) -> String {
    if let Some(caps) = MIXED_RE.captures(ingredient) {
        let quantity = number(&caps, 1) + number(&caps, 2) / number(&caps, 3);
        return rebuild(&format_quantity(quantity * factor), &caps, 4);
    }

    if let Some(caps) = FRACTION_RE.captures(ingredient) {
        let quantity = number(&caps, 1) / number(&caps, 2);
        return rebuild(&format_quantity(quantity * factor), &caps, 3);
    }

    if let Some(caps) = RANGE_RE.captures(ingredient) {
        let low = round_to(number(&caps, 1) * factor, 10.0);
        let high = round_to(number(&caps, 2) * factor, 10.0);
        return rebuild(&format!("{low}-{high}"), &caps, 3);
    }

    if let Some(caps) = DECIMAL_RE.captures(ingredient) {
        let quantity = number(&caps, 1);
        return rebuild(&format_quantity(quantity * factor), &caps, 2);
    }

    ingredient.to_string()
}

/// Render a quantity, snapping to a common fraction when close to one
#[must_use]
pub fn format_quantity(quantity: f64) -> String {
    let rounded = round_to(quantity, 100.0);

    if let Some((_, display)) = FRACTIONS
        .iter()
        .find(|(value, _)| (rounded - value).abs() < FRACTION_TOLERANCE)
    {
        return (*display).to_string();
    }

    let text = format!("{rounded:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    text.to_string()
}

/// Duration multiplier for a scale factor
///
/// `1 + log2(f) * 0.2` above one, `1 - log2(1/f) * 0.1` below, never negative.
#[must_use]
pub fn time_multiplier(factor: f64) -> f64 {
    if !factor.is_finite() || factor <= 0.0 {
        return 1.0;
    }
    if factor > 1.0 {
        1.0 + factor.log2() * GROWTH_PER_DOUBLING
    } else if factor < 1.0 {
        (1.0 - (1.0 / factor).log2() * SHRINK_PER_HALVING).max(0.0)
    } else {
        1.0
    }
}

/// Spoken summary of how scaling changes cooking time
///
/// Empty when the serving count is unchanged or the change rounds to 0%.
#[must_use]
pub fn time_adjustment_text(original_servings: u32, target_servings: u32, language: &Language) -> String {
    if original_servings == target_servings || original_servings == 0 || target_servings == 0 {
        return String::new();
    }

    let factor = f64::from(target_servings) / f64::from(original_servings);
    let percent = if factor > 1.0 {
        percent(factor.log2() * GROWTH_PER_DOUBLING)
    } else {
        -percent((1.0 / factor).log2() * SHRINK_PER_HALVING)
    };

    if percent == 0 {
        return String::new();
    }
    language.time_adjustment(percent, target_servings)
}

#[allow(clippy::cast_possible_truncation)]
fn percent(fraction: f64) -> i64 {
    (fraction * 100.0).round() as i64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_seconds(seconds: u32, multiplier: f64) -> u32 {
    if seconds == 0 {
        return 0;
    }
    (f64::from(seconds) * multiplier)
        .round()
        .clamp(0.0, f64::from(u32::MAX)) as u32
}

fn round_to(value: f64, scale: f64) -> f64 {
    (value * scale).round() / scale
}

fn number(caps: &Captures<'_>, index: usize) -> f64 {
    caps.get(index)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0)
}

/// `{quantity}{separator}{unit} {name}`, capture groups starting at `first`
fn rebuild(quantity: &str, caps: &Captures<'_>, first: usize) -> String {
    let name = caps.get(first + 2).map_or("", |m| m.as_str());
    match caps.get(first + 1) {
        Some(unit) => {
            let separator = caps.get(first).map_or("", |m| m.as_str());
            format!("{quantity}{separator}{} {name}", unit.as_str())
        }
        None => format!("{quantity} {name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language;

    fn paneer() -> Recipe {
        Recipe::new(
            "Paneer tikka",
            vec!["300g paneer".to_string()],
            vec![Step::new("Grill", 600)],
        )
    }

    #[test]
    fn doubles_paneer_recipe() {
        let scaled = scale(&paneer(), 4);
        assert_eq!(scaled.recipe.ingredients, vec!["600g paneer"]);
        assert_eq!(scaled.recipe.steps[0].estimate_seconds, 720);
        assert!((scaled.scale_factor - 2.0).abs() < f64::EPSILON);
        assert_eq!(scaled.target_servings, 4);
    }

    #[test]
    fn snaps_to_fractions() {
        assert_eq!(scale_ingredient("1 cup", 1.5), "1 1/2 cup");
        assert_eq!(scale_ingredient("1/2 tsp salt", 0.5), "1/4 tsp salt");
        assert_eq!(scale_ingredient("1 1/2 cups flour", 2.0), "3 cups flour");
        assert_eq!(scale_ingredient("1 1/2 cups flour", 0.5), "3/4 cups flour");
        assert_eq!(format_quantity(1.0 / 3.0), "1/3");
    }

    #[test]
    fn pattern_precedence() {
        // mixed fraction must not be read as "1" followed by a unit
        assert_eq!(scale_ingredient("1 1/2 cups rice", 1.0), "1 1/2 cups rice");
        assert_eq!(scale_ingredient("2-3 onions", 2.0), "4-6 onions");
        assert_eq!(scale_ingredient("2-3 large onions", 1.5), "3-4.5 large onions");
        assert_eq!(scale_ingredient("2 cups rice", 3.0), "6 cups rice");
        assert_eq!(scale_ingredient("1.5 kg chicken", 2.0), "3 kg chicken");
    }

    #[test]
    fn unmatched_ingredients_pass_through() {
        assert_eq!(scale_ingredient("salt to taste", 2.0), "salt to taste");
        assert_eq!(scale_ingredient("a pinch of saffron", 4.0), "a pinch of saffron");
        assert_eq!(scale_ingredient("", 2.0), "");
    }

    #[test]
    fn trims_trailing_zeros_only_after_decimal_point() {
        assert_eq!(format_quantity(600.0), "600");
        assert_eq!(format_quantity(100.0), "100");
        assert_eq!(format_quantity(3.1), "3.1");
        assert_eq!(format_quantity(4.125), "4.13");
    }

    #[test]
    fn same_servings_is_identity() {
        let mut recipe = paneer();
        recipe.ingredients.push("1.50 cups stock".to_string());
        let scaled = scale(&recipe, recipe.original_servings);
        assert_eq!(scaled.recipe, recipe);
        assert!((scaled.scale_factor - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_servings_returns_input() {
        let recipe = paneer();
        let scaled = scale(&recipe, 0);
        assert_eq!(scaled.recipe, recipe);
        assert_eq!(scaled.target_servings, recipe.original_servings);
    }

    #[test]
    fn durations_grow_monotonically() {
        let recipe = paneer();
        let mut previous = 0;
        for servings in 1..=32 {
            let secs = scale(&recipe, servings).recipe.steps[0].estimate_seconds;
            assert!(secs >= previous, "{servings} servings: {secs} < {previous}");
            previous = secs;
        }
    }

    #[test]
    fn halving_shrinks_time_by_a_tenth() {
        let scaled = scale(&paneer(), 1);
        assert_eq!(scaled.recipe.ingredients, vec!["150g paneer"]);
        assert_eq!(scaled.recipe.steps[0].estimate_seconds, 540);
    }

    #[test]
    fn untimed_steps_stay_untimed() {
        let recipe = Recipe::new("Salad", Vec::new(), vec![Step::new("Toss", 0)]);
        assert_eq!(scale(&recipe, 8).recipe.steps[0].estimate_seconds, 0);
    }

    #[test]
    fn scaling_is_deterministic() {
        let recipe = paneer();
        assert_eq!(scale(&recipe, 7), scale(&recipe, 7));
    }

    #[test]
    fn multiplier_never_negative() {
        assert!(time_multiplier(1.0 / 4096.0) >= 0.0);
        assert!((time_multiplier(4.0) - 1.4).abs() < 1e-9);
    }

    #[test]
    fn time_adjustment_phrases() {
        let en = language::lookup("en-US");
        assert_eq!(
            time_adjustment_text(2, 4, en),
            "Cooking time increases by approximately 20% for 4 servings."
        );
        assert_eq!(
            time_adjustment_text(4, 2, en),
            "Cooking time decreases by approximately 10% for 2 servings."
        );
        assert_eq!(time_adjustment_text(2, 2, en), "");

        let hi = language::lookup("hi-IN");
        assert!(time_adjustment_text(2, 4, hi).contains("20%"));
    }
}
