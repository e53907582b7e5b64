//! Recipe model consumed by cooking sessions
//!
//! Recipes are produced by an external generator (see [`normalize`]) and are
//! read-only during a session; scaling produces a derived copy.

pub mod normalize;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Serving count assumed when a recipe doesn't state one
pub const DEFAULT_SERVINGS: u32 = 2;

/// One instruction unit of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub instruction: String,
    /// Estimated duration; zero means "no timer, advance on command"
    #[serde(default)]
    pub estimate_seconds: u32,
}

impl Step {
    /// Create a step
    #[must_use]
    pub fn new(instruction: impl Into<String>, estimate_seconds: u32) -> Self {
        Self {
            instruction: instruction.into(),
            estimate_seconds,
        }
    }

    /// Whether this step runs a countdown once started
    #[must_use]
    pub const fn has_timer(&self) -> bool {
        self.estimate_seconds > 0
    }
}

/// A generated recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default = "default_servings")]
    pub original_servings: u32,
}

const fn default_servings() -> u32 {
    DEFAULT_SERVINGS
}

impl Recipe {
    /// Create a recipe with a fresh id and the default serving count
    #[must_use]
    pub fn new(title: impl Into<String>, ingredients: Vec<String>, steps: Vec<Step>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            summary: String::new(),
            ingredients,
            steps,
            original_servings: DEFAULT_SERVINGS,
        }
    }

    /// Check that the recipe can drive a cooking session
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recipe`] if there are no steps or a step has no instruction
    pub fn validate_for_cooking(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(Error::Recipe(format!(
                "'{}' has no steps to cook",
                self.title
            )));
        }

        if let Some(index) = self
            .steps
            .iter()
            .position(|step| step.instruction.trim().is_empty())
        {
            return Err(Error::Recipe(format!(
                "step {} of '{}' has no instruction",
                index + 1,
                self.title
            )));
        }

        Ok(())
    }

    /// Serving count to scale from, never zero
    #[must_use]
    pub const fn base_servings(&self) -> u32 {
        if self.original_servings == 0 {
            DEFAULT_SERVINGS
        } else {
            self.original_servings
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_recipe_without_steps() {
        let recipe = Recipe::new("Toast", vec!["bread".to_string()], Vec::new());
        let err = recipe.validate_for_cooking().unwrap_err();
        assert!(matches!(err, Error::Recipe(_)));
        assert!(err.to_string().contains("no steps"));
    }

    #[test]
    fn refuses_blank_instruction() {
        let recipe = Recipe::new(
            "Tea",
            Vec::new(),
            vec![Step::new("Boil water", 120), Step::new("   ", 0)],
        );
        let err = recipe.validate_for_cooking().unwrap_err();
        assert!(err.to_string().contains("step 2"));
    }

    #[test]
    fn accepts_well_formed_recipe() {
        let recipe = Recipe::new("Tea", Vec::new(), vec![Step::new("Boil water", 120)]);
        assert!(recipe.validate_for_cooking().is_ok());
        assert_eq!(recipe.original_servings, DEFAULT_SERVINGS);
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let json = r#"{
            "id": "r1",
            "title": "Rice",
            "steps": [{"instruction": "Rinse rice"}]
        }"#;
        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.original_servings, 2);
        assert_eq!(recipe.steps[0].estimate_seconds, 0);
        assert!(!recipe.steps[0].has_timer());
    }

    #[test]
    fn zero_servings_scale_from_default() {
        let mut recipe = Recipe::new("Dal", Vec::new(), Vec::new());
        recipe.original_servings = 0;
        assert_eq!(recipe.base_servings(), DEFAULT_SERVINGS);
    }
}
