use std::path::PathBuf;

use brekkie_core::generator::generate_recipe;
use brekkie_core::recipes::{ImageUpload, RecipeDraft};

use crate::cli::RecipeCommands;
use crate::commands::common::{format_recipe_detail, format_recipe_lines, AppContext};
use crate::error::CliError;

/// Fields given to `recipes save`; unset fields keep their current value.
#[derive(Debug, Default)]
pub struct RecipeEdits {
    pub title: Option<String>,
    pub description: Option<String>,
    pub prep_time: Option<String>,
    pub servings: Option<u32>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
}

impl RecipeEdits {
    pub fn apply(self, draft: &mut RecipeDraft) {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if self.prep_time.is_some() {
            draft.prep_time = self.prep_time;
        }
        if self.servings.is_some() {
            draft.servings = self.servings;
        }
        if !self.ingredients.is_empty() {
            draft.ingredients = self.ingredients;
        }
        if !self.instructions.is_empty() {
            draft.instructions = self.instructions;
        }
    }
}

pub async fn run_recipes(command: RecipeCommands, ctx: &AppContext) -> Result<(), CliError> {
    let session = ctx.require_session().await?;
    let mut manager = ctx.recipe_manager()?;

    match command {
        RecipeCommands::List { json } => {
            let recipes = manager.refresh(Some(&session)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(recipes)?);
            } else if recipes.is_empty() {
                println!("No saved recipes yet.");
            } else {
                for line in format_recipe_lines(recipes) {
                    println!("{line}");
                }
            }
        }
        RecipeCommands::Save {
            id,
            title,
            description,
            prep_time,
            servings,
            ingredients,
            instructions,
            image,
        } => {
            let mut draft = match id.as_deref() {
                Some(id) => {
                    let recipes = manager.refresh(Some(&session)).await?;
                    let existing = recipes
                        .iter()
                        .find(|recipe| recipe.id.to_string() == id.trim())
                        .ok_or_else(|| CliError::RecipeNotFound(id.to_string()))?;
                    RecipeDraft::from_recipe(existing)
                }
                None => RecipeDraft::default(),
            };
            RecipeEdits {
                title,
                description,
                prep_time,
                servings,
                ingredients,
                instructions,
            }
            .apply(&mut draft);

            let image = load_image(image)?;
            let outcome = manager.save_recipe(Some(&session), draft, image).await?;
            println!(
                "{} recipe {}",
                if outcome.created { "Created" } else { "Updated" },
                outcome.recipe_id
            );
        }
        RecipeCommands::Delete { id } => {
            manager.delete_recipe(Some(&session), id.trim()).await?;
            println!("Deleted recipe {}", id.trim());
        }
        RecipeCommands::Generate { servings, save } => {
            let recipe = generate_recipe(servings, &mut rand::thread_rng());
            for line in format_recipe_detail(&recipe) {
                println!("{line}");
            }
            if save {
                let outcome = manager
                    .save_recipe(Some(&session), RecipeDraft::from_recipe(&recipe), None)
                    .await?;
                println!("Created recipe {}", outcome.recipe_id);
            }
        }
    }

    Ok(())
}

pub fn load_image(path: Option<PathBuf>) -> Result<Option<ImageUpload>, CliError> {
    path.map(|path| ImageUpload::from_path(&path))
        .transpose()
        .map_err(CliError::from)
}
