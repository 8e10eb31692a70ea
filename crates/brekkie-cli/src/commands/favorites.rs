use brekkie_core::generator::generate_recipe;

use crate::cli::FavoriteCommands;
use crate::commands::common::{
    find_recipe, format_recipe_detail, format_recipe_lines, recipe_candidates, AppContext,
};
use crate::error::CliError;

pub async fn run_favorites(command: FavoriteCommands, ctx: &AppContext) -> Result<(), CliError> {
    let session = ctx.restore_session().await;
    let session = session.as_ref();
    let mut planner = ctx.planner();
    let favorites = planner.load(session).await?.liked_recipes.clone();

    match command {
        FavoriteCommands::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&favorites)?);
            } else if favorites.is_empty() {
                println!("No favorite recipes yet.");
            } else {
                for line in format_recipe_lines(&favorites) {
                    println!("{line}");
                }
            }
        }
        FavoriteCommands::Add { recipe } => {
            let candidates = recipe_candidates(ctx, session, &favorites).await;
            let recipe = find_recipe(&recipe, &candidates)?;
            let stored = planner.like_recipe(session, &recipe).await?;
            println!("Added {} to favorites ({})", stored.title, stored.id);
        }
        FavoriteCommands::Remove { recipe } => {
            let recipe = find_recipe(&recipe, &favorites)?;
            let removed = planner.unlike_recipe(session, &recipe.id).await?;
            println!("Removed {} from favorites", removed.title);
        }
        FavoriteCommands::Generate { servings, like } => {
            let recipe = generate_recipe(servings, &mut rand::thread_rng());
            for line in format_recipe_detail(&recipe) {
                println!("{line}");
            }
            if like {
                let stored = planner.like_recipe(session, &recipe).await?;
                println!("Added {} to favorites ({})", stored.title, stored.id);
            }
        }
    }

    Ok(())
}
