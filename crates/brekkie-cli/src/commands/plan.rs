use brekkie_core::calendar::{view_dates, CalendarView};

use crate::cli::PlanCommands;
use crate::commands::common::{
    find_recipe, format_plan_lines, parse_date_arg, parse_meal_ref, recipe_candidates,
    resolve_date_arg, AppContext, MealRef, PlanDay,
};
use crate::error::CliError;

pub async fn run_plan(command: PlanCommands, ctx: &AppContext) -> Result<(), CliError> {
    let session = ctx.restore_session().await;
    let session = session.as_ref();
    let mut planner = ctx.planner();

    match command {
        PlanCommands::Show { view, date, json } => {
            let date = resolve_date_arg(date.as_deref())?;
            let state = planner.load(session).await?;
            let days = view_dates(CalendarView::from(view), date)
                .into_iter()
                .map(|date| PlanDay {
                    date,
                    meals: state.meals_on(date).to_vec(),
                })
                .collect::<Vec<_>>();

            if json {
                println!("{}", serde_json::to_string_pretty(&days)?);
            } else {
                for line in format_plan_lines(&days) {
                    println!("{line}");
                }
            }
        }
        PlanCommands::Add { recipe, date } => {
            let date = resolve_date_arg(date.as_deref())?;
            let favorites = planner.load(session).await?.liked_recipes.clone();
            let candidates = recipe_candidates(ctx, session, &favorites).await;
            let recipe = find_recipe(&recipe, &candidates)?;
            let meal = planner.add_recipe_to_planner(session, &recipe, date).await?;
            println!("{}", meal.id);
        }
        PlanCommands::Toggle { date, meal } => {
            let date = parse_date_arg(&date)?;
            let status = match parse_meal_ref(&meal)? {
                MealRef::Index(index) => planner.toggle_meal_status(session, date, index).await?,
                MealRef::Id(meal_id) => planner.toggle_meal(session, date, meal_id).await?,
            };
            println!("{status}");
        }
        PlanCommands::Remove { date, meal } => {
            let date = parse_date_arg(&date)?;
            let removed = match parse_meal_ref(&meal)? {
                MealRef::Index(index) => planner.remove_meal(session, date, index).await?,
                MealRef::Id(meal_id) => planner.remove_meal_by_id(session, date, meal_id).await?,
            };
            println!("Removed {} from {}", removed.recipe.title, date);
        }
        PlanCommands::Refresh => {
            planner.force_refresh();
            let state = planner.load(session).await?;
            let meal_count = state.planned_meals.values().map(Vec::len).sum::<usize>();
            println!(
                "Loaded {} favorite(s) and {} planned meal(s) from {} storage",
                state.liked_recipes.len(),
                meal_count,
                if session.is_some() && ctx.config.is_remote_enabled() {
                    "remote"
                } else {
                    "local"
                }
            );
        }
    }

    Ok(())
}
