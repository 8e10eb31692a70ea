use brekkie_core::migration::MigrationOutcome;

use crate::commands::common::AppContext;
use crate::error::CliError;

/// Run the local-to-remote migration for the signed-in user.
///
/// Restoring the session already attempts it once; this reports the result.
pub async fn run_migrate(ctx: &AppContext) -> Result<(), CliError> {
    ctx.require_session().await?;

    match ctx.sessions.migrate_now().await? {
        MigrationOutcome::Skipped => {
            println!("Local data for this account has already been migrated.");
        }
        MigrationOutcome::Migrated(report) => {
            println!(
                "Migrated {} recipe(s) ({} favorite(s) already present) and {} planned meal(s)",
                report.recipes_inserted, report.recipes_matched, report.meals_inserted
            );
            if report.meals_existing > 0 {
                println!(
                    "{} planned meal(s) were already in your account",
                    report.meals_existing
                );
            }
        }
    }

    Ok(())
}
