use std::path::PathBuf;

use brekkie_core::calendar::CalendarView;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "brekkie")]
#[command(about = "Plan breakfasts from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for Supabase configuration and session
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show and edit the breakfast plan
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Manage favorite recipes
    #[command(alias = "favs")]
    Favorites {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
    /// Manage your saved recipes (requires sign-in)
    Recipes {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Show or update your profile (requires sign-in)
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Copy local favorites and planned meals to your account
    Migrate,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Authenticate CLI profile with Supabase
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ViewArg {
    Day,
    Week,
    Month,
}

impl From<ViewArg> for CalendarView {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::Day => Self::Day,
            ViewArg::Week => Self::Week,
            ViewArg::Month => Self::Month,
        }
    }
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Show planned breakfasts for a day, week or month
    Show {
        /// Calendar view
        #[arg(long, value_enum, default_value_t = ViewArg::Week)]
        view: ViewArg,
        /// Reference date (YYYY-MM-DD, today when omitted)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Plan a recipe on a date
    Add {
        /// Recipe id or title
        recipe: String,
        /// Date to plan on (YYYY-MM-DD, today when omitted)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },
    /// Toggle a planned meal between planned and completed
    Toggle {
        /// Date of the meal (YYYY-MM-DD)
        date: String,
        /// Position on that date (as shown by `plan show`) or meal id
        meal: String,
    },
    /// Remove a planned meal
    Remove {
        /// Date of the meal (YYYY-MM-DD)
        date: String,
        /// Position on that date (as shown by `plan show`) or meal id
        meal: String,
    },
    /// Reload the plan from storage, ignoring anything cached
    Refresh,
}

#[derive(Subcommand)]
pub enum FavoriteCommands {
    /// List favorite recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a recipe to favorites
    Add {
        /// Recipe id or title
        recipe: String,
    },
    /// Remove a recipe from favorites
    Remove {
        /// Favorite recipe id or title
        recipe: String,
    },
    /// Generate a random breakfast recipe
    Generate {
        /// Servings to scale the ingredients for
        #[arg(short, long, default_value = "2")]
        servings: u32,
        /// Add the generated recipe to favorites
        #[arg(long)]
        like: bool,
    },
}

#[derive(Subcommand)]
pub enum RecipeCommands {
    /// List your saved recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a recipe, or update one when --id is given
    Save {
        /// Id of an existing recipe to update
        #[arg(long, value_name = "ID")]
        id: Option<String>,
        /// Recipe title
        #[arg(long)]
        title: Option<String>,
        /// Recipe description
        #[arg(long)]
        description: Option<String>,
        /// Preparation time, e.g. "15 mins"
        #[arg(long, value_name = "TIME")]
        prep_time: Option<String>,
        /// Number of servings
        #[arg(long)]
        servings: Option<u32>,
        /// Ingredient line (repeatable)
        #[arg(long = "ingredient", value_name = "TEXT")]
        ingredients: Vec<String>,
        /// Instruction step (repeatable)
        #[arg(long = "instruction", value_name = "TEXT")]
        instructions: Vec<String>,
        /// Image file to upload
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
    },
    /// Delete a recipe and its image
    Delete {
        /// Recipe id
        id: String,
    },
    /// Generate a random recipe, optionally saving it to your account
    Generate {
        /// Servings to scale the ingredients for
        #[arg(short, long, default_value = "2")]
        servings: u32,
        /// Save the generated recipe
        #[arg(long)]
        save: bool,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show your profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update username, display name or avatar
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
        /// Avatar image file to upload
        #[arg(long, value_name = "PATH")]
        avatar: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an account with email/password
    Signup {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Login with Supabase email/password and store session in keychain
    Login {
        /// Supabase account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Supabase account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Print the browser URL for an OAuth provider sign-in
    OauthUrl {
        /// OAuth provider, e.g. google
        #[arg(long, default_value = "google")]
        provider: String,
        /// URL the provider redirects back to
        #[arg(long, value_name = "URL")]
        redirect_to: String,
    },
    /// Finish an OAuth sign-in from the redirect URL
    Callback {
        /// Full redirect URL including the token fragment
        url: String,
    },
    /// Show auth status for profile
    Status,
    /// Logout profile and clear stored session
    Logout,
}
