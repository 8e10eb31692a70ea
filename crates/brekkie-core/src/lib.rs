//! brekkie-core - Core library for brekkie
//!
//! This crate contains the models, local store, Supabase gateway, and the
//! planner/recipe/session logic used by every brekkie interface.

pub mod auth;
pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod local;
pub mod migration;
pub mod models;
pub mod notify;
pub mod planner;
pub mod profile;
pub mod recipes;
pub mod remote;
pub mod session;
pub mod util;

pub use error::{Error, Result};
pub use models::{MealId, MealStatus, PlannedMeal, Recipe, RecipeId, UserProfile};
