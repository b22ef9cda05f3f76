use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A registered account. Never serialized directly - the password hash
/// must not leave the store layer. API responses use [`Profile`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: UserRole,
    pub date_joined: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Public representation of a user, with the subscription flag scoped
/// to the requesting viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

/// A recipe row as stored. `image` is a path relative to the media root.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i64,
    pub pub_date: String,
}

/// An ingredient with its amount inside one recipe, as rendered in
/// recipe list/detail responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Full recipe representation for list and retrieve endpoints.
/// The two boolean flags are scoped to the requesting viewer and are
/// always false for anonymous requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: Profile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i64,
}

/// `{id, amount}` pair used when writing a recipe's ingredient set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientAmountInput {
    pub id: i64,
    pub amount: i64,
}

/// Response shape for recipe create/update: related objects by id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeWriteView {
    pub id: i64,
    pub author: i64,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub ingredients: Vec<IngredientAmountInput>,
    pub tags: Vec<i64>,
    pub cooking_time: i64,
    pub pub_date: String,
}

/// Abbreviated recipe used inside subscription listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortRecipe {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i64,
}

/// One subscribed author in `GET /api/users/subscriptions/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    #[serde(flatten)]
    pub author: Profile,
    pub recipes: Vec<ShortRecipe>,
    pub recipes_count: i64,
}

/// One aggregated line of a shopping list: total amount of an
/// ingredient across every recipe in the user's cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}
