//! Outward-facing shapes for records.
//!
//! Each function takes the record that is currently being serialized *around*
//! this one, which is how the user <-> recipe cycle is broken: a recipe nested in
//! a user drops its `user` key, and a user nested in a recipe drops `recipes`.
//! The credential never has a key in any of these shapes.

use serde_json::{json, Map, Value};

use super::{Recipe, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Root,
    User,
    Recipe,
}

/// `{id, username, image_url, bio, recipes}`
pub fn user(user: &User, origin: Origin) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("id".into(), json!(user.id()));
    out.insert("username".into(), json!(user.username()));
    out.insert("image_url".into(), json!(user.image_url()));
    out.insert("bio".into(), json!(user.bio()));
    if origin != Origin::Recipe {
        let recipes = user
            .recipes()
            .iter()
            .map(|r| Value::Object(recipe(r, Some(user), Origin::User)))
            .collect();
        out.insert("recipes".into(), Value::Array(recipes));
    }
    out
}

/// `{id, title, instructions, minutes_to_complete, user}`
///
/// `owner` is the loaded user behind `recipe.user_id()`; a root recipe without
/// one serializes `user: null`.
pub fn recipe(recipe: &Recipe, owner: Option<&User>, origin: Origin) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("id".into(), json!(recipe.id()));
    out.insert("title".into(), json!(recipe.title()));
    out.insert("instructions".into(), json!(recipe.instructions()));
    out.insert("minutes_to_complete".into(), json!(recipe.minutes_to_complete()));
    if origin != Origin::User {
        let owner = owner
            .map(|u| Value::Object(user(u, Origin::Recipe)))
            .unwrap_or(Value::Null);
        out.insert("user".into(), owner);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chef() -> User {
        let mut u = User::new("chef1").unwrap();
        u.assign_id(1);
        u.set_password_hash("hunter2").unwrap();
        u
    }

    fn soup() -> Recipe {
        let mut r = Recipe::new("Soup", &"x".repeat(50), 20).unwrap();
        r.assign_id(1);
        r
    }

    fn has_credential_key(v: &Value) -> bool {
        match v {
            Value::Object(map) => map.iter().any(|(k, v)| {
                k.contains("password") || k.contains("hash") || has_credential_key(v)
            }),
            Value::Array(items) => items.iter().any(has_credential_key),
            _ => false,
        }
    }

    #[test]
    fn new_user_shape() {
        let out = Value::Object(user(&chef(), Origin::Root));
        assert_eq!(
            out,
            json!({"id": 1, "username": "chef1", "image_url": null, "bio": null, "recipes": []})
        );
    }

    #[test]
    fn recipe_nested_in_user_has_no_user_key() {
        let mut u = chef();
        u.add_recipe(soup());
        let out = user(&u, Origin::Root);
        let recipes = out["recipes"].as_array().unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(
            recipes[0],
            json!({
                "id": 1,
                "title": "Soup",
                "instructions": "x".repeat(50),
                "minutes_to_complete": 20
            })
        );
        assert!(recipes[0].get("user").is_none());
    }

    #[test]
    fn user_nested_in_recipe_has_no_recipes_key() {
        let mut u = chef();
        u.add_recipe(soup());
        let r = u.recipes()[0].clone();
        let out = recipe(&r, Some(&u), Origin::Root);
        let owner = out["user"].as_object().unwrap();
        assert_eq!(owner["username"], "chef1");
        assert!(owner.get("recipes").is_none());
    }

    #[test]
    fn orphan_recipe_has_null_user() {
        let out = recipe(&soup(), None, Origin::Root);
        assert_eq!(out["user"], Value::Null);
    }

    #[test]
    fn unsaved_records_have_null_ids() {
        let u = User::new("fresh").unwrap();
        assert_eq!(user(&u, Origin::Root)["id"], Value::Null);
    }

    #[test]
    fn credential_never_serialized_at_any_depth() {
        let mut u = chef();
        u.add_recipe(soup());
        let r = u.recipes()[0].clone();

        assert!(!has_credential_key(&Value::Object(user(&u, Origin::Root))));
        assert!(!has_credential_key(&Value::Object(recipe(&r, Some(&u), Origin::Root))));
    }
}
