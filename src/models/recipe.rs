use sqlx::FromRow;

use super::require_present;
use crate::error::ValidationError;

pub const MIN_INSTRUCTIONS_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Recipe {
    id: Option<i64>,
    title: String,
    instructions: String,
    minutes_to_complete: i32,
    user_id: Option<i64>, // nullable owner
}

pub fn validate_title(title: Option<&str>) -> Result<&str, ValidationError> {
    require_present(title, "Title")
}

/// Instructions must be present and at least [`MIN_INSTRUCTIONS_LEN`] characters
/// once surrounding whitespace is trimmed. Returns the value as given.
pub fn validate_instructions(instructions: Option<&str>) -> Result<&str, ValidationError> {
    let instructions = require_present(instructions, "Instructions")?;
    if instructions.trim().chars().count() < MIN_INSTRUCTIONS_LEN {
        return Err(ValidationError::TooShort {
            field: "Instructions",
            min: MIN_INSTRUCTIONS_LEN,
        });
    }
    Ok(instructions)
}

impl Recipe {
    pub fn new(
        title: &str,
        instructions: &str,
        minutes_to_complete: i32,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: None,
            title: validate_title(Some(title))?.to_string(),
            instructions: validate_instructions(Some(instructions))?.to_string(),
            minutes_to_complete,
            user_id: None,
        })
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn minutes_to_complete(&self) -> i32 {
        self.minutes_to_complete
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn set_title(&mut self, title: &str) -> Result<(), ValidationError> {
        self.title = validate_title(Some(title))?.to_string();
        Ok(())
    }

    pub fn set_instructions(&mut self, instructions: &str) -> Result<(), ValidationError> {
        self.instructions = validate_instructions(Some(instructions))?.to_string();
        Ok(())
    }

    pub fn set_minutes_to_complete(&mut self, minutes: i32) {
        self.minutes_to_complete = minutes;
    }

    pub fn set_owner(&mut self, user_id: Option<i64>) {
        self.user_id = user_id;
    }

    pub(crate) fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}
