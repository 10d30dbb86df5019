use serde::Deserialize;

use crate::core::ports::confirmation::Confirmation;

/// `?confirm=true` on destructive admin requests. Missing means declined.
#[derive(Debug, Default, Deserialize)]
pub struct Confirm {
    #[serde(default)]
    pub confirm: bool,
}

impl Confirmation for Confirm {
    fn confirm(&self, _prompt: &str) -> bool {
        self.confirm
    }
}

#[derive(Debug, Deserialize)]
pub struct OptionText {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct Selection {
    pub value: String,
}
