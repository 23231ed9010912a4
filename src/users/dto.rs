use serde::{Deserialize, Deserializer};

/// Partial profile update. An absent key leaves the field alone; an explicit
/// `null` clears `image_url` or `bio`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    #[serde(deserialize_with = "present")]
    pub image_url: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub bio: Option<Option<String>>,
}

/// Only called when the key exists, so a `null` becomes `Some(None)`.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}
