use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(FromRow)]
pub struct LinkRecord {
    pub id: String,
    pub destination_url: String,
}

#[derive(Deserialize)]
pub struct CreateLinkRequest {
    pub destination_url: String,
    #[serde(default)]
    pub short_url: String,
}

#[derive(Deserialize)]
pub struct EditLinkRequest {
    pub shortlink: String,
    #[serde(rename = "newShortlink", default)]
    pub new_shortlink: String,
    #[serde(rename = "newDestinationURL", default)]
    pub new_destination_url: String,
}

#[derive(Deserialize)]
pub struct DeleteLinkRequest {
    pub shortlink: String,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct ShortUrl {
    pub short_url: String,
}
