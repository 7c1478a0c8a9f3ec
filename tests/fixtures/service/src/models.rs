use serde::{Deserialize, Serialize};

/// A registered user
#[derive(Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(rename = "displayName")]
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

#[derive(Deserialize)]
pub struct NewUser {
    pub name: String,
    pub role: Role,
}

#[derive(Serialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

#[derive(Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}
