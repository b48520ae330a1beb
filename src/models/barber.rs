use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Barber {
    pub id: String,
    pub name: String,
    pub nickname: String,
    pub is_active: bool,
}
