use serde::{Deserialize, Serialize};

/// Customer contact details captured at booking time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerContact {
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl CustomerContact {
    /// Names of the fields that are missing or malformed, empty when valid.
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        let mut fields = vec![];
        if self.name.trim().is_empty() {
            fields.push("name");
        }
        if self.phone.trim().is_empty() {
            fields.push("phone");
        }
        if !is_valid_email(self.email.trim()) {
            fields.push("email");
        }
        fields
    }

    pub fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_string(),
        }
    }
}

/// `local@domain.tld`: no whitespace, exactly one `@`, and a dot inside the
/// domain with text on both sides.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
