//! Family invite links: `<base>?invite=<code>&role=parent|child`.

use url::Url;

use crate::error::ValidationError;
use crate::family::MemberRole;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteLink {
    pub code: String,
    pub role: MemberRole,
}

impl InviteLink {
    /// New invite with a random 8-character code.
    pub fn generate(role: MemberRole) -> Self {
        let code = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        Self { code, role }
    }

    /// Extract an invite from a URL. A missing `role` defaults to `parent`.
    pub fn parse(link: &str) -> Result<Self, ValidationError> {
        let url = Url::parse(link).map_err(|e| ValidationError::InvalidValue {
            field: "invite",
            message: e.to_string(),
        })?;

        let mut code = None;
        let mut role = MemberRole::Parent;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "invite" => code = Some(value.trim().to_string()),
                "role" => {
                    role = MemberRole::parse(&value).ok_or_else(|| {
                        ValidationError::InvalidValue {
                            field: "role",
                            message: format!("unknown role '{}'", value),
                        }
                    })?
                }
                _ => {}
            }
        }

        match code {
            Some(code) if !code.is_empty() => Ok(Self { code, role }),
            _ => Err(ValidationError::MissingField("invite")),
        }
    }

    /// Build the shareable URL on top of the app's base URL.
    pub fn to_url(&self, base: &str) -> Result<String, ValidationError> {
        let mut url = Url::parse(base).map_err(|e| ValidationError::InvalidValue {
            field: "base_url",
            message: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("invite", &self.code)
            .append_pair("role", self.role.as_str());
        Ok(url.to_string())
    }
}
