// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use inflector::Inflector as _;
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use tabled::Tabled;

use crate::error::{self, Result};

/// Response of the token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenPair {
    pub(crate) access: SecretString,
    pub(crate) refresh: SecretString,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct User {
    pub(crate) id: u64,
    pub(crate) username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) last_name: Option<String>,
}

impl User {
    /// The full name if the server knows one, otherwise the username.
    pub(crate) fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.username.clone()
        } else {
            name
        }
    }
}

/// The profile of the signed-in user, as returned by the profile endpoint.
///
/// Fields this client does not know about are kept as they were sent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Identity {
    pub(crate) user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) profile_pic: Option<String>,
    #[serde(flatten)]
    pub(crate) extra: serde_json::Map<String, serde_json::Value>,
}

/// A single row of the identity table printed by `whoami`.
#[derive(Clone, Debug, Tabled)]
pub(crate) struct IdentityRow {
    #[tabled(rename = "Field")]
    pub(crate) field: String,
    #[tabled(rename = "Value")]
    pub(crate) value: String,
}

impl Identity {
    pub(crate) fn rows(&self) -> Vec<IdentityRow> {
        let mut rows = vec![
            ("ID", Some(self.user.id.to_string())),
            ("Username", Some(self.user.username.clone())),
            ("Name", Some(self.user.display_name())),
            ("Email", self.user.email.clone()),
            ("Position", self.position.clone()),
            ("Bio", self.bio.clone()),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            value.map(|v| IdentityRow {
                field: field.to_owned(),
                value: v,
            })
        })
        .collect::<Vec<_>>();

        rows.extend(self.extra.iter().map(|(key, value)| IdentityRow {
            field: key.to_title_case(),
            value: match *value {
                serde_json::Value::String(ref s) => s.clone(),
                ref other => other.to_string(),
            },
        }));
        rows
    }
}

/// The fields sent to the registration endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct Registration {
    pub(crate) username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) email: Option<String>,
    #[serde(serialize_with = "serialize_secret")]
    pub(crate) password: SecretString,
    #[serde(serialize_with = "serialize_secret")]
    pub(crate) password2: SecretString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) last_name: Option<String>,
}

impl Registration {
    /// Checks the fields the server cannot do without.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(error::Api::MissingField("username").into());
        }
        if self.password.expose_secret().is_empty() {
            return Err(error::Api::MissingField("password").into());
        }
        Ok(())
    }
}

fn serialize_secret<S: Serializer>(
    value: &SecretString,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.expose_secret())
}

/// Field-level validation messages, exactly as the server reported them.
pub(crate) type RegistrationErrors = serde_json::Map<String, serde_json::Value>;

/// The errors to report when the server did not give any of its own.
pub(crate) fn generic_registration_errors() -> RegistrationErrors {
    let mut errors = RegistrationErrors::new();
    let _ = errors.insert(
        "detail".to_owned(),
        serde_json::Value::String("Registration failed".to_owned()),
    );
    errors
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn identity_keeps_unknown_fields() -> Result<()> {
        let identity: Identity = serde_json::from_value(json!({
            "id": 7,
            "user": {"id": 1, "username": "alice", "first_name": "Alice"},
            "position": "Engineer",
            "profile_pic": null,
        }))?;

        assert_eq!(identity.user.username, "alice");
        assert_eq!(identity.position.as_deref(), Some("Engineer"));
        assert_eq!(identity.profile_pic, None);
        assert_eq!(identity.extra.get("id"), Some(&json!(7)));
        Ok(())
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user = User {
            id: 1,
            username: "alice".to_owned(),
            email: None,
            first_name: Some(String::new()),
            last_name: None,
        };
        assert_eq!(user.display_name(), "alice");

        user.first_name = Some("Alice".to_owned());
        user.last_name = Some("Liddell".to_owned());
        assert_eq!(user.display_name(), "Alice Liddell");
    }

    #[test]
    fn identity_rows_skip_absent_fields() -> Result<()> {
        let identity: Identity = serde_json::from_value(json!({
            "user": {"id": 1, "username": "alice"},
            "team_count": 3,
        }))?;

        let fields = identity
            .rows()
            .into_iter()
            .map(|row| (row.field, row.value))
            .collect::<Vec<_>>();
        assert_eq!(
            fields,
            vec![
                ("ID".to_owned(), "1".to_owned()),
                ("Username".to_owned(), "alice".to_owned()),
                ("Name".to_owned(), "alice".to_owned()),
                ("Team Count".to_owned(), "3".to_owned()),
            ]
        );
        Ok(())
    }

    #[test]
    fn registration_requires_username_and_password() {
        let registration = Registration {
            username: " ".to_owned(),
            email: None,
            password: SecretString::new("hunter2".to_owned()),
            password2: SecretString::new("hunter2".to_owned()),
            first_name: None,
            last_name: None,
        };
        assert!(matches!(
            registration.validate(),
            Err(error::Error::Api(error::Api::MissingField("username")))
        ));

        let registration = Registration {
            username: "alice".to_owned(),
            password: SecretString::new(String::new()),
            ..registration
        };
        assert!(matches!(
            registration.validate(),
            Err(error::Error::Api(error::Api::MissingField("password")))
        ));
    }

    #[test]
    fn registration_serializes_passwords_in_clear() -> Result<()> {
        let registration = Registration {
            username: "alice".to_owned(),
            email: Some("alice@example.com".to_owned()),
            password: SecretString::new("hunter2".to_owned()),
            password2: SecretString::new("hunter2".to_owned()),
            first_name: None,
            last_name: None,
        };

        assert_eq!(
            serde_json::to_value(&registration)?,
            json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "hunter2",
                "password2": "hunter2",
            })
        );
        Ok(())
    }
}
