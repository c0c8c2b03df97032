//! Demo user records.
//!
//! The demo routes have no persistence. Created users are echoed back and
//! lookups are answered from fixed fixtures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Validated input for creating a demo user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Full name, 1 to 100 characters.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Age in years, 18 to 120.
    pub age: u8,
    /// Optional personal website.
    pub website: Option<String>,
}

/// Demo user as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemoUser {
    /// Stable user identifier.
    #[schema(example = "3fa85f64-5717-4562-b3fc-2c963f66afa6")]
    pub id: Uuid,
    /// Full name.
    #[schema(example = "Jane Doe")]
    pub name: String,
    /// Email address.
    #[schema(example = "jane@example.com")]
    pub email: String,
    /// Age in years.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    /// Personal website.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Creation time for freshly created users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl DemoUser {
    /// Materialise a new user from validated input.
    #[must_use]
    pub fn create(input: NewUser, created_at: DateTime<Utc>) -> Self {
        let NewUser {
            name,
            email,
            age,
            website,
        } = input;
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            age: Some(age),
            website,
            created_at: Some(created_at),
        }
    }

    /// Fixture returned for any identifier lookup.
    #[must_use]
    pub fn fixture(id: Uuid) -> Self {
        Self {
            id,
            name: "Jane Doe".to_owned(),
            email: "jane@example.com".to_owned(),
            age: Some(28),
            website: None,
            created_at: None,
        }
    }

    /// Fixture directory listed by the index route, filtered by name.
    ///
    /// # Examples
    /// ```
    /// use sitescope_backend::domain::DemoUser;
    ///
    /// let users = DemoUser::directory(Some("ali"));
    /// assert_eq!(users.len(), 1);
    /// assert_eq!(users[0].name, "Alice Smith");
    /// ```
    #[must_use]
    pub fn directory(search: Option<&str>) -> Vec<Self> {
        let users = [
            ("Alice Smith", "alice@example.com"),
            ("Bob Johnson", "bob@example.com"),
        ]
        .into_iter()
        .map(|(name, email)| Self {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            email: email.to_owned(),
            age: None,
            website: None,
            created_at: None,
        });

        match search.map(str::to_lowercase) {
            Some(needle) => users
                .filter(|user| user.name.to_lowercase().contains(&needle))
                .collect(),
            None => users.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Demo user fixtures.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, 2)]
    #[case(Some("BOB"), 1)]
    #[case(Some("zed"), 0)]
    fn directory_filters_case_insensitively(#[case] search: Option<&str>, #[case] expected: usize) {
        assert_eq!(DemoUser::directory(search).len(), expected);
    }

    #[test]
    fn create_echoes_input_with_fresh_id() {
        let input = NewUser {
            name: "John Doe".to_owned(),
            email: "john@example.com".to_owned(),
            age: 30,
            website: Some("https://johndoe.com".to_owned()),
        };
        let now = Utc::now();
        let first = DemoUser::create(input.clone(), now);
        let second = DemoUser::create(input, now);

        assert_ne!(first.id, second.id);
        assert_eq!(first.age, Some(30));
        assert_eq!(first.created_at, Some(now));
    }

    #[test]
    fn created_user_serialises_camel_case() {
        let user = DemoUser::create(
            NewUser {
                name: "John Doe".to_owned(),
                email: "john@example.com".to_owned(),
                age: 30,
                website: None,
            },
            Utc::now(),
        );
        let value = serde_json::to_value(&user).expect("serialise user");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("website").is_none());
    }
}
