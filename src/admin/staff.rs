use serde::{Deserialize, Serialize};

use crate::models::{Client, Role, StaffMember};

/// Role / status selectors of the staff tab. Both are sent to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaffQuery {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl StaffQuery {
    pub fn active_veterinarians() -> Self {
        Self {
            role: Some(Role::Veterinarian),
            is_active: Some(true),
        }
    }

    pub fn active() -> Self {
        Self {
            role: None,
            is_active: Some(true),
        }
    }

    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(role) = self.role {
            params.push(("role", role.as_str().to_string()));
        }
        if let Some(active) = self.is_active {
            params.push(("is_active", active.to_string()));
        }
        params
    }
}

/// Parses the `true` / `false` / empty values of status selectors.
pub fn parse_status_filter(value: Option<&str>) -> Option<bool> {
    match value.map(str::trim) {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

/// Contents of the add / edit staff modal.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StaffForm {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub specialization: String,
    #[serde(default)]
    pub is_active: String,
}

impl StaffForm {
    pub fn blank() -> Self {
        Self {
            role: Role::Veterinarian.as_str().to_string(),
            is_active: "true".to_string(),
            ..Self::default()
        }
    }

    pub fn from_member(member: &StaffMember) -> Self {
        Self {
            id: Some(member.id.to_string()),
            email: member.email.clone(),
            password: String::new(),
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            phone: member.phone.clone().unwrap_or_default(),
            role: member.role.as_str().to_string(),
            specialization: member.specialization.clone().unwrap_or_default(),
            is_active: member.is_active.to_string(),
        }
    }

    pub fn staff_id(&self) -> Option<i64> {
        self.id.as_deref().and_then(|id| id.trim().parse().ok())
    }

    pub fn is_new(&self) -> bool {
        self.staff_id().is_none()
    }

    pub fn title(&self) -> &'static str {
        if self.is_new() {
            "Agregar Nuevo Personal"
        } else {
            "Editar Personal"
        }
    }

    pub fn shows_specialization(&self) -> bool {
        self.role == Role::Veterinarian.as_str()
    }

    /// Password only when typed; specialization only for veterinarians.
    pub fn payload(&self) -> StaffPayload {
        StaffPayload {
            email: self.email.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            role: self.role.clone(),
            is_active: self.is_active == "true",
            password: (!self.password.is_empty()).then(|| self.password.clone()),
            specialization: self
                .shows_specialization()
                .then(|| self.specialization.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffPayload {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
}

pub fn toggle_staff_prompt(activate: bool) -> String {
    format!(
        "¿Está seguro de {} a este miembro del personal?",
        if activate { "activar" } else { "desactivar" }
    )
}

pub fn toggle_client_prompt(activate: bool) -> String {
    format!(
        "¿Está seguro de {} a este cliente?",
        if activate { "activar" } else { "desactivar" }
    )
}

/// Records the admin tables can be searched over.
pub trait Searchable {
    fn full_name(&self) -> String;
    fn email(&self) -> &str;
}

impl Searchable for StaffMember {
    fn full_name(&self) -> String {
        StaffMember::full_name(self)
    }

    fn email(&self) -> &str {
        &self.email
    }
}

impl Searchable for Client {
    fn full_name(&self) -> String {
        Client::full_name(self)
    }

    fn email(&self) -> &str {
        &self.email
    }
}

/// Case-insensitive substring match against "first last" or the e-mail.
pub fn matches_search<T: Searchable>(record: &T, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    record.full_name().to_lowercase().contains(&needle)
        || record.email().to_lowercase().contains(&needle)
}

pub fn filter_records<'a, T: Searchable>(records: &'a [T], search: &str) -> Vec<&'a T> {
    records
        .iter()
        .filter(|record| matches_search(*record, search))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: i64, first: &str, last: &str, email: &str) -> StaffMember {
        StaffMember {
            id,
            email: email.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone: None,
            role: Role::Veterinarian,
            specialization: None,
            is_active: true,
        }
    }

    #[test]
    fn search_matches_name_or_email_ignoring_case() {
        let staff = vec![
            member(1, "Ana", "García", "ana@clinica.es"),
            member(2, "Luis", "Pérez", "lperez@clinica.es"),
            member(3, "Marta", "Anaya", "marta@vets.org"),
        ];

        let ids = |search: &str| {
            filter_records(&staff, search)
                .into_iter()
                .map(|member| member.id)
                .collect::<Vec<_>>()
        };

        assert_eq!(ids("ANA"), vec![1, 3]);
        assert_eq!(ids("vets.ORG"), vec![3]);
        assert_eq!(ids("luis pérez"), vec![2]);
        assert_eq!(ids(""), vec![1, 2, 3]);
        assert!(ids("zz").is_empty());
    }

    #[test]
    fn payload_skips_blank_password_and_non_vet_specialization() {
        let form = StaffForm {
            id: Some("4".to_string()),
            email: " rec@clinica.es ".to_string(),
            password: String::new(),
            first_name: "Rosa".to_string(),
            last_name: "Díaz".to_string(),
            phone: String::new(),
            role: "receptionist".to_string(),
            specialization: "Cirugía".to_string(),
            is_active: "false".to_string(),
        };

        let payload = serde_json::to_value(form.payload()).unwrap();
        assert_eq!(payload["email"], "rec@clinica.es");
        assert_eq!(payload["is_active"], false);
        assert!(payload.get("password").is_none());
        assert!(payload.get("specialization").is_none());
        assert_eq!(form.staff_id(), Some(4));
    }

    #[test]
    fn payload_keeps_vet_specialization_and_new_password() {
        let form = StaffForm {
            password: "secreto1".to_string(),
            role: "veterinarian".to_string(),
            specialization: "Felinos".to_string(),
            ..StaffForm::blank()
        };

        let payload = form.payload();
        assert!(form.is_new());
        assert_eq!(payload.password.as_deref(), Some("secreto1"));
        assert_eq!(payload.specialization.as_deref(), Some("Felinos"));
        assert!(payload.is_active);
    }

    #[test]
    fn staff_query_params() {
        assert!(StaffQuery::default().to_params().is_empty());
        assert_eq!(
            StaffQuery::active_veterinarians().to_params(),
            vec![
                ("role", "veterinarian".to_string()),
                ("is_active", "true".to_string())
            ]
        );
        assert_eq!(parse_status_filter(Some("false")), Some(false));
        assert_eq!(parse_status_filter(Some("")), None);
    }
}
