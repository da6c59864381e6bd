use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::AppError;

/// Where the work was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationType {
    OnSite,
    Remote,
    Hybrid,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::OnSite => "on-site",
            LocationType::Remote => "remote",
            LocationType::Hybrid => "hybrid",
        }
    }
}

impl FromStr for LocationType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on-site" => Ok(LocationType::OnSite),
            "remote" => Ok(LocationType::Remote),
            "hybrid" => Ok(LocationType::Hybrid),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Contract form of the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Freelance,
    Internship,
}

impl EmploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "full-time",
            EmploymentType::PartTime => "part-time",
            EmploymentType::Contract => "contract",
            EmploymentType::Freelance => "freelance",
            EmploymentType::Internship => "internship",
        }
    }
}

impl FromStr for EmploymentType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full-time" => Ok(EmploymentType::FullTime),
            "part-time" => Ok(EmploymentType::PartTime),
            "contract" => Ok(EmploymentType::Contract),
            "freelance" => Ok(EmploymentType::Freelance),
            "internship" => Ok(EmploymentType::Internship),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// A stored enum column held a value this build does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown variant `{}`", self.0)
    }
}

/// Payload for creating or replacing a timeline entry.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceInput {
    #[validate(length(min = 1, max = 255, message = "Wrong company name length"))]
    pub company_name: String,
    #[validate(length(min = 1, max = 255, message = "Wrong occupation length"))]
    pub occupation: String,
    #[validate(length(max = 255, message = "Wrong location name length"))]
    pub location_name: Option<String>,
    pub location_type: LocationType,
    pub employment_type: EmploymentType,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_current: bool,
    #[validate(length(min = 1, max = 5000, message = "Description is required"))]
    pub description: String,
}

impl ExperienceInput {
    /// Runs the field rules and the date-range rules.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;

        if let Some(end_date) = self.end_date {
            if self.is_current {
                return Err(AppError::ValidationError(
                    "A current position cannot have an end date".into(),
                ));
            }
            if end_date < self.start_date {
                return Err(AppError::ValidationError(
                    "End date must not precede start date".into(),
                ));
            }
        }

        Ok(())
    }
}

/// A timeline entry as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: i64,
    pub user_id: i64,
    pub company_name: String,
    pub occupation: String,
    pub location_name: Option<String>,
    pub location_type: LocationType,
    pub employment_type: EmploymentType,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_current: bool,
    pub description: String,
}

impl Experience {
    pub fn new(id: i64, user_id: i64, input: &ExperienceInput) -> Self {
        Self {
            id,
            user_id,
            company_name: input.company_name.clone(),
            occupation: input.occupation.clone(),
            location_name: input.location_name.clone(),
            location_type: input.location_type,
            employment_type: input.employment_type,
            start_date: input.start_date,
            end_date: input.end_date,
            is_current: input.is_current,
            description: input.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn input() -> ExperienceInput {
        ExperienceInput {
            company_name: "Acme".to_string(),
            occupation: "Engineer".to_string(),
            location_name: Some("Berlin".to_string()),
            location_type: LocationType::Hybrid,
            employment_type: EmploymentType::FullTime,
            start_date: Utc::now() - Duration::days(400),
            end_date: None,
            is_current: true,
            description: "Built things".to_string(),
        }
    }

    #[test]
    fn test_wire_format_uses_kebab_case_variants() {
        let payload = json!({
            "companyName": "Acme",
            "occupation": "Engineer",
            "locationType": "on-site",
            "employmentType": "part-time",
            "startDate": "2021-03-01T00:00:00Z",
            "description": "Built things"
        });

        let parsed: ExperienceInput = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.location_type, LocationType::OnSite);
        assert_eq!(parsed.employment_type, EmploymentType::PartTime);
        assert!(!parsed.is_current);
        assert!(parsed.location_name.is_none());

        let bad = json!({
            "companyName": "Acme",
            "occupation": "Engineer",
            "locationType": "moon",
            "employmentType": "part-time",
            "startDate": "2021-03-01T00:00:00Z",
            "description": "Built things"
        });
        assert!(serde_json::from_value::<ExperienceInput>(bad).is_err());
    }

    #[test]
    fn test_enum_strings_round_trip_through_storage_form() {
        for location in [LocationType::OnSite, LocationType::Remote, LocationType::Hybrid] {
            assert_eq!(location.as_str().parse::<LocationType>(), Ok(location));
        }
        assert!("office".parse::<EmploymentType>().is_err());
        assert_eq!(
            "internship".parse::<EmploymentType>(),
            Ok(EmploymentType::Internship)
        );
    }

    #[test]
    fn test_check_accepts_valid_input() {
        assert!(input().check().is_ok());

        let mut finished = input();
        finished.is_current = false;
        finished.end_date = Some(Utc::now());
        assert!(finished.check().is_ok());
    }

    #[test]
    fn test_check_rejects_bad_fields() {
        let mut empty_company = input();
        empty_company.company_name = String::new();
        assert!(matches!(empty_company.check(), Err(AppError::ValidationError(_))));

        let mut long_description = input();
        long_description.description = "x".repeat(5001);
        assert!(long_description.check().is_err());
    }

    #[test]
    fn test_check_rejects_bad_dates() {
        let mut current_with_end = input();
        current_with_end.end_date = Some(Utc::now());
        assert!(matches!(current_with_end.check(), Err(AppError::ValidationError(_))));

        let mut reversed = input();
        reversed.is_current = false;
        reversed.end_date = Some(reversed.start_date - Duration::days(1));
        assert!(matches!(reversed.check(), Err(AppError::ValidationError(_))));
    }
}
