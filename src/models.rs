use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

/// Company as the backend sends it: a bare name on list endpoints, an object
/// with a logo on the richer ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompanyRef {
    Name(String),
    Detail {
        name: String,
        #[serde(default, alias = "logo")]
        image: String,
    },
}

impl Default for CompanyRef {
    fn default() -> Self {
        CompanyRef::Name(String::new())
    }
}

impl CompanyRef {
    pub fn name(&self) -> &str {
        match self {
            CompanyRef::Name(name) => name,
            CompanyRef::Detail { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
}

impl Location {
    pub fn display(&self) -> String {
        match (self.city.is_empty(), self.country.is_empty()) {
            (false, false) => format!("{}, {}", self.city, self.country),
            (true, false) => self.country.clone(),
            (false, true) => self.city.clone(),
            (true, true) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApplicationStatus {
    Submitted,
    OnlineAssessment,
    PhoneInterview,
    FinalInterview,
    Hr,
    RecruiterCall,
    Offer,
    NotNow,
    Rejected,
    Other(String),
}

impl ApplicationStatus {
    pub const KNOWN: [ApplicationStatus; 9] = [
        ApplicationStatus::Submitted,
        ApplicationStatus::OnlineAssessment,
        ApplicationStatus::PhoneInterview,
        ApplicationStatus::FinalInterview,
        ApplicationStatus::Hr,
        ApplicationStatus::RecruiterCall,
        ApplicationStatus::Offer,
        ApplicationStatus::NotNow,
        ApplicationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ApplicationStatus::Submitted => "Submitted",
            ApplicationStatus::OnlineAssessment => "OA",
            ApplicationStatus::PhoneInterview => "Phone interview",
            ApplicationStatus::FinalInterview => "Final interview",
            ApplicationStatus::Hr => "HR",
            ApplicationStatus::RecruiterCall => "Recruiter call",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::NotNow => "Not now",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Other(raw) => raw,
        }
    }

    /// Stages counted as "interviewing" on the dashboards.
    pub fn is_interviewing(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Hr
                | ApplicationStatus::PhoneInterview
                | ApplicationStatus::FinalInterview
                | ApplicationStatus::OnlineAssessment
        )
    }
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        ApplicationStatus::Submitted
    }
}

impl From<String> for ApplicationStatus {
    fn from(raw: String) -> Self {
        Self::KNOWN
            .iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(raw.trim()))
            .cloned()
            .unwrap_or(ApplicationStatus::Other(raw))
    }
}

impl From<ApplicationStatus> for String {
    fn from(status: ApplicationStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub company: CompanyRef,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub referred: bool,
    #[serde(default)]
    pub recruiter_name: String,
    #[serde(default)]
    pub recruiter_email: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub date: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub archived: bool,
    // Only present on the admin listing
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_email: String,
}

impl Application {
    pub fn company_name(&self) -> &str {
        self.company.name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralMaterials {
    #[serde(default = "default_true")]
    pub resume: bool,
    #[serde(default = "default_true")]
    pub essay: bool,
    #[serde(default = "default_true")]
    pub contact: bool,
}

impl Default for ReferralMaterials {
    fn default() -> Self {
        Self { resume: true, essay: true, contact: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub domain: String,
    pub location: Location,
    #[serde(default = "default_true")]
    pub can_refer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_materials: Option<ReferralMaterials>,
}

/// What a referral company asks members to have on file before requesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralRequirements {
    #[serde(default = "default_true")]
    pub resume: bool,
    #[serde(default = "default_true")]
    pub essay: bool,
    #[serde(default = "default_true")]
    pub phone_number: bool,
}

impl Default for ReferralRequirements {
    fn default() -> Self {
        Self { resume: true, essay: true, phone_number: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralCompany {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub referral_link: String,
    #[serde(default)]
    pub referral_materials: ReferralRequirements,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferralRequest {
    pub company_id: String,
    pub job_title: String,
    #[serde(default)]
    pub job_id: String,
    pub role: String,
    #[serde(default)]
    pub request_note: String,
    #[serde(default)]
    pub resume: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub essay: String,
    pub date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LessonCategory {
    #[serde(rename = "Workshops")]
    Workshops,
    #[serde(rename = "Data Structures and Algorithms")]
    Dsa,
    #[serde(rename = "System Design")]
    SystemDesign,
}

impl FromStr for LessonCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "workshops" | "workshop" => Ok(LessonCategory::Workshops),
            "dsa" | "data structures and algorithms" => Ok(LessonCategory::Dsa),
            "system design" | "system-design" => Ok(LessonCategory::SystemDesign),
            _ => Err(anyhow!(
                "Unknown lesson category '{}'. Available: Workshops, DSA, System Design",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonFormat {
    #[default]
    Video,
    Document,
    Html,
}

impl LessonFormat {
    /// Maps the labels offered in the lesson form to wire values.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Video" | "video" => Some(LessonFormat::Video),
            "Document (File)" | "Document (Link)" | "document" => Some(LessonFormat::Document),
            "Web page" | "html" => Some(LessonFormat::Html),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub topic: String,
    pub link: String,
    pub category: LessonCategory,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub format: LessonFormat,
    #[serde(default)]
    pub playlist: String,
    #[serde(default = "default_year")]
    pub year: i32,
    #[serde(default)]
    pub instructor: String,
    #[serde(default)]
    pub uploader: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUpload {
    pub file_id: String,
    pub name: String,
    pub link: String,
}

/// User hierarchy, stored and sent as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Role {
    Guest = 0,
    Member = 1,
    Referrer = 2,
    Volunteer = 3,
    Lead = 4,
    Admin = 5,
}

impl Role {
    pub fn is_privileged(self) -> bool {
        self >= Role::Lead
    }
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            0 => Ok(Role::Guest),
            1 => Ok(Role::Member),
            2 => Ok(Role::Referrer),
            3 => Ok(Role::Volunteer),
            4 => Ok(Role::Lead),
            5 => Ok(Role::Admin),
            other => Err(format!("unknown role code {}", other)),
        }
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        role as u8
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(code) = s.parse::<u8>() {
            return Role::try_from(code).map_err(|e| anyhow!(e));
        }
        match s.to_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "member" => Ok(Role::Member),
            "referrer" => Ok(Role::Referrer),
            "volunteer" => Ok(Role::Volunteer),
            "lead" => Ok(Role::Lead),
            "admin" => Ok(Role::Admin),
            _ => Err(anyhow!(
                "Unknown role '{}'. Available: guest, member, referrer, volunteer, lead, admin",
                s
            )),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Guest => "guest",
            Role::Member => "member",
            Role::Referrer => "referrer",
            Role::Volunteer => "volunteer",
            Role::Lead => "lead",
            Role::Admin => "admin",
        };
        f.write_str(name)
    }
}

/// Body of `GET/POST /learning/progress`, keyed by `category::topic`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub completed_topics: Vec<String>,
    #[serde(default)]
    pub bookmarked_topics: Vec<String>,
    #[serde(default)]
    pub notes: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_year() -> i32 {
    2023
}

/// Mongo ids arrive as strings, the demo data uses integers.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<Id>::deserialize(deserializer)? {
        Some(Id::Text(text)) => text,
        Some(Id::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_accepts_both_company_shapes() {
        let plain: Application = serde_json::from_str(
            r#"{"id": "65a1", "company": "Google", "title": "SWE", "role": "Intern", "status": "Offer"}"#,
        )
        .unwrap();
        assert_eq!(plain.company_name(), "Google");
        assert_eq!(plain.status, ApplicationStatus::Offer);
        assert!(plain.active);

        let rich: Application = serde_json::from_str(
            r#"{"id": 7, "company": {"name": "Stripe", "image": "x.png"}, "status": "Rejected"}"#,
        )
        .unwrap();
        assert_eq!(rich.id, "7");
        assert_eq!(rich.company_name(), "Stripe");
    }

    #[test]
    fn test_status_round_trips_display_strings() {
        let status: ApplicationStatus = serde_json::from_str(r#""Phone interview""#).unwrap();
        assert_eq!(status, ApplicationStatus::PhoneInterview);
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""Phone interview""#);

        let odd: ApplicationStatus = serde_json::from_str(r#""Ghosted""#).unwrap();
        assert_eq!(odd, ApplicationStatus::Other("Ghosted".to_string()));
        assert!(!odd.is_interviewing());
        assert!(ApplicationStatus::OnlineAssessment.is_interviewing());
    }

    #[test]
    fn test_role_codes() {
        let role: Role = serde_json::from_str("1").unwrap();
        assert_eq!(role, Role::Member);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "5");
        assert!(serde_json::from_str::<Role>("9").is_err());

        assert_eq!("lead".parse::<Role>().unwrap(), Role::Lead);
        assert_eq!("2".parse::<Role>().unwrap(), Role::Referrer);
        assert!(Role::Admin.is_privileged());
        assert!(!Role::Member.is_privileged());
    }

    #[test]
    fn test_location_display() {
        let both = Location { country: "USA".into(), city: "Seattle".into() };
        assert_eq!(both.display(), "Seattle, USA");
        let country = Location { country: "Ghana".into(), city: String::new() };
        assert_eq!(country.display(), "Ghana");
    }

    #[test]
    fn test_lesson_wire_format() {
        let lesson = Lesson {
            id: None,
            topic: "Graphs".into(),
            link: "https://example.com".into(),
            category: LessonCategory::Dsa,
            subcategory: None,
            format: LessonFormat::from_label("Web page").unwrap(),
            playlist: "DSA".into(),
            year: 2024,
            instructor: String::new(),
            uploader: 0,
        };
        let json = serde_json::to_value(&lesson).unwrap();
        assert_eq!(json["category"], "Data Structures and Algorithms");
        assert_eq!(json["format"], "html");
        assert!(json.get("id").is_none());
    }
}
