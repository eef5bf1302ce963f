//! Draft builders for the create and edit panels. Each returns a [`Form`]
//! seeded with the fields its panel starts from.

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use serde_json::{json, Value};

use crate::catalog::Reference;
use crate::form::{FieldChange, Form};
use crate::models::{
    Application, ApplicationStatus, Lesson, LessonCategory, LessonFormat, ReferralCompany,
    ReferralRequest, ReferralRequirements,
};
use crate::suggest;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

// Applications

pub fn application_form() -> Form {
    Form::new(json!({
        "company": "",
        "title": "",
        "role": "",
        "deadline": "",
        "notes": "",
        "status": "",
        "referred": false,
        "recruiter_name": "",
        "recruiter_email": "",
        "location": { "country": "", "city": "" }
    }))
    .required(&["company", "title", "role", "status"])
    .booleans(&["referred"])
}

/// Only the fields the edit panel exposes, seeded from the current record.
pub fn application_update_form(app: &Application) -> Form {
    Form::new(json!({
        "id": app.id,
        "status": app.status,
        "referred": app.referred,
        "notes": app.notes,
        "recruiter_name": app.recruiter_name,
        "recruiter_email": app.recruiter_email,
        "location": { "country": app.location.country, "city": app.location.city }
    }))
    .required(&["status"])
    .booleans(&["referred"])
}

/// The full record, for edits the update panel does not cover.
pub fn application_replace_form(app: &Application) -> Result<Form> {
    Ok(Form::new(serde_json::to_value(app)?)
        .required(&["company", "title", "role", "status"])
        .booleans(&["referred", "active", "archived"]))
}

/// Snaps typed picker values onto the reference lists and checks the fields
/// the pickers would have constrained. Custom companies and titles are kept.
pub fn normalize_application(form: &mut Form, reference: &Reference) -> Result<()> {
    for (field, options) in [
        ("company", &reference.companies),
        ("title", &reference.job_titles),
        ("role", &reference.job_levels),
        ("location.country", &reference.countries),
    ] {
        let Some(raw) = string_field(form, field) else {
            continue;
        };
        if let Some(canonical) = suggest::resolve(&raw, options) {
            if canonical != raw {
                form.apply(FieldChange::new(field, canonical))?;
            }
        }
    }

    if let Some(raw) = string_field(form, "status") {
        match ApplicationStatus::from(raw.clone()) {
            ApplicationStatus::Other(_) => bail!(
                "Unknown status '{}'. Available: {}",
                raw,
                ApplicationStatus::KNOWN.map(|s| s.as_str().to_string()).join(", ")
            ),
            status => form.apply(FieldChange::new("status", status.as_str()))?,
        }
    }

    if let Some(email) = string_field(form, "recruiter_email") {
        let re = regex::Regex::new(EMAIL_PATTERN)?;
        if !re.is_match(&email) {
            bail!("'{}' is not a valid recruiter email", email);
        }
    }
    Ok(())
}

fn string_field(form: &Form, field: &str) -> Option<String> {
    form.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// Companies

pub fn company_form() -> Form {
    Form::new(json!({
        "name": "",
        "image": "",
        "domain": "",
        "location": { "country": "", "city": "" },
        "can_refer": true,
        "referral_materials": { "resume": true, "essay": true, "contact": true }
    }))
    .required(&["name", "domain", "location.country"])
    .booleans(&[
        "can_refer",
        "referral_materials.resume",
        "referral_materials.essay",
        "referral_materials.contact",
    ])
}

// Referrals

/// What the member already has on file.
#[derive(Debug, Clone, Default)]
pub struct Materials {
    pub resume: Option<String>,
    pub essay: Option<String>,
    pub phone_number: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

pub fn missing_requirements(
    requirements: &ReferralRequirements,
    materials: &Materials,
) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if requirements.resume && !present(&materials.resume) {
        missing.push("resume");
    }
    if requirements.essay && !present(&materials.essay) {
        missing.push("referral essay");
    }
    if requirements.phone_number && !present(&materials.phone_number) {
        missing.push("phone number");
    }
    missing
}

/// "a", "a and b", "a, b, and c".
pub fn format_requirement_list(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => one.to_string(),
        [first, second] => format!("{} and {}", first, second),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    }
}

pub fn requirement_warning(missing: &[&str]) -> Option<String> {
    if missing.is_empty() {
        return None;
    }
    Some(format!(
        "Please add your {} before requesting a referral.",
        format_requirement_list(missing)
    ))
}

pub fn referral_date(today: NaiveDate) -> String {
    today.format("%d-%m-%Y").to_string()
}

/// The company is sent by name in `company_id`.
pub fn referral_form(company: &ReferralCompany, materials: &Materials, today: NaiveDate) -> Form {
    Form::new(json!({
        "company_id": company.name,
        "job_title": "",
        "job_id": "",
        "role": "New grad",
        "request_note": "",
        "resume": materials.resume.clone().unwrap_or_default(),
        "phone_number": materials.phone_number.clone().unwrap_or_default(),
        "essay": materials.essay.clone().unwrap_or_default(),
        "date": referral_date(today)
    }))
    .required(&["job_title", "role"])
}

pub fn referral_request(
    form: &Form,
    company: &ReferralCompany,
    materials: &Materials,
) -> Result<ReferralRequest> {
    let missing = missing_requirements(&company.referral_materials, materials);
    if let Some(warning) = requirement_warning(&missing) {
        bail!(warning);
    }
    form.validate()?;
    form.to_payload()
}

// Lessons

pub fn lesson_form(uploader: i64, today: NaiveDate) -> Form {
    Form::new(json!({
        "topic": "",
        "link": "",
        "category": "",
        "subcategory": null,
        "format": "",
        "playlist": "",
        "year": today.year(),
        "instructor": "",
        "uploader": uploader
    }))
    .required(&["topic", "link", "category", "format"])
}

/// Accepts the form's display labels and short names for category and
/// format, and numeric text for the year.
pub fn lesson_payload(form: &Form) -> Result<Lesson> {
    form.validate()?;
    let mut normalized = form.clone();

    if let Some(raw) = string_field(form, "category") {
        let category: LessonCategory = raw.parse()?;
        normalized.apply(FieldChange::new("category", serde_json::to_value(category)?))?;
    }
    if let Some(raw) = string_field(form, "format") {
        let format = LessonFormat::from_label(&raw)
            .with_context(|| format!("Unknown lesson format '{}'. Available: Video, Document (File), Document (Link), Web page", raw))?;
        normalized.apply(FieldChange::new("format", serde_json::to_value(format)?))?;
    }
    if let Some(raw) = string_field(form, "year") {
        let year: i32 = raw.parse().with_context(|| format!("Invalid year '{}'", raw))?;
        normalized.apply(FieldChange::new("year", year))?;
    }
    normalized.to_payload()
}

/// Partial body for `PATCH /learning/lessons/{id}` from `field=value` edits.
pub fn lesson_changes(changes: Vec<FieldChange>) -> Result<Value> {
    let mut form = Form::new(json!({}));
    form.apply_all(changes)?;

    let mut draft = form.draft().clone();
    if let Some(raw) = draft.get("category").and_then(Value::as_str) {
        let category: LessonCategory = raw.parse()?;
        draft["category"] = serde_json::to_value(category)?;
    }
    if let Some(raw) = draft.get("format").and_then(Value::as_str) {
        let format = LessonFormat::from_label(raw)
            .with_context(|| format!("Unknown lesson format '{}'", raw))?;
        draft["format"] = serde_json::to_value(format)?;
    }
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::form::parse_assignment;

    fn apply(form: &mut Form, assignments: &[&str]) {
        for raw in assignments {
            form.apply(parse_assignment(raw).unwrap()).unwrap();
        }
    }

    fn company(requirements: ReferralRequirements) -> ReferralCompany {
        ReferralCompany {
            id: "c1".into(),
            name: "Stripe".into(),
            image: String::new(),
            referral_link: String::new(),
            referral_materials: requirements,
        }
    }

    #[test]
    fn test_application_form_builds_payload() {
        let reference = catalog::reference().unwrap();
        let mut form = application_form();
        assert_eq!(form.missing_required(), vec!["company", "title", "role", "status"]);

        apply(
            &mut form,
            &[
                "company=google",
                "title=Software Engineer",
                "role=new grad",
                "status=phone interview",
                "referred=yes",
                "location.city=Accra",
                "location.country=ghana",
            ],
        );
        normalize_application(&mut form, &reference).unwrap();
        form.validate().unwrap();

        let draft = form.draft();
        assert_eq!(draft["company"], "Google");
        assert_eq!(draft["role"], "New Grad");
        assert_eq!(draft["status"], "Phone interview");
        assert_eq!(draft["referred"], true);
        assert_eq!(draft["location"]["country"], "Ghana");
        assert_eq!(draft["location"]["city"], "Accra");
    }

    #[test]
    fn test_custom_company_is_kept() {
        let reference = catalog::reference().unwrap();
        let mut form = application_form();
        apply(&mut form, &["company=Tiny Startup Labs", "status=Offer"]);
        normalize_application(&mut form, &reference).unwrap();
        assert_eq!(form.draft()["company"], "Tiny Startup Labs");
    }

    #[test]
    fn test_application_rejects_bad_input() {
        let reference = catalog::reference().unwrap();

        let mut form = application_form();
        apply(&mut form, &["status=Ghosted"]);
        assert!(normalize_application(&mut form, &reference).is_err());

        let mut form = application_form();
        apply(&mut form, &["status=Offer", "recruiter_email=not-an-email"]);
        let err = normalize_application(&mut form, &reference).unwrap_err();
        assert!(err.to_string().contains("recruiter email"));
    }

    #[test]
    fn test_update_form_seeds_from_record() {
        let demo = catalog::demo_applications().unwrap();
        let mut form = application_update_form(&demo[1]);
        assert_eq!(form.draft()["status"], "Offer");
        assert!(form.get("company").is_none());

        apply(&mut form, &["status=Rejected", "notes=Went with another offer"]);
        assert_eq!(form.draft()["status"], "Rejected");
        assert_eq!(form.draft()["id"], demo[1].id.as_str());
    }

    #[test]
    fn test_replace_form_round_trips_record() {
        let demo = catalog::demo_applications().unwrap();
        let mut form = application_replace_form(&demo[2]).unwrap();
        apply(&mut form, &["title=Staff Engineer", "company.name=AWS", "archived=yes"]);

        let record: Application = form.to_payload().unwrap();
        assert_eq!(record.id, demo[2].id);
        assert_eq!(record.title, "Staff Engineer");
        assert_eq!(record.company_name(), "AWS");
        assert!(record.archived);
        assert_eq!(record.status, demo[2].status);
    }

    #[test]
    fn test_company_form_payload() {
        let mut form = company_form();
        apply(
            &mut form,
            &[
                "name=Paystack",
                "domain=paystack.com",
                "location.country=Nigeria",
                "referral_materials.essay=no",
            ],
        );
        let company: crate::models::Company = form.to_payload().unwrap();
        assert_eq!(company.name, "Paystack");
        assert!(company.can_refer);
        let materials = company.referral_materials.unwrap();
        assert!(!materials.essay);
        assert!(materials.resume);
    }

    #[test]
    fn test_requirement_list_formatting() {
        assert_eq!(format_requirement_list(&["resume"]), "resume");
        assert_eq!(format_requirement_list(&["resume", "phone number"]), "resume and phone number");
        assert_eq!(
            requirement_warning(&["resume", "referral essay", "phone number"]).unwrap(),
            "Please add your resume, referral essay, and phone number before requesting a referral."
        );
        assert!(requirement_warning(&[]).is_none());
    }

    #[test]
    fn test_missing_requirements_respects_company() {
        let materials = Materials {
            resume: Some("https://drive.example/cv.pdf".into()),
            essay: Some("   ".into()),
            phone_number: None,
        };
        let all = ReferralRequirements::default();
        assert_eq!(missing_requirements(&all, &materials), vec!["referral essay", "phone number"]);

        let resume_only = ReferralRequirements { resume: true, essay: false, phone_number: false };
        assert!(missing_requirements(&resume_only, &materials).is_empty());
    }

    #[test]
    fn test_referral_request_from_form() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let materials = Materials {
            resume: Some("https://drive.example/cv.pdf".into()),
            essay: Some("Why me".into()),
            phone_number: Some("+233 20 000 0000".into()),
        };
        let company = company(ReferralRequirements::default());
        let mut form = referral_form(&company, &materials, today);
        assert_eq!(form.draft()["role"], "New grad");
        assert_eq!(form.draft()["date"], "07-03-2024");

        assert!(referral_request(&form, &company, &materials).is_err());
        apply(&mut form, &["job_title=Backend Engineer", "job_id=R-123"]);
        let request = referral_request(&form, &company, &materials).unwrap();
        assert_eq!(request.company_id, "Stripe");
        assert_eq!(request.job_id, "R-123");
        assert_eq!(request.resume, "https://drive.example/cv.pdf");
    }

    #[test]
    fn test_referral_blocked_without_materials() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let company = company(ReferralRequirements::default());
        let materials = Materials::default();
        let mut form = referral_form(&company, &materials, today);
        apply(&mut form, &["job_title=Backend Engineer"]);

        let err = referral_request(&form, &company, &materials).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please add your resume, referral essay, and phone number before requesting a referral."
        );
    }

    #[test]
    fn test_lesson_payload_maps_labels() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut form = lesson_form(12, today);
        apply(
            &mut form,
            &[
                "topic=Graph traversal",
                "link=https://example.com/graphs",
                "category=DSA",
                "format=Web page",
                "year=2022",
            ],
        );
        let lesson = lesson_payload(&form).unwrap();
        assert_eq!(lesson.category, LessonCategory::Dsa);
        assert_eq!(lesson.format, LessonFormat::Html);
        assert_eq!(lesson.year, 2022);
        assert_eq!(lesson.uploader, 12);
    }

    #[test]
    fn test_lesson_requires_fields() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let form = lesson_form(1, today);
        let err = lesson_payload(&form).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field(s): topic, link, category, format");
    }

    #[test]
    fn test_lesson_changes_are_partial() {
        let changes = vec![
            parse_assignment("format=Document (Link)").unwrap(),
            parse_assignment("instructor=Ama").unwrap(),
        ];
        let body = lesson_changes(changes).unwrap();
        assert_eq!(body, json!({"format": "document", "instructor": "Ama"}));
    }
}
