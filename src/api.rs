use reqwest::blocking::{multipart, RequestBuilder};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{
    Application, Company, FileUpload, Lesson, ProgressSnapshot, ReferralCompany,
    ReferralRequest,
};
use crate::progress::ProgressRemote;

const USER_AGENT: &str = concat!("elevate/", env!("CARGO_PKG_VERSION"));

/// Responses sometimes wrap the record, sometimes not.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApplicationBody {
    Wrapped { application: Application },
    Bare(Application),
}

impl ApplicationBody {
    fn into_inner(self) -> Application {
        match self {
            ApplicationBody::Wrapped { application } => application,
            ApplicationBody::Bare(application) => application,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApplicationList {
    Wrapped { applications: Vec<Application> },
    Bare(Vec<Application>),
}

impl ApplicationList {
    fn into_inner(self) -> Vec<Application> {
        match self {
            ApplicationList::Wrapped { applications } => applications,
            ApplicationList::Bare(applications) => applications,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LessonList {
    #[serde(default)]
    lessons: Vec<Lesson>,
}

#[derive(Debug, Deserialize)]
struct LessonBody {
    lesson: Lesson,
}

#[derive(Debug, Deserialize)]
struct ReferralCompanyList {
    #[serde(default)]
    companies: Vec<ReferralCompany>,
}

#[derive(Debug, Deserialize)]
struct UploadBody {
    file: FileUpload,
}

/// Blocking client for the Elevate backend.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::blocking::Client,
    base_url: String,
    token: Option<String>,
    user_id: Option<String>,
}

impl Client {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            user_id: None,
        })
    }

    pub fn with_session(mut self, token: &str, user_id: &str) -> Self {
        self.token = Some(token.to_string());
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn user_path(&self, action: &str) -> ApiResult<String> {
        let user_id = self.user_id.as_deref().ok_or(ApiError::Unauthorized)?;
        Ok(format!("/users.{}.applications.{}", user_id, action))
    }

    fn user_id(&self) -> ApiResult<&str> {
        self.user_id.as_deref().ok_or(ApiError::Unauthorized)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, %url, "api request");
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn send(&self, builder: RequestBuilder) -> ApiResult<String> {
        let response = builder.send()?;
        let status = response.status();
        let body = response.text()?;
        debug!(status = status.as_u16(), bytes = body.len(), "api response");

        if !status.is_success() {
            let err = ApiError::from_status(status.as_u16(), &body);
            warn!("API request failed: {}", err);
            return Err(err);
        }
        Ok(body)
    }

    fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let body = self.send(builder)?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn send_empty(&self, builder: RequestBuilder) -> ApiResult<()> {
        self.send(builder).map(|_| ())
    }

    // Applications

    pub fn list_all_applications(&self) -> ApiResult<Vec<Application>> {
        let list: ApplicationList = self.send_json(self.request(Method::GET, "/applications"))?;
        Ok(list.into_inner())
    }

    pub fn list_user_applications(&self) -> ApiResult<Vec<Application>> {
        let path = self.user_path("list")?;
        let list: ApplicationList = self.send_json(self.request(Method::GET, &path))?;
        Ok(list.into_inner())
    }

    pub fn get_application(&self, id: &str) -> ApiResult<Application> {
        let body: ApplicationBody =
            self.send_json(self.request(Method::GET, &format!("/applications/{}", id)))?;
        Ok(body.into_inner())
    }

    pub fn create_application(&self, draft: &Value) -> ApiResult<Application> {
        let path = self.user_path("create")?;
        let body: ApplicationBody = self.send_json(self.request(Method::POST, &path).json(draft))?;
        Ok(body.into_inner())
    }

    /// Replaces the whole record.
    pub fn put_application(&self, application: &Application) -> ApiResult<Application> {
        let path = format!("/applications/{}", application.id);
        let body: ApplicationBody =
            self.send_json(self.request(Method::PUT, &path).json(application))?;
        Ok(body.into_inner())
    }

    pub fn update_application(&self, id: &str, draft: &Value) -> ApiResult<Application> {
        let path = format!("/applications/{}/update", id);
        let body: ApplicationBody = self.send_json(self.request(Method::PUT, &path).json(draft))?;
        Ok(body.into_inner())
    }

    pub fn archive_user_applications(&self, ids: &[String]) -> ApiResult<()> {
        let path = self.user_path("archive")?;
        self.send_empty(self.request(Method::PUT, &path).json(ids))
    }

    pub fn delete_user_applications(&self, ids: &[String]) -> ApiResult<()> {
        let path = self.user_path("delete")?;
        self.send_empty(self.request(Method::PUT, &path).json(ids))
    }

    pub fn archive_applications(&self, ids: &[String]) -> ApiResult<()> {
        self.send_empty(self.request(Method::PUT, "/applications/archive").json(ids))
    }

    pub fn delete_applications(&self, ids: &[String]) -> ApiResult<()> {
        self.send_empty(self.request(Method::PUT, "/applications/delete").json(ids))
    }

    // Companies and referrals

    pub fn create_company(&self, company: &Company) -> ApiResult<()> {
        self.send_empty(self.request(Method::POST, "/companies/create").json(company))
    }

    pub fn list_referral_companies(&self) -> ApiResult<Vec<ReferralCompany>> {
        let list: ReferralCompanyList =
            self.send_json(self.request(Method::GET, "/referrals/companies"))?;
        Ok(list.companies)
    }

    pub fn create_referral(&self, request: &ReferralRequest) -> ApiResult<()> {
        self.send_empty(self.request(Method::POST, "/referrals").json(request))
    }

    // Learning

    pub fn list_lessons(&self) -> ApiResult<Vec<Lesson>> {
        let list: LessonList = self.send_json(self.request(Method::GET, "/learning/lessons"))?;
        Ok(list.lessons)
    }

    pub fn create_lesson(&self, lesson: &Lesson) -> ApiResult<Lesson> {
        let body: LessonBody =
            self.send_json(self.request(Method::POST, "/learning/lessons").json(lesson))?;
        Ok(body.lesson)
    }

    pub fn update_lesson(&self, id: i64, changes: &Value) -> ApiResult<Lesson> {
        let path = format!("/learning/lessons/{}", id);
        let body: LessonBody = self.send_json(self.request(Method::PATCH, &path).json(changes))?;
        Ok(body.lesson)
    }

    pub fn upload_file(&self, path: &Path) -> ApiResult<FileUpload> {
        let form = multipart::Form::new().file("file", path)?;
        let body: UploadBody = self.send_json(
            self.request(Method::POST, "/learning/file/upload").multipart(form),
        )?;
        Ok(body.file)
    }

    // Profile documents

    pub fn update_cover_letter(&self, text: &str) -> ApiResult<()> {
        let path = format!("/users/{}/cover-letter", self.user_id()?);
        self.send_empty(self.request(Method::POST, &path).json(&json!({ "cover_letter": text })))
    }

    pub fn update_essay(&self, text: &str) -> ApiResult<()> {
        let path = format!("/users/{}/essay", self.user_id()?);
        self.send_empty(self.request(Method::POST, &path).json(&json!({ "essay": text })))
    }
}

impl ProgressRemote for Client {
    fn fetch_progress(&self) -> ApiResult<ProgressSnapshot> {
        self.send_json(self.request(Method::GET, "/learning/progress"))
    }

    fn push_progress(&self, snapshot: &ProgressSnapshot) -> ApiResult<()> {
        self.send_empty(self.request(Method::POST, "/learning/progress").json(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = Client::new("http://localhost:8000/v1/").unwrap();
        assert_eq!(client.url("/applications"), "http://localhost:8000/v1/applications");
        assert_eq!(client.url("learning/lessons"), "http://localhost:8000/v1/learning/lessons");
    }

    #[test]
    fn test_user_paths_need_session() {
        let client = Client::new("http://localhost:8000/v1").unwrap();
        assert!(client.user_path("list").unwrap_err().is_unauthorized());

        let client = client.with_session("tok", "64f0c2");
        assert_eq!(client.user_path("list").unwrap(), "/users.64f0c2.applications.list");
        assert_eq!(client.user_path("archive").unwrap(), "/users.64f0c2.applications.archive");
    }

    #[test]
    fn test_application_body_shapes() {
        let wrapped: ApplicationBody =
            serde_json::from_str(r#"{"application": {"id": "a1", "company": "Stripe", "title": "SWE"}}"#)
                .unwrap();
        assert_eq!(wrapped.into_inner().company_name(), "Stripe");

        let bare: ApplicationBody =
            serde_json::from_str(r#"{"id": 3, "company": {"name": "Amazon", "image": ""}}"#).unwrap();
        let app = bare.into_inner();
        assert_eq!(app.id, "3");
        assert_eq!(app.company_name(), "Amazon");
    }

    #[test]
    fn test_application_list_shapes() {
        let wrapped: ApplicationList =
            serde_json::from_str(r#"{"applications": [{"id": "a"}, {"id": "b"}]}"#).unwrap();
        assert_eq!(wrapped.into_inner().len(), 2);

        let bare: ApplicationList = serde_json::from_str(r#"[{"id": "a"}]"#).unwrap();
        assert_eq!(bare.into_inner().len(), 1);
    }

    #[test]
    fn test_upload_body() {
        let body: UploadBody = serde_json::from_str(
            r#"{"file": {"file_id": "f1", "name": "slides.pdf", "link": "https://drive.example/f1"}}"#,
        )
        .unwrap();
        assert_eq!(body.file.name, "slides.pdf");
    }
}
