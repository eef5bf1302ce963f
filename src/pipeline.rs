//! Derived views over the application list: filter, sort, paginate. Nothing
//! here mutates the source list, and the same inputs always give the same view.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::{Application, ApplicationStatus};

/// Treats the "All" option and blank input as "no filter".
pub fn active(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("all"))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationFilter {
    pub search: String,
    pub member: String,
    pub company: String,
    pub status: Option<ApplicationStatus>,
    pub level: Option<String>,
    pub location: Option<String>,
    pub referred: Option<bool>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl ApplicationFilter {
    pub fn matches(&self, app: &Application) -> bool {
        self.matches_search(app)
            && self.matches_member(app)
            && contains_ci(app.company_name(), &self.company)
            && self.status.as_ref().is_none_or(|status| &app.status == status)
            && self.level.as_deref().is_none_or(|level| app.role == level)
            && self.location.as_deref().is_none_or(|place| {
                app.location.country.eq_ignore_ascii_case(place)
                    || app.location.city.eq_ignore_ascii_case(place)
            })
            && self.referred.is_none_or(|referred| app.referred == referred)
            && self.matches_dates(app)
    }

    fn matches_search(&self, app: &Application) -> bool {
        self.search.trim().is_empty()
            || contains_ci(app.company_name(), &self.search)
            || contains_ci(&app.title, &self.search)
            || contains_ci(&app.role, &self.search)
            || (!app.user_name.is_empty() && contains_ci(&app.user_name, &self.search))
    }

    fn matches_member(&self, app: &Application) -> bool {
        self.member.trim().is_empty()
            || contains_ci(&app.user_name, &self.member)
            || contains_ci(&app.user_email, &self.member)
    }

    fn matches_dates(&self, app: &Application) -> bool {
        if self.date_from.is_none() && self.date_to.is_none() {
            return true;
        }
        let Some(applied) = parse_timestamp(&app.date).map(|ts| ts.date()) else {
            return false;
        };
        self.date_from.is_none_or(|from| applied >= from)
            && self.date_to.is_none_or(|to| applied <= to)
    }

    /// Number of active filters shown on the filter badge; free-text search
    /// is not counted.
    pub fn active_count(&self) -> usize {
        [
            !self.member.trim().is_empty(),
            !self.company.trim().is_empty(),
            self.status.is_some(),
            self.level.is_some(),
            self.location.is_some(),
            self.referred.is_some(),
            self.date_from.is_some(),
            self.date_to.is_some(),
        ]
        .into_iter()
        .filter(|on| *on)
        .count()
    }

    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty() || self.active_count() > 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Accepts the date shapes the backend and the forms produce.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    ["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub fn parse_date_arg(raw: &str) -> Result<NaiveDate> {
    parse_timestamp(raw)
        .map(|ts| ts.date())
        .ok_or_else(|| anyhow!("Invalid date '{}'. Use YYYY-MM-DD", raw))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Date,
    Company,
    Member,
    Status,
    Title,
}

impl SortKey {
    fn as_str(self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::Company => "company",
            SortKey::Member => "member",
            SortKey::Status => "status",
            SortKey::Title => "title",
        }
    }

    fn compare(self, a: &Application, b: &Application) -> Ordering {
        match self {
            SortKey::Date => parse_timestamp(&a.date).cmp(&parse_timestamp(&b.date)),
            SortKey::Company => compare_text(a.company_name(), b.company_name()),
            SortKey::Member => compare_text(&a.user_name, &b.user_name),
            SortKey::Status => compare_text(a.status.as_str(), b.status.as_str()),
            SortKey::Title => compare_text(&a.title, &b.title),
        }
    }
}

/// Case-insensitive first, exact order as the tiebreak.
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub key: SortKey,
    pub direction: Direction,
}

impl Default for SortState {
    fn default() -> Self {
        Self { key: SortKey::Date, direction: Direction::Descending }
    }
}

impl SortState {
    pub fn ascending(key: SortKey) -> Self {
        Self { key, direction: Direction::Ascending }
    }

    /// Column-header click: the active column flips, any other column starts
    /// ascending.
    pub fn toggle(self, key: SortKey) -> Self {
        if self.key != key {
            return Self::ascending(key);
        }
        let direction = match self.direction {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        };
        Self { key, direction }
    }

    pub fn compare(&self, a: &Application, b: &Application) -> Ordering {
        let ordering = self.key.compare(a, b);
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

impl FromStr for SortState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        let (key, direction) = match s.rsplit_once('_') {
            Some((key, "asc")) => (key, Direction::Ascending),
            Some((key, "desc")) => (key, Direction::Descending),
            _ => (s.as_str(), Direction::Ascending),
        };
        let key = match key {
            "date" => SortKey::Date,
            "company" => SortKey::Company,
            "member" => SortKey::Member,
            "status" => SortKey::Status,
            "title" => SortKey::Title,
            _ => {
                return Err(anyhow!(
                    "Unknown sort '{}'. Use date|company|member|status|title with _asc or _desc",
                    s
                ));
            }
        };
        Ok(Self { key, direction })
    }
}

impl fmt::Display for SortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.direction {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        };
        write!(f, "{}_{}", self.key.as_str(), suffix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct View<'a> {
    pub items: Vec<&'a Application>,
    /// Size of the filtered list before paging.
    pub matched: usize,
    pub page: usize,
    pub page_count: usize,
}

pub fn page_count(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1))
}

pub fn clamp_page(page: usize, page_count: usize) -> usize {
    page.clamp(1, page_count.max(1))
}

pub fn derive_view<'a>(
    source: &'a [Application],
    filter: &ApplicationFilter,
    sort: SortState,
    page: Option<PageRequest>,
) -> View<'a> {
    let mut items: Vec<&Application> = source.iter().filter(|app| filter.matches(app)).collect();
    items.sort_by(|a, b| sort.compare(a, b));
    let matched = items.len();

    match page {
        None => View { items, matched, page: 1, page_count: 1 },
        Some(request) => {
            let size = request.page_size.max(1);
            let count = page_count(matched, size);
            let current = clamp_page(request.page, count);
            let items = items.into_iter().skip((current - 1) * size).take(size).collect();
            View { items, matched, page: current, page_count: count }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub submitted: usize,
    pub interviewing: usize,
    pub offers: usize,
    pub rejected: usize,
    /// Everything that is not an offer, a rejection or an interview stage.
    pub pending: usize,
}

pub fn stats(applications: &[Application]) -> Stats {
    applications.iter().fold(Stats::default(), |mut acc, app| {
        acc.total += 1;
        match &app.status {
            ApplicationStatus::Offer => acc.offers += 1,
            ApplicationStatus::Rejected => acc.rejected += 1,
            status if status.is_interviewing() => acc.interviewing += 1,
            _ => acc.pending += 1,
        }
        if app.status == ApplicationStatus::Submitted {
            acc.submitted += 1;
        }
        acc
    })
}

const CSV_HEADER: [&str; 10] = [
    "Member", "Email", "Company", "Position", "Level", "Location", "Referred", "Recruiter", "Status",
    "Applied",
];

pub fn export_csv(applications: &[&Application]) -> String {
    let mut out = csv_row(CSV_HEADER.iter().map(|h| h.to_string()));
    for app in applications {
        out.push('\n');
        out.push_str(&csv_row([
            app.user_name.clone(),
            app.user_email.clone(),
            app.company_name().to_string(),
            app.title.clone(),
            app.role.clone(),
            app.location.display(),
            if app.referred { "Yes" } else { "No" }.to_string(),
            app.recruiter_name.clone(),
            app.status.to_string(),
            app.date.clone(),
        ]));
    }
    out
}

fn csv_row(fields: impl IntoIterator<Item = String>) -> String {
    fields
        .into_iter()
        .map(|field| {
            if field.contains([',', '"', '\n', '\r']) {
                format!("\"{}\"", field.replace('"', "\"\""))
            } else {
                field
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::demo_applications;

    fn ids(view: &View) -> Vec<String> {
        view.items.iter().map(|a| a.id.clone()).collect()
    }

    fn app(id: &str, company: &str, date: &str) -> Application {
        Application {
            id: id.into(),
            company: crate::models::CompanyRef::Name(company.into()),
            date: date.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_offer_filter_yields_microsoft() {
        let demo = demo_applications().unwrap();
        let filter = ApplicationFilter {
            status: Some(ApplicationStatus::Offer),
            ..Default::default()
        };
        let view = derive_view(&demo, &filter, SortState::default(), None);
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].company_name(), "Microsoft");
    }

    #[test]
    fn test_clearing_filters_restores_all_by_date_desc() {
        let demo = demo_applications().unwrap();
        let mut filter = ApplicationFilter {
            status: Some(ApplicationStatus::Offer),
            search: "micro".into(),
            ..Default::default()
        };
        filter.clear();
        assert!(!filter.is_active());

        let view = derive_view(&demo, &filter, SortState::default(), None);
        assert_eq!(view.matched, 8);
        assert_eq!(ids(&view), vec!["6", "5", "4", "8", "3", "2", "1", "7"]);
    }

    #[test]
    fn test_derive_view_is_idempotent_and_pure() {
        let demo = demo_applications().unwrap();
        let before = demo.clone();
        let filter = ApplicationFilter {
            search: "engineer".into(),
            referred: Some(false),
            ..Default::default()
        };
        let sort: SortState = "company_asc".parse().unwrap();

        let first = ids(&derive_view(&demo, &filter, sort, None));
        let second = ids(&derive_view(&demo, &filter, sort, None));
        assert_eq!(first, second);
        assert_eq!(demo, before);
        // Netflix and Stripe; the other engineers were referred
        assert_eq!(first, vec!["6", "7"]);
    }

    #[test]
    fn test_predicates_are_conjunctive() {
        let demo = demo_applications().unwrap();
        let level_only = ApplicationFilter { level: Some("Full Stack".into()), ..Default::default() };
        let referred_only = ApplicationFilter { referred: Some(true), ..Default::default() };
        let both = ApplicationFilter {
            level: Some("Full Stack".into()),
            referred: Some(true),
            ..Default::default()
        };

        let expected: Vec<&str> = demo
            .iter()
            .filter(|a| level_only.matches(a) && referred_only.matches(a))
            .map(|a| a.id.as_str())
            .collect();
        let actual: Vec<&str> = demo.iter().filter(|a| both.matches(a)).map(|a| a.id.as_str()).collect();
        assert_eq!(actual, expected);
        assert_eq!(actual, vec!["4", "8"]);
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let demo = demo_applications().unwrap();
        let filter = ApplicationFilter {
            date_from: Some(parse_date_arg("2025-10-20").unwrap()),
            date_to: Some(parse_date_arg("2025-10-28").unwrap()),
            ..Default::default()
        };
        let view = derive_view(&demo, &filter, SortState::ascending(SortKey::Date), None);
        assert_eq!(ids(&view), vec!["2", "3", "8"]);
    }

    #[test]
    fn test_unparsable_dates_never_match_a_date_bound() {
        let apps = vec![app("1", "A", "soon"), app("2", "B", "2025-01-02")];
        let filter = ApplicationFilter {
            date_from: Some(parse_date_arg("2025-01-01").unwrap()),
            ..Default::default()
        };
        let view = derive_view(&apps, &filter, SortState::default(), None);
        assert_eq!(ids(&view), vec!["2"]);
    }

    #[test]
    fn test_location_and_search() {
        let demo = demo_applications().unwrap();
        let filter = ApplicationFilter { location: Some("san francisco".into()), ..Default::default() };
        assert_eq!(derive_view(&demo, &filter, SortState::default(), None).matched, 2);

        let filter = ApplicationFilter { search: "MOBILE".into(), ..Default::default() };
        let view = derive_view(&demo, &filter, SortState::default(), None);
        assert_eq!(view.items[0].company_name(), "Apple");
    }

    #[test]
    fn test_sort_toggle() {
        let state = SortState::default();
        let company = state.toggle(SortKey::Company);
        assert_eq!(company, SortState::ascending(SortKey::Company));
        let flipped = company.toggle(SortKey::Company);
        assert_eq!(flipped.direction, Direction::Descending);
        assert_eq!(flipped.toggle(SortKey::Company).direction, Direction::Ascending);
        assert_eq!(flipped.toggle(SortKey::Status), SortState::ascending(SortKey::Status));
    }

    #[test]
    fn test_sort_names_round_trip() {
        for name in ["date_desc", "date_asc", "company_asc", "company_desc", "member_asc", "member_desc"] {
            assert_eq!(name.parse::<SortState>().unwrap().to_string(), name);
        }
        assert_eq!("status".parse::<SortState>().unwrap(), SortState::ascending(SortKey::Status));
        assert!("salary_desc".parse::<SortState>().is_err());
    }

    #[test]
    fn test_company_sort_is_case_insensitive_and_stable() {
        let apps = vec![app("1", "beta", ""), app("2", "Alpha", ""), app("3", "alpha", ""), app("4", "Alpha", "")];
        let view = derive_view(&apps, &ApplicationFilter::default(), SortState::ascending(SortKey::Company), None);
        assert_eq!(ids(&view), vec!["2", "4", "3", "1"]);
    }

    #[test]
    fn test_pagination_boundaries() {
        let apps: Vec<Application> = (1..=23).map(|i| app(&i.to_string(), "Acme", "")).collect();
        let sort = SortState::ascending(SortKey::Company);
        let filter = ApplicationFilter::default();

        let last = derive_view(&apps, &filter, sort, Some(PageRequest { page: 3, page_size: 10 }));
        assert_eq!(last.page_count, 3);
        assert_eq!(last.items.len(), 23 % 10);

        let clamped = derive_view(&apps, &filter, sort, Some(PageRequest { page: 99, page_size: 10 }));
        assert_eq!(clamped.page, 3);
        let clamped = derive_view(&apps, &filter, sort, Some(PageRequest { page: 0, page_size: 10 }));
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.items.len(), 10);

        let even: Vec<Application> = apps.into_iter().take(20).collect();
        let last = derive_view(&even, &filter, sort, Some(PageRequest { page: 2, page_size: 10 }));
        assert_eq!(last.items.len(), 10);
    }

    #[test]
    fn test_empty_list_pages() {
        let view = derive_view(&[], &ApplicationFilter::default(), SortState::default(), Some(PageRequest { page: 4, page_size: 10 }));
        assert_eq!(view.page_count, 0);
        assert_eq!(view.page, 1);
        assert!(view.items.is_empty());
    }

    #[test]
    fn test_stats() {
        let demo = demo_applications().unwrap();
        let stats = stats(&demo);
        assert_eq!(stats.total, 8);
        assert_eq!(stats.offers, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.interviewing, 5);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.submitted, 1);
    }

    #[test]
    fn test_active_filter_count() {
        let filter = ApplicationFilter {
            search: "x".into(),
            status: Some(ApplicationStatus::Hr),
            referred: Some(true),
            ..Default::default()
        };
        assert_eq!(filter.active_count(), 2);
        assert_eq!(active(Some("All")), None);
        assert_eq!(active(Some(" ")), None);
        assert_eq!(active(Some("Offer")), Some("Offer"));
    }

    #[test]
    fn test_export_csv_quotes_fields() {
        let mut a = app("1", "Acme, Inc.", "2025-01-01");
        a.location.city = "Accra".into();
        a.location.country = "Ghana".into();
        a.referred = true;
        let csv = export_csv(&[&a]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Member,Email,Company,Position,Level,Location,Referred,Recruiter,Status,Applied"
        );
        assert_eq!(lines.next().unwrap(), ",,\"Acme, Inc.\",,,\"Accra, Ghana\",Yes,,Submitted,2025-01-01");
    }
}
