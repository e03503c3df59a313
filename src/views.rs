//! Server-rendered HTML pages for the dashboard and login form.
//!
//! Pages are Tera templates compiled into the binary. Their names end in `.html`, so every
//! interpolated value is HTML-escaped unless a template marks it `safe`. Only links built by
//! [`encode_path`] and [`queue_href`] are marked that way.

use std::fmt::Write;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use tera::{Context, Tera};

use crate::config::{DateFormats, UiConfig};
use crate::models::queue::{JobState, JobSummary, QueueSummary};
use crate::models::BoardResult;

const TEMPLATES: [(&str, &str); 4] = [
    ("base.html", include_str!("../templates/base.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    ("queue.html", include_str!("../templates/queue.html")),
    ("login.html", include_str!("../templates/login.html")),
];

/// Formats a millisecond timestamp: `short` format for today, `common` for earlier this year,
/// `full` for anything older.
pub fn format_timestamp(formats: &DateFormats, millis: i64, now: DateTime<Utc>) -> String {
    let ts = match Utc.timestamp_millis_opt(millis).single() {
        Some(ts) => ts,
        None => return millis.to_string(),
    };
    let format = if ts.date_naive() == now.date_naive() {
        &formats.short
    } else if ts.year() == now.year() {
        &formats.common
    } else {
        &formats.full
    };

    let mut out = String::new();
    match write!(out, "{}", ts.format(format)) {
        Ok(()) => out,
        // invalid format string
        Err(_) => ts.to_rfc3339(),
    }
}

/// Percent-encodes each segment of a path, keeping the `/` separators.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// Link to a queue's page below `home_page`.
pub fn queue_href(home_page: &str, queue_name: &str) -> String {
    format!(
        "{}/queues/{}",
        encode_path(home_page.trim_end_matches('/')),
        urlencoding::encode(queue_name)
    )
}

#[derive(Serialize)]
struct Branding<'a> {
    title: &'a str,
    locale: &'a str,
    logo_path: Option<&'a str>,
    logo_width: Option<&'a str>,
    logo_height: Option<&'a str>,
    favicon: Option<&'a str>,
    favicon_alternative: Option<&'a str>,
}

impl<'a> From<&'a UiConfig> for Branding<'a> {
    fn from(ui: &'a UiConfig) -> Self {
        Branding {
            title: &ui.title,
            locale: &ui.locale,
            logo_path: ui.logo_path.as_deref(),
            logo_width: ui.logo_width.as_deref(),
            logo_height: ui.logo_height.as_deref(),
            favicon: ui.favicon.as_deref(),
            favicon_alternative: ui.favicon_alternative.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct QueueRow<'a> {
    name: &'a str,
    href: String,
    kind: String,
    available: bool,
    counts: String,
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct StateLink {
    name: String,
    href: String,
    current: bool,
}

#[derive(Serialize)]
struct JobRow<'a> {
    id: &'a str,
    name: &'a str,
    created: String,
    processed: String,
    finished: String,
    attempts: u64,
    data: String,
    failed_reason: &'a str,
}

/// The compiled page templates.
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> BoardResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)?;
        Ok(Views { tera })
    }

    /// Context shared by every page: branding and the header links.
    fn page(&self, ui: &UiConfig, home_page: &str, logout_page: Option<&str>) -> Context {
        let mut context = Context::new();
        context.insert("branding", &Branding::from(ui));
        context.insert("home_href", &encode_path(home_page));
        context.insert("logout_href", &logout_page.map(encode_path));
        context
    }

    /// Renders the main dashboard: one row per queue with its job counts.
    pub fn dashboard(
        &self,
        ui: &UiConfig,
        home_page: &str,
        logout_page: Option<&str>,
        queues: &[QueueSummary],
        now: DateTime<Utc>,
    ) -> BoardResult<String> {
        let rows: Vec<QueueRow> = queues
            .iter()
            .map(|queue| QueueRow {
                name: &queue.name,
                href: queue_href(home_page, &queue.name),
                kind: queue.kind.to_string(),
                available: queue.counts.is_some(),
                counts: queue
                    .counts
                    .iter()
                    .flatten()
                    .map(|(state, n)| format!("{}: {}", state, n))
                    .collect::<Vec<_>>()
                    .join(", "),
                error: queue.error.as_deref(),
            })
            .collect();

        let mut context = self.page(ui, home_page, logout_page);
        context.insert("queues", &rows);
        context.insert("updated", &format_timestamp(&ui.date_formats, now.timestamp_millis(), now));
        Ok(self.tera.render("dashboard.html", &context)?)
    }

    /// Renders the jobs of one queue in one state.
    #[allow(clippy::too_many_arguments)]
    pub fn queue(
        &self,
        ui: &UiConfig,
        home_page: &str,
        logout_page: Option<&str>,
        queue_name: &str,
        states: &[JobState],
        current: JobState,
        jobs: &[JobSummary],
        now: DateTime<Utc>,
    ) -> BoardResult<String> {
        let href = queue_href(home_page, queue_name);
        let links: Vec<StateLink> = states
            .iter()
            .map(|state| StateLink {
                name: state.to_string(),
                href: format!("{}?state={}", href, state),
                current: *state == current,
            })
            .collect();

        let ts = |t: Option<i64>| {
            t.map(|t| format_timestamp(&ui.date_formats, t, now))
                .unwrap_or_default()
        };
        let rows: Vec<JobRow> = jobs
            .iter()
            .map(|job| JobRow {
                id: &job.id,
                name: job.name.as_deref().unwrap_or(""),
                created: ts(job.timestamp),
                processed: ts(job.processed_on),
                finished: ts(job.finished_on),
                attempts: job.attempts_made.unwrap_or(0),
                data: job.data.as_ref().map(|d| d.to_string()).unwrap_or_default(),
                failed_reason: job.failed_reason.as_deref().unwrap_or(""),
            })
            .collect();

        let mut context = self.page(ui, home_page, logout_page);
        context.insert("queue_name", queue_name);
        context.insert("states", &links);
        context.insert("current", &current.to_string());
        context.insert("jobs", &rows);
        Ok(self.tera.render("queue.html", &context)?)
    }

    /// Renders the login form, posting back to `action`.
    pub fn login(&self, ui: &UiConfig, action: &str, failed: bool) -> BoardResult<String> {
        let mut context = self.page(ui, action, None);
        context.insert("action", &encode_path(action));
        context.insert("failed", &failed);
        Ok(self.tera.render("login.html", &context)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::models::queue::{JobCounts, QueueKind};

    fn ui() -> UiConfig {
        Config::from_lookup(|_| None).unwrap().ui
    }

    fn views() -> Views {
        Views::new().unwrap()
    }

    fn summary(name: &str) -> QueueSummary {
        QueueSummary { name: name.to_owned(), kind: QueueKind::Bull, counts: Some(JobCounts::new()), error: None }
    }

    #[test]
    fn paths_are_percent_encoded() {
        assert_eq!(encode_path("/"), "/");
        assert_eq!(encode_path("/bull/board"), "/bull/board");
        assert_eq!(encode_path("/my board"), "/my%20board");
        assert_eq!(queue_href("/", "mail"), "/queues/mail");
        assert_eq!(queue_href("/bull/", "a#b?c"), "/bull/queues/a%23b%3Fc");
        assert_eq!(queue_href("/", "reports/daily"), "/queues/reports%2Fdaily");
    }

    #[test]
    fn timestamp_formats() {
        let formats = ui().date_formats;
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();

        let today = Utc.with_ymd_and_hms(2024, 6, 15, 8, 30, 5).unwrap().timestamp_millis();
        assert_eq!(format_timestamp(&formats, today, now), "08:30:05");

        let this_year = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap().timestamp_millis();
        assert_eq!(format_timestamp(&formats, this_year, now), "Feb 03, 04:05:06");

        let older = Utc.with_ymd_and_hms(2021, 2, 3, 4, 5, 6).unwrap().timestamp_millis();
        assert_eq!(format_timestamp(&formats, older, now), "2021 Feb 03, 04:05:06");
    }

    #[test]
    fn dashboard_lists_queues() {
        let mut counts = JobCounts::new();
        counts.insert(JobState::Waiting, 3);
        counts.insert(JobState::Failed, 1);
        let queues = vec![
            QueueSummary { name: "mail".to_owned(), kind: QueueKind::Bull, counts: Some(counts), error: None },
            QueueSummary {
                name: "<video>".to_owned(),
                kind: QueueKind::Bull,
                counts: None,
                error: Some("refused".to_owned()),
            },
        ];
        let html = views().dashboard(&ui(), "/bull", Some("/bull/logout"), &queues, Utc::now()).unwrap();
        assert!(html.contains("<a href=\"/bull/queues/mail\">mail</a>"));
        assert!(html.contains("waiting: 3, failed: 1"));
        assert!(html.contains("<a href=\"/bull/queues/%3Cvideo%3E\">&lt;video&gt;</a>"));
        assert!(!html.contains("<video>"));
        assert!(html.contains("unavailable: refused"));
        assert!(html.contains("href=\"/bull/logout\""));
    }

    #[test]
    fn queue_names_are_encoded_in_links() {
        let queues = vec![summary("a#b?c"), summary("x\" onclick=\"y")];
        let html = views().dashboard(&ui(), "/", None, &queues, Utc::now()).unwrap();
        assert!(html.contains("<a href=\"/queues/a%23b%3Fc\">a#b?c</a>"));
        assert!(html.contains("href=\"/queues/x%22%20onclick%3D%22y\""));
        assert!(!html.contains("\" onclick=\""));

        let states = [JobState::Active, JobState::Failed];
        let html = views()
            .queue(&ui(), "/", None, "a#b?c", &states, JobState::Failed, &[], Utc::now())
            .unwrap();
        assert!(html.contains("<a href=\"/queues/a%23b%3Fc?state=active\">active</a>"));
    }

    #[test]
    fn dashboard_root_links() {
        let queues = vec![QueueSummary { name: "mail".to_owned(), kind: QueueKind::BullMq, counts: None, error: None }];
        let html = views().dashboard(&ui(), "/", None, &queues, Utc::now()).unwrap();
        assert!(html.contains("<a href=\"/queues/mail\">mail</a>"));
        assert!(html.contains("<span class=\"error\">unavailable</span>"));
        assert!(!html.contains("Log out"));
    }

    #[test]
    fn empty_dashboard() {
        let html = views().dashboard(&ui(), "/", None, &[], Utc::now()).unwrap();
        assert!(html.contains("No queues found."));
        assert!(html.contains("<title>Bull</title>"));
    }

    #[test]
    fn branding() {
        let mut ui = ui();
        ui.title = "Jobs & Co".to_owned();
        ui.logo_path = Some("/logo.png".to_owned());
        ui.logo_width = Some("40".to_owned());
        ui.favicon = Some("/favicon.ico".to_owned());
        ui.locale = "fr-FR".to_owned();
        let html = views().dashboard(&ui, "/", None, &[], Utc::now()).unwrap();
        assert!(html.contains("<html lang=\"fr-FR\">"));
        assert!(html.contains("<title>Jobs &amp; Co</title>"));
        assert!(html.contains("<img src=\""));
        assert!(html.contains("logo.png\" alt=\"\" width=\"40\">"));
        assert!(!html.contains("height="));
        assert!(html.contains("<link rel=\"icon\" href=\""));
        assert!(html.contains("favicon.ico\">"));
        assert!(!html.contains("alternate icon"));
    }

    #[test]
    fn queue_page() {
        let jobs = vec![JobSummary {
            id: "9".to_owned(),
            name: Some("resize".to_owned()),
            data: Some(serde_json::json!({"html": "<b>"})),
            attempts_made: Some(2),
            failed_reason: Some("out of <memory>".to_owned()),
            ..Default::default()
        }];
        let states = [JobState::Active, JobState::Failed];
        let html = views()
            .queue(&ui(), "/", None, "images", &states, JobState::Failed, &jobs, Utc::now())
            .unwrap();
        assert!(html.contains("<title>images - Bull</title>"));
        assert!(html.contains("<strong>failed</strong>"));
        assert!(html.contains("<a href=\"/queues/images?state=active\">active</a>"));
        assert!(html.contains("out of &lt;memory&gt;"));
        assert!(html.contains("<td>resize</td>"));
        assert!(html.contains("<td>2</td>"));
        assert!(html.contains("&lt;b&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn queue_page_without_jobs() {
        let html = views()
            .queue(&ui(), "/", None, "images", &[JobState::Waiting], JobState::Waiting, &[], Utc::now())
            .unwrap();
        assert!(html.contains("No waiting jobs."));
        assert!(!html.contains("<table>"));
    }

    #[test]
    fn login_form() {
        let html = views().login(&ui(), "/bull/login", true).unwrap();
        assert!(html.contains("action=\"/bull/login\""));
        assert!(html.contains("Invalid username or password."));
        assert!(!html.contains("Log out"));
        assert!(!views().login(&ui(), "/login", false).unwrap().contains("Invalid"));
    }
}
