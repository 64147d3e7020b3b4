use super::fuzzy::best_match;
use super::{EntityKind, Lesson, Schedule, ScheduleEntity, ScheduleSource};
use crate::error::{CampusAgentError, Result};
use async_trait::async_trait;
use chrono::Local;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://guap.ru/rasp";
const TIMEOUT_SECONDS: u64 = 30;

/// Schedule lookup backed by the university's public schedule pages
#[derive(Clone)]
pub struct ScheduleService {
    client: reqwest::Client,
    base_url: String,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CampusAgentError::ParseError(format!("Invalid selector {}: {:?}", css, e)))
}

fn has_class(element: &ElementRef, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn clean_text(element: &ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ScheduleService {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECONDS))
            .build()?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_page(&self, params: &[(&str, &str)]) -> Result<String> {
        let response = self.client.get(&self.base_url).query(params).send().await?;

        if !response.status().is_success() {
            return Err(CampusAgentError::ApiError(format!(
                "Schedule page request failed with status {}",
                response.status()
            )));
        }

        Ok(response.text().await?)
    }

    /// Entities listed in the select element for `kind`
    pub async fn options(&self, kind: EntityKind) -> Result<Vec<ScheduleEntity>> {
        let html = self.fetch_page(&[]).await?;
        Self::parse_options(&html, kind)
    }

    fn parse_options(html: &str, kind: EntityKind) -> Result<Vec<ScheduleEntity>> {
        let document = Html::parse_document(html);
        let by_id = selector(&format!("select#{} option", kind.select_id()))?;
        let by_name = selector(&format!("select[name='{}'] option", kind.param()))?;

        let mut options: Vec<ElementRef> = document.select(&by_id).collect();
        if options.is_empty() {
            options = document.select(&by_name).collect();
        }
        if options.is_empty() {
            warn!(select_id = kind.select_id(), "Select not found on schedule page");
        }

        Ok(options
            .into_iter()
            .filter_map(|option| {
                let id = option.value().attr("value").unwrap_or_default().trim().to_string();
                let name = clean_text(&option);
                (!id.is_empty() && id != "0" && !name.is_empty()).then_some(ScheduleEntity { id, name })
            })
            .collect())
    }

    /// Lessons from a schedule page: day headers followed by time blocks and lesson blocks
    fn parse_schedule(html: &str) -> Result<Vec<Lesson>> {
        let document = Html::parse_document(html);
        let day_selector = selector("h4.text-danger")?;

        let Some(first_day) = document.select(&day_selector).next() else {
            warn!("No day headers found in schedule page");
            return Ok(Vec::new());
        };
        let Some(container) = first_day.parent().and_then(ElementRef::wrap) else {
            return Ok(Vec::new());
        };

        let mut lessons = Vec::new();
        let mut day: Option<String> = None;
        let mut time = String::new();

        for element in container.children().filter_map(ElementRef::wrap) {
            let name = element.value().name();
            if name == "h4" && has_class(&element, "text-danger") {
                day = Some(clean_text(&element));
                time.clear();
            } else if day.is_none() || name != "div" {
                continue;
            } else if has_class(&element, "text-danger") {
                time = clean_text(&element);
            } else if has_class(&element, "mb-3") {
                lessons.push(Self::parse_lesson(&element, day.as_deref().unwrap_or_default(), &time)?);
            }
        }

        debug!(lessons = lessons.len(), "Parsed schedule page");
        Ok(lessons)
    }

    fn parse_lesson(block: &ElementRef, day: &str, time: &str) -> Result<Lesson> {
        let first_text = |css: &str| -> Result<String> {
            let sel = selector(css)?;
            Ok(block.select(&sel).next().map(|e| clean_text(&e)).unwrap_or_default())
        };

        Ok(Lesson {
            day: day.to_string(),
            time: time.to_string(),
            lesson_type: first_text("div.fs-6")?,
            subject: first_text("div.lead")?,
            room: first_text("div.opacity-75 a[href*='ad=']")?,
            teacher: first_text("div.opacity-75 a[href*='pr=']")?,
            group: first_text("div.opacity-75 a[href*='gr=']")?,
        })
    }
}

#[async_trait]
impl ScheduleSource for ScheduleService {
    async fn find(&self, kind: EntityKind, query: &str) -> Result<Option<ScheduleEntity>> {
        info!(kind = %kind, query, "Searching schedule entity");
        let options = self.options(kind).await?;

        Ok(best_match(query, &options).map(|(entity, score)| {
            info!(kind = %kind, name = entity.name.as_str(), score, "Matched schedule entity");
            entity.clone()
        }))
    }

    async fn schedule(&self, kind: EntityKind, entity: &ScheduleEntity) -> Result<Schedule> {
        info!(kind = %kind, name = entity.name.as_str(), "Fetching schedule");
        let html = self.fetch_page(&[(kind.param(), entity.id.as_str())]).await?;

        Ok(Schedule {
            kind,
            entity: entity.clone(),
            lessons: Self::parse_schedule(&html)?,
            fetched_at: Local::now(),
        })
    }
}
