//! Class schedule lookup.
//!
//! The agent reaches schedules through the [`ScheduleSource`] trait: first resolve a loosely
//! typed target ("4236", "Petrova") to an entity known to the schedule site, then fetch that
//! entity's lessons. [`ScheduleService`] implements the trait against the university's
//! schedule pages.

pub mod fuzzy;
mod service;

pub use service::{ScheduleService, DEFAULT_BASE_URL};

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a schedule can be requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Group,
    Teacher,
    Department,
    Room,
}

impl EntityKind {
    /// `id` of the select element listing entities of this kind
    pub fn select_id(self) -> &'static str {
        match self {
            EntityKind::Group => "selGroup",
            EntityKind::Teacher => "selPrep",
            EntityKind::Department => "selChair",
            EntityKind::Room => "selRoom",
        }
    }

    /// Query parameter (and select `name`) identifying an entity of this kind
    pub fn param(self) -> &'static str {
        match self {
            EntityKind::Group => "gr",
            EntityKind::Teacher => "pr",
            EntityKind::Department => "ch",
            EntityKind::Room => "ad",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Group => "group",
            EntityKind::Teacher => "teacher",
            EntityKind::Department => "department",
            EntityKind::Room => "room",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An entry of one of the site's selectable lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub day: String,
    pub time: String,
    pub lesson_type: String,
    pub subject: String,
    pub room: String,
    pub teacher: String,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub kind: EntityKind,
    pub entity: ScheduleEntity,
    pub lessons: Vec<Lesson>,
    pub fetched_at: DateTime<Local>,
}

impl Schedule {
    /// Day-grouped plain text for the model
    pub fn format_for_llm(&self) -> String {
        let title = format!("Schedule for {} {}", self.kind.label(), self.entity.name);

        if self.lessons.is_empty() {
            return format!("{}: not found or empty.", title);
        }

        // Keep days in page order
        let mut days: Vec<(&str, Vec<&Lesson>)> = Vec::new();
        for lesson in &self.lessons {
            let day = match lesson.day.trim() {
                "" => "Day not specified",
                day => day,
            };
            match days.iter_mut().find(|(name, _)| *name == day) {
                Some((_, lessons)) => lessons.push(lesson),
                None => days.push((day, vec![lesson])),
            }
        }

        let mut lines = vec![title];
        for (day, lessons) in days {
            lines.push(String::new());
            lines.push(format!("{}:", day));
            for lesson in lessons {
                let mut line = format!("  {} - {}", lesson.time, lesson.subject);
                if !lesson.lesson_type.is_empty() {
                    line.push_str(&format!(" [{}]", lesson.lesson_type));
                }
                if !lesson.teacher.is_empty() {
                    line.push_str(&format!(", teacher: {}", lesson.teacher));
                }
                if !lesson.group.is_empty() {
                    line.push_str(&format!(", group {}", lesson.group));
                }
                if !lesson.room.is_empty() {
                    line.push_str(&format!(", room {}", lesson.room));
                }
                lines.push(line);
            }
        }

        lines.join("\n")
    }
}

/// Source of class schedules
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Resolve a loosely written name to a known entity, if any matches
    async fn find(&self, kind: EntityKind, query: &str) -> Result<Option<ScheduleEntity>>;

    /// Fetch the lessons of a resolved entity
    async fn schedule(&self, kind: EntityKind, entity: &ScheduleEntity) -> Result<Schedule>;
}
