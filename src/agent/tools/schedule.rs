use super::{check_filled, ToolArgs, ToolKind, ToolServices};
use crate::error::Result;
use crate::schedule::EntityKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleQueryType {
    Group,
    #[serde(alias = "professor")]
    Teacher,
    Department,
    Room,
    Student,
    Subject,
}

impl ScheduleQueryType {
    /// Entity kind the schedule site can look up directly
    pub fn entity_kind(self) -> Option<EntityKind> {
        match self {
            ScheduleQueryType::Group => Some(EntityKind::Group),
            ScheduleQueryType::Teacher => Some(EntityKind::Teacher),
            ScheduleQueryType::Department => Some(EntityKind::Department),
            ScheduleQueryType::Room => Some(EntityKind::Room),
            ScheduleQueryType::Student | ScheduleQueryType::Subject => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScheduleQueryType::Group => "group",
            ScheduleQueryType::Teacher => "teacher",
            ScheduleQueryType::Department => "department",
            ScheduleQueryType::Room => "room",
            ScheduleQueryType::Student => "student",
            ScheduleQueryType::Subject => "subject",
        }
    }
}

/// Tool for retrieving class schedules, including time, location, and teacher information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScheduleTool {
    /// Type of schedule query: 'group', 'teacher', 'department', 'room', 'student' or 'subject'
    pub query_type: ScheduleQueryType,
    /// Name or number of the group, teacher, department, room, student or subject
    pub target: String,
    /// Optional date range (e.g. 'today', 'tomorrow', 'this week', '2025-10-23')
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<String>,
    /// Optional additional filters (e.g. {"building": "A", "floor": "2"})
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_filters: Option<BTreeMap<String, String>>,
}

impl ToolArgs for ScheduleTool {
    const KIND: ToolKind = ToolKind::ScheduleTool;

    fn validate(&self) -> Result<()> {
        check_filled(Self::KIND, "target", &self.target)
    }
}

impl ScheduleTool {
    pub(crate) async fn execute(&self, services: &ToolServices) -> Result<String> {
        let Some(source) = services.schedule.as_ref() else {
            return Ok("Schedule lookup is unavailable right now.".to_string());
        };

        let Some(kind) = self.query_type.entity_kind() else {
            return Ok(format!(
                "Schedules cannot be looked up by {}. Ask for the student's group, a teacher, a department or a room instead.",
                self.query_type.label()
            ));
        };

        let Some(entity) = source.find(kind, &self.target).await? else {
            info!(kind = %kind, target = self.target.as_str(), "No schedule entity matched");
            return Ok(format!("No {} matching '{}' was found in the schedule.", kind, self.target));
        };

        let schedule = source.schedule(kind, &entity).await?;
        let mut text = schedule.format_for_llm();

        if let Some(range) = &self.date_range {
            text.push_str(&format!("\n\nRequested period: {}", range));
        }
        if let Some(filters) = self.additional_filters.as_ref().filter(|f| !f.is_empty()) {
            let filters = filters
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            text.push_str(&format!("\nRequested filters: {}", filters));
        }

        Ok(text)
    }
}
