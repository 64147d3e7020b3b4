use super::{format_cited, search_and_cite, ToolArgs, ToolKind, ToolServices};
use crate::agent::context::ConversationContext;
use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MapQueryType {
    FindRoom,
    Route,
    BuildingInfo,
    Facilities,
    Nearest,
}

impl MapQueryType {
    fn phrase(self) -> &'static str {
        match self {
            MapQueryType::FindRoom => "location of room",
            MapQueryType::Route => "route",
            MapQueryType::BuildingInfo => "building information",
            MapQueryType::Facilities => "campus facilities",
            MapQueryType::Nearest => "nearest",
        }
    }
}

/// Tool for navigation and location queries within the university campus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MapTool {
    /// Type of navigation query: 'find_room', 'route', 'building_info', 'facilities' or 'nearest'
    pub query_type: MapQueryType,
    /// Starting point (for route queries)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_from: Option<String>,
    /// Destination (room number, building name, or facility)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_to: Option<String>,
    /// Type of facility to find: 'cafeteria', 'library', 'restroom', 'parking', etc.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_type: Option<String>,
    /// Specific building name or code (e.g. 'A', 'B', 'Main')
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
}

impl ToolArgs for MapTool {
    const KIND: ToolKind = ToolKind::MapTool;

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl MapTool {
    /// Knowledge-base query describing the navigation request
    pub fn search_query(&self) -> String {
        let mut parts = vec![format!("campus navigation: {}", self.query_type.phrase())];
        if let Some(facility) = &self.facility_type {
            parts.push(facility.clone());
        }
        if let Some(from) = &self.location_from {
            parts.push(format!("from {}", from));
        }
        if let Some(to) = &self.location_to {
            parts.push(format!("to {}", to));
        }
        if let Some(building) = &self.building {
            parts.push(format!("building {}", building));
        }
        parts.join(" ")
    }

    pub(crate) async fn execute(&self, ctx: &mut ConversationContext, services: &ToolServices) -> Result<String> {
        let Some(knowledge) = services.knowledge.as_ref() else {
            return Ok("Campus navigation data is unavailable right now.".to_string());
        };

        let query = self.search_query();
        let cited = search_and_cite(ctx, knowledge.as_ref(), &query, services.top_k).await?;
        if cited.is_empty() {
            return Ok(format!("No navigation information found for: {}", query));
        }

        Ok(format!("Navigation information for: {}\n\n{}", query, format_cited(&cited)))
    }
}
