use super::{check_filled, format_cited, search_and_cite, ToolArgs, ToolKind, ToolServices};
use crate::agent::context::ConversationContext;
use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Tool for general university information queries using the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneralInfoTool {
    /// User's question or information request
    pub query: String,
    /// Category of query: 'admission', 'contacts', 'departments', 'events', 'rules', 'services' or 'general'
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Key terms or concepts to search for in the knowledge base
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    /// Whether to include contextual information from the knowledge base
    #[serde(default = "default_true")]
    pub context_needed: bool,
}

impl ToolArgs for GeneralInfoTool {
    const KIND: ToolKind = ToolKind::GeneralInfoTool;

    fn validate(&self) -> Result<()> {
        check_filled(Self::KIND, "query", &self.query)
    }
}

impl GeneralInfoTool {
    pub fn search_query(&self) -> String {
        let mut query = self.query.trim().to_string();
        if let Some(keywords) = self.keywords.as_ref().filter(|k| !k.is_empty()) {
            query.push(' ');
            query.push_str(&keywords.join(" "));
        }
        query
    }

    pub(crate) async fn execute(&self, ctx: &mut ConversationContext, services: &ToolServices) -> Result<String> {
        if !self.context_needed {
            return Ok(format!(
                "Knowledge base not consulted for: {}. Answer from the conversation so far.",
                self.query
            ));
        }

        let Some(knowledge) = services.knowledge.as_ref() else {
            return Ok("The university knowledge base is unavailable right now.".to_string());
        };

        let cited = search_and_cite(ctx, knowledge.as_ref(), &self.search_query(), services.top_k).await?;
        if cited.is_empty() {
            return Ok(format!("No information found in the knowledge base for: {}", self.query));
        }

        let category = self.category.as_deref().unwrap_or("general");
        Ok(format!(
            "Knowledge base results ({}) for: {}\n\n{}",
            category,
            self.query,
            format_cited(&cited)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::test_support::StaticKnowledge;
    use serde_json::json;
    use std::sync::Arc;

    fn tool(value: serde_json::Value) -> GeneralInfoTool {
        GeneralInfoTool::parse(value).unwrap()
    }

    #[test]
    fn test_context_needed_defaults_true() {
        let t = tool(json!({"query": "How do I get a student card?"}));
        assert!(t.context_needed);
        assert_eq!(t.search_query(), "How do I get a student card?");
    }

    #[test]
    fn test_keywords_extend_query() {
        let t = tool(json!({"query": "dean office hours", "keywords": ["dean", "schedule"]}));
        assert_eq!(t.search_query(), "dean office hours dean schedule");
    }

    #[tokio::test]
    async fn test_execute_records_sources() {
        let kb = Arc::new(StaticKnowledge::new(&["Admission starts June 20.", "Documents: passport, certificate."]));
        let services = ToolServices::default().with_knowledge(kb).with_top_k(1);
        let mut ctx = ConversationContext::new("When does admission start?");

        let text = tool(json!({"query": "admission dates", "category": "admission"}))
            .execute(&mut ctx, &services)
            .await
            .unwrap();

        assert!(text.starts_with("Knowledge base results (admission) for: admission dates"));
        assert!(text.contains("[1] (relevance 0.90) Admission starts June 20."));
        assert_eq!(ctx.sources().len(), 1);
        assert_eq!(ctx.sources()[0].full_content, "Admission starts June 20.");
    }

    #[tokio::test]
    async fn test_empty_results_are_not_an_error() {
        let services = ToolServices::default().with_knowledge(Arc::new(StaticKnowledge::new(&[])));
        let mut ctx = ConversationContext::new("task");

        let text = tool(json!({"query": "quidditch club"})).execute(&mut ctx, &services).await.unwrap();
        assert_eq!(text, "No information found in the knowledge base for: quidditch club");
    }

    #[test]
    fn test_empty_query_rejected() {
        assert!(GeneralInfoTool::parse(json!({"query": ""})).is_err());
    }
}
