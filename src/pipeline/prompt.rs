//! Style prompt resolution.
use crate::store::StyleCatalog;

pub const DEFAULT_PROMPT: &str = "Transform this photo into a high-quality stylized portrait. \
Keep the person's facial features, expression and pose recognisable, apply a cohesive artistic \
style to the whole image, and produce clean, well-lit, professional results.";

/// Prompt for `style_id`; a missing or unreadable entry yields `DEFAULT_PROMPT`.
pub async fn resolve<C>(catalog: &C, style_id: &str) -> String
where
    C: StyleCatalog + ?Sized,
{
    match catalog.style_prompt(style_id).await {
        Ok(Some(prompt)) => prompt,
        Ok(None) => {
            tracing::info!(%style_id, "no prompt for style, using default");
            DEFAULT_PROMPT.to_string()
        }
        Err(err) => {
            tracing::warn!(%style_id, error = %err, "style lookup failed, using default prompt");
            DEFAULT_PROMPT.to_string()
        }
    }
}
