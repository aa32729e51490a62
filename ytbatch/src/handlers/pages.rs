use askama::Template;
use axum::{extract::State, response::Html};

use crate::error::AppError;
use crate::models::QualityMode;
use crate::state::AppState;

pub struct QualityChoice {
    pub label: &'static str,
    pub selected: bool
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    qualities: Vec<QualityChoice>,
    trigger_enabled: bool
}

fn quality_choices() -> Vec<QualityChoice> {
    QualityMode::ALL
        .into_iter()
        .map(|mode| QualityChoice {
            label: mode.label(),
            selected: mode == QualityMode::default()
        })
        .collect()
}

pub async fn index_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let template = IndexTemplate {
        qualities: quality_choices(),
        trigger_enabled: state.presentation.view().trigger_enabled
    };
    Ok(Html(template.render()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_quality_is_preselected() {
        let choices = quality_choices();
        let selected: Vec<_> = choices.iter().filter(|c| c.selected).map(|c| c.label).collect();
        assert_eq!(selected, vec!["Default quality"]);
        assert_eq!(choices.len(), 4);
    }

    #[test]
    fn test_index_renders_controls() {
        let html = IndexTemplate {
            qualities: quality_choices(),
            trigger_enabled: false
        }
        .render()
        .unwrap();
        assert!(html.contains("Input: (separate with spaces)"));
        assert!(html.contains(r#"<option value="Video Only">Video Only</option>"#));
        assert!(html.contains(r#"<option value="Default quality" selected>Default quality</option>"#));
        assert!(html.contains(r#"id="download-button" disabled"#));
    }
}
