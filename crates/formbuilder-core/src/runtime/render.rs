// crates/formbuilder-core/src/runtime/render.rs
// ============================================================================
// Module: Form Renderer
// Description: Generates grouped, paginated form markup from a form schema.
// Purpose: Turn page and field definitions into deterministic HTML fragments.
// Dependencies: crate::{audit, core, runtime::markup}
// ============================================================================

//! ## Overview
//! Each page becomes a `div.form-page` holding its fields in configuration
//! order. Consecutive fields that share a non-empty `group_id` are wrapped in
//! one `div.row`; a new row opens when the group changes and the open row
//! closes at the first ungrouped field or at the end of the page. Fields with
//! an unrecognized widget kind are skipped with a warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::core::schema::FieldDefinition;
use crate::core::schema::FormSchema;
use crate::core::schema::InputKind;
use crate::core::schema::PageDefinition;
use crate::runtime::markup::Element;

// ============================================================================
// SECTION: Renderer
// ============================================================================

/// Schema-driven form renderer.
#[derive(Clone)]
pub struct FormRenderer {
    /// Sink for skipped-field warnings.
    audit: Arc<dyn AuditSink>,
}

impl FormRenderer {
    /// Creates a renderer reporting to `audit`.
    #[must_use]
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            audit,
        }
    }

    /// Renders every page of `schema` as one markup fragment.
    #[must_use]
    pub fn render(&self, schema: &FormSchema) -> String {
        self.render_pages(schema).iter().map(Element::to_pretty_string).collect()
    }

    /// Renders every page as an element tree.
    #[must_use]
    pub fn render_pages(&self, schema: &FormSchema) -> Vec<Element> {
        schema.pages().iter().map(|page| self.render_page(schema, page)).collect()
    }

    /// Renders a single page.
    fn render_page(&self, schema: &FormSchema, page: &PageDefinition) -> Element {
        let mut container = Element::new("div")
            .attr("class", "form-page")
            .attr("id", format!("page{}", page.page_number))
            .child(
                Element::new("h4")
                    .attr("class", "mt-4")
                    .attr("aria-level", "2")
                    .text(page.title.as_str()),
            )
            .child(Element::new("p").attr("class", "text-muted").text(page.description.as_str()));

        let mut open_row: Option<(String, Element)> = None;
        for field in schema.fields_on_page(page.page_number) {
            let group = field
                .group_id
                .as_deref()
                .map(str::trim)
                .filter(|group| !group.is_empty())
                .map(str::to_string);
            let Some(control) = self.render_field(field, group.is_some()) else {
                continue;
            };
            match group {
                Some(group) => {
                    let same_group = open_row.as_ref().is_some_and(|(open, _)| *open == group);
                    if !same_group {
                        if let Some((_, row)) = open_row.take() {
                            container.push(row);
                        }
                        open_row = Some((group, Element::new("div").attr("class", "row")));
                    }
                    if let Some((_, row)) = open_row.as_mut() {
                        row.push(control);
                    }
                }
                None => {
                    if let Some((_, row)) = open_row.take() {
                        container.push(row);
                    }
                    container.push(control);
                }
            }
        }
        if let Some((_, row)) = open_row.take() {
            container.push(row);
        }
        container
    }

    /// Renders the wrapper, label, and control for one field.
    fn render_field(&self, field: &FieldDefinition, grouped: bool) -> Option<Element> {
        let name = field.backend_name.as_str();
        let control = match &field.input_kind {
            InputKind::TextInput => Element::new("input")
                .attr("type", "text")
                .attr("class", "form-control")
                .attr("id", name)
                .attr("name", name)
                .flag_if("required", field.required),
            InputKind::Select => field.select_options.iter().fold(
                Element::new("select")
                    .attr("class", "form-select")
                    .attr("id", name)
                    .attr("name", name)
                    .flag_if("required", field.required),
                |select, option| {
                    select.child(Element::new("option").attr("value", option.as_str()).text(option.as_str()))
                },
            ),
            InputKind::Paragraph => Element::new("textarea")
                .attr("class", "form-control")
                .attr("id", name)
                .attr("name", name)
                .attr("rows", "3")
                .flag_if("required", field.required),
            InputKind::Other(kind) => {
                self.audit.record(
                    &AuditEvent::warn("render_field_skipped", "unknown field type")
                        .with_field("field", name)
                        .with_field("field_type", kind),
                );
                return None;
            }
        };
        let wrapper_class = if grouped { "col-md-6 mb-3" } else { "mb-3" };
        let label_class = if field.required { "form-label required-field" } else { "form-label" };
        Some(
            Element::new("div")
                .attr("class", wrapper_class)
                .child(
                    Element::new("label")
                        .attr("for", name)
                        .attr("class", label_class)
                        .text(field.label.as_str()),
                )
                .child(control),
        )
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions on known inputs.")]

    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::core::schema::DataType;

    fn field(name: &str, group: Option<&str>, kind: InputKind) -> FieldDefinition {
        FieldDefinition {
            backend_name: name.to_string(),
            label: name.to_uppercase(),
            page_number: 1,
            group_id: group.map(str::to_string),
            input_kind: kind,
            data_type: DataType::String,
            required: false,
            select_options: Vec::new(),
        }
    }

    fn schema(fields: Vec<FieldDefinition>) -> FormSchema {
        FormSchema::new(
            vec![PageDefinition {
                page_number: 1,
                title: "About you".to_string(),
                description: "Basics".to_string(),
            }],
            fields,
        )
        .unwrap()
    }

    fn renderer() -> (FormRenderer, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        (FormRenderer::new(sink.clone()), sink)
    }

    #[test]
    fn grouped_fields_share_a_row_until_ungrouped_field() {
        let (renderer, _) = renderer();
        let markup = renderer.render(&schema(vec![
            field("a", Some("g1"), InputKind::TextInput),
            field("b", Some("g1"), InputKind::TextInput),
            field("c", None, InputKind::TextInput),
            field("d", Some("g2"), InputKind::TextInput),
        ]));
        assert_eq!(markup.matches("<div class=\"row\">").count(), 2);
        let row_start = markup.find("<div class=\"row\">").unwrap();
        let c_pos = markup.find("id=\"c\"").unwrap();
        let b_pos = markup.find("id=\"b\"").unwrap();
        assert!(row_start < b_pos && b_pos < c_pos);
        assert_eq!(markup.matches("col-md-6 mb-3").count(), 3);
    }

    #[test]
    fn group_change_opens_new_row() {
        let (renderer, _) = renderer();
        let markup = renderer.render(&schema(vec![
            field("a", Some("g1"), InputKind::TextInput),
            field("b", Some("g2"), InputKind::TextInput),
        ]));
        assert_eq!(markup.matches("<div class=\"row\">").count(), 2);
    }

    #[test]
    fn unknown_kind_is_skipped_with_warning() {
        let (renderer, sink) = renderer();
        let markup = renderer.render(&schema(vec![
            field("a", None, InputKind::Other("slider".to_string())),
            field("b", None, InputKind::TextInput),
        ]));
        assert!(!markup.contains("id=\"a\""));
        assert!(markup.contains("id=\"b\""));
        assert_eq!(sink.event_names(), vec!["render_field_skipped"]);
    }

    #[test]
    fn select_options_round_trip_as_literal_text() {
        let (renderer, _) = renderer();
        let mut select = field("choice", None, InputKind::Select);
        select.select_options = vec!["A".to_string(), "B & C".to_string()];
        select.required = true;
        let markup = renderer.render(&schema(vec![select]));
        assert!(markup.contains("<option value=\"A\">\n    A\n   </option>"));
        assert!(markup.contains("<option value=\"B &amp; C\">"));
        assert!(markup.contains("class=\"form-label required-field\""));
        assert!(markup.contains("name=\"choice\" required>"));
    }

    #[test]
    fn page_heading_and_description_are_rendered() {
        let (renderer, _) = renderer();
        let markup = renderer.render(&schema(vec![]));
        assert!(markup.starts_with("<div class=\"form-page\" id=\"page1\">\n"));
        assert!(markup.contains("<h4 class=\"mt-4\" aria-level=\"2\">\n  About you\n </h4>"));
        assert!(markup.contains("<p class=\"text-muted\">\n  Basics\n </p>"));
    }
}
