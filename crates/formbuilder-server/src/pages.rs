// crates/formbuilder-server/src/pages.rs
// ============================================================================
// Module: Page Shells
// Description: Full HTML documents around rendered form and dashboard content.
// Purpose: Assemble the pages served by the HTTP routes.
// Dependencies: formbuilder-core
// ============================================================================

//! ## Overview
//! Pages are built from the same [`Element`] tree the form renderer uses, so
//! every dynamic value is escaped on output. The form page embeds three
//! hidden inputs the submission pipeline relies on: the session id, the page
//! load time, and the honeypot field with its initial value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use formbuilder_core::Element;
use formbuilder_core::FORM_LOAD_TIME_FIELD;
use formbuilder_core::HONEYPOT_FIELD;
use formbuilder_core::HONEYPOT_INITIAL_VALUE;
use formbuilder_core::SESSION_ID_FORM_FIELD;
use formbuilder_core::Table;
use formbuilder_core::Timestamp;

use crate::dashboard::DashboardView;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Shows one `.form-page` at a time and keeps the progress bar in step.
const PAGINATION_SCRIPT: &str = "(function () {
  var pages = document.querySelectorAll('.form-page');
  var prev = document.getElementById('prev-btn');
  var next = document.getElementById('next-btn');
  var submit = document.getElementById('submit-btn');
  var bar = document.getElementById('progress-bar');
  var current = 0;
  function show(index) {
    pages.forEach(function (page, i) { page.hidden = i !== index; });
    prev.hidden = index === 0;
    next.hidden = index >= pages.length - 1;
    submit.hidden = index < pages.length - 1;
    bar.style.width = ((index + 1) * 100 / Math.max(pages.length, 1)) + '%';
    bar.setAttribute('aria-valuenow', String(index + 1));
    current = index;
  }
  prev.addEventListener('click', function () { show(Math.max(current - 1, 0)); });
  next.addEventListener('click', function () { show(Math.min(current + 1, pages.length - 1)); });
  show(0);
})();";

// ============================================================================
// SECTION: Documents
// ============================================================================

/// Wraps `body` in an HTML document.
fn document(title: &str, body: Element) -> String {
    let html = Element::new("html")
        .attr("lang", "en")
        .child(
            Element::new("head")
                .child(Element::new("meta").attr("charset", "utf-8"))
                .child(
                    Element::new("meta")
                        .attr("name", "viewport")
                        .attr("content", "width=device-width, initial-scale=1"),
                )
                .child(Element::new("title").text(title)),
        )
        .child(Element::new("body").child(body));
    format!("<!DOCTYPE html>\n{}", html.to_pretty_string())
}

/// Hidden input.
fn hidden(name: &str, value: &str) -> Element {
    Element::new("input").attr("type", "hidden").attr("name", name).attr("value", value)
}

/// Renders the respondent form around pre-rendered `pages`.
#[must_use]
pub fn form_page(pages: &[Element], session_id: &str, loaded_at: &Timestamp) -> String {
    let mut form = Element::new("form")
        .attr("id", "form")
        .attr("method", "post")
        .attr("action", "/submit")
        .child(hidden(SESSION_ID_FORM_FIELD, session_id))
        .child(hidden(FORM_LOAD_TIME_FIELD, &loaded_at.to_canonical_string()))
        .child(
            Element::new("div")
                .attr("class", "visually-hidden")
                .attr("aria-hidden", "true")
                .child(
                    Element::new("input")
                        .attr("type", "text")
                        .attr("name", HONEYPOT_FIELD)
                        .attr("value", HONEYPOT_INITIAL_VALUE)
                        .attr("tabindex", "-1")
                        .attr("autocomplete", "off"),
                ),
        );
    for page in pages {
        form.push(page.clone());
    }
    form.push(
        Element::new("div")
            .attr("class", "form-navigation d-flex justify-content-between")
            .child(nav_button("prev-btn", "btn btn-secondary", "Previous"))
            .child(nav_button("next-btn", "btn btn-primary", "Next"))
            .child(
                Element::new("button")
                    .attr("type", "submit")
                    .attr("id", "submit-btn")
                    .attr("class", "btn btn-success")
                    .text("Submit"),
            ),
    );
    let body = Element::new("main")
        .attr("class", "container")
        .child(
            Element::new("p")
                .attr("class", "text-muted")
                .text("Session code: ")
                .child(Element::new("code").attr("id", "session-id").text(session_id)),
        )
        .child(progress_bar(pages.len()))
        .child(form)
        .child(Element::new("script").raw(PAGINATION_SCRIPT));
    document("Form", body)
}

/// Client-side page navigation button.
fn nav_button(id: &str, class: &str, label: &str) -> Element {
    Element::new("button").attr("type", "button").attr("id", id).attr("class", class).text(label)
}

/// Progress bar starting on the first of `page_count` pages.
fn progress_bar(page_count: usize) -> Element {
    let total = page_count.max(1);
    let percent = 100 / total;
    Element::new("div").attr("class", "progress mb-3").child(
        Element::new("div")
            .attr("id", "progress-bar")
            .attr("class", "progress-bar")
            .attr("role", "progressbar")
            .attr("style", format!("width: {percent}%"))
            .attr("aria-valuenow", "1")
            .attr("aria-valuemin", "1")
            .attr("aria-valuemax", total.to_string()),
    )
}

/// Renders the post-submission confirmation.
#[must_use]
pub fn thank_you_page(session_id: Option<&str>, message: &str) -> String {
    let mut body = Element::new("main")
        .attr("class", "container")
        .child(Element::new("h1").text("Thank you"))
        .child(Element::new("p").attr("id", "message").text(message));
    if let Some(session_id) = session_id {
        body.push(Element::new("code").attr("id", "session-id").text(session_id));
    }
    document("Thank you", body)
}

/// Renders the operator dashboard.
#[must_use]
pub fn dashboard_page(view: &DashboardView) -> String {
    let mut body = Element::new("main")
        .attr("class", "container")
        .child(Element::new("h1").text("Submissions"))
        .child(table_element("submissions", &view.submissions))
        .child(Element::new("h2").text("Submissions per day"))
        .child(table_element("per-day", &view.per_day));
    if let Some((field, table)) = &view.breakdown {
        body.push(Element::new("h2").text(format!("Breakdown by {field}")));
        body.push(table_element("breakdown", table));
    }
    document("Dashboard", body)
}

/// Renders the bulk upload page.
#[must_use]
pub fn upload_page(allowed_extensions: &[String]) -> String {
    let accept = allowed_extensions
        .iter()
        .map(|extension| format!(".{}", extension.trim_start_matches('.')))
        .collect::<Vec<_>>()
        .join(",");
    let body = Element::new("main")
        .attr("class", "container")
        .child(Element::new("h1").text("Bulk upload"))
        .child(
            Element::new("p").child(
                Element::new("a")
                    .attr("href", "/generate_data_upload_template")
                    .text("Download the upload template"),
            ),
        )
        .child(
            Element::new("form")
                .attr("method", "post")
                .attr("action", "/upload")
                .attr("enctype", "multipart/form-data")
                .child(
                    Element::new("input")
                        .attr("type", "file")
                        .attr("name", "file")
                        .attr("accept", accept)
                        .flag("required"),
                )
                .child(Element::new("button").attr("type", "submit").text("Upload")),
        );
    document("Upload", body)
}

/// Renders a table with a header row; nulls render as empty cells.
#[must_use]
pub fn table_element(id: &str, table: &Table) -> Element {
    let header = table
        .columns()
        .iter()
        .fold(Element::new("tr"), |row, column| row.child(Element::new("th").text(column.as_str())));
    let body = table.rows().iter().fold(Element::new("tbody"), |body, values| {
        let row = values.iter().fold(Element::new("tr"), |row, value| {
            if value.is_null() {
                row.child(Element::new("td"))
            } else {
                row.child(Element::new("td").text(value.to_string()))
            }
        });
        body.child(row)
    });
    Element::new("table")
        .attr("id", id)
        .attr("class", "table table-striped table-bordered")
        .child(Element::new("thead").child(header))
        .child(body)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
