use crate::error::{with_timeout, AppError, Result};
use crate::models::{Parameter, Sample};
use crate::server::AppState;
use crate::services::alert_evaluator::percent_change;
use crate::services::local_now;
use axum::{extract::State, response::Html};
use std::fmt::Write as _;
use tracing::instrument;

/// Samples shown on the settings page
const SETTINGS_SAMPLE_LIMIT: i64 = 50;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 2rem auto; max-width: 960px; color: #222; }
nav a { margin-right: 1rem; }
table { border-collapse: collapse; width: 100%; margin-bottom: 2rem; }
th, td { padding: 0.4rem 0.6rem; border-bottom: 1px solid #ddd; text-align: left; }
.card { display: inline-block; min-width: 200px; padding: 1rem 1.5rem; margin: 0 1rem 1rem 0; border: 1px solid #ddd; border-radius: 8px; }
.price { font-size: 1.8rem; font-weight: 600; }
.up { color: #15803d; }
.down { color: #b91c1c; }
.muted { color: #777; font-size: 0.85rem; }
"#;

const SETTINGS_SCRIPT: &str = r#"
async function saveParameter(form) {
  const name = form.dataset.name;
  const value = form.querySelector('input').value;
  const res = await fetch('/api/parameters/' + encodeURIComponent(name), {
    method: 'PUT',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify({ value }),
  });
  const body = await res.json();
  alert(res.ok ? 'Saved ' + name + ' = ' + body.value : body.error);
  return false;
}
async function deleteSample(id) {
  if (!confirm('Delete sample ' + id + '?')) return;
  const res = await fetch('/api/samples/' + id, { method: 'DELETE' });
  if (res.ok) { location.reload(); } else { alert((await res.json()).error); }
}
"#;

/// One indicator card on the dashboard
#[derive(Debug, Clone)]
pub struct DashboardCard {
    pub name: String,
    pub latest: Option<Sample>,
    pub previous_close: Option<f64>,
}

impl DashboardCard {
    pub fn change(&self) -> Option<f64> {
        percent_change(self.latest.as_ref()?.value, self.previous_close?)
    }
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn page(title: &str, content: &str, script: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n<script>{script}</script>\n</head>\n<body>\n\
         <nav><a href=\"/dashboard\">Dashboard</a><a href=\"/settings\">Settings</a></nav>\n\
         <h1>{title}</h1>\n{content}\n</body>\n</html>\n",
        title = escape_html(title),
    )
}

async fn dashboard_cards(app_state: &AppState) -> Result<Vec<DashboardCard>> {
    let today = local_now(app_state.timezone).date_naive();
    let yesterday = today.pred_opt();
    let timeout = app_state.call_timeout;

    let mut cards = Vec::new();
    for indicator in app_state.evaluator.indicators() {
        let kind = indicator.indicator_type.as_str();
        let latest = with_timeout("read latest sample", timeout, app_state.series.latest(kind)).await?;
        let previous_close = match yesterday {
            Some(day) => with_timeout("read previous close", timeout, app_state.series.last_on_day(kind, day))
                .await?
                .map(|s| s.value),
            None => None,
        };

        cards.push(DashboardCard {
            name: indicator.display_name(),
            latest,
            previous_close,
        });
    }
    Ok(cards)
}

fn render_dashboard(cards: &[DashboardCard], app_state: &AppState) -> String {
    let mut content = String::new();

    for card in cards {
        let _ = write!(content, "<div class=\"card\"><h2>{}</h2>", escape_html(&card.name));
        match &card.latest {
            Some(sample) => {
                let updated = sample.timestamp.with_timezone(&app_state.timezone);
                let _ = write!(
                    content,
                    "<div class=\"price\">{:.2}</div><div class=\"muted\">Updated {}</div>",
                    sample.value,
                    updated.format("%Y-%m-%d %H:%M %Z")
                );
                match card.change() {
                    Some(change) => {
                        let class = if change >= 0.0 { "up" } else { "down" };
                        let _ = write!(
                            content,
                            "<div class=\"{}\">{:+.2}% vs previous close</div>",
                            class, change
                        );
                    }
                    None => content.push_str("<div class=\"muted\">No previous close</div>"),
                }
            }
            None => content.push_str("<div class=\"muted\">No data</div>"),
        }
        content.push_str("</div>\n");
    }

    if cards.is_empty() {
        content.push_str("<p class=\"muted\">No indicators are tracked.</p>");
    }

    page("Price Dashboard", &content, "")
}

/// GET /dashboard - Latest price and change per tracked indicator
#[instrument(skip(app_state))]
pub async fn dashboard_handler(State(app_state): State<AppState>) -> std::result::Result<Html<String>, AppError> {
    let cards = dashboard_cards(&app_state).await?;
    Ok(Html(render_dashboard(&cards, &app_state)))
}

fn render_settings(parameters: &[Parameter], samples: &[Sample], app_state: &AppState) -> String {
    let mut content = String::from("<h2>Parameters</h2>\n<table><tr><th>Name</th><th>Value</th></tr>\n");
    for parameter in parameters {
        let name = escape_html(&parameter.name);
        let _ = write!(
            content,
            "<tr><td>{name}</td><td><form data-name=\"{name}\" onsubmit=\"return saveParameter(this)\">\
             <input value=\"{value}\"> <button>Save</button></form></td></tr>\n",
            name = name,
            value = escape_html(&parameter.value),
        );
    }
    content.push_str("</table>\n");

    let _ = write!(
        content,
        "<h2>Recent samples</h2>\n<table><tr><th>Id</th><th>Time ({})</th><th>Type</th><th>Country</th><th>Value</th><th></th></tr>\n",
        app_state.timezone
    );
    for sample in samples {
        let _ = write!(
            content,
            "<tr><td>{id}</td><td>{time}</td><td>{kind}</td><td>{country}</td><td>{value:.2}</td>\
             <td><button onclick=\"deleteSample({id})\">Delete</button></td></tr>\n",
            id = sample.id,
            time = sample.timestamp.with_timezone(&app_state.timezone).format("%Y-%m-%d %H:%M:%S"),
            kind = escape_html(&sample.indicator_type),
            country = escape_html(&sample.indicator_country),
            value = sample.value,
        );
    }
    content.push_str("</table>\n");

    page("Settings", &content, SETTINGS_SCRIPT)
}

/// GET /settings - Parameters and recent samples
#[instrument(skip(app_state))]
pub async fn settings_handler(State(app_state): State<AppState>) -> std::result::Result<Html<String>, AppError> {
    let timeout = app_state.call_timeout;
    let parameters = with_timeout("list parameters", timeout, app_state.parameters.all_parameters()).await?;
    let samples = with_timeout("list samples", timeout, app_state.series.recent(None, SETTINGS_SAMPLE_LIMIT)).await?;

    Ok(Html(render_settings(&parameters, &samples, &app_state)))
}
