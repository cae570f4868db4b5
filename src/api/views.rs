// 服务端渲染的两个页面：访问日志首页与负载控制页。
use crate::storage::{AccessLogRecord, LoadStatusRecord};
use chrono::NaiveDateTime;
use std::fmt::Write;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct IndexView<'a> {
    pub hostname: &'a str,
    pub db_connected: bool,
    pub logs: &'a [AccessLogRecord],
}

pub struct LoadControlView<'a> {
    pub hostname: &'a str,
    pub db_connected: bool,
    pub load_active: bool,
    pub statuses: &'a [LoadStatusRecord],
}

pub fn render_index(view: &IndexView<'_>) -> String {
    let mut body = String::new();
    let _ = write!(
        body,
        "<h1>Visit log</h1>\n<p>Served by <strong>{}</strong></p>\n{}\n",
        escape_html(view.hostname),
        db_badge(view.db_connected)
    );
    if !view.db_connected {
        body.push_str("<p>Access logging is disabled.</p>\n");
    } else if view.logs.is_empty() {
        body.push_str("<p>No visits recorded.</p>\n");
    } else {
        body.push_str("<table>\n<tr><th>ID</th><th>Hostname</th><th>Access time</th></tr>\n");
        for log in view.logs {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                log.id,
                escape_html(&log.hostname),
                format_time(log.access_time.as_ref())
            );
        }
        body.push_str("</table>\n");
    }
    body.push_str("<p><a href=\"/load-control\">Load control</a></p>\n");
    layout("Visit log", &body)
}

pub fn render_load_control(view: &LoadControlView<'_>) -> String {
    let mut body = String::new();
    let _ = write!(
        body,
        "<h1>Load control</h1>\n<p>Host <strong>{}</strong></p>\n{}\n",
        escape_html(view.hostname),
        db_badge(view.db_connected)
    );
    let (state_class, state_label) = if view.load_active {
        ("active", "ACTIVE")
    } else {
        ("idle", "IDLE")
    };
    let _ = writeln!(
        body,
        "<p>Local load: <span class=\"load-{state_class}\">{state_label}</span></p>"
    );
    body.push_str(
        "<form method=\"post\" action=\"/load\"><button type=\"submit\">Start load</button></form>\n\
         <form method=\"post\" action=\"/stop\"><button type=\"submit\">Stop load</button></form>\n",
    );
    if !view.db_connected {
        body.push_str("<p>Load status history is unavailable without a database.</p>\n");
    } else if view.statuses.is_empty() {
        body.push_str("<p>No load status recorded.</p>\n");
    } else {
        body.push_str("<table>\n<tr><th>Hostname</th><th>Status</th><th>Updated at</th></tr>\n");
        for record in view.statuses {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&record.hostname),
                record.status,
                format_time(Some(&record.updated_at))
            );
        }
        body.push_str("</table>\n");
    }
    body.push_str("<p><a href=\"/\">Visit log</a></p>\n");
    layout("Load control", &body)
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        body
    )
}

fn db_badge(connected: bool) -> &'static str {
    if connected {
        "<p class=\"db db-connected\">DB: connected</p>"
    } else {
        "<p class=\"db db-disconnected\">DB: not connected</p>"
    }
}

fn format_time(value: Option<&NaiveDateTime>) -> String {
    value
        .map(|time| time.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn escape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            other => output.push(other),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LoadStatus;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .expect("valid timestamp")
    }

    #[test]
    fn escape_html_handles_markup() {
        assert_eq!(
            escape_html("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn index_lists_logs_and_escapes_hostname() {
        let logs = vec![AccessLogRecord {
            id: 7,
            hostname: "<web>".to_string(),
            access_time: Some(at(9)),
        }];
        let html = render_index(&IndexView {
            hostname: "<web>",
            db_connected: true,
            logs: &logs,
        });
        assert!(html.contains("&lt;web&gt;"));
        assert!(!html.contains("<web>"));
        assert!(html.contains("<td>7</td>"));
        assert!(html.contains("2024-05-01 09:00:00"));
        assert!(html.contains("DB: connected"));
    }

    #[test]
    fn index_without_database_says_so() {
        let html = render_index(&IndexView {
            hostname: "web",
            db_connected: false,
            logs: &[],
        });
        assert!(html.contains("DB: not connected"));
        assert!(!html.contains("<table>"));
    }

    #[test]
    fn load_control_shows_flag_forms_and_statuses() {
        let statuses = vec![LoadStatusRecord {
            hostname: "web".to_string(),
            status: LoadStatus::Running,
            updated_at: at(10),
        }];
        let html = render_load_control(&LoadControlView {
            hostname: "web",
            db_connected: true,
            load_active: true,
            statuses: &statuses,
        });
        assert!(html.contains("action=\"/load\""));
        assert!(html.contains("action=\"/stop\""));
        assert!(html.contains("load-active"));
        assert!(html.contains("<td>RUNNING</td>"));
        assert!(html.contains("2024-05-01 10:00:00"));
    }
}
