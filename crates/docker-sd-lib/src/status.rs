//! Status view of the latest discovery pass
//!
//! The refresh loop publishes each completed pass to a [`StatusBoard`]; HTTP
//! handlers read the latest [`StatusView`] without blocking the writer.

use crate::models::{LabelSet, ResolvedTarget};
use html_escape::encode_text;
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;
use tokio::sync::watch;

/// Summary plus one row per container
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusView {
    pub total: usize,
    pub with_job: usize,
    /// Exported with an explicit port
    pub oks: usize,
    /// Exported, but the port was picked among several
    pub warnings: usize,
    /// Has a job label but is not exported
    pub errors: usize,
    pub items: Vec<StatusItem>,
    /// Unix timestamp of the pass, 0 before the first one
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusItem {
    pub name: String,
    pub address: String,
    /// `key="value"`, sorted
    pub labels: Vec<String>,
    pub has_job: bool,
    pub is_exported: bool,
    pub is_in_target_network: bool,
    pub has_tcp_ports: bool,
    pub has_explicit_port: bool,
    pub scrape_external: bool,
}

impl StatusView {
    /// Build the view from an ordered target list
    pub fn from_targets(targets: &[ResolvedTarget]) -> Self {
        let mut view = StatusView {
            total: targets.len(),
            items: Vec::with_capacity(targets.len()),
            updated_at: chrono::Utc::now().timestamp(),
            ..Default::default()
        };

        for target in targets {
            if target.has_job {
                view.with_job += 1;

                match (target.is_exported(), target.has_explicit_port) {
                    (true, true) => view.oks += 1,
                    (true, false) => view.warnings += 1,
                    (false, _) => view.errors += 1,
                }
            }

            view.items.push(StatusItem {
                name: target.name.clone(),
                address: target.address.clone(),
                labels: format_labels(&target.labels),
                has_job: target.has_job,
                is_exported: target.is_exported(),
                is_in_target_network: target.is_in_target_network,
                has_tcp_ports: target.has_tcp_ports,
                has_explicit_port: target.has_explicit_port,
                scrape_external: target.scrape_external,
            });
        }

        view
    }

    /// Render as a standalone HTML page
    pub fn render_html(&self) -> String {
        let mut html = String::with_capacity(4096 + self.items.len() * 512);

        html.push_str(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Docker service discovery</title>\n\
             <style>\n\
             body { font-family: sans-serif; margin: 2em; }\n\
             table { border-collapse: collapse; width: 100%; }\n\
             td, th { border: 1px solid #ccc; padding: 4px 8px; vertical-align: top; text-align: left; }\n\
             tr.ok { background: #e8f5e9; } tr.warning { background: #fff8e1; }\n\
             tr.error { background: #ffebee; } tr.ignored { color: #888; }\n\
             ul { margin: 0; padding-left: 1em; font-family: monospace; font-size: 0.85em; }\n\
             </style>\n</head>\n<body>\n<h1>Containers</h1>\n",
        );

        let _ = write!(
            html,
            "<p>Total: {} &middot; With job: {} &middot; OK: {} &middot; Warnings: {} &middot; Errors: {}</p>\n",
            self.total, self.with_job, self.oks, self.warnings, self.errors
        );

        html.push_str(
            "<table>\n<tr><th>Name</th><th>Address</th><th>Job</th><th>In network</th>\
             <th>TCP ports</th><th>Explicit port</th><th>External</th><th>Labels</th></tr>\n",
        );

        for item in &self.items {
            let _ = write!(
                html,
                "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><ul>",
                item.row_class(),
                encode_text(&item.name),
                encode_text(&item.address),
                yes_no(item.has_job),
                yes_no(item.is_in_target_network),
                yes_no(item.has_tcp_ports),
                yes_no(item.has_explicit_port),
                yes_no(item.scrape_external),
            );
            for label in &item.labels {
                let _ = write!(html, "<li>{}</li>", encode_text(label));
            }
            html.push_str("</ul></td></tr>\n");
        }

        html.push_str("</table>\n</body>\n</html>\n");
        html
    }
}

impl StatusItem {
    fn row_class(&self) -> &'static str {
        match (self.has_job, self.is_exported, self.has_explicit_port) {
            (false, _, _) => "ignored",
            (true, false, _) => "error",
            (true, true, false) => "warning",
            (true, true, true) => "ok",
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn format_labels(labels: &LabelSet) -> Vec<String> {
    // LabelSet iterates in key order, so the result is already sorted
    labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect()
}

/// Latest-value slot for the status view.
///
/// Publishing swaps in a new immutable snapshot; readers clone the `Arc` and
/// never observe a partially built view.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<Arc<StatusView>>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(StatusView::default()));
        Self { tx: Arc::new(tx) }
    }

    /// Replace the current view
    pub fn publish(&self, view: StatusView) {
        self.tx.send_replace(Arc::new(view));
    }

    /// Most recent view
    pub fn latest(&self) -> Arc<StatusView> {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<Arc<StatusView>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str, has_job: bool, exported: bool, explicit: bool) -> ResolvedTarget {
        ResolvedTarget {
            name: name.to_string(),
            address: if exported {
                format!("{}:2000", name.trim_start_matches('/'))
            } else {
                String::new()
            },
            labels: LabelSet::from([
                ("job".to_string(), "job1".to_string()),
                ("__address__".to_string(), "x".to_string()),
            ]),
            has_job,
            is_in_target_network: exported,
            has_tcp_ports: exported,
            has_explicit_port: explicit,
            scrape_external: false,
        }
    }

    #[test]
    fn test_view_counts() {
        let targets = vec![
            target("/ignored", false, false, false),
            target("/broken", true, false, false),
            target("/ambiguous", true, true, false),
            target("/ok", true, true, true),
        ];

        let view = StatusView::from_targets(&targets);

        assert_eq!(view.total, 4);
        assert_eq!(view.with_job, 3);
        assert_eq!(view.oks, 1);
        assert_eq!(view.warnings, 1);
        assert_eq!(view.errors, 1);
        assert_eq!(view.items.len(), 4);
        assert_eq!(view.items[0].name, "/ignored");
    }

    #[test]
    fn test_labels_sorted_as_pairs() {
        let view = StatusView::from_targets(&[target("/ok", true, true, true)]);
        assert_eq!(
            view.items[0].labels,
            vec!["__address__=\"x\"".to_string(), "job=\"job1\"".to_string()]
        );
    }

    #[test]
    fn test_html_escapes_values() {
        let mut t = target("/<script>", true, true, true);
        t.labels
            .insert("note".to_string(), "<b>bold</b>".to_string());
        let html = StatusView::from_targets(&[t]).render_html();

        assert!(html.contains("/&lt;script&gt;"));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("class=\"ok\""));
    }

    #[tokio::test]
    async fn test_board_latest_value() {
        let board = StatusBoard::new();
        assert_eq!(board.latest().total, 0);

        let mut rx = board.subscribe();
        board.publish(StatusView::from_targets(&[target("/a", true, true, true)]));
        board.publish(StatusView::from_targets(&[
            target("/a", true, true, true),
            target("/b", true, true, true),
        ]));

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().total, 2);
        assert_eq!(board.latest().total, 2);
    }
}
