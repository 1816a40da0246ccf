//! Plain-text output for the command line

use chrono::{DateTime, Utc};
use serde_json::Value;

use kubedeck_types::{ClusterHealth, ObjectList, Operator};

/// Left-aligned columns separated by three spaces
fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_row = |cells: &mut dyn Iterator<Item = &str>| {
        let line: Vec<String> = cells
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        out.push_str(line.join("   ").trim_end());
        out.push('\n');
    };

    push_row(&mut header.iter().copied());
    for row in rows {
        push_row(&mut row.iter().map(String::as_str));
    }
    out
}

/// Short age in the style of `kubectl get`: `45s`, `12m`, `3h`, `5d`
pub fn format_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - created).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86_400),
    }
}

fn meta_str<'a>(item: &'a Value, field: &str) -> &'a str {
    item["metadata"][field].as_str().unwrap_or("")
}

/// Resource list as NAME, NAMESPACE (when listing across namespaces), AGE
pub fn resource_table(list: &ObjectList<Value>, show_namespace: bool, now: DateTime<Utc>) -> String {
    if list.items.is_empty() {
        return "No resources found.\n".to_string();
    }

    let rows: Vec<Vec<String>> = list
        .items
        .iter()
        .map(|item| {
            let age = DateTime::parse_from_rfc3339(meta_str(item, "creationTimestamp"))
                .map(|created| format_age(created.with_timezone(&Utc), now))
                .unwrap_or_else(|_| "<unknown>".to_string());

            let mut row = Vec::with_capacity(3);
            if show_namespace {
                row.push(meta_str(item, "namespace").to_string());
            }
            row.push(meta_str(item, "name").to_string());
            row.push(age);
            row
        })
        .collect();

    if show_namespace {
        table(&["NAMESPACE", "NAME", "AGE"], &rows)
    } else {
        table(&["NAME", "AGE"], &rows)
    }
}

pub fn operator_table(list: &ObjectList<Operator>) -> String {
    if list.items.is_empty() {
        return "No operators found.\n".to_string();
    }

    let rows: Vec<Vec<String>> = list
        .items
        .iter()
        .map(|op| {
            vec![
                op.name.clone(),
                op.phase.to_string(),
                op.version.clone().unwrap_or_else(|| "-".to_string()),
                op.message.clone().unwrap_or_default(),
            ]
        })
        .collect();
    table(&["NAME", "PHASE", "VERSION", "MESSAGE"], &rows)
}

pub fn health_report(health: &ClusterHealth) -> String {
    let mut out = format!(
        "Status: {}\nNodes ready: {}\n",
        health.status,
        health.node_summary()
    );

    if !health.components.is_empty() {
        let rows: Vec<Vec<String>> = health
            .components
            .iter()
            .map(|c| {
                vec![
                    c.name.clone(),
                    if c.healthy { "Healthy" } else { "Unhealthy" }.to_string(),
                    c.message.clone().unwrap_or_default(),
                ]
            })
            .collect();
        out.push('\n');
        out.push_str(&table(&["COMPONENT", "STATUS", "MESSAGE"], &rows));
    }
    out
}
