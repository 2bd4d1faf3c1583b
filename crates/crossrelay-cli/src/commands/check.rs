use anyhow::Result;
use serde::Serialize;

use crossrelay_core::{RelayConfig, RouteTable};
use crossrelay_traits::{ChatId, Destination, ThreadId, UserId};

use crate::output::OutputFormat;
use crate::output::json::print_json;
use crate::output::table::{new_table, print_table};

#[derive(Debug, Serialize)]
struct EdgeRow {
    kind: &'static str,
    source_chat: ChatId,
    source_thread: ThreadId,
    dest_chat: ChatId,
    dest_thread: ThreadId,
    sender: Option<UserId>,
    translate: bool,
}

impl EdgeRow {
    fn new(
        kind: &'static str,
        source: (ChatId, ThreadId),
        dest: Destination,
        sender: Option<UserId>,
        translate: bool,
    ) -> Self {
        Self {
            kind,
            source_chat: source.0,
            source_thread: source.1,
            dest_chat: dest.chat,
            dest_thread: dest.thread,
            sender,
            translate,
        }
    }
}

fn edge_rows(table: &RouteTable) -> Vec<EdgeRow> {
    let primary = table.sorted_routes().into_iter().map(|route| {
        EdgeRow::new(
            "route",
            route.source,
            route.dest,
            route.sender_restriction,
            table.edge_translates(route.source, route.dest, route.translate_override),
        )
    });
    let fanout = table.sorted_fanout().into_iter().map(|(source, dest)| {
        EdgeRow::new(
            "fanout",
            source,
            dest,
            None,
            table.edge_translates(source, dest, None),
        )
    });
    primary.chain(fanout).collect()
}

/// Build the route graph exactly as `run` would and print it.
pub fn run(config: &RelayConfig, format: OutputFormat) -> Result<()> {
    config.validate()?;
    let table = RouteTable::from_config(config)?;
    let rows = edge_rows(&table);

    if format.is_json() {
        return print_json(&rows);
    }

    let mut output = new_table(&["Kind", "Source", "Destination", "Sender", "Translate"]);
    for row in &rows {
        output.add_row(vec![
            row.kind.to_string(),
            format!("{}:{}", row.source_chat, row.source_thread),
            format!("{}:{}", row.dest_chat, row.dest_thread),
            row.sender.map_or_else(|| "any".to_string(), |id| id.to_string()),
            (if row.translate { "yes" } else { "no" }).to_string(),
        ]);
    }
    print_table(output)?;
    println!(
        "{} route(s), {} fan-out edge(s), translation {}",
        table.route_count(),
        table.fanout_count(),
        if table.translation_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );
    Ok(())
}
