use std::collections::HashMap;
use std::fmt::Write;
use std::io::IsTerminal;

use anstyle::{AnsiColor, Style};
use tokio::sync::mpsc;

use argot::Project;
use argot::commands::registry::UnitId;
use argot::plan::PlanItem;
use argot::plan::validation::NodeId;
use argot::runner::{RunError, UnitEvent};

const PRIMARY_COLOR: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Magenta)));
const SUCCESS_COLOR: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Green)));
const ERROR_COLOR: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Red)));
const DIM: Style = Style::new().dimmed();

fn paint(style: Style, text: &str) -> String {
    if std::io::stderr().is_terminal() {
        format!("{style}{text}{style:#}")
    } else {
        text.to_string()
    }
}

fn arrow() -> String {
    paint(PRIMARY_COLOR, "❱")
}

#[must_use]
pub fn format_event(event: UnitEvent, name: &str) -> String {
    match event {
        UnitEvent::Start(_) => format!("{} {name}", arrow()),
        UnitEvent::Skipped(_) => format!("{} {name} {}", arrow(), paint(DIM, "skipped")),
        UnitEvent::Stop(_) => format!("{} {name} {}", arrow(), paint(SUCCESS_COLOR, "✓")),
    }
}

#[must_use]
pub fn format_failure(error: &RunError) -> String {
    format!("{} {} {error}", arrow(), paint(ERROR_COLOR, "✘"))
}

#[must_use]
pub fn format_diagnostic(item: &PlanItem) -> String {
    let mut out = String::new();
    let at = if item.path.is_empty() {
        String::new()
    } else {
        format!(" in '{}'", item.path.join(" "))
    };
    if let Some(command) = &item.unknown_command {
        let _ = write!(out, "{} unknown command '{command}'{at}", paint(ERROR_COLOR, "✘"));
    }
    for option in &item.unknown_options {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = write!(out, "{} unknown option '{option}'{at}", paint(ERROR_COLOR, "✘"));
    }
    out
}

/// Invocable commands below `node`, one per line
#[must_use]
pub fn format_available(project: &Project, node: NodeId) -> String {
    let mut out = String::new();
    let children: Vec<_> = project.plan.children(node).collect();
    if children.is_empty() {
        return out;
    }
    let _ = writeln!(out, "Available commands:");
    for child in children {
        let _ = writeln!(out, "  {}{}", child.name, describe(project, child.command));
    }
    out
}

fn describe(project: &Project, command: Option<UnitId>) -> String {
    match command.and_then(|id| project.registry.get(id)) {
        Some(definition) if !definition.description.is_empty() => {
            format!(" - {}", definition.description)
        }
        Some(_) => String::new(),
        None => format!(" {}", paint(DIM, "[topic]")),
    }
}

/// The invocable command tree, indented by depth
#[must_use]
pub fn format_tree(project: &Project) -> String {
    let mut out = String::new();
    let root = project.plan.root();
    let node = project.plan.node(root);
    let _ = writeln!(out, "{}{}", node.name, describe(project, node.command));
    write_children(project, root, 1, &mut out);
    out
}

fn write_children(project: &Project, node: NodeId, depth: usize, out: &mut String) {
    for child in project.plan.children(node) {
        let _ = writeln!(
            out,
            "{}{}{}",
            "  ".repeat(depth),
            child.name,
            describe(project, child.command)
        );
        if let Some(id) = project.plan.child(node, &child.name) {
            write_children(project, id, depth + 1, out);
        }
    }
}

/// Print events until every sender is dropped
pub async fn print_events(
    mut events: mpsc::UnboundedReceiver<UnitEvent>,
    names: HashMap<UnitId, String>,
) {
    while let Some(event) = events.recv().await {
        let name = names.get(&event.unit()).map_or("?", String::as_str);
        eprintln!("{}", format_event(event, name));
    }
}
