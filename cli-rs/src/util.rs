//! Console output helpers shared by every command

use std::env;
use std::io::{self, IsTerminal, Write};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Markup tags and their ANSI foreground colour codes
const COLOR_TAGS: [(&str, &str); 5] = [
    ("blue", "34"),
    ("cyan", "36"),
    ("green", "32"),
    ("yellow", "33"),
    ("red", "31"),
];

static MARKUP: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    COLOR_TAGS
        .iter()
        .filter_map(|(tag, code)| {
            Regex::new(&format!(r"(?s)<{tag}>(.*?)</{tag}>"))
                .ok()
                .map(|re| (re, *code))
        })
        .collect()
});

/// Keys always printed first, in this order
const LEADING_KEYS: [&str; 3] = ["name", "module_name", "class_name"];

/// Colour is off when `NO_COLOR` is set or stdout is not a terminal
pub fn color_enabled() -> bool {
    env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

/// Replaces `<blue>..</blue>` style tags with ANSI colours, or strips them
pub fn render_markup(message: &str, color: bool) -> String {
    let mut rendered = message.to_string();
    for (re, code) in MARKUP.iter() {
        let replacement = if color {
            format!("\x1b[{code}m${{1}}\x1b[0m")
        } else {
            "${1}".to_string()
        };
        rendered = re.replace_all(&rendered, replacement.as_str()).into_owned();
    }
    rendered
}

pub fn cli_message(message: &str) {
    println!("{}", render_markup(message, color_enabled()));
}

/// Prints an optional intro line, then each string as its own message
pub fn cli_message_list(items: &[String], list_intro_string: Option<&str>) {
    let mut stdout = io::stdout().lock();
    // Nothing useful to do when stdout is gone.
    let _ = write_message_list(&mut stdout, items, list_intro_string, color_enabled());
}

fn write_message_list<W: Write>(
    out: &mut W,
    items: &[String],
    list_intro_string: Option<&str>,
    color: bool,
) -> io::Result<()> {
    if let Some(intro) = list_intro_string.filter(|intro| !intro.is_empty()) {
        writeln!(out, "{}", render_markup(intro, color))?;
    }
    for item in items {
        writeln!(out, "{}", render_markup(item, color))?;
    }
    Ok(())
}

/// `name (ClassName) => name (ClassName)`
pub fn action_list_to_string(action_list: &[Value]) -> String {
    action_list
        .iter()
        .map(|action| {
            let name = action.get("name").map(display_value).unwrap_or_default();
            let class_name = action
                .get("action")
                .and_then(|a| a.get("class_name"))
                .map(display_value)
                .unwrap_or_default();
            format!("{name} ({class_name})")
        })
        .collect::<Vec<_>>()
        .join(" => ")
}

/// Renders a config entry as markup lines.
///
/// With `indent > 1`, the character at position 1 of the first line is
/// replaced by `bullet`.
pub fn format_dict(dict: &Map<String, Value>, indent: usize, bullet: Option<char>) -> String {
    dict_lines(dict, indent, bullet).join("\n")
}

pub fn cli_message_dict(dict: &Map<String, Value>, indent: usize, bullet: Option<char>) {
    cli_message_list(&dict_lines(dict, indent, bullet), None);
}

fn dict_lines(dict: &Map<String, Value>, indent: usize, bullet: Option<char>) -> Vec<String> {
    let mut lines = Vec::new();
    push_dict_lines(dict, indent, &mut lines);

    if let (Some(bullet), Some(first)) = (bullet, lines.first_mut()) {
        if indent > 1 && first.len() > 1 {
            let rest = first.split_off(2);
            first.truncate(1);
            first.push(bullet);
            first.push_str(&rest);
        }
    }

    lines
}

fn push_dict_lines(dict: &Map<String, Value>, indent: usize, lines: &mut Vec<String>) {
    let pad = " ".repeat(indent);
    let mut remaining = dict.clone();

    for key in LEADING_KEYS {
        if remaining.get(key).is_some_and(is_truthy) {
            if let Some(value) = remaining.remove(key) {
                lines.push(format!("{pad}<cyan>{key}:</cyan> {}", display_value(&value)));
            }
        }
    }

    if let Some(Value::Array(actions)) = remaining.get("action_list") {
        if !actions.is_empty() {
            lines.push(format!(
                "{pad}<cyan>action_list:</cyan> {}",
                action_list_to_string(actions)
            ));
            remaining.remove("action_list");
        }
    }

    let mut keys: Vec<&String> = remaining.keys().collect();
    keys.sort();
    for key in keys {
        match &remaining[key.as_str()] {
            _ if key == "password" => lines.push(format!("{pad}<cyan>password:</cyan> ******")),
            Value::Object(nested) => {
                lines.push(format!("{pad}<cyan>{key}:</cyan>"));
                push_dict_lines(nested, indent + 2, lines);
            }
            value => lines.push(format!("{pad}<cyan>{key}:</cyan> {}", display_value(value))),
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Only checks that the Slack incoming-webhook host appears in the URL
pub fn is_sane_slack_webhook(url: Option<&str>) -> bool {
    url.is_some_and(|url| url.trim().contains("https://hooks.slack.com/"))
}
