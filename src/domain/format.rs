use crate::domain::TaskDetail;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum FormatError {
    #[error("unknown placeholder: {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("no {kind} named {key:?} on this task")]
    MissingKey { kind: &'static str, key: String },

    #[error("unterminated placeholder starting at byte {0}")]
    Unterminated(usize),

    #[error("unmatched '}}' at byte {0}")]
    UnmatchedClose(usize),
}

/// Expands a `-display-format` template against a task detail.
///
/// Placeholders: `{name}`, `{node_name}`, `{node_ip}`, `{driver}`,
/// `{config:KEY}`, `{env:KEY}`, `{port:LABEL}`. `{{` and `}}` emit literal
/// braces; `\n` and `\t` are expanded so templates can be passed from a shell.
pub fn format_task_detail(template: &str, detail: &TaskDetail) -> Result<String, FormatError> {
    let template = expand_escapes(template);
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' => {
                if chars.peek().is_some_and(|(_, next)| *next == '{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(FormatError::Unterminated(pos));
                }
                out.push_str(&resolve_placeholder(name.trim(), detail)?);
            }
            '}' => {
                if chars.peek().is_some_and(|(_, next)| *next == '}') {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(FormatError::UnmatchedClose(pos));
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

fn resolve_placeholder(name: &str, detail: &TaskDetail) -> Result<String, FormatError> {
    match name {
        "name" => return Ok(detail.task_name.clone()),
        "node_name" => return Ok(detail.node_name.clone()),
        "node_ip" | "ip" => return Ok(detail.node_ip.clone()),
        "driver" => return Ok(detail.driver.clone()),
        _ => {}
    }

    let Some((kind, key)) = name.split_once(':') else {
        return Err(FormatError::UnknownPlaceholder(name.to_string()));
    };
    let missing = |kind: &'static str| FormatError::MissingKey {
        kind,
        key: key.to_string(),
    };
    match kind {
        "config" => detail.config.get(key).cloned().ok_or_else(|| missing("config")),
        "env" => detail.env.get(key).cloned().ok_or_else(|| missing("env")),
        "port" => detail
            .port(key)
            .map(|port| port.to_string())
            .ok_or_else(|| missing("port")),
        _ => Err(FormatError::UnknownPlaceholder(name.to_string())),
    }
}

fn expand_escapes(template: &str) -> String {
    template.replace("\\n", "\n").replace("\\t", "\t")
}
