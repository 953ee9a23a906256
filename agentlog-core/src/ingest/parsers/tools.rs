//! Tool-call rendering and categorization shared by both grammars.
//!
//! Rendered tool calls become part of a message's canonical text, so the
//! formats here are stable: downstream readers split on the bracketed header.

use serde_json::Value;

/// Category assigned to tool names with no dedicated bucket.
pub const OTHER_CATEGORY: &str = "Other";

/// Bucket a raw tool name into a coarse category.
///
/// MCP tools (`mcp__<server>__<op>`) are bucketed by server name.
pub fn categorize(name: &str) -> String {
    if let Some(server) = mcp_server_name(name) {
        return server.to_string();
    }

    let category = match name {
        "Read" => "Read",
        "Write" => "Write",
        "Edit" | "MultiEdit" | "NotebookEdit" | "apply_patch" => "Edit",
        "Bash" | "BashOutput" | "KillShell" | "shell" | "exec_command" | "local_shell" => "Bash",
        "Grep" => "Grep",
        "Glob" => "Glob",
        "WebFetch" | "WebSearch" => "Web",
        "Task" => "Task",
        "TodoWrite" | "update_plan" => "Todo",
        "EnterPlanMode" | "ExitPlanMode" => "Plan",
        "AskUserQuestion" => "Question",
        _ => OTHER_CATEGORY,
    };
    category.to_string()
}

/// Server component of an `mcp__<server>__<op>` tool name.
///
/// Returns `None` unless both the server and the operation are non-empty.
pub fn mcp_server_name(name: &str) -> Option<&str> {
    let rest = name.strip_prefix("mcp__")?;
    let (server, op) = rest.split_once("__")?;
    if server.is_empty() || op.is_empty() {
        return None;
    }
    Some(server)
}

/// Render a tool invocation as canonical text.
pub fn render_tool_use(name: &str, input: &Value) -> String {
    match name {
        "Read" | "Write" => format!("[{}: {}]", name, str_field(input, "file_path")),
        "Edit" | "MultiEdit" => format!("[Edit: {}]", str_field(input, "file_path")),
        "NotebookEdit" => format!("[NotebookEdit: {}]", str_field(input, "notebook_path")),
        "Glob" | "Grep" => {
            let pattern = str_field(input, "pattern");
            match input.get("path").and_then(Value::as_str) {
                Some(path) if !path.is_empty() => format!("[{}: {} in {}]", name, pattern, path),
                _ => format!("[{}: {}]", name, pattern),
            }
        }
        "Bash" => {
            let command = str_field(input, "command");
            match input.get("description").and_then(Value::as_str) {
                Some(desc) if !desc.is_empty() => format!("[Bash: {}]\n$ {}", desc, command),
                _ => format!("[Bash]\n$ {}", command),
            }
        }
        "shell" | "exec_command" | "local_shell" => {
            format!("[Bash]\n$ {}", shell_command(input).unwrap_or_default())
        }
        "apply_patch" => "[Edit: apply_patch]".to_string(),
        "Task" => {
            let desc = str_field(input, "description");
            match input.get("subagent_type").and_then(Value::as_str) {
                Some(agent) if !agent.is_empty() => format!("[Task: {} ({})]", desc, agent),
                _ => format!("[Task: {}]", desc),
            }
        }
        "TodoWrite" => render_todos(input),
        "AskUserQuestion" => render_questions(input),
        "EnterPlanMode" => "[Entering Plan Mode]".to_string(),
        "ExitPlanMode" => match input.get("plan").and_then(Value::as_str) {
            Some(plan) if !plan.trim().is_empty() => format!("[Exiting Plan Mode]\n{}", plan),
            _ => "[Exiting Plan Mode]".to_string(),
        },
        "WebFetch" => format!("[WebFetch: {}]", str_field(input, "url")),
        "WebSearch" => format!("[WebSearch: {}]", str_field(input, "query")),
        "Skill" => format!("[Skill: {}]", str_field(input, "skill")),
        _ => format!("[Tool: {}]", name),
    }
}

/// Flatten tool output (a string, or an array of text blocks) to text.
pub fn result_text(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn str_field<'a>(input: &'a Value, key: &str) -> &'a str {
    input.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Command line of a Codex shell call.
///
/// `["bash", "-lc", "<script>"]` collapses to the script itself.
fn shell_command(input: &Value) -> Option<String> {
    let command = input.get("command").or_else(|| input.get("cmd"))?;
    match command {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let parts: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
            match parts.as_slice() {
                [_, flag, script] if *flag == "-lc" || *flag == "-c" => Some(script.to_string()),
                _ => Some(parts.join(" ")),
            }
        }
        _ => None,
    }
}

fn render_todos(input: &Value) -> String {
    let mut out = String::from("[Todo List]");
    let todos = input.get("todos").and_then(Value::as_array);
    for todo in todos.into_iter().flatten() {
        let icon = match todo.get("status").and_then(Value::as_str) {
            Some("completed") => "✓",
            Some("in_progress") => "→",
            _ => "○",
        };
        out.push_str(&format!("\n{} {}", icon, str_field(todo, "content")));
    }
    out
}

fn render_questions(input: &Value) -> String {
    let questions = input.get("questions").and_then(Value::as_array);
    let rendered: Vec<String> = questions
        .into_iter()
        .flatten()
        .map(|q| {
            let mut out = format!("[Question: {}]", str_field(q, "header"));
            let text = str_field(q, "question");
            if !text.is_empty() {
                out.push_str(&format!("\n  {}", text));
            }
            let options = q.get("options").and_then(Value::as_array);
            for option in options.into_iter().flatten() {
                let label = str_field(option, "label");
                match option.get("description").and_then(Value::as_str) {
                    Some(desc) if !desc.is_empty() => {
                        out.push_str(&format!("\n  - {}: {}", label, desc))
                    }
                    _ => out.push_str(&format!("\n  - {}", label)),
                }
            }
            out
        })
        .collect();

    if rendered.is_empty() {
        "[Question]".to_string()
    } else {
        rendered.join("\n")
    }
}
