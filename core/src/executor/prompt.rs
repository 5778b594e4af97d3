use super::types::{Task, TaskResult};

/// Output of a completed dependency, fed into the dependent's prompt.
#[derive(Debug, Clone)]
pub struct DependencyOutput<'a> {
    pub task: &'a Task,
    pub result: &'a TaskResult,
}

/// Compose the execution prompt for one task.
pub fn build_execution_prompt(
    objective: &str,
    task: &Task,
    dependencies: &[DependencyOutput<'_>],
    dependency_chars: usize,
) -> String {
    let mut prompt = String::new();

    prompt.push_str("You are one agent in a team working toward a shared mission.\n\n");
    prompt.push_str(&format!("Mission objective:\n{}\n\n", objective.trim()));

    prompt.push_str(&format!("Your task: {}\n", task.name));
    prompt.push_str(&format!(
        "Priority: {} ({})\n",
        task.priority.as_str(),
        if task.priority_reasoning.trim().is_empty() {
            "no reasoning given"
        } else {
            task.priority_reasoning.trim()
        }
    ));
    prompt.push_str(&format!("Instructions:\n{}\n", task.description.trim()));

    if !task.tools.is_empty() {
        let tools: Vec<&str> = task.tools.iter().map(String::as_str).collect();
        prompt.push_str(&format!("\nTools available to you: {}\n", tools.join(", ")));
    }

    if !dependencies.is_empty() {
        prompt.push_str("\nResults from prerequisite tasks:\n");
        for dep in dependencies {
            prompt.push_str(&format!(
                "\n## [{}] {}\n{}\n",
                dep.task.id,
                dep.task.name,
                truncate_chars(dep.result.content.trim(), dependency_chars)
            ));
        }
    }

    prompt.push_str("\nCarry out the task and reply with your result.\n");
    prompt
}

/// Truncate on a char boundary, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}…", &text[..byte_idx]),
        None => text.to_string(),
    }
}
