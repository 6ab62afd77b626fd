//! Terminal intervention interface.
//!
//! Presents intervention prompts with dialoguer. The prompts block on stdin,
//! so each one runs on the blocking thread pool.

use console::style;
use dialoguer::{Input, Select};
use serde_json::{Map, Value};

use busy_core::orchestration::InterventionInterface;
use busy_types::checkpoint::Checkpoint;
use busy_types::context::ContextState;
use busy_types::error::InterventionError;
use busy_types::intervention::{InterventionAction, InterventionState};

const MENU: [&str; 6] = [
    "Retry this step",
    "Skip to the next step",
    "Go back to a checkpoint",
    "Edit the input and run",
    "Resume automatic mode",
    "Abort the process",
];

#[derive(Debug, Default)]
pub struct TerminalInterface;

impl TerminalInterface {
    pub fn new() -> Self {
        Self
    }
}

fn prompt_error(err: dialoguer::Error) -> InterventionError {
    InterventionError::Input(err.to_string())
}

async fn blocking<T, F>(prompt: F) -> Result<T, InterventionError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, InterventionError> + Send + 'static,
{
    tokio::task::spawn_blocking(prompt)
        .await
        .map_err(|err| InterventionError::Input(format!("prompt task failed: {err}")))?
}

fn print_header(state: &InterventionState) {
    println!();
    match &state.error {
        Some(error) => {
            println!(
                "  {} Step {} ({}) failed",
                style("✗").red().bold(),
                state.step_index,
                style(&state.current_step).cyan()
            );
            println!("    {}", style(error).red());
        }
        None => println!(
            "  {} Paused before step {} ({})",
            style("⏸").yellow().bold(),
            state.step_index,
            style(&state.current_step).cyan()
        ),
    }
    println!(
        "    {}",
        style(format!("{} checkpoint(s) available", state.available_checkpoints.len())).dim()
    );
    println!();
}

fn checkpoint_label(checkpoint: &Checkpoint) -> String {
    format!(
        "#{} {} [{}] {}",
        checkpoint.step_index,
        checkpoint.step_id,
        checkpoint.kind,
        checkpoint.timestamp.format("%H:%M:%S%.3f")
    )
}

fn choose_checkpoint(checkpoints: &[Checkpoint]) -> Result<Option<Checkpoint>, InterventionError> {
    if checkpoints.is_empty() {
        println!("  {}", style("No checkpoints to go back to").dim());
        return Ok(None);
    }
    let items: Vec<String> = checkpoints.iter().map(checkpoint_label).collect();
    let selection = Select::new()
        .with_prompt("  Rewind to")
        .items(&items)
        .default(items.len() - 1)
        .interact_opt()
        .map_err(prompt_error)?;
    Ok(selection.map(|index| checkpoints[index].clone()))
}

fn read_json(prompt: &str, initial: &Value) -> Result<Value, InterventionError> {
    let initial = serde_json::to_string(initial).unwrap_or_else(|_| "{}".to_string());
    let text: String = Input::new()
        .with_prompt(prompt)
        .with_initial_text(initial)
        .validate_with(|input: &String| -> Result<(), String> {
            serde_json::from_str::<Value>(input)
                .map(|_| ())
                .map_err(|e| format!("not valid JSON: {e}"))
        })
        .interact_text()
        .map_err(prompt_error)?;
    serde_json::from_str(&text).map_err(|e| InterventionError::Input(e.to_string()))
}

fn edit_blocking(context: ContextState, data: Value) -> Result<(ContextState, Value), InterventionError> {
    println!(
        "  {} Editing data for layer {}",
        style("✎").cyan(),
        style(&context.current_layer).cyan()
    );
    let edited = read_json("  Data (JSON)", &data)?;
    Ok((context, edited))
}

/// Fields of `edited` that are new or differ from `original`.
fn changed_fields(original: &Value, edited: Value) -> Map<String, Value> {
    let Value::Object(edited) = edited else {
        let mut map = Map::new();
        map.insert("value".to_string(), edited);
        return map;
    };
    edited
        .into_iter()
        .filter(|(key, value)| original.get(key) != Some(value))
        .collect()
}

/// What the user picked from the menu.
enum MenuChoice {
    Action(InterventionAction),
    /// Edit the data held by this checkpoint, then run with the changes.
    Edit(Checkpoint),
}

fn menu_blocking(state: InterventionState) -> Result<MenuChoice, InterventionError> {
    print_header(&state);

    loop {
        let selection = Select::new()
            .with_prompt("  How do you want to continue?")
            .items(&MENU)
            .default(if state.is_failure() { 0 } else { 4 })
            .interact()
            .map_err(prompt_error)?;

        let action = match selection {
            0 => InterventionAction::Retry,
            1 => InterventionAction::Next,
            2 => match choose_checkpoint(&state.available_checkpoints)? {
                Some(checkpoint) => InterventionAction::Back {
                    target_checkpoint: checkpoint.id,
                },
                None => continue,
            },
            3 => {
                // The latest checkpoint holds the data this step was given.
                let Some(latest) = state.available_checkpoints.last() else {
                    println!("  {}", style("Nothing to edit").dim());
                    continue;
                };
                return Ok(MenuChoice::Edit(latest.clone()));
            }
            4 => InterventionAction::ResumeAuto,
            _ => InterventionAction::Abort,
        };
        return Ok(MenuChoice::Action(action));
    }
}

impl InterventionInterface for TerminalInterface {
    async fn show_intervention_menu(
        &self,
        state: &InterventionState,
    ) -> Result<InterventionAction, InterventionError> {
        let state = state.clone();
        match blocking(move || menu_blocking(state)).await? {
            MenuChoice::Action(action) => Ok(action),
            MenuChoice::Edit(checkpoint) => {
                let (_, edited) = self
                    .edit_context_state(checkpoint.context_state, checkpoint.current_data.clone())
                    .await?;
                Ok(InterventionAction::EditState {
                    modified_data: changed_fields(&checkpoint.current_data, edited),
                })
            }
        }
    }

    async fn edit_context_state(
        &self,
        context: ContextState,
        data: Value,
    ) -> Result<(ContextState, Value), InterventionError> {
        blocking(move || edit_blocking(context, data)).await
    }

    fn show_status(&self, message: &str) {
        println!("  {} {message}", style("i").cyan());
    }
}
