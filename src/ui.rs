// UI layer: the terminal side of the collectors. Prompts use `dialoguer`,
// upload progress is drawn with an `indicatif` bar.

use crate::api::ArtifactType;
use crate::artifact::{choose_type, ProgressSink, TypeResolver};
use crate::error::Result;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Lists the server's artifact types and asks for an index.
pub struct PromptResolver;

impl TypeResolver for PromptResolver {
    fn resolve(&self, path: &Path, types: &[ArtifactType]) -> Result<String> {
        println!("Select the type of the artifact for the file {}:", path.display());
        for (index, t) in types.iter().enumerate() {
            println!("{} - {}", index, t.name);
        }
        // Read as text so a non-numeric answer is an invalid choice rather
        // than a re-prompt.
        let answer: String = Input::new()
            .with_prompt("Enter the number corresponding to the type you want to use")
            .interact_text()?;
        let chosen = choose_type(types, &answer)?;
        println!("You have selected {}", chosen.name);
        Ok(chosen.short_name.clone())
    }
}

/// One progress bar per uploaded artifact.
#[derive(Default)]
pub struct BarProgress {
    bar: Option<ProgressBar>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for BarProgress {
    fn update(&mut self, phase: &str, percent_delta: f64, status: &str) {
        let bar = self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(100);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner} {msg} [{bar:40}] {pos:>3}% {elapsed_precise}",
            ) {
                bar.set_style(style);
            }
            bar
        });
        bar.inc(percent_delta.round() as u64);
        bar.set_message(format!("{} - {}", phase, status));
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.set_position(100);
            bar.finish();
        }
    }
}

/// Ask for the experiment name when it was not given on the command line.
pub fn prompt_experiment_name() -> Result<String> {
    let name: String = Input::new()
        .with_prompt("Enter the name of your experiment")
        .interact_text()?;
    Ok(name)
}
