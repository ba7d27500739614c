// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Preprocessor command - directive language utilities

use miette::Result;

use super::PreprocessorAction;
use crate::preprocessor::Preprocessor;

/// Run the preprocessor command
pub async fn run(action: PreprocessorAction) -> Result<()> {
    match action {
        PreprocessorAction::Statements => {
            println!("Available preprocessor statements:");
            let preprocessor = Preprocessor::new();
            for function in preprocessor.functions() {
                println!("\n{}", function.usage());
            }
        }
    }
    Ok(())
}
