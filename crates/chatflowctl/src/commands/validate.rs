//! Flow file validation

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chatflow_core::FlowDefinition;
use chatflow_triggers::KeywordMatcher;

/// Outcome for one file
struct FileReport {
    path: PathBuf,
    flow_name: Option<String>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

pub async fn execute(paths: &[PathBuf]) -> Result<()> {
    let files = collect_files(paths)?;
    if files.is_empty() {
        anyhow::bail!("No flow files (*.yaml, *.yml) found");
    }

    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        reports.push(check_file(&path).await);
    }

    // Later files replace earlier ones with the same name at load time
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    for report in &mut reports {
        if let Some(name) = &report.flow_name {
            if let Some(first) = seen.insert(name.clone(), report.path.clone()) {
                report.warnings.push(format!(
                    "flow name '{}' also defined in {}; this file wins",
                    name,
                    first.display()
                ));
            }
        }
    }

    let mut failed = 0;
    for report in &reports {
        let status = if !report.errors.is_empty() {
            failed += 1;
            "ERROR"
        } else if !report.warnings.is_empty() {
            "WARN"
        } else {
            "OK"
        };
        println!(
            "{:<6} {}{}",
            status,
            report.path.display(),
            report
                .flow_name
                .as_ref()
                .map(|n| format!(" ({})", n))
                .unwrap_or_default()
        );
        for error in &report.errors {
            println!("       error: {}", error);
        }
        for warning in &report.warnings {
            println!("       warning: {}", warning);
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} flow files failed validation", failed, reports.len());
    }
    Ok(())
}

fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut in_dir: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| is_flow_file(p))
                .collect();
            in_dir.sort();
            files.extend(in_dir);
        } else if path.exists() {
            files.push(path.clone());
        } else {
            anyhow::bail!("No such file or directory: {}", path.display());
        }
    }
    Ok(files)
}

fn is_flow_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

async fn check_file(path: &Path) -> FileReport {
    let mut report = FileReport {
        path: path.to_path_buf(),
        flow_name: None,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            report.errors.push(format!("cannot read file: {}", e));
            return report;
        }
    };

    let flow = match FlowDefinition::from_yaml_str(&content) {
        Ok(flow) => flow,
        Err(e) => {
            report.errors.push(e.to_string());
            return report;
        }
    };
    report.flow_name = Some(flow.name.clone());

    match flow.validate() {
        Ok(warnings) => report.warnings.extend(warnings),
        Err(e) => report.errors.push(e.to_string()),
    }

    // Triggers are checked the same way the router registers them
    let load = KeywordMatcher::new().load(&[Arc::new(flow)]);
    report
        .errors
        .extend(load.skipped.iter().map(|e| e.to_string()));

    report
}
