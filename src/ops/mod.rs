//! Project operations.
//!
//! Each operation is a method on [`Coordinator`](crate::transaction::Coordinator)
//! that validates its input, describes its edit as a closure over the
//! [`Project`], and lets the coordinator stage, check and commit it:
//!
//! - [`project`] - create a project, set its properties, clean it
//! - [`env_specs`] - env specs, their packages and platforms
//! - [`locking`] - lock, update and unlock
//! - [`downloads`], [`services`], [`variables`] - requirements
//! - [`commands`] - runnable commands
//!
//! Every operation returns `anyhow::Result<Status>`: `Ok` for success and
//! for every expected failure, `Err` only when persisting failed.

pub mod commands;
pub mod downloads;
pub mod env_specs;
pub mod locking;
pub mod project;
pub mod services;
pub mod variables;

use crate::core::Status;
use crate::project::Project;
use strsim::levenshtein;

/// Maximum edit distance, as a percentage of the name length, for a suggestion.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Known names close to `target`, closest first.
pub(crate) fn similar_names<'a, I>(target: &str, available: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scored: Vec<(&str, usize)> =
        available.into_iter().map(|name| (name, levenshtein(target, name))).collect();
    scored.sort_by_key(|(_, distance)| *distance);
    scored
        .into_iter()
        .filter(|(_, distance)| *distance <= (target.len() * SIMILARITY_THRESHOLD_PERCENT / 100).max(1))
        .take(3)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// `status` with a "did you mean" error when something close to `target` exists.
pub(crate) fn with_suggestion<'a, I>(status: Status, target: &str, available: I) -> Status
where
    I: IntoIterator<Item = &'a str>,
{
    let suggestions = similar_names(target, available);
    if suggestions.is_empty() {
        status
    } else {
        status.with_error(format!("Did you mean: {}?", suggestions.join(", ")))
    }
}

/// Failure for an env spec name the project does not have.
pub(crate) fn unknown_env_spec(project: &Project, name: &str) -> Status {
    with_suggestion(
        Status::failure(format!("Environment spec {name} doesn't exist.")),
        name,
        project.env_specs().keys().map(String::as_str),
    )
}

/// `Err` with [`unknown_env_spec`] unless `name` is `None` or known.
pub(crate) fn check_env_spec(project: &Project, name: Option<&str>) -> Result<(), Status> {
    match name {
        Some(name) if project.env_spec(name).is_none() => Err(unknown_env_spec(project, name)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similar_names() {
        let names = ["default", "python3", "python2"];
        assert_eq!(similar_names("pyhton3", names), vec!["python3", "python2"]);
        assert!(similar_names("zzz", names).is_empty());
    }
}
