//! Derive the project model from its documents and collect problems.

use super::command::{CommandType, ProjectCommand};
use crate::constants::{DEFAULT_ENV_SPEC_NAME, ENV_PREFIX_VAR};
use crate::document::{ConfigDocument, array};
use crate::env_spec::{EnvSpec, merge_packages, merge_unique, parse_spec, platform};
use crate::lockfile::LockFile;
use crate::requirements::{HashAlgorithm, Requirement, RequirementRegistry};
use indexmap::IndexMap;
use std::path::Path;
use toml_edit::{Item, TableLike, Value};

/// Everything derived from the project file and the lock file.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProjectModel {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub global_platforms: Vec<String>,
    pub env_specs: IndexMap<String, EnvSpec>,
    pub default_env_spec_name: String,
    pub commands: IndexMap<String, ProjectCommand>,
    pub requirements: Vec<Requirement>,
    pub problems: Vec<String>,
}

struct Parser<'a> {
    file: String,
    registry: &'a RequirementRegistry,
    problems: Vec<String>,
}

pub(crate) fn parse(
    directory: &Path,
    project_file: &ConfigDocument,
    lock_file: &LockFile,
    registry: &RequirementRegistry,
) -> ProjectModel {
    let mut parser = Parser {
        file: project_file.basename(),
        registry,
        problems: Vec::new(),
    };
    if let Some(reason) = project_file.parse_error() {
        parser.problems.push(reason.to_string());
    }
    parser.problems.extend(lock_file.problems());

    let root = project_file.root();
    let name = parser.optional_string(root.get("name"), "name");
    let description = parser.optional_string(root.get("description"), "description");
    let icon = parser.optional_string(root.get("icon"), "icon");
    if let Some(icon) = &icon
        && !directory.join(icon).is_file()
    {
        parser.problems.push(format!("Icon file {} does not exist.", directory.join(icon).display()));
    }

    let global = parser.env_inputs(root, "");
    parser.check_platforms(&global.platforms, "project");

    let mut env_specs = parser.env_specs(root.get("env_specs"), &global);
    if env_specs.is_empty() {
        let mut spec = EnvSpec::new(
            DEFAULT_ENV_SPEC_NAME,
            global.conda.clone(),
            global.channels.clone(),
            global.platforms.clone(),
        );
        spec.pip_packages = global.pip.clone();
        env_specs.insert(spec.name.clone(), spec);
    }
    for spec in env_specs.values_mut() {
        spec.lock_set = lock_file.lock_set_for(&spec.name);
    }

    let default_env_spec_name =
        env_specs.keys().next().cloned().unwrap_or_else(|| DEFAULT_ENV_SPEC_NAME.to_string());
    let commands = parser.commands(root.get("commands"), &env_specs, &default_env_spec_name);
    let requirements = parser.requirements(root);

    ProjectModel {
        name,
        icon,
        description,
        global_platforms: global.platforms,
        env_specs,
        default_env_spec_name,
        commands,
        requirements,
        problems: parser.problems,
    }
}

#[derive(Debug, Default)]
struct EnvInputs {
    conda: Vec<String>,
    pip: Vec<String>,
    channels: Vec<String>,
    platforms: Vec<String>,
}

impl Parser<'_> {
    fn problem(&mut self, message: String) {
        self.problems.push(format!("{}: {message}", self.file));
    }

    fn optional_string(&mut self, item: Option<&Item>, field: &str) -> Option<String> {
        let item = item?;
        match item.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.problem(format!("{field} field should be a string, not {}", item.type_name()));
                None
            }
        }
    }

    fn string_list(&mut self, item: Option<&Item>, field: &str) -> Vec<String> {
        let Some(item) = item else {
            return Vec::new();
        };
        match item.as_array() {
            Some(values) if values.iter().all(Value::is_str) => array::strings(values),
            _ => {
                self.problem(format!("{field} field should be a list of strings"));
                Vec::new()
            }
        }
    }

    fn env_inputs(&mut self, table: &dyn TableLike, prefix: &str) -> EnvInputs {
        let field = |name: &str| format!("{prefix}{name}");
        let mut inputs = EnvInputs::default();

        if let Some(item) = table.get("packages") {
            match item.as_array() {
                Some(values) => {
                    for value in values.iter() {
                        self.package_entry(value, &field("packages"), &mut inputs);
                    }
                }
                None => self.problem(format!("{} field should be a list", field("packages"))),
            }
        }
        inputs.channels = self.string_list(table.get("channels"), &field("channels"));
        inputs.platforms = self.string_list(table.get("platforms"), &field("platforms"));
        inputs
    }

    fn package_entry(&mut self, value: &Value, field: &str, inputs: &mut EnvInputs) {
        if let Some(spec) = value.as_str() {
            if parse_spec(spec).is_some() {
                inputs.conda.push(spec.to_string());
            } else {
                self.problem(format!("Invalid package specification: {spec}"));
            }
            return;
        }

        let pip = value.as_inline_table().and_then(|t| t.get("pip")).and_then(Value::as_array);
        match pip {
            Some(pip) if pip.iter().all(Value::is_str) => inputs.pip.extend(array::strings(pip)),
            _ => self.problem(format!(
                "{field} should contain package specification strings or {{ pip = [...] }} tables"
            )),
        }
    }

    fn check_platforms(&mut self, platforms: &[String], owner: &str) {
        for name in platforms {
            if !platform::is_known_platform(name) {
                self.problem(platform::unknown_platform_problem(name, owner));
            }
        }
    }

    fn env_specs(&mut self, item: Option<&Item>, global: &EnvInputs) -> IndexMap<String, EnvSpec> {
        let mut env_specs = IndexMap::new();
        let Some(item) = item else {
            return env_specs;
        };
        let Some(table) = item.as_table_like() else {
            self.problem("env_specs should be a table from env spec names to env specs".to_string());
            return env_specs;
        };

        for (name, entry) in table.iter() {
            let Some(entry) = entry.as_table_like() else {
                self.problem(format!("env spec {name} should be a table"));
                continue;
            };
            let own = self.env_inputs(entry, &format!("env_specs.{name}."));
            self.check_platforms(&own.platforms, &format!("env spec {name}"));
            let description =
                self.optional_string(entry.get("description"), &format!("env_specs.{name}.description"));

            let mut spec = EnvSpec::new(
                name,
                merge_packages(&global.conda, &own.conda),
                merge_unique(&global.channels, &own.channels),
                merge_unique(&global.platforms, &own.platforms),
            );
            spec.pip_packages = merge_unique(&global.pip, &own.pip);
            spec.description = description;
            env_specs.insert(name.to_string(), spec);
        }
        env_specs
    }

    fn commands(
        &mut self,
        item: Option<&Item>,
        env_specs: &IndexMap<String, EnvSpec>,
        default_env_spec: &str,
    ) -> IndexMap<String, ProjectCommand> {
        let mut commands = IndexMap::new();
        let Some(item) = item else {
            return commands;
        };
        let Some(table) = item.as_table_like() else {
            self.problem("'commands' section should be a table from command names to commands".to_string());
            return commands;
        };

        for (name, entry) in table.iter() {
            let Some(entry) = entry.as_table_like() else {
                self.problem(format!("command {name} should be a table"));
                continue;
            };

            let mut command_lines = Vec::new();
            for command_type in CommandType::ALL {
                if let Some(value) = entry.get(command_type.key()) {
                    match value.as_str() {
                        Some(line) => command_lines.push((command_type, line.to_string())),
                        None => self.problem(format!(
                            "command {name} has a non-string '{command_type}' field"
                        )),
                    }
                }
            }
            if command_lines.is_empty() {
                self.problem(format!("command '{name}' does not have a command line in it"));
                continue;
            }
            let conflict = command_lines.iter().find_map(|(a, _)| {
                command_lines.iter().find(|(b, _)| !a.combines_with(*b)).map(|(b, _)| (*a, *b))
            });
            if let Some((a, b)) = conflict {
                self.problem(format!(
                    "command '{name}' has multiple commands in it, '{a}' can't go with '{b}'"
                ));
            }

            let env_spec = match entry.get("env_spec") {
                None => default_env_spec.to_string(),
                Some(value) => match value.as_str() {
                    Some(env_spec) => {
                        if !env_specs.contains_key(env_spec) {
                            self.problems.push(format!(
                                "Command {name} uses env spec {env_spec} which does not appear in the project."
                            ));
                        }
                        env_spec.to_string()
                    }
                    None => {
                        self.problem(format!("command {name} has a non-string 'env_spec' field"));
                        default_env_spec.to_string()
                    }
                },
            };

            let supports_http_options = match entry.get("supports_http_options") {
                None => false,
                Some(value) => value.as_bool().unwrap_or_else(|| {
                    self.problem(format!("command {name}: supports_http_options should be true or false"));
                    false
                }),
            };
            let description =
                self.optional_string(entry.get("description"), &format!("commands.{name}.description"));

            commands.insert(
                name.to_string(),
                ProjectCommand {
                    name: name.to_string(),
                    description,
                    env_spec,
                    supports_http_options,
                    command_lines,
                },
            );
        }
        commands
    }

    fn requirements(&mut self, root: &dyn TableLike) -> Vec<Requirement> {
        let mut requirements = vec![Requirement::Environment {
            env_var: ENV_PREFIX_VAR.to_string(),
        }];
        self.downloads(root.get("downloads"), &mut requirements);
        self.services(root.get("services"), &mut requirements);
        self.variables(root.get("variables"), &mut requirements);

        let mut seen: Vec<&str> = Vec::new();
        let mut duplicates = Vec::new();
        for requirement in &requirements {
            let env_var = requirement.env_var();
            if seen.contains(&env_var) {
                duplicates.push(env_var.to_string());
            } else {
                seen.push(env_var);
            }
        }
        for env_var in duplicates {
            self.problem(format!("variable {env_var} is defined more than once"));
        }
        requirements
    }

    fn section<'i>(&mut self, item: Option<&'i Item>, section: &str) -> Option<&'i dyn TableLike> {
        let item = item?;
        let table = item.as_table_like();
        if table.is_none() {
            self.problem(format!("'{section}' section should be a table"));
        }
        table
    }

    fn downloads(&mut self, item: Option<&Item>, requirements: &mut Vec<Requirement>) {
        let Some(table) = self.section(item, "downloads") else {
            return;
        };
        for (env_var, entry) in table.iter() {
            if let Some(url) = entry.as_str() {
                requirements.push(Requirement::Download {
                    env_var: env_var.to_string(),
                    url: url.to_string(),
                    filename: filename_from_url(url),
                    hash: None,
                    description: None,
                });
                continue;
            }
            let Some(entry) = entry.as_table_like() else {
                self.problem(format!("download {env_var} should be a URL string or a table"));
                continue;
            };
            let Some(url) = entry.get("url").and_then(Item::as_str) else {
                self.problem(format!("download item {env_var} doesn't contain a 'url' field"));
                continue;
            };

            let hashes: Vec<(HashAlgorithm, &Item)> = HashAlgorithm::ALL
                .into_iter()
                .filter_map(|algorithm| entry.get(algorithm.key()).map(|v| (algorithm, v)))
                .collect();
            if hashes.len() > 1 {
                let keys: Vec<&str> = hashes.iter().map(|(a, _)| a.key()).collect();
                self.problem(format!(
                    "multiple checksums for download {env_var}: {}",
                    keys.join(", ")
                ));
                continue;
            }
            let hash = match hashes.first() {
                None => None,
                Some((algorithm, value)) => match value.as_str() {
                    Some(digest) => Some((*algorithm, digest.to_string())),
                    None => {
                        self.problem(format!("checksum of download {env_var} should be a string"));
                        continue;
                    }
                },
            };

            let filename = entry
                .get("filename")
                .and_then(Item::as_str)
                .map_or_else(|| filename_from_url(url), str::to_string);
            let description = entry.get("description").and_then(Item::as_str).map(str::to_string);
            requirements.push(Requirement::Download {
                env_var: env_var.to_string(),
                url: url.to_string(),
                filename,
                hash,
                description,
            });
        }
    }

    fn services(&mut self, item: Option<&Item>, requirements: &mut Vec<Requirement>) {
        let Some(table) = self.section(item, "services") else {
            return;
        };
        for (env_var, entry) in table.iter() {
            let service_type = entry
                .as_str()
                .or_else(|| entry.as_table_like().and_then(|t| t.get("type")).and_then(Item::as_str));
            let Some(service_type) = service_type else {
                self.problem(format!(
                    "service {env_var} should be a service type string or a table with a 'type' field"
                ));
                continue;
            };
            if self.registry.service_type(service_type).is_none() {
                let known = self.registry.service_type_names();
                self.problem(format!(
                    "service {env_var} has an unknown type '{service_type}'; we know about: {known}"
                ));
                continue;
            }
            requirements.push(Requirement::Service {
                env_var: env_var.to_string(),
                service_type: service_type.to_string(),
            });
        }
    }

    fn variables(&mut self, item: Option<&Item>, requirements: &mut Vec<Requirement>) {
        let Some(item) = item else {
            return;
        };

        if let Some(names) = item.as_array() {
            for name in names.iter() {
                match name.as_str() {
                    Some(name) => requirements.push(plain_variable(name, None)),
                    None => self.problem("variables list should contain only names".to_string()),
                }
            }
            return;
        }

        let Some(table) = self.section(Some(item), "variables") else {
            return;
        };
        for (env_var, entry) in table.iter() {
            if let Some(value) = entry.as_value().and_then(scalar_to_string) {
                requirements.push(plain_variable(env_var, Some(value)));
                continue;
            }
            let Some(options) = entry.as_table_like() else {
                self.problem(format!(
                    "variable {env_var} should have a default value or an options table"
                ));
                continue;
            };
            let default = match options.get("default") {
                None => None,
                Some(item) => match item.as_value().and_then(scalar_to_string) {
                    Some(default) => Some(default),
                    None => {
                        self.problem(format!("default value of variable {env_var} should be a string"));
                        continue;
                    }
                },
            };
            requirements.push(Requirement::Variable {
                env_var: env_var.to_string(),
                default,
                description: options.get("description").and_then(Item::as_str).map(str::to_string),
                encrypted: options.get("encrypted").and_then(Item::as_bool).unwrap_or(false),
            });
        }
    }
}

fn plain_variable(env_var: &str, default: Option<String>) -> Requirement {
    Requirement::Variable {
        env_var: env_var.to_string(),
        default,
        description: None,
        encrypted: false,
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.value().clone()),
        Value::Integer(i) => Some(i.value().to_string()),
        Value::Float(f) => Some(f.value().to_string()),
        Value::Boolean(b) => Some(b.value().to_string()),
        _ => None,
    }
}

/// Last path segment of `url`, without query or fragment.
pub(crate) fn filename_from_url(url: &str) -> String {
    let location = url.split(['?', '#']).next().unwrap_or(url);
    let without_scheme = location.split_once("://").map_or(location, |(_, rest)| rest);
    let path = without_scheme.split_once('/').map_or("", |(_, path)| path);
    match path.trim_end_matches('/').rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => "download".to_string(),
    }
}
