//! `hashlb validate`: check a configuration file for errors.
//!
//! The file is loaded the same way `run` loads it, then every backend is
//! listed with the problems found for it. Problems that do not belong to
//! a single backend (timeouts, an empty list) are reported after the
//! list. Output is text for people or JSON for scripts.

use serde::Serialize;

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::model::Config;
use crate::config::{sources, validation};
use crate::error::{BalancerError, ValidationError};

#[derive(Debug, Serialize)]
struct Report<'a> {
    path: String,
    revision: &'a str,
    valid: bool,
    port: u16,
    scheme: &'static str,
    timeout_sec: u64,
    health_interval_secs: u64,
    trace: bool,
    backends: Vec<BackendEntry<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<&'a ValidationError>,
}

#[derive(Debug, Serialize)]
struct BackendEntry<'a> {
    address: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    problems: Vec<&'a ValidationError>,
}

impl<'a> Report<'a> {
    fn new(
        path: String,
        revision: &'a str,
        config: &'a Config,
        errors: &'a [ValidationError],
    ) -> Self {
        let backends = config
            .backends
            .iter()
            .enumerate()
            .map(|(i, address)| {
                let field = format!("backends[{i}]");
                BackendEntry {
                    address,
                    problems: errors.iter().filter(|e| e.field == field).collect(),
                }
            })
            .collect();

        Self {
            path,
            revision,
            valid: errors.is_empty(),
            port: config.port,
            scheme: config.scheme().as_str(),
            timeout_sec: config.timeout_sec,
            health_interval_secs: config.health_interval_secs,
            trace: config.trace,
            backends,
            errors: errors
                .iter()
                .filter(|e| !e.field.starts_with("backends["))
                .collect(),
        }
    }

    fn render_text(&self) -> String {
        let mark = if self.valid { '\u{2713}' } else { '\u{2717}' };
        let mut out = format!(
            "{mark} {} (rev {}): {} backends over {}, port {}\n",
            self.path,
            self.revision,
            self.backends.len(),
            self.scheme,
            self.port,
        );

        for backend in &self.backends {
            if backend.problems.is_empty() {
                out.push_str(&format!("  \u{2713} {}\n", backend.address));
            } else {
                out.push_str(&format!("  \u{2717} {}\n", backend.address));
                for problem in &backend.problems {
                    out.push_str(&format!("    {problem}\n"));
                }
            }
        }
        for error in &self.errors {
            out.push_str(&format!("{error}\n"));
        }

        out.push_str(&format!(
            "  timeout {}s, health interval {}s, trace {}",
            self.timeout_sec,
            self.health_interval_secs,
            if self.trace { "on" } else { "off" },
        ));
        out
    }
}

pub async fn execute(args: &ValidateArgs) -> Result<(), BalancerError> {
    let path = &args.config;
    let (config, revision) = sources::load_file(path).await?;

    let errors = validation::validate(&config).err().unwrap_or_default();
    let report = Report::new(path.display().to_string(), &revision, &config, &errors);

    let rendered = match args.format {
        ValidateFormat::Text => report.render_text(),
        ValidateFormat::Json => serde_json::to_string(&report).map_err(|e| {
            BalancerError::ConfigParse {
                path: report.path.clone(),
                source: Box::new(e),
            }
        })?,
    };

    if report.valid {
        println!("{rendered}");
        Ok(())
    } else {
        match args.format {
            ValidateFormat::Text => eprintln!("{rendered}"),
            ValidateFormat::Json => println!("{rendered}"),
        }
        Err(BalancerError::ConfigValidation { errors })
    }
}
