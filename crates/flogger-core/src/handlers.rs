//! Built-in handlers.
//!
//! Handlers whose name ends in `_last` only look at the most recent step;
//! the others consume the whole series. Disk writers resolve their output
//! with [`HandlerCall::artifact_path`].

use std::collections::BTreeMap;

use tracing::Level;

use crate::binding::{Handler, HandlerCall};
use crate::storage;

/// Prints `"{entry} at {step}: {value}"` for the last step.
///
/// Option `output`: `"stdout"` (default) or `"stderr"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoLast;

impl Handler for EchoLast {
    fn name(&self) -> &str {
        "echo_last"
    }

    fn handle(&self, call: &HandlerCall<'_>) -> anyhow::Result<()> {
        let (step, value) = call.last()?;
        let line = format!("{} at {}: {}", call.entry, step, value);
        match call.option_str("output").unwrap_or("stdout") {
            "stdout" => println!("{}", line),
            "stderr" => eprintln!("{}", line),
            other => anyhow::bail!("unknown output stream `{}`", other),
        }
        Ok(())
    }
}

/// Emits the last step through `tracing` at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct LogLast {
    level: Level,
}

impl LogLast {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Default for LogLast {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl Handler for LogLast {
    fn name(&self) -> &str {
        "log_last"
    }

    fn handle(&self, call: &HandlerCall<'_>) -> anyhow::Result<()> {
        let (step, value) = call.last()?;
        let entry = call.entry;
        let level = self.level;
        if level == Level::TRACE {
            tracing::trace!(target: "flogger::data", "{} at {}: {}", entry, step, value);
        } else if level == Level::DEBUG {
            tracing::debug!(target: "flogger::data", "{} at {}: {}", entry, step, value);
        } else if level == Level::INFO {
            tracing::info!(target: "flogger::data", "{} at {}: {}", entry, step, value);
        } else if level == Level::WARN {
            tracing::warn!(target: "flogger::data", "{} at {}: {}", entry, step, value);
        } else {
            tracing::error!(target: "flogger::data", "{} at {}: {}", entry, step, value);
        }
        Ok(())
    }
}

/// Whole series to `<leaf>.json` as `{"step": value, ...}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveJson;

impl Handler for SaveJson {
    fn name(&self) -> &str {
        "save_to_json"
    }

    fn handle(&self, call: &HandlerCall<'_>) -> anyhow::Result<()> {
        storage::save_json(&call.artifact_path("json"), call.data)?;
        Ok(())
    }
}

/// Last value to `<leaf>.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveJsonLast;

impl Handler for SaveJsonLast {
    fn name(&self) -> &str {
        "save_to_json_last"
    }

    fn handle(&self, call: &HandlerCall<'_>) -> anyhow::Result<()> {
        let (_, value) = call.last()?;
        storage::save_json(&call.artifact_path("json"), value)?;
        Ok(())
    }
}

/// Whole series to `<leaf>.txt`, one `step: value` line per step.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveText;

impl Handler for SaveText {
    fn name(&self) -> &str {
        "save_to_text"
    }

    fn handle(&self, call: &HandlerCall<'_>) -> anyhow::Result<()> {
        storage::save_text(&call.artifact_path("txt"), &storage::format_series(call.data))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SaveTextLast;

impl Handler for SaveTextLast {
    fn name(&self) -> &str {
        "save_to_text_last"
    }

    fn handle(&self, call: &HandlerCall<'_>) -> anyhow::Result<()> {
        let (_, value) = call.last()?;
        storage::save_text(&call.artifact_path("txt"), &value.to_string())?;
        Ok(())
    }
}

/// Whole series to `<leaf>.yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveYaml;

impl Handler for SaveYaml {
    fn name(&self) -> &str {
        "save_to_yaml"
    }

    fn handle(&self, call: &HandlerCall<'_>) -> anyhow::Result<()> {
        // String keys keep the mapping readable by non-Rust YAML tools.
        let keyed: BTreeMap<String, _> = call
            .data
            .iter()
            .map(|(step, value)| (step.to_string(), value))
            .collect();
        storage::save_yaml(&call.artifact_path("yaml"), &keyed)?;
        Ok(())
    }
}

/// Whole series to `<leaf>.parquet` with `step` and `value` columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveParquet;

impl Handler for SaveParquet {
    fn name(&self) -> &str {
        "save_to_parquet"
    }

    fn handle(&self, call: &HandlerCall<'_>) -> anyhow::Result<()> {
        storage::write_series_parquet(&call.artifact_path("parquet"), call.data)?;
        Ok(())
    }
}
