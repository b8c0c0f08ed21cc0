use crate::schema::ParamValue;
use crate::task::{TaskInput, TaskReport};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Reads a task file. `.json` is parsed as JSON, anything else as TOML.
pub fn read_task(path: &Path) -> Result<TaskInput> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read task: {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let task = if is_json {
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse task: {}", path.display()))?
    } else {
        toml::from_str(&text).with_context(|| format!("failed to parse task: {}", path.display()))?
    };
    Ok(task)
}

fn field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Long-format CSV of a task result: one `name,value,role` row per entry.
pub struct CsvWriter {
    w: BufWriter<File>,
}

impl CsvWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let f = File::create(path)
            .with_context(|| format!("failed to create csv: {}", path.display()))?;
        Ok(Self { w: BufWriter::new(f) })
    }

    pub fn write_header(&mut self) -> Result<()> {
        writeln!(self.w, "name,value,role")?;
        Ok(())
    }

    fn write_row(&mut self, name: &str, value: &str, role: &str) -> Result<()> {
        writeln!(self.w, "{},{},{}", field(name), field(value), role)?;
        Ok(())
    }

    pub fn write_report(&mut self, report: &TaskReport) -> Result<()> {
        for (name, value) in report.params.iter() {
            let optimized = report
                .optimized_params
                .as_ref()
                .is_some_and(|o| o.contains_key(name));
            let role = if optimized { "optimized" } else { "input" };
            let text = match value {
                ParamValue::Number(v) => format!("{:.6}", v),
                ParamValue::Text(s) => s.clone(),
            };
            self.write_row(name, &text, role)?;
        }

        self.write_row("ads", &format!("{:.6}", report.ads), "prediction")?;
        self.write_row("rem", &format!("{:.6}", report.rem), "prediction")?;

        let v = &report.verification;
        self.write_row("mass_balance", &v.mass_balance_msg, "verification")?;
        self.write_row("elemental", &v.elemental_msg, "verification")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}
