//! CSV data logger. Column keys are compiled once, at construction, into
//! accessor closures against the status record's struct+map hybrid, rather
//! than re-parsing a dot-path per row.

use std::path::{Path, PathBuf};

use milton_thermal::{Event, RunHistory, StatusRecord};

/// One logged column: its header key, a `printf`-style numeric format
/// (defaulting to `%s`), and the compiled accessor.
struct Column {
    key: String,
    format: String,
    accessor: Box<dyn Fn(&StatusRecord) -> Option<f64>>,
}

/// A single-producer CSV writer built from a column list. Construction
/// compiles every accessor and expands the filename template once; `write`
/// just evaluates the closures and hands the row to the `csv` crate.
pub struct Logger {
    columns: Vec<Column>,
    writer: csv::Writer<std::fs::File>,
}

impl Logger {
    /// `columns` is `(dotted_key, optional_format)`. `path` has already had
    /// its `%c`/`%d` template expanded by the caller (see
    /// [`expand_filename`]).
    pub fn create(path: &PathBuf, columns: &[(String, Option<String>)]) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        let compiled: Vec<Column> = columns
            .iter()
            .map(|(key, format)| Column {
                key: key.clone(),
                format: format.clone().unwrap_or_else(|| "%s".to_string()),
                accessor: compile_accessor(key),
            })
            .collect();

        writer.write_record(compiled.iter().map(|c| c.key.as_str()))?;
        writer.flush()?;

        Ok(Self { columns: compiled, writer })
    }

    /// Writes one row for `status`, formatting each column per its spec or
    /// leaving the cell empty when the field is absent this tick.
    pub fn write(&mut self, status: &StatusRecord) -> std::io::Result<()> {
        let row: Vec<String> = self
            .columns
            .iter()
            .map(|c| match (c.accessor)(status) {
                Some(v) => format_value(&c.format, v),
                None => String::new(),
            })
            .collect();
        self.writer.write_record(&row)?;
        self.writer.flush()
    }
}

/// Compiles a dotted column key into an accessor. The status record is a
/// flat mapping, so the only "nesting" is the stage attribute namespace
/// (`stage.fan`, etc.); everything else is a direct `StatusRecord::field`
/// lookup.
fn compile_accessor(key: &str) -> Box<dyn Fn(&StatusRecord) -> Option<f64>> {
    let key = key.to_string();
    if let Some(attr) = key.strip_prefix("stage.") {
        let attr = format!("stage-{attr}");
        Box::new(move |status: &StatusRecord| status.field(&attr))
    } else {
        Box::new(move |status: &StatusRecord| status.field(&key))
    }
}

/// Formats `v` per a (small) subset of C `printf` numeric conventions:
/// `%s` (default display), `%.Nf` (fixed precision), `%d`/`%i` (truncated
/// integer).
fn format_value(format: &str, v: f64) -> String {
    if format == "%s" {
        return v.to_string();
    }
    if format == "%d" || format == "%i" {
        return format!("{}", v as i64);
    }
    if let Some(rest) = format.strip_prefix("%.") {
        if let Some(precision_str) = rest.strip_suffix('f') {
            if let Ok(precision) = precision_str.parse::<usize>() {
                return format!("{v:.precision$}");
            }
        }
    }
    v.to_string()
}

/// Reads a CSV log written by [`Logger::create`]/[`Logger::write`] back into
/// a [`RunHistory`], for the `tune` command to fit against. Only the
/// columns named `now`, `period`, `temperature`, `voltage`, `current` and
/// `power` are recognized; anything else in the header is ignored, since
/// `Tuner` only ever reads those fields off a `StatusRecord`.
pub fn read_history(path: &Path) -> std::io::Result<RunHistory> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut history = RunHistory::new();

    for record in reader.records() {
        let record = record?;
        let mut status = StatusRecord::new(Event::TimerEvent, 0.0, 0.0);
        for (header, cell) in headers.iter().zip(record.iter()) {
            if cell.is_empty() {
                continue;
            }
            let Ok(value) = cell.parse::<f64>() else {
                continue;
            };
            match header {
                "now" => status.now = value,
                "period" => status.period = value,
                "temperature" => status.temperature = value,
                "voltage" => status.voltage = value,
                "current" => status.current = value,
                "power" => status.power = value,
                _ => {}
            }
        }
        history.push(status);
    }

    Ok(history)
}

/// Expands `%c` (command name) and `%d` (`YYYYMMDD-HHMMSS` run timestamp)
/// in a filename template. `timestamp` is supplied by the caller (this
/// module does not read the clock, matching the workspace-wide rule that
/// wall time is passed in rather than sampled ad hoc).
pub fn expand_filename(template: &str, command_name: &str, timestamp: &str) -> String {
    template.replace("%c", command_name).replace("%d", timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use milton_thermal::Event;

    #[test]
    fn filename_template_expands_command_and_timestamp() {
        let expanded = expand_filename("%c-%d.csv", "reflow", "20260727-120000");
        assert_eq!(expanded, "reflow-20260727-120000.csv");
    }

    #[test]
    fn fixed_precision_format_matches_printf_style() {
        assert_eq!(format_value("%.2f", 123.4567), "123.46");
        assert_eq!(format_value("%d", 99.9), "99");
        assert_eq!(format_value("%s", 1.5), "1.5");
    }

    #[test]
    fn writes_header_and_rows_for_direct_and_stage_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let columns = vec![
            ("now".to_string(), None),
            ("temperature".to_string(), Some("%.1f".to_string())),
            ("stage.fan".to_string(), None),
        ];
        let mut logger = Logger::create(&path, &columns).unwrap();

        let mut status = StatusRecord::new(Event::TimerEvent, 1.0, 0.5);
        status.temperature = 123.456;
        status.set_extra("stage-fan", 1.0);
        logger.write(&status).unwrap();
        drop(logger);

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("now,temperature,stage.fan"));
        assert_eq!(lines.next(), Some("1,123.5,1"));
    }

    #[test]
    fn missing_field_leaves_the_cell_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let columns = vec![("resistance".to_string(), None)];
        let mut logger = Logger::create(&path, &columns).unwrap();
        let status = StatusRecord::new(Event::TimerEvent, 0.0, 1.0);
        logger.write(&status).unwrap();
        drop(logger);

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        lines.next();
        assert_eq!(lines.next(), Some(""));
    }

    #[test]
    fn read_history_round_trips_a_written_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let columns = vec![
            ("now".to_string(), None),
            ("period".to_string(), None),
            ("temperature".to_string(), None),
        ];
        let mut logger = Logger::create(&path, &columns).unwrap();
        for i in 0..3 {
            let mut status = StatusRecord::new(Event::TimerEvent, i as f64, 1.0);
            status.temperature = 20.0 + i as f64;
            logger.write(&status).unwrap();
        }
        drop(logger);

        let history = read_history(&path).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history.iter().nth(1).unwrap().temperature, 21.0);
    }
}
