//! Per-run benchmark metadata, appended to a file as JSON lines.

use std::collections::HashMap;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use json::JsonValue;

/// Everything worth keeping about one benchmark invocation: what ran, with
/// which arguments, where it ran, and what it measured. The output section
/// is filled in by the benchmark before the record is written.
pub struct RunRecord {
    pub benchmark: String,
    parameters: Vec<String>,
    run_date: String,
    system: HashMap<String, String>,
    environment: HashMap<String, String>,
    output: HashMap<String, String>,
}

impl RunRecord {
    pub fn new(benchmark: &str) -> Self {
        RunRecord {
            benchmark: benchmark.to_string(),
            parameters: env::args().skip(1).collect(),
            run_date: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            system: system_info(),
            environment: env_with_prefixes(&["COOPMEM", "SLURM"]),
            output: HashMap::new(),
        }
    }

    /// Add one measured key/value to the record's output section.
    pub fn insert_output(&mut self, key: &str, value: String) {
        self.output.insert(key.to_string(), value);
    }

    pub fn as_json(&self) -> JsonValue {
        json::object! {
            "benchmark" => self.benchmark.clone(),
            "parameters" => self.parameters.clone(),
            "run_date" => self.run_date.clone(),
            "system" => self.system.clone(),
            "environment" => self.environment.clone(),
            "output" => self.output.clone(),
        }
    }

    /// Append the record to `file` as one JSON line, creating parent
    /// directories and the file as needed. Best effort: a benchmark run
    /// never fails because its record could not be written.
    pub fn write(&self, file: &PathBuf) {
        if let Some(parent) = file.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(file) {
            let _ = writeln!(f, "{}", json::stringify(self.as_json()));
        }
    }

    /// `<root>/<benchmark>_<slurm job id or timestamp>_result.jsonl`
    pub fn default_output_path(&self, root: &str) -> PathBuf {
        let time = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let id = self.environment.get("SLURM_JOB_ID").unwrap_or(&time);
        PathBuf::from(format!("{root}/{}_{id}_result.jsonl", self.benchmark))
    }
}

/// Environment variables whose names start with any of the given prefixes.
fn env_with_prefixes(prefixes: &[&str]) -> HashMap<String, String> {
    env::vars()
        .filter(|(key, _)| prefixes.iter().any(|p| key.starts_with(p)))
        .collect()
}

fn system_info() -> HashMap<String, String> {
    let mut info = HashMap::new();
    let sys = sysinfo::System::new_all();

    if let Some(hostname) = sysinfo::System::host_name() {
        info.insert("hostname".to_string(), hostname);
    }
    if let Some(os) = sysinfo::System::long_os_version() {
        info.insert("os".to_string(), os);
    }
    info.insert("cpu_cores".to_string(), sys.cpus().len().to_string());
    info.insert("ram_bytes".to_string(), sys.total_memory().to_string());

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_section_accumulates() {
        let mut rec = RunRecord::new("unit");
        assert_eq!(rec.output.len(), 0);
        rec.insert_output("elapsed_secs", "1.5".into());
        rec.insert_output("mflops", "100.0".into());
        assert_eq!(rec.output.len(), 2);
        assert_eq!(rec.output["elapsed_secs"], "1.5");
    }

    #[test]
    fn json_carries_all_sections() {
        let mut rec = RunRecord::new("unit");
        rec.insert_output("key", "value".into());
        let obj = rec.as_json();
        assert_eq!(obj["benchmark"], "unit");
        assert_eq!(obj["output"]["key"], "value");
        assert!(obj["run_date"].is_string());
        assert!(obj["system"]["cpu_cores"].is_string());
    }

    #[test]
    fn default_path_names_the_benchmark() {
        let rec = RunRecord::new("my_bench");
        let path = rec.default_output_path(".").to_string_lossy().to_string();
        assert!(path.contains("my_bench"));
        assert!(path.ends_with("_result.jsonl"));
    }

    #[test]
    fn env_capture_filters_by_prefix() {
        env::set_var("COOPMEM_UNIT_TEST", "on");
        env::set_var("UNRELATED_UNIT_TEST", "off");
        let rec = RunRecord::new("unit");
        assert_eq!(rec.environment.get("COOPMEM_UNIT_TEST").unwrap(), "on");
        assert!(!rec.environment.contains_key("UNRELATED_UNIT_TEST"));
    }

    #[test]
    fn write_appends_one_line_per_record() {
        let path = env::temp_dir().join("run_record_unit_test.jsonl");
        let _ = fs::remove_file(&path);

        let rec = RunRecord::new("unit");
        rec.write(&path);
        rec.write(&path);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().all(|l| l.contains("\"unit\"")));
        let _ = fs::remove_file(&path);
    }
}
