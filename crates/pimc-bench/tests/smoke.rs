use std::fs;
use std::path::Path;

use pimc_bench::config::BenchmarkConfig;
use pimc_bench::runner::MatchRunner;
use tempfile::tempdir;

fn load_config(output_dir: &Path) -> BenchmarkConfig {
    let yaml = format!(
        r#"
run_id: "test_smoke"
game:
  kind: "trick"
  players: 3
  hand_size: 4
matches:
  seed: 4242
  count: 2
  rotations: 3
agents:
  - name: "pimc"
    kind: "pimc"
    params:
      rollouts: 6
      seed: 3
      parallel_actions: true
  - name: "random_a"
    kind: "random"
  - name: "random_b"
    kind: "random"
outputs:
  jsonl: "{jsonl}"
  summary_md: "{summary}"
metrics:
  baseline: "random_a"
logging:
  enable_structured: false
"#,
        jsonl = output_dir.join("matches.jsonl").display(),
        summary = output_dir.join("summary.md").display(),
    );

    let mut cfg: BenchmarkConfig = serde_yaml::from_str(&yaml).expect("valid yaml");
    cfg.validate().expect("config validates");
    cfg
}

fn normalized_rows(path: &Path) -> Vec<serde_json::Value> {
    let jsonl = fs::read_to_string(path).expect("jsonl readable");
    jsonl
        .lines()
        .map(|line| {
            let mut value: serde_json::Value = serde_json::from_str(line).expect("row decodes");
            if let Some(speed) = value.get_mut("speed_ms_turn") {
                *speed = serde_json::json!(0.0);
            }
            value
        })
        .collect()
}

fn run_once() -> (pimc_bench::runner::RunSummary, Vec<serde_json::Value>, tempfile::TempDir) {
    let dir = tempdir().expect("temp dir");
    let config = load_config(dir.path());
    let outputs = config.resolved_outputs();
    let runner = MatchRunner::new(config, outputs).expect("runner created");
    let summary = runner.run().expect("matches complete");
    let rows = normalized_rows(&summary.jsonl_path);
    (summary, rows, dir)
}

#[test]
fn smoke_run_is_reproducible() {
    let (summary, first, _dir_a) = run_once();
    let (_, second, _dir_b) = run_once();

    assert_eq!(summary.matches_played, 2);
    assert_eq!(summary.rotations, 3);
    assert_eq!(summary.rows_written, 2 * 3 * 3);
    assert_eq!(first.len(), summary.rows_written);
    assert_eq!(first, second, "identical configs must replay identically");

    for row in &first {
        let place = row["place"].as_u64().expect("place");
        assert!((1..=3).contains(&place));
        // Four tricks, one card per seat each.
        assert_eq!(row["decisions"].as_u64(), Some(4));
    }

    let markdown = fs::read_to_string(&summary.summary_path).expect("summary readable");
    assert!(markdown.contains("| pimc | Pimc |"));
    assert!(markdown.contains("## Branching Factor"));
    assert_eq!(summary.branching.len(), 3);
    assert!(summary.telemetry_path.is_none());
}

#[test]
fn shipped_configs_validate() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../bench");
    for name in ["bench.yaml", "coin.yaml"] {
        let config = BenchmarkConfig::from_path(root.join(name)).expect("shipped config loads");
        assert!(MatchRunner::new(config.clone(), config.resolved_outputs()).is_ok());
    }
}
