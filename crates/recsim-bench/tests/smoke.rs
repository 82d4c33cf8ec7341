use std::fs;
use std::path::Path;

use recsim_bench::batch::BatchRunner;
use recsim_bench::config::BenchmarkConfig;
use tempfile::tempdir;

fn load_config(output_dir: &Path) -> BenchmarkConfig {
    let yaml = format!(
        r#"
run_id: "test_smoke"
trials:
  seed: 4242
  episodes: 40
instances:
  - name: "two_genres"
    likes: [[0.9, 0.75], [0.64, 0.5]]
    survival: [[0.2, 0.4], [0.7, 0.8]]
    prior: [0.3, 0.7]
  - name: "flat_pruned"
    likes: [[0.99, 0.2, 0.2], [0.2, 0.99, 0.2], [0.2, 0.2, 0.99], [0.93, 0.93, 0.4], [0.4, 0.93, 0.93], [0.93, 0.4, 0.93], [0.85, 0.85, 0.85]]
    survival: [[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]
    prior: [0.45, 0.25, 0.3]
  - name: "loyal"
    likes: [[0.9, 0.1]]
    survival: [[1.0, 1.0]]
    prior: [0.5, 0.5]
outputs:
  jsonl: "{jsonl}"
  summary_md: "{summary}"
  plots_dir: "{plots}"
logging:
  enable_structured: false
"#,
        jsonl = output_dir.join("episodes.jsonl").display(),
        summary = output_dir.join("summary.md").display(),
        plots = output_dir.join("plots").display()
    );

    let mut cfg: BenchmarkConfig = serde_yaml::from_str(&yaml).expect("valid yaml");
    cfg.validate().expect("config validates");
    cfg
}

/// Rows with timing fields zeroed so runs can be compared.
fn normalized_rows(path: &Path) -> Vec<serde_json::Value> {
    let jsonl = fs::read_to_string(path).expect("jsonl readable");
    jsonl
        .lines()
        .map(|line| {
            let mut value: serde_json::Value =
                serde_json::from_str(line).expect("row decodes to JSON");
            if let Some(obj) = value.as_object_mut() {
                if let Some(elapsed) = obj.get_mut("elapsed_ms") {
                    *elapsed = serde_json::Value::from(0.0);
                }
            }
            value
        })
        .collect()
}

#[test]
fn batch_smoke_test_writes_rows_and_summary() {
    let dir = tempdir().expect("temp dir");
    let config = load_config(dir.path());
    let outputs = config.resolved_outputs();

    let runner = BatchRunner::new(config, outputs).expect("runner created");
    let summary = runner.run().expect("batch completes");

    assert_eq!(summary.episodes_per_instance, 40);
    assert_eq!(summary.rows_written, 120);

    let rows = normalized_rows(&summary.jsonl_path);
    assert_eq!(rows.len(), 120);

    // Trial-major: instances alternate within each trial.
    let names: Vec<&str> = rows
        .iter()
        .take(6)
        .map(|row| row["instance"].as_str().expect("instance name"))
        .collect();
    assert_eq!(
        names,
        ["two_genres", "flat_pruned", "loyal", "two_genres", "flat_pruned", "loyal"]
    );

    for row in &rows {
        let reward = row["reward"].as_u64().expect("reward");
        let rounds = row["rounds"].as_u64().expect("rounds");
        assert!(reward <= 15);
        assert!(rounds <= 15);
        match row["termination"].as_str().expect("termination") {
            "user_left" => {
                let left = row["user_left_round"].as_u64().expect("leave round");
                assert_eq!(left, rounds);
                assert!(reward < rounds);
            }
            "horizon_reached" => {
                assert_eq!(rounds, 15);
                assert!(row["user_left_round"].is_null());
            }
            other => panic!("unexpected termination {other}"),
        }
        if row["instance"] == "loyal" {
            assert_eq!(row["termination"], "horizon_reached");
        }
    }

    assert_eq!(summary.analytics.instances.len(), 3);
    for report in &summary.analytics.instances {
        assert_eq!(report.episodes, 40);
        assert!(report.ci.0 <= report.mean_reward && report.mean_reward <= report.ci.1);
        assert_eq!(report.budget_exceeded, 0);
    }

    let markdown = fs::read_to_string(&summary.summary_path).expect("summary readable");
    assert!(markdown.contains("| two_genres | 40 |"));
    assert!(markdown.contains("| loyal | 40 |"));

    let plot_path = summary.plot_path.expect("mean reward plot rendered");
    assert_eq!(plot_path, dir.path().join("plots").join("mean_reward.png"));
    let png = fs::read(&plot_path).expect("plot readable");
    assert!(png.starts_with(b"\x89PNG"));
    assert!(!dir.path().join("telemetry.jsonl").exists());
}

#[test]
fn identical_seeds_reproduce_rows() {
    let first_dir = tempdir().expect("temp dir");
    let second_dir = tempdir().expect("temp dir");

    let run = |dir: &Path| {
        let config = load_config(dir);
        let outputs = config.resolved_outputs();
        let summary = BatchRunner::new(config, outputs)
            .expect("runner created")
            .run()
            .expect("batch completes");
        normalized_rows(&summary.jsonl_path)
    };

    assert_eq!(run(first_dir.path()), run(second_dir.path()));
}

#[test]
fn shipped_configuration_validates() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../bench/bench.yaml");
    let config = BenchmarkConfig::from_path(&path).expect("bench.yaml loads");
    let names: Vec<&str> = config
        .instances
        .iter()
        .map(|instance| instance.name.as_str())
        .collect();
    assert_eq!(names, ["1", "2", "3a", "3b", "3c", "4", "5"]);
    assert_eq!(config.trials.episodes, 10_000);
    for instance in &config.instances {
        instance.build().expect("instance is valid");
    }
}
