//! End-to-end tests driving the `sepsis` binary over files on disk.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn sepsis_binary() -> String {
    env!("CARGO_BIN_EXE_sepsis").to_string()
}

/// Runs the binary with an isolated home so no user config is picked up.
fn sepsis(home: &Path, args: &[&str], envs: &[(&str, &Path)]) -> Output {
    let mut command = Command::new(sepsis_binary());
    command
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("SEPSIS_INPUT_DIR")
        .env_remove("SEPSIS_OUTPUT_DIR")
        .args(args);
    for (key, value) in envs {
        command.env(key, value);
    }
    command.output().expect("failed to run sepsis")
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), contents).unwrap();
}

const DEMOG: &str = "\
subject_id|hadm_id|stay_id|admittime|dischtime|intime|outtime|morta_90|morta_hosp
1|10|30|0|200000|1000|100000||0
1|11|31|1000000|1500000|1100000|1200000|1|1
2|20|40|500|200500|1000|100000||
";

/// Two ICU stays for subject 1 in separate admissions, one for subject 2.
fn write_inputs(dir: &Path) {
    write(dir, "demog.csv", DEMOG);
    write(
        dir,
        "microbio.csv",
        "subject_id|hadm_id|charttime|chartdate|spec_type_desc\n1|10||50000|BLOOD\n",
    );
    write(
        dir,
        "culture.csv",
        "subject_id|hadm_id|stay_id|charttime|itemid\n2|20||20000|70012\n",
    );
    write(
        dir,
        "abx.csv",
        "\
subject_id|hadm_id|stay_id|starttime|antibiotic
1|10||40000|vancomycin
1|11||1150000|cefepime
2|20||30000|piperacillin
",
    );
    write(
        dir,
        "labs_ce.csv",
        "icustay_id|charttime|itemid|valuenum\n30|2000|829|4.1\n",
    );
    write(
        dir,
        "labs_le.csv",
        "icustay_id|timestp|itemid|valuenum\n40|3000|50971|3.9\n",
    );
}

#[test]
fn test_preprocess_writes_onsets() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in");
    let output_dir = temp.path().join("out");
    write_inputs(&input);

    let output = sepsis(
        temp.path(),
        &["preprocess"],
        &[("SEPSIS_INPUT_DIR", input.as_path()), ("SEPSIS_OUTPUT_DIR", output_dir.as_path())],
    );
    assert!(
        output.status.success(),
        "preprocess should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("presumed infection onsets: 2"), "{stdout}");

    let onset = std::fs::read_to_string(output_dir.join("onset.csv")).unwrap();
    assert_eq!(onset, "subject_id|stay_id|onset_time\n1|30|40000\n2|40|20000\n");

    let demog = std::fs::read_to_string(output_dir.join("demog_processed.csv")).unwrap();
    let flags: Vec<&str> = demog
        .lines()
        .skip(1)
        .map(|line| line.rsplit('|').next().unwrap())
        .collect();
    assert_eq!(flags, vec!["0", "1", "0"]);

    let labu = std::fs::read_to_string(output_dir.join("labu.csv")).unwrap();
    assert_eq!(
        labu,
        "icustay_id|charttime|itemid|valuenum\n30|2000|829|4.1\n40|3000|50971|3.9\n"
    );
}

/// Admissions sharing admit and discharge times are duplicates even across
/// subjects, so the second one's stay is gone before resolution.
#[test]
fn test_preprocess_drops_duplicate_admissions() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in");
    let output_dir = temp.path().join("out");
    write_inputs(&input);
    write(
        &input,
        "demog.csv",
        &DEMOG.replace("2|20|40|500|200500|", "2|20|40|0|200000|"),
    );

    let output = sepsis(
        temp.path(),
        &["preprocess", "--json"],
        &[("SEPSIS_INPUT_DIR", input.as_path()), ("SEPSIS_OUTPUT_DIR", output_dir.as_path())],
    );
    assert!(
        output.status.success(),
        "preprocess should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["demographics"]["duplicates_dropped"], 1);
    assert_eq!(summary["cultures"]["unresolved"], 1);
    assert_eq!(summary["antibiotics"]["unresolved"], 1);
    assert_eq!(summary["onsets"], 1);

    let onset = std::fs::read_to_string(output_dir.join("onset.csv")).unwrap();
    assert_eq!(onset, "subject_id|stay_id|onset_time\n1|30|40000\n");
}

#[test]
fn test_preprocess_json_summary() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in");
    write_inputs(&input);

    let output = sepsis(
        temp.path(),
        &["preprocess", "--json"],
        &[("SEPSIS_INPUT_DIR", input.as_path()), ("SEPSIS_OUTPUT_DIR", input.as_path())],
    );
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["onsets"], 2);
    assert_eq!(summary["antibiotics"]["resolved"], 3);
    assert_eq!(summary["cultures"]["resolved"], 2);
    assert_eq!(summary["demographics"]["duplicates_dropped"], 0);
    assert_eq!(summary["lab_rows"], 2);
}

#[test]
fn test_resolve_then_onset_with_config_file() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("data");
    write(
        &dir,
        "stays.csv",
        "stay_id,subject_id,hadm_id,intime,outtime\n30,1,10,1000,5000\n31,1,11,900000,905000\n",
    );
    write(&dir, "cultures.csv", "subject_id,charttime\n1,900\n");
    write(&dir, "abx.csv", "hadm_id,starttime\n10,950\n");
    let config = dir.join("sepsis.toml");
    std::fs::write(&config, "delimiter = \",\"\n").unwrap();
    let config = config.to_str().unwrap();
    let path = |name: &str| dir.join(name).to_str().unwrap().to_string();

    for (kind, input, output) in [
        ("cultures", "cultures.csv", "cultures_resolved.csv"),
        ("antibiotics", "abx.csv", "abx_resolved.csv"),
    ] {
        let result = sepsis(
            temp.path(),
            &[
                "--config",
                config,
                "resolve",
                kind,
                "--stays",
                &path("stays.csv"),
                "--input",
                &path(input),
                "--output",
                &path(output),
            ],
            &[],
        );
        assert!(
            result.status.success(),
            "resolve {kind} should succeed: {}",
            String::from_utf8_lossy(&result.stderr)
        );
    }

    let result = sepsis(
        temp.path(),
        &[
            "--config",
            config,
            "onset",
            "--antibiotics",
            &path("abx_resolved.csv"),
            "--cultures",
            &path("cultures_resolved.csv"),
            "--output",
            &path("onset.csv"),
        ],
        &[],
    );
    assert!(result.status.success());

    let onset = std::fs::read_to_string(dir.join("onset.csv")).unwrap();
    assert_eq!(onset, "subject_id,stay_id,onset_time\n1,30,900\n");
}

#[test]
fn test_missing_input_fails_with_path() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("empty");
    std::fs::create_dir_all(&input).unwrap();

    let output = sepsis(
        temp.path(),
        &["preprocess"],
        &[("SEPSIS_INPUT_DIR", input.as_path()), ("SEPSIS_OUTPUT_DIR", input.as_path())],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read"), "{stderr}");
}
