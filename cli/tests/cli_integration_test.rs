use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_telemwave"))
}

fn tmp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("telemwave-cli-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

fn run_telemwave(args: &[&str]) -> Output {
    Command::new(binary())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute telemwave")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn inspect_json(mode: &str) -> serde_json::Value {
    let output = run_telemwave(&["inspect", mode, "--reset-count", "5", "--uptime", "42", "--seed", "3"]);
    assert!(output.status.success(), "inspect failed: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_str(&stdout_of(&output)).expect("inspect output is not JSON")
}

#[test]
fn test_inspect_fsk_frame() {
    let report = inspect_json("f");
    assert_eq!(report["mode"], "FSK");
    assert_eq!(report["header"]["mode_id"], 7);
    assert_eq!(report["header"]["reset_count"], 5);
    assert_eq!(report["header"]["uptime"], 42);
    assert_eq!(report["layout"]["logical_bytes"], 64);
    assert_eq!(report["symbols"], 96);
    assert_eq!(report["samples"], (10 + 96 * 10) * 240);
    assert_eq!(report["parity"].as_array().unwrap().len(), 1);
    assert_eq!(report["header_bytes"].as_str().unwrap().len(), 12);
    assert_eq!(report["phase_reversals"], 0);
}

#[test]
fn test_inspect_bpsk_frame() {
    let report = inspect_json("b");
    assert_eq!(report["mode"], "BPSK");
    assert_eq!(report["header"]["mode_id"], 0);
    assert_eq!(report["layout"]["logical_bytes"], 476);
    assert_eq!(report["layout"]["sub_frames"], 3);
    assert_eq!(report["symbols"], 476 + 3 * 32);
    assert_eq!(report["samples"], (31 + 572 * 10) * 40);
    assert_eq!(report["parity"].as_array().unwrap().len(), 3);

    // Marker byte 99 follows the packed header fields
    let header = report["header_bytes"].as_str().unwrap();
    assert_eq!(header.len(), 16);
    assert_eq!(&header[12..14], "63");
    assert!(report["phase_reversals"].as_u64().unwrap() > 0);
}

#[test]
fn test_inspect_rejects_text_modes() {
    let output = run_telemwave(&["inspect", "a"]);
    assert!(!output.status.success());
}

#[test]
fn test_encode_fsk_to_wav() {
    let dir = tmp_dir("encode-fsk");
    let wav = dir.join("fsk.wav");
    let output = run_telemwave(&["encode", "f", wav.to_str().unwrap(), "--cycles", "2", "--seed", "9"]);
    assert!(output.status.success(), "encode failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout_of(&output).contains("Encoded 2 cycle(s) in FSK mode"));

    let reader = hound::WavReader::open(&wav).expect("Failed to open WAV");
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 48000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len(), 2 * (10 + 96 * 10) * 240);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_inspect_is_repeatable_with_seed() {
    assert_eq!(inspect_json("b"), inspect_json("b"));

    let output = run_telemwave(&["inspect", "b", "--reset-count", "5", "--uptime", "42", "--seed", "4"]);
    let other: serde_json::Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(other["header_bytes"], inspect_json("b")["header_bytes"]);
    assert_ne!(other["payload"], inspect_json("b")["payload"]);
}

#[test]
fn test_encode_cw_with_identification() {
    let dir = tmp_dir("encode-cw");
    let plain = dir.join("cw.wav");
    let with_id = dir.join("cw-id.wav");

    let output = run_telemwave(&["encode", "c", plain.to_str().unwrap(), "--seed", "2"]);
    assert!(output.status.success());
    let output = run_telemwave(&[
        "encode",
        "c",
        with_id.to_str().unwrap(),
        "--seed",
        "2",
        "--cw-id",
        "--callsign",
        "KB1ABC",
    ]);
    assert!(output.status.success());

    let len = |p: &PathBuf| hound::WavReader::open(p).unwrap().len();
    assert!(len(&plain) > 0);
    assert!(len(&with_id) > len(&plain));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_encode_afsk_is_refused() {
    let dir = tmp_dir("encode-afsk");
    let output = run_telemwave(&["encode", "a", dir.join("a.wav").to_str().unwrap()]);
    assert!(!output.status.success());
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_run_without_listener_counts_resets() {
    let dir = tmp_dir("run-fsk");
    let config = dir.join("sim.cfg");
    let config_arg = config.to_str().unwrap();

    // Port 9 on loopback has no listener; cycles continue without sending
    for expected in [101, 102] {
        let output = run_telemwave(&[
            "run",
            "f",
            "2",
            "--no-cw-id",
            "--config",
            config_arg,
            "--addr",
            "127.0.0.1:9",
            "--seed",
            "1",
        ]);
        assert!(output.status.success(), "run failed: {}", String::from_utf8_lossy(&output.stderr));
        let text = stdout_of(&output);
        assert!(text.contains(&format!("reset count {}", expected)), "{}", text);
        assert!(text.contains("Cycle 2: 1 frame(s)"));
        assert!(text.contains("(not sent)"));
    }

    let saved = fs::read_to_string(&config).unwrap();
    assert!(saved.starts_with("NOCALL 102 "));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_run_afsk_writes_packet_text() {
    let dir = tmp_dir("run-afsk");
    let config = dir.join("sim.cfg");
    fs::write(&config, "KB1ABC 7 40.0379 -75.3433\n").unwrap();
    let text_out = dir.join("t.txt");

    let output = run_telemwave(&[
        "run",
        "a",
        "1",
        "--no-cw-id",
        "--config",
        config.to_str().unwrap(),
        "--text-out",
        text_out.to_str().unwrap(),
        "--addr",
        "127.0.0.1:9",
    ]);
    assert!(output.status.success(), "run failed: {}", String::from_utf8_lossy(&output.stderr));

    let packets = fs::read_to_string(&text_out).unwrap();
    let lines: Vec<&str> = packets.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("KB1ABC>CQ:=4003.79N\\\\07534.33WShi hi 1"));
    assert_eq!(lines[1], "KB1ABC>CQ:010101/hi hi ");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_run_recovers_malformed_config() {
    let dir = tmp_dir("run-malformed");
    let config = dir.join("sim.cfg");
    fs::write(&config, "KB1ABC many 40.0 -75.0\n").unwrap();

    let output = run_telemwave(&[
        "run",
        "f",
        "1",
        "--no-cw-id",
        "--config",
        config.to_str().unwrap(),
        "--addr",
        "127.0.0.1:9",
    ]);
    assert!(output.status.success(), "run failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout_of(&output).contains("reset count 1"));
    assert!(fs::read_to_string(&config).unwrap().starts_with("KB1ABC 1 "));

    fs::remove_dir_all(&dir).ok();
}
